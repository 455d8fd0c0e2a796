//! Conversion between [`SearchState`] and URL query parameters.
//!
//! | field         | param    | encoding                                   |
//! |---------------|----------|--------------------------------------------|
//! | `search_term` | `q`      | text, omitted when absent                  |
//! | `page`        | `page`   | decimal, omitted when <= 1                 |
//! | `tab`         | `tab`    | text, omitted when equal to the default    |
//! | `facets`      | `facets` | nested `facet=value&facet=value` string    |
//!
//! The nested facet string is itself a query string: each component is
//! percent-encoded, and the whole string is percent-encoded again as the
//! value of the outer `facets` parameter. Multiple values for one facet
//! repeat the key.
//!
//! Parsing never fails. Malformed input degrades to "field absent" and is
//! logged at debug level.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use super::query::{QueryParams, try_decode_component};
use crate::model::SearchState;

pub const PARAM_TERM: &str = "q";
pub const PARAM_PAGE: &str = "page";
pub const PARAM_TAB: &str = "tab";
pub const PARAM_FACETS: &str = "facets";

/// Parameters owned by the codec, in emission order.
pub const MANAGED_PARAMS: [&str; 4] = [PARAM_TERM, PARAM_PAGE, PARAM_TAB, PARAM_FACETS];

/// Reasons a nested `facets` string is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FacetParseError {
    #[error("invalid percent-encoding in facet pair `{0}`")]
    Encoding(String),

    #[error("facet pair `{0}` has no `=` separator")]
    MissingSeparator(String),

    #[error("facet pair `{0}` has an empty facet id")]
    EmptyFacetId(String),
}

/// Parse query parameters into canonical state.
pub fn parse_state(params: &QueryParams, default_tab: Option<&str>) -> SearchState {
    let mut state = SearchState::default();

    if let Some(term) = params.get(PARAM_TERM) {
        state.set_search_term(term);
    }

    if let Some(raw) = params.get(PARAM_PAGE) {
        state.page = parse_page(raw);
        if state.page.is_none() && !raw.is_empty() && raw.trim() != "1" {
            debug!(page = raw, "ignoring invalid page parameter");
        }
    }

    if let Some(tab) = params.get(PARAM_TAB) {
        state.set_tab(tab, default_tab);
    }

    if let Some(raw) = params.get(PARAM_FACETS) {
        match parse_facets(raw) {
            Ok(facets) => state.facets = facets,
            Err(err) => debug!(facets = raw, error = %err, "ignoring malformed facets parameter"),
        }
    }

    state
}

/// Parse a page number. Non-numeric, zero, negative and 1 all mean absent.
pub fn parse_page(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|p| *p > 1)
}

/// Parse the decoded value of the `facets` parameter.
pub fn parse_facets(raw: &str) -> Result<BTreeMap<String, Vec<String>>, FacetParseError> {
    let mut facets: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for pair in raw.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| FacetParseError::MissingSeparator(pair.to_string()))?;
        let key = try_decode_component(key)
            .ok_or_else(|| FacetParseError::Encoding(pair.to_string()))?;
        let value = try_decode_component(value)
            .ok_or_else(|| FacetParseError::Encoding(pair.to_string()))?;
        if key.is_empty() {
            return Err(FacetParseError::EmptyFacetId(pair.to_string()));
        }
        if value.is_empty() {
            continue;
        }
        let values = facets.entry(key.into_owned()).or_default();
        if !values.iter().any(|v| v.as_str() == value) {
            values.push(value.into_owned());
        }
    }
    Ok(facets)
}

/// Render facets as the nested query string (before outer encoding).
pub fn encode_facets(facets: &BTreeMap<String, Vec<String>>) -> String {
    facets
        .iter()
        .flat_map(|(facet, values)| {
            values.iter().map(move |value| {
                format!(
                    "{}={}",
                    urlencoding::encode(facet),
                    urlencoding::encode(value)
                )
            })
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Render canonical state as query parameters in `q`, `page`, `tab`,
/// `facets` order.
pub fn state_to_params(state: &SearchState, default_tab: Option<&str>) -> QueryParams {
    let state = state.canonical(default_tab);
    let mut params = QueryParams::new();
    if let Some(term) = &state.search_term {
        params.append(PARAM_TERM, term.as_str());
    }
    if let Some(page) = state.page {
        params.append(PARAM_PAGE, page.to_string());
    }
    if let Some(tab) = &state.tab {
        params.append(PARAM_TAB, tab.as_str());
    }
    if !state.facets.is_empty() {
        params.append(PARAM_FACETS, encode_facets(&state.facets));
    }
    params
}

/// Replace the managed parameters of `existing` with `state`, keeping any
/// foreign parameters (in their original order) after the managed ones.
pub fn merge_params(
    existing: &QueryParams,
    state: &SearchState,
    default_tab: Option<&str>,
) -> QueryParams {
    let mut params = state_to_params(state, default_tab);
    for (key, value) in existing.iter() {
        if !MANAGED_PARAMS.contains(&key) {
            params.append(key, value);
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_facets(pairs: &[(&str, &str)]) -> SearchState {
        let mut state = SearchState::default();
        for (facet, value) in pairs {
            state.insert_facet_value(facet, value);
        }
        state
    }

    #[test]
    fn parses_full_query() {
        let params = QueryParams::parse("?q=doctor&page=2&facets=type%3Dvideo");
        let state = parse_state(&params, None);
        assert_eq!(state.search_term.as_deref(), Some("doctor"));
        assert_eq!(state.page, Some(2));
        assert_eq!(state.selected_values("type"), ["video".to_string()]);
    }

    #[test]
    fn missing_params_are_absent() {
        let state = parse_state(&QueryParams::parse(""), None);
        assert!(state.is_empty());
    }

    #[test]
    fn invalid_pages_are_absent() {
        for raw in ["abc", "0", "-3", "1", "", "2.5", "99999999999"] {
            assert_eq!(parse_page(raw), None, "page `{raw}`");
        }
        assert_eq!(parse_page(" 4 "), Some(4));
    }

    #[test]
    fn malformed_facets_mean_no_facets() {
        for raw in ["facets=category", "facets=%3Dnews", "facets=category%3D%25ZZ"] {
            let state = parse_state(&QueryParams::parse(raw), None);
            assert!(state.facets.is_empty(), "query `{raw}`");
        }
    }

    #[test]
    fn malformed_facets_keep_other_fields() {
        let state = parse_state(&QueryParams::parse("q=x&facets=broken"), None);
        assert_eq!(state.search_term.as_deref(), Some("x"));
        assert!(state.facets.is_empty());
    }

    #[test]
    fn parse_facets_reports_reason() {
        assert_eq!(
            parse_facets("category"),
            Err(FacetParseError::MissingSeparator("category".into()))
        );
        assert_eq!(
            parse_facets("=news"),
            Err(FacetParseError::EmptyFacetId("=news".into()))
        );
        assert!(matches!(
            parse_facets("a=%G1"),
            Err(FacetParseError::Encoding(_))
        ));
    }

    #[test]
    fn repeated_keys_collect_values_without_duplicates() {
        let facets = parse_facets("type=video&type=article&type=video&type=").unwrap();
        assert_eq!(facets["type"], vec!["video".to_string(), "article".to_string()]);
    }

    #[test]
    fn default_tab_is_not_emitted() {
        let mut state = SearchState::default();
        state.tab = Some("all".into());
        assert!(state_to_params(&state, Some("all")).is_empty());
        assert_eq!(
            state_to_params(&state, None).to_query_string(),
            "tab=all"
        );
    }

    #[test]
    fn params_render_in_fixed_order() {
        let mut state = state_with_facets(&[("category", "news")]);
        state.search_term = Some("hospital".into());
        state.page = Some(3);
        state.tab = Some("articles".into());
        assert_eq!(
            state_to_params(&state, None).to_query_string(),
            "q=hospital&page=3&tab=articles&facets=category%3Dnews"
        );
    }

    #[test]
    fn facet_values_with_reserved_characters_survive() {
        let state = state_with_facets(&[("brand", "A&B=C"), ("size", "10 %")]);
        let rendered = state_to_params(&state, None).to_query_string();
        let parsed = parse_state(&QueryParams::parse(&rendered), None);
        assert_eq!(parsed, state);
    }

    #[test]
    fn merge_keeps_foreign_params() {
        let existing = QueryParams::parse("utm_source=mail&q=old&page=4");
        let mut state = SearchState::default();
        state.search_term = Some("new".into());
        let merged = merge_params(&existing, &state, None);
        assert_eq!(merged.to_query_string(), "q=new&utm_source=mail");
    }
}
