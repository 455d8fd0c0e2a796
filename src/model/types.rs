//! Search state entity.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// In-memory search state mirrored in the URL query string.
///
/// Canonical form:
/// - `search_term` is never `Some("")`
/// - `page` is never `Some(0)` or `Some(1)` (absent means first page)
/// - `tab` is never empty and never the configured default tab
/// - `facets` holds no empty value lists and no duplicate values
///
/// Equality ignores the order of values inside a facet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub facets: BTreeMap<String, Vec<String>>,
}

impl SearchState {
    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.search_term.is_none()
            && self.page.is_none()
            && self.tab.is_none()
            && self.facets.is_empty()
    }

    /// True when a term, a tab or any facet value narrows the results.
    pub fn has_active_filters(&self) -> bool {
        self.search_term.is_some() || self.tab.is_some() || !self.facets.is_empty()
    }

    /// Resolved 1-based page number.
    pub fn page_number(&self) -> u32 {
        self.page.unwrap_or(1)
    }

    pub fn selected_values(&self, facet_id: &str) -> &[String] {
        self.facets.get(facet_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_selected(&self, facet_id: &str, value_id: &str) -> bool {
        self.selected_values(facet_id).iter().any(|v| v == value_id)
    }

    /// Set the term; an empty string clears it.
    pub fn set_search_term(&mut self, term: &str) -> &mut Self {
        self.search_term = (!term.is_empty()).then(|| term.to_string());
        self
    }

    /// Set the page; values of 1 or below clear it.
    pub fn set_page(&mut self, page: u32) -> &mut Self {
        self.page = (page > 1).then_some(page);
        self
    }

    /// Back to the first page.
    pub fn reset_page(&mut self) -> &mut Self {
        self.page = None;
        self
    }

    /// Set the tab; empty or default tabs clear it.
    pub fn set_tab(&mut self, tab: &str, default_tab: Option<&str>) -> &mut Self {
        self.tab = (!tab.is_empty() && Some(tab) != default_tab).then(|| tab.to_string());
        self
    }

    /// Insert a facet value. Returns false if it was already selected.
    pub fn insert_facet_value(&mut self, facet_id: &str, value_id: &str) -> bool {
        let values = self.facets.entry(facet_id.to_string()).or_default();
        if values.iter().any(|v| v == value_id) {
            return false;
        }
        values.push(value_id.to_string());
        true
    }

    /// Remove a facet value, dropping the facet once it has no values.
    /// Returns false if the value was not selected.
    pub fn remove_facet_value(&mut self, facet_id: &str, value_id: &str) -> bool {
        let Some(values) = self.facets.get_mut(facet_id) else {
            return false;
        };
        let before = values.len();
        values.retain(|v| v != value_id);
        let removed = values.len() != before;
        if values.is_empty() {
            self.facets.remove(facet_id);
        }
        removed
    }

    pub fn clear_facets(&mut self) {
        self.facets.clear();
    }

    /// Bring the state into canonical form in place.
    pub fn canonicalize(&mut self, default_tab: Option<&str>) {
        if self.search_term.as_deref() == Some("") {
            self.search_term = None;
        }
        if self.page.is_some_and(|p| p <= 1) {
            self.page = None;
        }
        if let Some(tab) = self.tab.take() {
            self.set_tab(&tab, default_tab);
        }
        for values in self.facets.values_mut() {
            let mut seen = Vec::with_capacity(values.len());
            values.retain(|v| {
                if v.is_empty() || seen.contains(v) {
                    false
                } else {
                    seen.push(v.clone());
                    true
                }
            });
        }
        self.facets.retain(|k, values| !k.is_empty() && !values.is_empty());
    }

    /// Canonical copy of this state.
    pub fn canonical(&self, default_tab: Option<&str>) -> Self {
        let mut state = self.clone();
        state.canonicalize(default_tab);
        state
    }
}

impl PartialEq for SearchState {
    fn eq(&self, other: &Self) -> bool {
        self.search_term == other.search_term
            && self.page == other.page
            && self.tab == other.tab
            && self.facets.len() == other.facets.len()
            && self.facets.iter().all(|(facet, values)| {
                other.facets.get(facet).is_some_and(|theirs| {
                    values.len() == theirs.len() && values.iter().all(|v| theirs.contains(v))
                })
            })
    }
}

impl Eq for SearchState {}
