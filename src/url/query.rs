//! Ordered query-string parameters.
//!
//! Values are stored decoded. Encoding happens only when the parameters are
//! rendered back into a query string, so callers never see `%XX` escapes.

use std::borrow::Cow;

/// Ordered list of decoded `key=value` query parameters.
///
/// Duplicate keys are allowed (the first one wins for [`QueryParams::get`]),
/// matching how browsers expose `URLSearchParams`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw query string. Accepts a leading `?` and ignores a trailing
    /// `#fragment`. Pairs that fail to decode are kept verbatim so the codec
    /// can decide how to treat them.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.split('#').next().unwrap_or("");
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        let pairs = raw
            .split('&')
            .filter(|part| !part.is_empty())
            .map(|part| match part.split_once('=') {
                Some((k, v)) => (decode_component(k), decode_component(v)),
                None => (decode_component(part), String::new()),
            })
            .collect();
        Self { pairs }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    /// Append a parameter, keeping any existing values for the key.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// Replace every value for `key` with a single value.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.remove(key);
        self.append(key, value);
    }

    pub fn remove(&mut self, key: &str) {
        self.pairs.retain(|(k, _)| k != key);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Render as `k=v&k=v` without a leading `?`.
    pub fn to_query_string(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Split an href (`/path?query#frag`, a full URL, or a bare query) into its
/// path and query parameters. A bare query yields an empty path.
pub fn split_href(href: &str) -> (String, QueryParams) {
    let without_fragment = href.split('#').next().unwrap_or("");
    let (path, query) = match without_fragment.split_once('?') {
        Some((path, query)) => (path, query),
        None if is_bare_query(without_fragment) => ("", without_fragment),
        None => (without_fragment, ""),
    };
    let path = strip_origin(path);
    (path.to_string(), QueryParams::parse(query))
}

/// Join a path and parameters back into an href.
pub fn join_href(path: &str, params: &QueryParams) -> String {
    if params.is_empty() {
        return path.to_string();
    }
    format!("{path}?{}", params.to_query_string())
}

/// A bare query has a `=` or `&` before any `/`; values may still contain
/// unencoded slashes (`q=http/2`).
fn is_bare_query(raw: &str) -> bool {
    if raw.starts_with('/') || raw.contains("://") {
        return false;
    }
    let head = raw.split('/').next().unwrap_or(raw);
    head.contains(['=', '&'])
}

fn strip_origin(path: &str) -> &str {
    match path.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("/", |idx| &rest[idx..]),
        None => path,
    }
}

/// Decode one form-encoded component (`+` is a space).
pub(crate) fn decode_component(raw: &str) -> String {
    try_decode_component(raw).map_or_else(|| raw.to_string(), Cow::into_owned)
}

/// Strict variant of [`decode_component`]; `None` on bad escapes or bad UTF-8.
pub(crate) fn try_decode_component(raw: &str) -> Option<Cow<'_, str>> {
    if !has_valid_escapes(raw) {
        return None;
    }
    if raw.contains('+') {
        let spaced = raw.replace('+', " ");
        return urlencoding::decode(&spaced)
            .ok()
            .map(|s| Cow::Owned(s.into_owned()));
    }
    urlencoding::decode(raw).ok()
}

// urlencoding passes malformed `%` sequences through untouched, so they are
// rejected here.
fn has_valid_escapes(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}
