//! Optional notification handlers for the search-execution layer.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::model::SearchState;

pub type KeyphraseHandler = Arc<dyn Fn(&str) + Send + Sync>;
pub type PageHandler = Arc<dyn Fn(u32) + Send + Sync>;
pub type FacetClickHandler = Arc<dyn Fn(&FacetClick) + Send + Sync>;
pub type FiltersClearedHandler = Arc<dyn Fn() + Send + Sync>;

/// Kind of facet selection reported to the search layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FacetClickKind {
    /// Selection by stable value identifier.
    ValueId,
}

/// A facet selection pushed to the search layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetClick {
    pub facet_id: String,
    pub value_id: String,
    pub kind: FacetClickKind,
    pub checked: bool,
    /// Position of the facet among the selected facets.
    pub facet_index: usize,
}

/// Handlers invoked by the manager. Missing handlers are no-ops.
#[derive(Clone, Default)]
pub struct SearchCallbacks {
    pub on_keyphrase: Option<KeyphraseHandler>,
    pub on_page: Option<PageHandler>,
    pub on_facet_click: Option<FacetClickHandler>,
    pub on_filters_cleared: Option<FiltersClearedHandler>,
}

impl SearchCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keyphrase(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_keyphrase = Some(Arc::new(f));
        self
    }

    pub fn with_page(mut self, f: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.on_page = Some(Arc::new(f));
        self
    }

    pub fn with_facet_click(mut self, f: impl Fn(&FacetClick) + Send + Sync + 'static) -> Self {
        self.on_facet_click = Some(Arc::new(f));
        self
    }

    pub fn with_filters_cleared(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_filters_cleared = Some(Arc::new(f));
        self
    }

    pub(crate) fn keyphrase(&self, term: &str) {
        if let Some(f) = &self.on_keyphrase {
            f(term);
        }
    }

    pub(crate) fn page(&self, page: u32) {
        if let Some(f) = &self.on_page {
            f(page);
        }
    }

    pub(crate) fn facet_click(&self, click: &FacetClick) {
        if let Some(f) = &self.on_facet_click {
            f(click);
        }
    }

    pub(crate) fn filters_cleared(&self) {
        if let Some(f) = &self.on_filters_cleared {
            f();
        }
    }

    /// Push a parsed state to the search layer: keyphrase if set, page if
    /// past the first, then one checked facet click per selected value.
    pub(crate) fn replay(&self, state: &SearchState) {
        if let Some(term) = &state.search_term {
            self.keyphrase(term);
        }
        if let Some(page) = state.page.filter(|p| *p > 1) {
            self.page(page);
        }
        for (facet_index, (facet_id, values)) in state.facets.iter().enumerate() {
            for value_id in values {
                self.facet_click(&FacetClick {
                    facet_id: facet_id.clone(),
                    value_id: value_id.clone(),
                    kind: FacetClickKind::ValueId,
                    checked: true,
                    facet_index,
                });
            }
        }
    }
}

impl fmt::Debug for SearchCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchCallbacks")
            .field("on_keyphrase", &self.on_keyphrase.is_some())
            .field("on_page", &self.on_page.is_some())
            .field("on_facet_click", &self.on_facet_click.is_some())
            .field("on_filters_cleared", &self.on_filters_cleared.is_some())
            .finish()
    }
}
