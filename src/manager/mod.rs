//! Search URL state manager.
//!
//! [`SearchUrlManager`] is the single writer that keeps a [`SearchState`]
//! and the URL query string consistent:
//!
//! - **URL to state**: [`SearchUrlManager::initialize`] and
//!   [`SearchUrlManager::sync_from_url`] parse the query and replay it to
//!   the search layer through [`SearchCallbacks`].
//! - **State to URL**: mutators update the state synchronously, apply the
//!   auto-reset rule (page returns to 1 on term, tab and facet changes) and
//!   schedule a shallow navigation.
//!
//! Search-term updates are debounced; every other mutator is a discrete
//! action and is queued immediately. All navigations run one at a time in
//! call order. Create exactly one manager per session and share it by
//! reference; two managers writing the same URL would overwrite each
//! other's updates.

pub mod callbacks;
pub mod navigation;
pub mod scheduler;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::ManagerConfig;
use crate::model::SearchState;
use crate::url::{join_href, merge_params, parse_state};

pub use callbacks::{FacetClick, FacetClickKind, SearchCallbacks};
pub use navigation::{MemoryNavigator, NavHandle, NavigationError, NavigationTarget, Navigator};
pub use scheduler::{UpdateHandle, UpdateOutcome};

use scheduler::{Debouncer, Shared, UpdateQueue};

pub struct SearchUrlManager {
    config: ManagerConfig,
    shared: Arc<Shared>,
    queue: UpdateQueue,
    debouncer: Debouncer,
    callbacks: RwLock<SearchCallbacks>,
    initialized: AtomicBool,
}

impl SearchUrlManager {
    /// Create a manager with an empty state.
    ///
    /// Spawns the navigation worker, so this must run inside a tokio runtime.
    pub fn new(config: ManagerConfig) -> Self {
        let shared = Arc::new(Shared::new(config.default_tab.clone()));
        let queue = UpdateQueue::spawn(Arc::clone(&shared));
        let debouncer = Debouncer::new(config.debounce);
        Self {
            config,
            shared,
            queue,
            debouncer,
            callbacks: RwLock::new(SearchCallbacks::default()),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Parse the URL, store `callbacks` and replay the parsed state to them.
    ///
    /// Before the router is ready this returns an empty state and changes
    /// nothing; call again once it is ready. Later calls replace the
    /// callbacks but do not replay, so handlers never fire twice for the
    /// same URL.
    pub fn initialize(&self, nav: &NavHandle, callbacks: SearchCallbacks) -> SearchState {
        if !nav.is_ready() {
            debug!("initialize called before router is ready");
            return SearchState::default();
        }

        if self.initialized.swap(true, Ordering::SeqCst) {
            debug!("manager already initialized; keeping current state");
            *self.callbacks.write() = callbacks;
            return self.current_state();
        }

        let parsed = self.parse(nav);
        *self.shared.state.lock() = parsed.clone();
        self.shared.mark_settled(nav.current_href());
        *self.callbacks.write() = callbacks;
        info!(
            term = parsed.search_term.as_deref().unwrap_or(""),
            page = parsed.page_number(),
            facets = parsed.facets.len(),
            "search state initialized from URL"
        );
        self.callbacks().replay(&parsed);
        parsed
    }

    /// Set the keyphrase (empty clears it) and reset the page. The URL
    /// update is debounced.
    pub fn set_search_term(&self, nav: &NavHandle, term: &str) -> UpdateHandle {
        debug!(term, "set_search_term");
        self.shared.state.lock().set_search_term(term).reset_page();
        self.callbacks().page(1);
        if let Some(skipped) = self.skip_if_uninitialized(nav, "search_term") {
            return skipped;
        }
        self.debouncer.schedule(&self.queue, nav, "search_term")
    }

    /// Set the page (1 or less clears it). Nothing else changes.
    pub fn set_page(&self, nav: &NavHandle, page: u32) -> UpdateHandle {
        debug!(page, "set_page");
        self.shared.state.lock().set_page(page);
        self.schedule(nav, "page")
    }

    /// Set the tab (the default tab clears it) and reset the page.
    pub fn set_tab(&self, nav: &NavHandle, tab: &str) -> UpdateHandle {
        debug!(tab, "set_tab");
        self.shared
            .state
            .lock()
            .set_tab(tab, self.config.default_tab.as_deref())
            .reset_page();
        self.callbacks().page(1);
        self.schedule(nav, "tab")
    }

    /// Select a facet value and reset the page. Selecting an already
    /// selected value leaves the facets as they are but still resets the
    /// page and updates the URL.
    pub fn add_facet(&self, nav: &NavHandle, facet_id: &str, value_id: &str) -> UpdateHandle {
        let inserted = {
            let mut state = self.shared.state.lock();
            let inserted = state.insert_facet_value(facet_id, value_id);
            state.reset_page();
            inserted
        };
        debug!(facet_id, value_id, inserted, "add_facet");
        self.callbacks().page(1);
        self.schedule(nav, "add_facet")
    }

    /// Deselect a facet value and reset the page. Unknown values are ignored.
    pub fn remove_facet(&self, nav: &NavHandle, facet_id: &str, value_id: &str) -> UpdateHandle {
        let removed = {
            let mut state = self.shared.state.lock();
            let removed = state.remove_facet_value(facet_id, value_id);
            state.reset_page();
            removed
        };
        debug!(facet_id, value_id, removed, "remove_facet");
        self.callbacks().page(1);
        self.schedule(nav, "remove_facet")
    }

    /// Drop every facet selection; keyphrase and tab are kept.
    pub fn clear_all_facets(&self, nav: &NavHandle) -> UpdateHandle {
        debug!("clear_all_facets");
        {
            let mut state = self.shared.state.lock();
            state.clear_facets();
            state.reset_page();
        }
        let callbacks = self.callbacks();
        callbacks.filters_cleared();
        callbacks.page(1);
        self.schedule(nav, "clear_all_facets")
    }

    /// Reset keyphrase, facets, tab and page together.
    pub fn clear_all_filters(&self, nav: &NavHandle) -> UpdateHandle {
        debug!("clear_all_filters");
        *self.shared.state.lock() = SearchState::default();
        let callbacks = self.callbacks();
        callbacks.filters_cleared();
        callbacks.page(1);
        self.schedule(nav, "clear_all_filters")
    }

    /// Re-read the URL after a navigation the manager did not issue (back,
    /// forward, typed URL). Returns true when the state changed, in which
    /// case the new state is replayed to the callbacks.
    ///
    /// While updates are pending, a URL the manager itself wrote or is
    /// writing only lags behind the state and is ignored. Any other URL
    /// wins: the state is replaced, an armed search-term update is dropped
    /// and, if a navigation is still running, a follow-up update restores
    /// the URL once it settles.
    pub fn sync_from_url(&self, nav: &NavHandle) -> bool {
        if !nav.is_ready() {
            debug!("sync_from_url called before router is ready");
            return false;
        }
        let href = nav.current_href();
        let pending = self.has_pending_updates();
        if pending && self.shared.is_known_href(&href) {
            debug!(
                in_flight = self.shared.in_flight(),
                href = %href,
                "sync_from_url skipped; URL lags behind pending updates"
            );
            return false;
        }
        self.shared.mark_settled(href);

        let parsed = self.parse(nav);
        let changed = {
            let mut state = self.shared.state.lock();
            let changed = *state != parsed;
            if changed {
                *state = parsed.clone();
            }
            changed
        };
        if pending {
            if changed && self.debouncer.cancel() {
                debug!("armed search-term update dropped for external URL change");
            }
            if self.shared.in_flight() > 0 {
                drop(self.queue.schedule(nav, "resync"));
            }
        }
        if !changed {
            return false;
        }
        info!(
            term = parsed.search_term.as_deref().unwrap_or(""),
            page = parsed.page_number(),
            facets = parsed.facets.len(),
            pending,
            "search state synced from URL"
        );
        self.callbacks().replay(&parsed);
        true
    }

    /// Copy of the current state.
    pub fn current_state(&self) -> SearchState {
        self.shared.state.lock().clone()
    }

    /// True while a debounced update is armed or a navigation has not
    /// settled.
    pub fn has_pending_updates(&self) -> bool {
        self.debouncer.is_armed() || self.shared.in_flight() > 0
    }

    /// Wait until every update scheduled so far has settled.
    pub async fn flush(&self) {
        loop {
            let progressed = self.shared.idle().notified();
            if !self.has_pending_updates() {
                return;
            }
            progressed.await;
        }
    }

    /// Shareable href for the current state on the router's current path.
    pub fn href(&self, nav: &NavHandle) -> String {
        let state = self.current_state();
        let query = merge_params(&nav.query(), &state, self.config.default_tab.as_deref());
        join_href(&nav.pathname(), &query)
    }

    fn schedule(&self, nav: &NavHandle, reason: &'static str) -> UpdateHandle {
        match self.skip_if_uninitialized(nav, reason) {
            Some(skipped) => skipped,
            None => self.queue.schedule(nav, reason),
        }
    }

    /// Before `initialize` has read the URL, writing the in-memory state
    /// would wipe the parameters it has not seen yet.
    fn skip_if_uninitialized(
        &self,
        nav: &NavHandle,
        reason: &'static str,
    ) -> Option<UpdateHandle> {
        if self.initialized.load(Ordering::SeqCst) {
            return None;
        }
        let outcome = if nav.is_ready() {
            UpdateOutcome::NotInitialized
        } else {
            UpdateOutcome::NotReady
        };
        debug!(reason, ?outcome, "manager not initialized; URL left unchanged");
        Some(UpdateHandle::ready(outcome))
    }

    fn parse(&self, nav: &NavHandle) -> SearchState {
        parse_state(&nav.query(), self.config.default_tab.as_deref())
    }

    fn callbacks(&self) -> SearchCallbacks {
        self.callbacks.read().clone()
    }
}
