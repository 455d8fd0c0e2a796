//! Router seam used by the manager.
//!
//! The host application implements [`Navigator`] on top of its router. Every
//! navigation issued by the manager is shallow (no document reload) and
//! never restores scroll position.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

use crate::url::{QueryParams, join_href, split_href};

/// Shared navigation handle passed to every manager operation.
pub type NavHandle = Arc<dyn Navigator>;

/// A URL change requested by the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationTarget {
    pub pathname: String,
    pub query: QueryParams,
    /// Update history without reloading the document.
    pub shallow: bool,
    /// Scroll to top after navigating.
    pub scroll: bool,
}

impl NavigationTarget {
    pub fn shallow(pathname: impl Into<String>, query: QueryParams) -> Self {
        Self {
            pathname: pathname.into(),
            query,
            shallow: true,
            scroll: false,
        }
    }

    pub fn href(&self) -> String {
        join_href(&self.pathname, &self.query)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    #[error("navigation rejected: {0}")]
    Rejected(String),

    #[error("navigation cancelled by a newer route change")]
    Cancelled,

    #[error("router is not ready")]
    NotReady,
}

/// Host router abstraction.
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Whether `query()` is authoritative. Before readiness the query is
    /// empty and must not be trusted.
    fn is_ready(&self) -> bool;

    /// Current path without the query string.
    fn pathname(&self) -> String;

    /// Current decoded query parameters.
    fn query(&self) -> QueryParams;

    /// Current href in the same normalized form as [`NavigationTarget::href`].
    fn current_href(&self) -> String {
        join_href(&self.pathname(), &self.query())
    }

    async fn navigate(&self, target: NavigationTarget) -> Result<(), NavigationError>;
}

#[derive(Debug)]
struct History {
    entries: Vec<String>,
    index: usize,
}

/// In-memory router with a browser-like history stack.
///
/// Used by the CLI to replay operations and by tests as a stand-in router.
#[derive(Debug)]
pub struct MemoryNavigator {
    history: Mutex<History>,
    ready: AtomicBool,
    navigations: AtomicUsize,
}

impl MemoryNavigator {
    /// Start at `href` (path, full URL, or bare query), ready.
    pub fn new(href: &str) -> Self {
        let (path, query) = split_href(href);
        let path = if path.is_empty() { "/".to_string() } else { path };
        Self {
            history: Mutex::new(History {
                entries: vec![join_href(&path, &query)],
                index: 0,
            }),
            ready: AtomicBool::new(true),
            navigations: AtomicUsize::new(0),
        }
    }

    /// Same as [`MemoryNavigator::new`] but not yet ready.
    pub fn not_ready(href: &str) -> Self {
        let nav = Self::new(href);
        nav.ready.store(false, Ordering::SeqCst);
        nav
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Current href (`/path?query`).
    pub fn href(&self) -> String {
        let history = self.history.lock();
        history.entries[history.index].clone()
    }

    /// Simulate a navigation the manager did not issue (link click, typed URL).
    pub fn push(&self, href: &str) {
        let (path, query) = split_href(href);
        let path = if path.is_empty() { self.pathname() } else { path };
        let mut history = self.history.lock();
        let next = history.index + 1;
        history.entries.truncate(next);
        history.entries.push(join_href(&path, &query));
        history.index = next;
    }

    /// Browser back button. Returns false at the start of history.
    pub fn back(&self) -> bool {
        let mut history = self.history.lock();
        if history.index == 0 {
            return false;
        }
        history.index -= 1;
        true
    }

    /// Browser forward button. Returns false at the end of history.
    pub fn forward(&self) -> bool {
        let mut history = self.history.lock();
        if history.index + 1 >= history.entries.len() {
            return false;
        }
        history.index += 1;
        true
    }

    /// Number of successful `navigate` calls.
    pub fn navigation_count(&self) -> usize {
        self.navigations.load(Ordering::SeqCst)
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().entries.len()
    }
}

#[async_trait]
impl Navigator for MemoryNavigator {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn pathname(&self) -> String {
        split_href(&self.href()).0
    }

    fn query(&self) -> QueryParams {
        if !self.is_ready() {
            return QueryParams::new();
        }
        split_href(&self.href()).1
    }

    async fn navigate(&self, target: NavigationTarget) -> Result<(), NavigationError> {
        if !self.is_ready() {
            return Err(NavigationError::NotReady);
        }
        self.push(&target.href());
        self.navigations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
