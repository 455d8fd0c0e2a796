use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use search_url_state::config::ManagerConfig;
use search_url_state::manager::{
    FacetClick, MemoryNavigator, NavHandle, NavigationError, NavigationTarget, Navigator,
    SearchCallbacks, SearchUrlManager,
};
use search_url_state::url::QueryParams;

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: Arc<std::sync::Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Assert that the captured log output contains the provided substring.
    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

struct TestWriter(Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[allow(dead_code)]
pub struct EnvGuard {
    key: String,
    prev: Option<String>,
}

#[allow(dead_code)]
impl EnvGuard {
    pub fn set(key: &str, val: impl AsRef<str>) -> Self {
        let prev = std::env::var(key).ok();
        unsafe { std::env::set_var(key, val.as_ref()) };
        Self {
            key: key.to_string(),
            prev,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.prev {
            Some(v) => unsafe { std::env::set_var(&self.key, v) },
            None => unsafe { std::env::remove_var(&self.key) },
        }
    }
}

/// Router double that records every navigation and can inject latency and
/// failures.
#[allow(dead_code)]
pub struct RecordingNavigator {
    inner: MemoryNavigator,
    calls: Mutex<Vec<NavigationTarget>>,
    delays: Mutex<VecDeque<Duration>>,
    failures: Mutex<VecDeque<bool>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

#[allow(dead_code)]
impl RecordingNavigator {
    pub fn new(href: &str) -> Arc<Self> {
        Arc::new(Self::wrap(MemoryNavigator::new(href)))
    }

    pub fn not_ready(href: &str) -> Arc<Self> {
        Arc::new(Self::wrap(MemoryNavigator::not_ready(href)))
    }

    fn wrap(inner: MemoryNavigator) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            delays: Mutex::new(VecDeque::new()),
            failures: Mutex::new(VecDeque::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn handle(self: &Arc<Self>) -> NavHandle {
        self.clone()
    }

    /// Latency for upcoming navigations, one entry per call.
    pub fn delay_next(&self, delays: &[u64]) {
        self.delays
            .lock()
            .extend(delays.iter().map(|ms| Duration::from_millis(*ms)));
    }

    /// Make the next navigation fail.
    pub fn fail_next(&self) {
        self.failures.lock().push_back(true);
    }

    pub fn memory(&self) -> &MemoryNavigator {
        &self.inner
    }

    pub fn href(&self) -> String {
        self.inner.href()
    }

    pub fn calls(&self) -> Vec<NavigationTarget> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Highest number of navigations observed running at once.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Navigator for RecordingNavigator {
    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    fn pathname(&self) -> String {
        self.inner.pathname()
    }

    fn query(&self) -> QueryParams {
        self.inner.query()
    }

    async fn navigate(&self, target: NavigationTarget) -> Result<(), NavigationError> {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        self.calls.lock().push(target.clone());

        let delay = self.delays.lock().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let fail = self.failures.lock().pop_front().unwrap_or(false);
        let result = if fail {
            Err(NavigationError::Rejected("injected failure".into()))
        } else {
            self.inner.navigate(target).await
        };
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Callback invocation, in the order the manager fired them.
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Keyphrase(String),
    Page(u32),
    Facet(FacetClick),
    Cleared,
}

#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct CallbackLog {
    events: Arc<Mutex<Vec<Event>>>,
}

#[allow(dead_code)]
impl CallbackLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callbacks(&self) -> SearchCallbacks {
        let (k, p, f, c) = (
            self.events.clone(),
            self.events.clone(),
            self.events.clone(),
            self.events.clone(),
        );
        SearchCallbacks::new()
            .with_keyphrase(move |term| k.lock().push(Event::Keyphrase(term.to_string())))
            .with_page(move |page| p.lock().push(Event::Page(page)))
            .with_facet_click(move |click| f.lock().push(Event::Facet(click.clone())))
            .with_filters_cleared(move || c.lock().push(Event::Cleared))
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

/// Manager with default config, initialized against `nav`.
#[allow(dead_code)]
pub fn initialized_manager(nav: &NavHandle, log: &CallbackLog) -> SearchUrlManager {
    let manager = SearchUrlManager::new(ManagerConfig::default());
    manager.initialize(nav, log.callbacks());
    manager
}
