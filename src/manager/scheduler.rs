//! URL update scheduling: a debounce slot for keystroke-driven updates and
//! a single FIFO worker that runs navigations one at a time.
//!
//! Queued updates render the manager state when they run, not when they were
//! queued, so the last navigation always reflects the latest mutation. An
//! update whose rendered href already matches the URL is not navigated, so
//! no duplicate history entry is pushed.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::navigation::{NavHandle, NavigationTarget};
use crate::model::SearchState;
use crate::url::merge_params;

/// How a scheduled URL update ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The navigation call completed.
    Navigated,
    /// The URL already matched the state; no navigation was issued.
    Unchanged,
    /// The navigation call failed; the error was logged.
    Failed,
    /// A newer debounced call replaced this one before it ran.
    Superseded,
    /// The router was not ready, so the URL was left alone.
    NotReady,
    /// The manager had not read the URL yet, so it was left alone.
    NotInitialized,
}

/// Completion of a scheduled URL update.
///
/// Awaiting is optional; the update runs whether or not the handle is polled.
#[must_use = "await the handle to observe when the URL has been updated"]
#[derive(Debug)]
pub struct UpdateHandle {
    rx: oneshot::Receiver<UpdateOutcome>,
}

impl UpdateHandle {
    fn new(rx: oneshot::Receiver<UpdateOutcome>) -> Self {
        Self { rx }
    }

    /// Handle that is already complete.
    pub fn ready(outcome: UpdateOutcome) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(outcome);
        Self { rx }
    }
}

impl Future for UpdateHandle {
    type Output = UpdateOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A dropped sender means the job was cancelled with its timer.
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or(UpdateOutcome::Superseded))
    }
}

/// Hrefs the manager put in the URL or has already read from it.
#[derive(Debug, Default)]
struct KnownHrefs {
    settled: Option<String>,
    navigating: Option<String>,
}

/// State shared between the manager, its debounce timers and the worker.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) state: Mutex<SearchState>,
    pub(crate) default_tab: Option<String>,
    in_flight: AtomicUsize,
    idle: Notify,
    hrefs: Mutex<KnownHrefs>,
}

impl Shared {
    pub(crate) fn new(default_tab: Option<String>) -> Self {
        Self {
            state: Mutex::new(SearchState::default()),
            default_tab,
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
            hrefs: Mutex::new(KnownHrefs::default()),
        }
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until the worker reports progress.
    pub(crate) fn idle(&self) -> &Notify {
        &self.idle
    }

    /// Record `href` as the URL the state was last in sync with.
    pub(crate) fn mark_settled(&self, href: String) {
        self.hrefs.lock().settled = Some(href);
    }

    /// True when `href` is the URL last in sync with the state or the one a
    /// running navigation is writing. Any other URL came from outside.
    pub(crate) fn is_known_href(&self, href: &str) -> bool {
        let hrefs = self.hrefs.lock();
        hrefs.settled.as_deref() == Some(href) || hrefs.navigating.as_deref() == Some(href)
    }

    fn begin_navigation(&self, href: &str) {
        self.hrefs.lock().navigating = Some(href.to_string());
    }

    fn end_navigation(&self, settled: Option<String>) {
        let mut hrefs = self.hrefs.lock();
        hrefs.navigating = None;
        if settled.is_some() {
            hrefs.settled = settled;
        }
    }

    fn target_for(&self, nav: &NavHandle) -> NavigationTarget {
        let state = self.state.lock().clone();
        let query = merge_params(&nav.query(), &state, self.default_tab.as_deref());
        NavigationTarget::shallow(nav.pathname(), query)
    }
}

struct NavJob {
    nav: NavHandle,
    reason: &'static str,
    done: Option<oneshot::Sender<UpdateOutcome>>,
}

/// Sender side of the navigation worker.
#[derive(Clone)]
pub(crate) struct UpdateQueue {
    tx: mpsc::UnboundedSender<NavJob>,
    shared: Arc<Shared>,
}

impl UpdateQueue {
    /// Spawn the worker on the current tokio runtime.
    pub(crate) fn spawn(shared: Arc<Shared>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(rx, Arc::clone(&shared)));
        Self { tx, shared }
    }

    /// Queue an immediate update and return its completion handle.
    pub(crate) fn schedule(&self, nav: &NavHandle, reason: &'static str) -> UpdateHandle {
        let (tx, rx) = oneshot::channel();
        self.enqueue(Arc::clone(nav), reason, Some(tx));
        UpdateHandle::new(rx)
    }

    fn enqueue(
        &self,
        nav: NavHandle,
        reason: &'static str,
        done: Option<oneshot::Sender<UpdateOutcome>>,
    ) {
        self.shared.in_flight.fetch_add(1, Ordering::SeqCst);
        let job = NavJob { nav, reason, done };
        if let Err(mpsc::error::SendError(job)) = self.tx.send(job) {
            warn!(reason = job.reason, "navigation worker stopped; dropping URL update");
            self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.shared.idle.notify_waiters();
            if let Some(done) = job.done {
                let _ = done.send(UpdateOutcome::Failed);
            }
        }
    }
}

async fn run_worker(mut rx: mpsc::UnboundedReceiver<NavJob>, shared: Arc<Shared>) {
    while let Some(job) = rx.recv().await {
        let outcome = execute(&shared, &job).await;
        shared.in_flight.fetch_sub(1, Ordering::SeqCst);
        shared.idle.notify_waiters();
        if let Some(done) = job.done {
            let _ = done.send(outcome);
        }
    }
    debug!("navigation worker finished");
}

async fn execute(shared: &Shared, job: &NavJob) -> UpdateOutcome {
    if !job.nav.is_ready() {
        debug!(reason = job.reason, "router not ready; skipping URL update");
        return UpdateOutcome::NotReady;
    }
    let target = shared.target_for(&job.nav);
    let href = target.href();
    if job.nav.current_href() == href {
        debug!(reason = job.reason, href = %href, "URL already up to date");
        shared.mark_settled(href);
        return UpdateOutcome::Unchanged;
    }

    debug!(reason = job.reason, href = %href, "navigating");
    shared.begin_navigation(&href);
    match job.nav.navigate(target).await {
        Ok(()) => {
            shared.end_navigation(Some(href));
            UpdateOutcome::Navigated
        }
        Err(err) => {
            shared.end_navigation(None);
            warn!(reason = job.reason, href = %href, error = %err, "URL update failed");
            UpdateOutcome::Failed
        }
    }
}

#[derive(Default)]
struct DebounceSlot {
    generation: u64,
    waiter: Option<oneshot::Sender<UpdateOutcome>>,
    timer: Option<JoinHandle<()>>,
}

/// Collapses bursts of calls so only the last one reaches the queue.
pub(crate) struct Debouncer {
    window: Duration,
    slot: Arc<Mutex<DebounceSlot>>,
}

impl Debouncer {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            slot: Arc::new(Mutex::new(DebounceSlot::default())),
        }
    }

    /// Restart the window. A previously armed call resolves as superseded.
    pub(crate) fn schedule(
        &self,
        queue: &UpdateQueue,
        nav: &NavHandle,
        reason: &'static str,
    ) -> UpdateHandle {
        let (tx, rx) = oneshot::channel();
        let mut slot = self.slot.lock();
        if let Some(previous) = slot.waiter.take() {
            let _ = previous.send(UpdateOutcome::Superseded);
        }
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
        slot.generation += 1;
        slot.waiter = Some(tx);

        let generation = slot.generation;
        let window = self.window;
        let slot_ref = Arc::clone(&self.slot);
        let queue = queue.clone();
        let nav = Arc::clone(nav);
        slot.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let mut slot = slot_ref.lock();
            if slot.generation != generation {
                return;
            }
            slot.timer = None;
            let waiter = slot.waiter.take();
            // Enqueue under the lock so the update is never invisible to
            // `is_armed` and `in_flight` at the same time.
            queue.enqueue(nav, reason, waiter);
        }));
        UpdateHandle::new(rx)
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.slot.lock().waiter.is_some()
    }

    /// Drop the armed call, if any; its handle resolves as superseded.
    pub(crate) fn cancel(&self) -> bool {
        let mut slot = self.slot.lock();
        slot.generation += 1;
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
        match slot.waiter.take() {
            Some(waiter) => {
                let _ = waiter.send(UpdateOutcome::Superseded);
                true
            }
            None => false,
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some(timer) = self.slot.lock().timer.take() {
            timer.abort();
        }
    }
}
