//! Request queues.
//!
//! A queue groups related requests and reports when they start and stop
//! running as a whole. Errors reported while the queue runs are delivered
//! together once all requests have ended. Errors reported to an idle queue
//! are discarded. For a queue `Q` with requests `R1`,
//! `R2`, the calls happen in this order:
//!
//! ```text
//! Q state change (finished = false)
//! R1 / R2 completions, in any order
//! Q state change (finished = true, reported errors)
//! ```
//!
//! Queues reference their requests weakly. A request dropped by its owner and
//! no longer running simply leaves the queue. Dropping the last handle to a
//! queue cancels the requests it still references.

use crate::request::{BaseRequest, RequestHandle, RunControl, RunningObserver};
use crate::NetworkError;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

type StateChangeHandler = Arc<dyn Fn(bool, Option<NetworkError>) + Send + Sync>;

#[derive(Default)]
struct QueueState {
    requests: Vec<RequestHandle>,
    running: bool,
    errors: Vec<NetworkError>,
}

struct QueueInner {
    state: Mutex<QueueState>,
    state_change: Option<StateChangeHandler>,
    running: watch::Sender<bool>,
}

impl QueueInner {
    fn live_requests(&self) -> Vec<Arc<dyn RunControl>> {
        let mut state = self.state.lock();
        state.requests.retain(RequestHandle::is_alive);
        state
            .requests
            .iter()
            .filter_map(RequestHandle::upgrade)
            .collect()
    }

    fn update(&self) {
        let transition = {
            let mut state = self.state.lock();
            state.requests.retain(RequestHandle::is_alive);
            let running = state
                .requests
                .iter()
                .filter_map(RequestHandle::upgrade)
                .any(|request| request.is_running());

            if running == state.running {
                None
            } else {
                state.running = running;
                if running {
                    Some((false, None))
                } else {
                    Some((true, NetworkError::combine(std::mem::take(&mut state.errors))))
                }
            }
        };

        if let Some((finished, error)) = transition {
            debug!(
                "Queue {} ({} errors)",
                if finished { "finished" } else { "started" },
                error.as_ref().map(|e| e.errors().len()).unwrap_or(0)
            );
            if let Some(handler) = &self.state_change {
                handler(finished, error);
            }
            let running = self.state.lock().running;
            self.running.send_replace(running);
        }
    }
}

impl RunningObserver for QueueInner {
    fn running_changed(&self) {
        self.update();
    }
}

impl Drop for QueueInner {
    fn drop(&mut self) {
        let requests = std::mem::take(&mut self.state.get_mut().requests);
        for request in requests.iter().filter_map(RequestHandle::upgrade) {
            request.cancel();
        }
    }
}

/// Groups requests and tracks their global running state.
#[derive(Clone)]
pub struct RequestQueue {
    inner: Arc<QueueInner>,
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("RequestQueue")
            .field("requests", &state.requests.len())
            .field("running", &state.running)
            .field("errors", &state.errors.len())
            .finish()
    }
}

impl RequestQueue {
    /// Queue without state change handler.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Queue calling `handler` when it starts (`finished == false`) and when
    /// it finishes (`finished == true`, with the reported errors, if any).
    pub fn with_state_change<F>(handler: F) -> Self
    where
        F: Fn(bool, Option<NetworkError>) + Send + Sync + 'static,
    {
        Self::build(Some(Arc::new(handler)))
    }

    fn build(state_change: Option<StateChangeHandler>) -> Self {
        let (running, _) = watch::channel(false);
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState::default()),
                state_change,
                running,
            }),
        }
    }

    /// Add a request to the queue, optionally resuming it. The queue state is
    /// updated immediately.
    ///
    /// Adding the same request to several queues is not supported.
    pub fn add_request<R: BaseRequest + ?Sized>(&self, request: &R, resume: bool) {
        let handle = request.handle();
        let Some(control) = handle.upgrade() else {
            return;
        };

        self.inner.state.lock().requests.push(handle);
        let inner: Arc<dyn RunningObserver> = self.inner.clone();
        control.add_observer(Arc::downgrade(&inner));

        if resume {
            control.resume();
        }
        // The request may already be running, in which case resuming it
        // notifies nobody.
        self.inner.update();
    }

    /// Resume all requests in the queue.
    pub fn resume(&self) {
        for request in self.inner.live_requests() {
            request.resume();
        }
    }

    /// Cancel all requests in the queue.
    pub fn cancel(&self) {
        for request in self.inner.live_requests() {
            request.cancel();
        }
    }

    /// Report an error, delivered when the queue finishes. `None` is ignored,
    /// as are errors reported while the queue is not running.
    pub fn report_error(&self, error: Option<NetworkError>) {
        let Some(error) = error else {
            return;
        };
        let mut state = self.inner.state.lock();
        if state.running {
            state.errors.push(error);
        } else {
            warn!("Discarding error reported to an idle queue: {}", error);
        }
    }

    /// Whether at least one request of the queue is running.
    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    /// Observe running state changes.
    pub fn subscribe_running(&self) -> watch::Receiver<bool> {
        self.inner.running.subscribe()
    }

    /// Number of requests still referenced by the queue.
    pub fn len(&self) -> usize {
        self.inner.live_requests().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
