//! Network activity management (opt-in).
//!
//! The network is considered active while at least one request is running.
//! Interested parties register a handler, called on every transition between
//! idle and active. Sessions report to [`NetworkActivity::shared`] unless
//! configured with their own monitor.

use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

type ActivityHandler = Arc<dyn Fn(bool) + Send + Sync>;

#[derive(Default)]
struct ActivityState {
    running_requests: usize,
    handler: Option<ActivityHandler>,
}

/// Counts running requests and reports activity changes.
#[derive(Default)]
pub struct NetworkActivity {
    state: Mutex<ActivityState>,
}

impl std::fmt::Debug for NetworkActivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("NetworkActivity")
            .field("running_requests", &state.running_requests)
            .field("enabled", &state.handler.is_some())
            .finish()
    }
}

impl NetworkActivity {
    /// Monitor that is not enabled yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide monitor used by sessions by default.
    pub fn shared() -> Arc<NetworkActivity> {
        static SHARED: OnceLock<Arc<NetworkActivity>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(NetworkActivity::new())).clone()
    }

    /// Enable activity reporting through `tracing`.
    pub fn enable(&self) {
        self.enable_with_handler(|active| {
            if active {
                info!("Network activity started");
            } else {
                info!("Network activity stopped");
            }
        });
    }

    /// Enable activity reporting with a custom handler, replacing any previous
    /// one. The handler is immediately called with the current status.
    pub fn enable_with_handler<F>(&self, handler: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let handler: ActivityHandler = Arc::new(handler);
        let active = {
            let mut state = self.state.lock();
            state.handler = Some(handler.clone());
            state.running_requests > 0
        };
        handler(active);
    }

    /// Disable activity reporting. The current handler is called one last time
    /// with `false`.
    pub fn disable(&self) {
        let handler = self.state.lock().handler.take();
        if let Some(handler) = handler {
            handler(false);
        }
    }

    /// Whether at least one request is running.
    pub fn is_active(&self) -> bool {
        self.state.lock().running_requests > 0
    }

    /// Number of requests currently running through sessions using this monitor.
    pub fn running_requests(&self) -> usize {
        self.state.lock().running_requests
    }

    pub(crate) fn increase(&self) {
        let handler = {
            let mut state = self.state.lock();
            state.running_requests += 1;
            debug!("Running requests: {}", state.running_requests);
            if state.running_requests == 1 {
                state.handler.clone()
            } else {
                None
            }
        };
        if let Some(handler) = handler {
            handler(true);
        }
    }

    pub(crate) fn decrease(&self) {
        let handler = {
            let mut state = self.state.lock();
            if state.running_requests == 0 {
                return;
            }
            state.running_requests -= 1;
            debug!("Running requests: {}", state.running_requests);
            if state.running_requests == 0 {
                state.handler.clone()
            } else {
                None
            }
        };
        if let Some(handler) = handler {
            handler(false);
        }
    }
}
