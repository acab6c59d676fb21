//! Cooperative cancellation of running requests.
//!
//! Each run of a request owns a token. [`Request::cancel`](crate::BaseRequest::cancel)
//! trips it, and the running task, which races its exchange against
//! [`CancellationToken::cancelled`], drops the exchange right away.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Shared {
    tripped: AtomicBool,
    waiters: Notify,
}

/// Cloneable cancellation flag which can be awaited.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    shared: Arc<Shared>,
}

impl CancellationToken {
    /// Token that is not cancelled yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the token. Waiters are woken on the first call only.
    pub fn cancel(&self) {
        if !self.shared.tripped.swap(true, Ordering::AcqRel) {
            self.shared.waiters.notify_waiters();
        }
    }

    /// Whether the token has been tripped.
    pub fn is_cancelled(&self) -> bool {
        self.shared.tripped.load(Ordering::Acquire)
    }

    /// Wait until the token is tripped.
    pub async fn cancelled(&self) {
        let notified = self.shared.waiters.notified();
        tokio::pin!(notified);
        // Registered before reading the flag, so a concurrent cancel wakes us.
        notified.as_mut().enable();
        if !self.is_cancelled() {
            notified.await;
        }
    }
}
