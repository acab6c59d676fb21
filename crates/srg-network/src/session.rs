//! Sessions dispatch requests through a transport.
//!
//! A [`Session`] is the Rust counterpart of a URL session: it owns the
//! transport, the retry policy, the in-flight deduplication table and the
//! activity monitor shared by all requests created for it. Sessions are cheap
//! to clone.

use crate::activity::NetworkActivity;
use crate::config::SessionConfig;
use crate::dedup::InFlightTable;
use crate::retry::{retry_with_backoff, RetryConfig, RetryDecision};
use crate::transport::{is_retryable_status, retry_after, DynTransport, ReqwestTransport};
use crate::url_request::{RawResponse, UrlRequest};
use crate::Result;
use std::sync::Arc;
use tracing::debug;

struct SessionInner {
    config: SessionConfig,
    transport: DynTransport,
    in_flight: InFlightTable,
    activity: Arc<NetworkActivity>,
}

/// Shared dispatching context for requests.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.inner.config)
            .field("in_flight", &self.inner.in_flight.len())
            .finish()
    }
}

impl Session {
    /// Create a session with the default configuration.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Session using the given configuration and the default transport.
    pub fn with_config(config: SessionConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Builder for sessions with a custom transport or activity monitor.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Configuration of the session.
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Activity monitor notified of running requests.
    pub fn activity(&self) -> &Arc<NetworkActivity> {
        &self.inner.activity
    }

    /// Number of distinct deduplicated exchanges currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// Perform a request, retrying and deduplicating as configured.
    ///
    /// Any HTTP status is returned as a response; only transport failures are
    /// errors at this level.
    pub async fn dispatch(&self, request: &UrlRequest) -> Result<RawResponse> {
        let retry = if request.is_idempotent() {
            self.inner.config.retry.clone()
        } else {
            RetryConfig::disabled()
        };

        let (outcome, stats) = retry_with_backoff(&retry, || self.exchange(request), decide).await;

        if stats.attempts > 1 {
            debug!(
                "{} {} settled after {} attempts ({:?} waiting)",
                request.method(),
                request.url(),
                stats.attempts,
                stats.waited
            );
        }
        outcome
    }

    async fn exchange(&self, request: &UrlRequest) -> Result<RawResponse> {
        if self.inner.config.deduplicate_requests && InFlightTable::is_shareable(request) {
            let transport = self.inner.transport.clone();
            let owned = request.clone();
            self.inner
                .in_flight
                .run(request, async move { transport.send(&owned).await })
                .await
        } else {
            self.inner.transport.send(request).await
        }
    }
}

fn decide(outcome: &Result<RawResponse>) -> RetryDecision {
    match outcome {
        Ok(raw) if is_retryable_status(raw.response.status()) => {
            RetryDecision::Retry(retry_after(&raw.response))
        }
        Err(e) if e.is_retryable() => RetryDecision::Retry(None),
        _ => RetryDecision::Accept,
    }
}

/// Builder for [`Session`].
#[derive(Default)]
pub struct SessionBuilder {
    config: SessionConfig,
    transport: Option<DynTransport>,
    activity: Option<Arc<NetworkActivity>>,
}

impl SessionBuilder {
    /// Set the session configuration.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom transport instead of the reqwest-backed one.
    pub fn transport(mut self, transport: DynTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Report activity to a dedicated monitor instead of the shared one.
    pub fn activity(mut self, activity: Arc<NetworkActivity>) -> Self {
        self.activity = Some(activity);
        self
    }

    /// Build the session, creating the default transport if none was set.
    pub fn build(self) -> Result<Session> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&self.config)?),
        };

        Ok(Session {
            inner: Arc::new(SessionInner {
                config: self.config,
                transport,
                in_flight: InFlightTable::new(),
                activity: self.activity.unwrap_or_else(NetworkActivity::shared),
            }),
        })
    }
}
