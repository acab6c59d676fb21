//! Centralized configuration for SRG Network.
//!
//! Constants for timeouts and retries, plus the runtime
//! [`SessionConfig`] used to build sessions.

use crate::retry::RetryConfig;
use std::time::Duration;

/// Network-related constants.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const USER_AGENT: &'static str = concat!("SRGNetwork/", env!("CARGO_PKG_VERSION"));
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const MAX_RETRY_ATTEMPTS: u32 = 3;
    pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
    pub const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);
}

/// Runtime configuration of a [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Total timeout applied to requests without their own timeout.
    pub timeout: Duration,
    /// Timeout for establishing connections.
    pub connect_timeout: Duration,
    pub user_agent: String,
    /// Retry policy for idempotent requests.
    pub retry: RetryConfig,
    /// Share a single exchange between identical concurrent GET/HEAD requests.
    pub deduplicate_requests: bool,
    /// Follow redirections instead of reporting them as errors.
    pub follow_redirects: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: NetworkConfig::REQUEST_TIMEOUT,
            connect_timeout: NetworkConfig::CONNECT_TIMEOUT,
            user_agent: NetworkConfig::USER_AGENT.to_string(),
            retry: RetryConfig::default(),
            deduplicate_requests: true,
            follow_redirects: false,
        }
    }
}

impl SessionConfig {
    /// Configuration with the default values of [`NetworkConfig`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the total timeout of each request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the `User-Agent` header sent with each request.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Enable or disable sharing of identical concurrent GET requests.
    pub fn with_deduplication(mut self, enabled: bool) -> Self {
        self.deduplicate_requests = enabled;
        self
    }

    /// Follow redirects instead of reporting them as errors.
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }
}
