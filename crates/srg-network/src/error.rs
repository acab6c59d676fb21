//! Error types for SRG Network.
//!
//! Transport failures, HTTP status codes, redirections and parse failures are
//! all mapped onto [`NetworkError`], so callers only ever deal with one error
//! type. Errors are cheap to clone since the same outcome can be delivered to
//! several deduplicated requests and collected by request queues.

use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

/// Message used when a failure is likely caused by a public Wi-Fi captive portal.
pub const PUBLIC_WIFI_MESSAGE: &str =
    "You are likely connected to a public wifi network with no Internet access";

/// Main error type for the SRG Network library.
#[derive(Debug, Clone, Error)]
pub enum NetworkError {
    /// An HTTP error status (>= 400) has been received.
    #[error("{message}")]
    Http {
        status: u16,
        url: Url,
        message: String,
    },

    /// A redirection was received. Usually a public Wi-Fi login page.
    #[error("{message}")]
    Redirect {
        url: Url,
        redirection_url: Option<Url>,
        message: String,
    },

    /// The received data could not be parsed.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    /// Any other transport-level failure.
    #[error("{message}")]
    Transport {
        url: String,
        message: String,
        /// Connection or TLS failures, typical of captive portals.
        captive_portal_suspected: bool,
    },

    /// Several errors reported to a request queue.
    #[error("{} errors occurred", .0.len())]
    Multiple(Vec<NetworkError>),

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Result type alias for SRG Network operations.
pub type Result<T> = std::result::Result<T, NetworkError>;

/// Stable error codes, independent of the error payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkErrorCode {
    Http,
    Redirect,
    InvalidData,
    Cancelled,
    Timeout,
    Transport,
    Multiple,
    Configuration,
}

impl NetworkError {
    /// Build an HTTP error for the given status code.
    pub fn http(status: StatusCode, url: Url) -> Self {
        NetworkError::Http {
            status: status.as_u16(),
            url,
            message: localized_status_description(status.as_u16()),
        }
    }

    /// Build a redirection error.
    pub fn redirect(url: Url, redirection_url: Option<Url>) -> Self {
        let message = match &redirection_url {
            Some(target) => format!("Redirected to {}", target),
            None => "Redirected to an unknown location".to_string(),
        };
        NetworkError::Redirect {
            url,
            redirection_url,
            message,
        }
    }

    /// Create an invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        NetworkError::InvalidData {
            message: message.into(),
        }
    }

    /// Map a reqwest failure for the request sent to `url`.
    pub fn from_transport(err: &reqwest::Error, url: &str) -> Self {
        if err.is_timeout() {
            return NetworkError::Timeout {
                url: url.to_string(),
            };
        }

        let message = error_chain_message(err);
        let lowered = message.to_lowercase();
        let captive_portal_suspected = err.is_connect()
            || lowered.contains("certificate")
            || lowered.contains("tls")
            || lowered.contains("ssl");

        NetworkError::Transport {
            url: url.to_string(),
            message,
            captive_portal_suspected,
        }
    }

    /// Combine reported errors: one error is kept as is, several are wrapped.
    pub fn combine(mut errors: Vec<NetworkError>) -> Option<NetworkError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(NetworkError::Multiple(errors)),
        }
    }

    /// Code identifying the kind of error.
    pub fn code(&self) -> NetworkErrorCode {
        match self {
            NetworkError::Http { .. } => NetworkErrorCode::Http,
            NetworkError::Redirect { .. } => NetworkErrorCode::Redirect,
            NetworkError::InvalidData { .. } => NetworkErrorCode::InvalidData,
            NetworkError::Cancelled => NetworkErrorCode::Cancelled,
            NetworkError::Timeout { .. } => NetworkErrorCode::Timeout,
            NetworkError::Transport { .. } => NetworkErrorCode::Transport,
            NetworkError::Multiple(_) => NetworkErrorCode::Multiple,
            NetworkError::Configuration { .. } => NetworkErrorCode::Configuration,
        }
    }

    /// HTTP status code, for HTTP errors.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            NetworkError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Redirection target, for redirection errors.
    pub fn redirection_url(&self) -> Option<&Url> {
        match self {
            NetworkError::Redirect {
                redirection_url, ..
            } => redirection_url.as_ref(),
            _ => None,
        }
    }

    /// Errors wrapped by a [`NetworkError::Multiple`], or the error itself.
    pub fn errors(&self) -> Vec<&NetworkError> {
        match self {
            NetworkError::Multiple(errors) => errors.iter().collect(),
            other => vec![other],
        }
    }

    /// Whether the error reports a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, NetworkError::Cancelled)
    }

    /// Check if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::Timeout { .. } | NetworkError::Transport { .. } => true,
            NetworkError::Http { status, .. } => StatusCode::from_u16(*status)
                .map(crate::transport::is_retryable_status)
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Replace the message of errors probably caused by a public Wi-Fi with a
    /// friendlier one. Variant and structured fields are left unchanged.
    pub fn with_friendly_message(self) -> Self {
        match self {
            NetworkError::Redirect {
                url,
                redirection_url,
                ..
            } => NetworkError::Redirect {
                url,
                redirection_url,
                message: PUBLIC_WIFI_MESSAGE.to_string(),
            },
            NetworkError::Transport {
                url,
                captive_portal_suspected: true,
                ..
            } => NetworkError::Transport {
                url,
                message: PUBLIC_WIFI_MESSAGE.to_string(),
                captive_portal_suspected: true,
            },
            other => other,
        }
    }
}

impl From<serde_json::Error> for NetworkError {
    fn from(err: serde_json::Error) -> Self {
        NetworkError::InvalidData {
            message: err.to_string(),
        }
    }
}

/// Capitalized human-readable description for an HTTP status code.
pub fn localized_status_description(status: u16) -> String {
    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("unknown status code");

    let mut chars = reason.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn error_chain_message(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
