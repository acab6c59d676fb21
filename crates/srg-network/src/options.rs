//! Per-request behavior flags.

/// Options applied to a request. All flags are off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RequestOptions {
    /// Call the completion handler with [`NetworkError::Cancelled`](crate::NetworkError::Cancelled)
    /// when the request is cancelled. By default cancelled requests stay silent.
    pub cancellation_errors_enabled: bool,
    /// Do not turn HTTP error statuses and redirections into errors. The status
    /// is then only available from the response.
    pub http_errors_disabled: bool,
    /// Keep original messages for errors likely caused by a public Wi-Fi
    /// captive portal instead of the friendly replacement.
    pub friendly_wifi_messages_disabled: bool,
}

impl RequestOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report cancellations to the completion handler as errors.
    pub fn with_cancellation_errors(mut self, enabled: bool) -> Self {
        self.cancellation_errors_enabled = enabled;
        self
    }

    /// Treat HTTP error statuses as successful responses.
    pub fn with_http_errors_disabled(mut self, disabled: bool) -> Self {
        self.http_errors_disabled = disabled;
        self
    }

    /// Keep the original error messages instead of the public Wi-Fi hint.
    pub fn with_friendly_wifi_messages_disabled(mut self, disabled: bool) -> Self {
        self.friendly_wifi_messages_disabled = disabled;
        self
    }
}
