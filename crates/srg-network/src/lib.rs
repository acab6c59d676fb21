//! SRG Network - Resilient HTTP request orchestration.
//!
//! This crate wraps an HTTP client with resumable and cancellable requests,
//! standard JSON parsers, page-based pagination and request queues. Failures
//! are reported through a single [`NetworkError`] type.
//!
//! Requests are lazy: they do nothing until resumed, and report their outcome
//! to a completion handler called on a Tokio worker task. An async
//! [`Request::execute`] is available as well.
//!
//! # Example
//!
//! ```rust,ignore
//! use srg_network::{BaseRequest, Request, RequestOptions, Session, UrlRequest};
//!
//! #[tokio::main]
//! async fn main() -> srg_network::Result<()> {
//!     let session = Session::new()?;
//!     let url_request = UrlRequest::get("https://il.srgssr.ch/integrationlayer/2.0/rts/topicList/tv")?;
//!
//!     let request = Request::json_dictionary(
//!         url_request,
//!         &session,
//!         RequestOptions::default(),
//!         |result, _response| match result {
//!             Ok(topics) => println!("{} keys", topics.len()),
//!             Err(error) => eprintln!("{}", error),
//!         },
//!     );
//!     request.resume();
//!
//!     // Or, from async code:
//!     let (topics, response) = request.execute().await?;
//!     println!("{} -> {}", response.status(), topics.len());
//!     Ok(())
//! }
//! ```

pub mod activity;
pub mod cancel;
pub mod config;
pub mod error;
pub mod options;
pub mod page;
pub mod pagination;
pub mod paginators;
pub mod parsers;
pub mod queue;
pub mod request;
pub mod retry;
pub mod session;
pub mod transport;
pub mod url_request;

mod dedup;

// Re-export commonly used types
pub use activity::NetworkActivity;
pub use cancel::CancellationToken;
pub use config::{NetworkConfig, SessionConfig};
pub use error::{localized_status_description, NetworkError, NetworkErrorCode, Result};
pub use options::RequestOptions;
pub use page::Page;
pub use pagination::{FirstPageRequest, PageRequest, PageResponse, Paginator, Sizer};
pub use paginators::{json_field_paginator, link_header_paginator, query_page_paginator, query_sizer};
pub use parsers::{json_array_parser, json_dictionary_parser};
pub use queue::RequestQueue;
pub use request::{BaseRequest, Request, RequestHandle};
pub use retry::RetryConfig;
pub use session::{Session, SessionBuilder};
pub use transport::{ReqwestTransport, Transport};
pub use url_request::{HttpResponse, RawResponse, UrlRequest};

/// Marketing version of the library, set at build time from the package version.
pub const MARKETING_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Marketing version of the library.
pub fn marketing_version() -> &'static str {
    MARKETING_VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marketing_version() {
        assert_eq!(marketing_version(), "3.1.1");
        assert_eq!(MARKETING_VERSION, env!("CARGO_PKG_VERSION"));
    }
}
