//! Owned HTTP request descriptions and response metadata.
//!
//! [`UrlRequest`] is cheap to clone so that sizers and paginators can derive
//! new requests from existing ones, and retries can replay them.

use crate::{NetworkError, Result};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use std::time::Duration;
use url::Url;

/// Description of an HTTP request to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Bytes>,
    timeout: Option<Duration>,
}

impl UrlRequest {
    /// Request with the given method and URL, no headers and no body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// GET request for a URL given as a string.
    pub fn get(url: &str) -> Result<Self> {
        Ok(Self::new(Method::GET, parse_url(url)?))
    }

    /// `POST` request to `url`.
    pub fn post(url: &str) -> Result<Self> {
        Ok(Self::new(Method::POST, parse_url(url)?))
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Target URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Request body, if any.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Per-request timeout overriding the session one.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether replaying the request is safe (used by retries and deduplication).
    pub fn is_idempotent(&self) -> bool {
        matches!(
            self.method,
            Method::GET | Method::HEAD | Method::OPTIONS | Method::PUT | Method::DELETE
        )
    }

    /// Replace the HTTP method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Replace the target URL.
    pub fn with_url(mut self, url: Url) -> Self {
        self.url = url;
        self
    }

    /// Add (or replace) a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            NetworkError::Configuration {
                message: format!("Invalid header name {}: {}", name, e),
            }
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| NetworkError::Configuration {
            message: format!("Invalid value for header {}: {}", name, e),
        })?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Set the request body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body and set the content type.
    pub fn with_json<T: serde::Serialize>(mut self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value)?;
        self.headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.body = Some(Bytes::from(body));
        Ok(self)
    }

    /// Set a per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Value of a query parameter, if present.
    pub fn query_value(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// Set a query parameter, replacing any existing occurrence.
    pub fn with_query_value(mut self, name: &str, value: &str) -> Self {
        let retained: Vec<(String, String)> = self
            .url
            .query_pairs()
            .filter(|(key, _)| key != name)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        {
            let mut pairs = self.url.query_pairs_mut();
            pairs.clear();
            for (key, val) in &retained {
                pairs.append_pair(key, val);
            }
            pairs.append_pair(name, value);
        }
        self
    }
}

/// Metadata of a received HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    url: Url,
    status: StatusCode,
    headers: HeaderMap,
}

impl HttpResponse {
    /// Response metadata for `url`.
    pub fn new(url: Url, status: StatusCode, headers: HeaderMap) -> Self {
        Self {
            url,
            status,
            headers,
        }
    }

    /// Final URL of the response.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// HTTP status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Value of header `name`, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A complete response as delivered by a transport.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub response: HttpResponse,
    pub body: Bytes,
}

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| NetworkError::Configuration {
        message: format!("Invalid URL {}: {}", url, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_request() {
        let request = UrlRequest::get("https://il.srgssr.ch/integrationlayer/2.0/rts/topicList/tv")
            .unwrap();
        assert_eq!(request.method(), &Method::GET);
        assert!(request.is_idempotent());
        assert!(request.body().is_none());
    }

    #[test]
    fn test_invalid_url() {
        let err = UrlRequest::get("not a url").unwrap_err();
        assert_eq!(err.code(), crate::NetworkErrorCode::Configuration);
    }

    #[test]
    fn test_post_is_not_idempotent() {
        let request = UrlRequest::post("https://example.com/items").unwrap();
        assert!(!request.is_idempotent());
    }

    #[test]
    fn test_query_value_replaced() {
        let request = UrlRequest::get("https://example.com/list?vector=portal&pageSize=10")
            .unwrap()
            .with_query_value("pageSize", "25");

        assert_eq!(request.query_value("pageSize").as_deref(), Some("25"));
        assert_eq!(request.query_value("vector").as_deref(), Some("portal"));
        assert_eq!(
            request.url().as_str(),
            "https://example.com/list?vector=portal&pageSize=25"
        );
    }

    #[test]
    fn test_headers_and_json_body() {
        let request = UrlRequest::post("https://example.com/items")
            .unwrap()
            .with_header("X-Client", "tests")
            .unwrap()
            .with_json(&serde_json::json!({ "name": "item" }))
            .unwrap();

        assert_eq!(request.headers().get("x-client").unwrap(), "tests");
        assert_eq!(
            request.headers().get("content-type").unwrap(),
            "application/json"
        );
        assert_eq!(request.body().unwrap().as_ref(), br#"{"name":"item"}"#);
    }

    #[test]
    fn test_invalid_header_name() {
        let result = UrlRequest::get("https://example.com")
            .unwrap()
            .with_header("bad header", "x");
        assert!(result.is_err());
    }
}
