//! Paginated requests.
//!
//! A [`FirstPageRequest`] retrieves the first page of a list. Two functions
//! describe how a service paginates:
//!
//! - a **sizer**, turning the original request into one asking for a given
//!   page size. It is never called for [`Page::UNSPECIFIED_SIZE`].
//! - a **paginator**, returning the request of the next page from the current
//!   page request and its outcome, or `None` on the last page.
//!
//! Each completion receives the current page and, when there is one, the next
//! page. Feed it to [`FirstPageRequest::with_page`] to get the matching
//! [`PageRequest`].

use crate::options::RequestOptions;
use crate::page::Page;
use crate::parsers::{data_parser, json_array_parser, json_decoder, json_dictionary_parser};
use crate::request::{BaseRequest, Request, RequestHandle, ResponseParser};
use crate::session::Session;
use crate::url_request::{HttpResponse, UrlRequest};
use crate::Result;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::watch;

/// Builds the request for a page of the given size.
pub type Sizer = Arc<dyn Fn(&UrlRequest, u32) -> UrlRequest + Send + Sync>;

/// Returns the request of the page following the current one, if any.
///
/// Arguments are the current page request, the parsed value and response when
/// available, the page size and the current page number.
pub type Paginator<T> = Arc<
    dyn Fn(&UrlRequest, Option<&T>, Option<&HttpResponse>, u32, u32) -> Option<UrlRequest>
        + Send
        + Sync,
>;

/// Called when a page request ends, with the outcome, the current page, the
/// next page if any and the response if one was received.
pub type PageCompletionHandler<T> =
    Arc<dyn Fn(Result<T>, Page, Option<Page>, Option<HttpResponse>) + Send + Sync>;

/// Outcome of [`PageRequest::execute`].
#[derive(Debug, Clone)]
pub struct PageResponse<T> {
    pub value: T,
    pub page: Page,
    pub next_page: Option<Page>,
    pub response: HttpResponse,
}

struct PagingCore<T> {
    url_request: UrlRequest,
    session: Session,
    options: RequestOptions,
    parser: ResponseParser<T>,
    sizer: Sizer,
    paginator: Paginator<T>,
    completion: PageCompletionHandler<T>,
}

impl<T> Clone for PagingCore<T> {
    fn clone(&self) -> Self {
        Self {
            url_request: self.url_request.clone(),
            session: self.session.clone(),
            options: self.options,
            parser: self.parser.clone(),
            sizer: self.sizer.clone(),
            paginator: self.paginator.clone(),
            completion: self.completion.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> PagingCore<T> {
    fn first_page(&self, size: u32) -> Page {
        let url_request = if size == Page::UNSPECIFIED_SIZE {
            self.url_request.clone()
        } else {
            (self.sizer)(&self.url_request, size)
        };
        Page::first(url_request, size)
    }

    fn next_page(
        &self,
        page: &Page,
        value: Option<&T>,
        response: Option<&HttpResponse>,
    ) -> Option<Page> {
        (self.paginator)(page.url_request(), value, response, page.size(), page.number())
            .map(|url_request| page.next(url_request))
    }

    fn request_for(&self, page: Page) -> PageRequest<T> {
        let core = self.clone();
        let current = page.clone();
        let request = Request::from_parts(
            page.url_request().clone(),
            &self.session,
            self.options,
            self.parser.clone(),
            Arc::new(move |result: Result<T>, response: Option<HttpResponse>| {
                let next_page = match &result {
                    Ok(value) => core.next_page(&current, Some(value), response.as_ref()),
                    Err(_) => None,
                };
                (core.completion)(result, current.clone(), next_page, response);
            }),
        );

        PageRequest {
            request,
            page,
            core: self.clone(),
        }
    }
}

/// Request for a specific page of a list.
pub struct PageRequest<T> {
    request: Request<T>,
    page: Page,
    core: PagingCore<T>,
}

impl<T> Clone for PageRequest<T> {
    fn clone(&self) -> Self {
        Self {
            request: self.request.clone(),
            page: self.page.clone(),
            core: self.core.clone(),
        }
    }
}

impl<T> std::fmt::Debug for PageRequest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageRequest")
            .field("page", &self.page)
            .field("request", &self.request)
            .finish()
    }
}

impl<T: Send + Sync + 'static> PageRequest<T> {
    /// Page this request loads.
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Session the request is sent through.
    pub fn session(&self) -> &Session {
        self.request.session()
    }

    /// Perform the exchange on the current task, without calling the
    /// completion handler.
    pub async fn execute(&self) -> Result<PageResponse<T>> {
        let (value, response) = self
            .request
            .execute_with_response()
            .await
            .map_err(|failure| failure.error)?;
        let next_page = self
            .core
            .next_page(&self.page, Some(&value), Some(&response));
        Ok(PageResponse {
            value,
            page: self.page.clone(),
            next_page,
            response,
        })
    }

    /// Request for another page of the same list. `None` means the first page.
    pub fn with_page(&self, page: Option<&Page>) -> PageRequest<T> {
        match page {
            Some(page) => self.core.request_for(page.clone()),
            None => self.core.request_for(self.core.first_page(self.page.size())),
        }
    }
}

impl<T: Send + Sync + 'static> BaseRequest for PageRequest<T> {
    fn resume(&self) {
        self.request.resume();
    }

    fn cancel(&self) {
        self.request.cancel();
    }

    fn is_running(&self) -> bool {
        self.request.is_running()
    }

    fn subscribe_running(&self) -> watch::Receiver<bool> {
        self.request.subscribe_running()
    }

    fn url_request(&self) -> &UrlRequest {
        self.request.url_request()
    }

    fn options(&self) -> RequestOptions {
        self.request.options()
    }

    fn handle(&self) -> RequestHandle {
        self.request.handle()
    }
}

/// Request for the first page of a list.
///
/// Derefs to its [`PageRequest`], so it can be resumed, cancelled or
/// executed directly.
pub struct FirstPageRequest<T> {
    inner: PageRequest<T>,
}

impl<T> Clone for FirstPageRequest<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> std::fmt::Debug for FirstPageRequest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FirstPageRequest").field(&self.inner).finish()
    }
}

impl<T> std::ops::Deref for FirstPageRequest<T> {
    type Target = PageRequest<T>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl FirstPageRequest<Bytes> {
    /// First page request delivering the raw response body.
    pub fn data<S, P, F>(
        url_request: UrlRequest,
        session: &Session,
        options: RequestOptions,
        sizer: S,
        paginator: P,
        completion: F,
    ) -> Self
    where
        S: Fn(&UrlRequest, u32) -> UrlRequest + Send + Sync + 'static,
        P: Fn(&UrlRequest, Option<&Bytes>, Option<&HttpResponse>, u32, u32) -> Option<UrlRequest>
            + Send
            + Sync
            + 'static,
        F: Fn(Result<Bytes>, Page, Option<Page>, Option<HttpResponse>) + Send + Sync + 'static,
    {
        Self::from_parts(
            url_request,
            session,
            options,
            Arc::new(data_parser),
            Arc::new(sizer),
            Arc::new(paginator),
            Arc::new(completion),
        )
    }
}

impl FirstPageRequest<Map<String, Value>> {
    /// First page request parsing a JSON dictionary.
    pub fn json_dictionary<S, P, F>(
        url_request: UrlRequest,
        session: &Session,
        options: RequestOptions,
        sizer: S,
        paginator: P,
        completion: F,
    ) -> Self
    where
        S: Fn(&UrlRequest, u32) -> UrlRequest + Send + Sync + 'static,
        P: Fn(
                &UrlRequest,
                Option<&Map<String, Value>>,
                Option<&HttpResponse>,
                u32,
                u32,
            ) -> Option<UrlRequest>
            + Send
            + Sync
            + 'static,
        F: Fn(Result<Map<String, Value>>, Page, Option<Page>, Option<HttpResponse>)
            + Send
            + Sync
            + 'static,
    {
        Self::from_parts(
            url_request,
            session,
            options,
            Arc::new(json_dictionary_parser),
            Arc::new(sizer),
            Arc::new(paginator),
            Arc::new(completion),
        )
    }
}

impl FirstPageRequest<Vec<Value>> {
    /// First page request parsing a JSON array.
    pub fn json_array<S, P, F>(
        url_request: UrlRequest,
        session: &Session,
        options: RequestOptions,
        sizer: S,
        paginator: P,
        completion: F,
    ) -> Self
    where
        S: Fn(&UrlRequest, u32) -> UrlRequest + Send + Sync + 'static,
        P: Fn(&UrlRequest, Option<&Vec<Value>>, Option<&HttpResponse>, u32, u32) -> Option<UrlRequest>
            + Send
            + Sync
            + 'static,
        F: Fn(Result<Vec<Value>>, Page, Option<Page>, Option<HttpResponse>)
            + Send
            + Sync
            + 'static,
    {
        Self::from_parts(
            url_request,
            session,
            options,
            Arc::new(json_array_parser),
            Arc::new(sizer),
            Arc::new(paginator),
            Arc::new(completion),
        )
    }
}

impl<T: Send + Sync + 'static> FirstPageRequest<T> {
    /// First page request turning response data into objects with `parser`.
    #[allow(clippy::too_many_arguments)]
    pub fn object<R, S, P, F>(
        url_request: UrlRequest,
        session: &Session,
        options: RequestOptions,
        parser: R,
        sizer: S,
        paginator: P,
        completion: F,
    ) -> Self
    where
        R: Fn(&[u8]) -> Result<T> + Send + Sync + 'static,
        S: Fn(&UrlRequest, u32) -> UrlRequest + Send + Sync + 'static,
        P: Fn(&UrlRequest, Option<&T>, Option<&HttpResponse>, u32, u32) -> Option<UrlRequest>
            + Send
            + Sync
            + 'static,
        F: Fn(Result<T>, Page, Option<Page>, Option<HttpResponse>) + Send + Sync + 'static,
    {
        Self::from_parts(
            url_request,
            session,
            options,
            Arc::new(parser),
            Arc::new(sizer),
            Arc::new(paginator),
            Arc::new(completion),
        )
    }

    /// First page request deserializing JSON pages into `T`.
    pub fn decode<S, P, F>(
        url_request: UrlRequest,
        session: &Session,
        options: RequestOptions,
        sizer: S,
        paginator: P,
        completion: F,
    ) -> Self
    where
        T: DeserializeOwned,
        S: Fn(&UrlRequest, u32) -> UrlRequest + Send + Sync + 'static,
        P: Fn(&UrlRequest, Option<&T>, Option<&HttpResponse>, u32, u32) -> Option<UrlRequest>
            + Send
            + Sync
            + 'static,
        F: Fn(Result<T>, Page, Option<Page>, Option<HttpResponse>) + Send + Sync + 'static,
    {
        Self::from_parts(
            url_request,
            session,
            options,
            Arc::new(json_decoder::<T>),
            Arc::new(sizer),
            Arc::new(paginator),
            Arc::new(completion),
        )
    }

    fn from_parts(
        url_request: UrlRequest,
        session: &Session,
        options: RequestOptions,
        parser: ResponseParser<T>,
        sizer: Sizer,
        paginator: Paginator<T>,
        completion: PageCompletionHandler<T>,
    ) -> Self {
        let core = PagingCore {
            url_request,
            session: session.clone(),
            options,
            parser,
            sizer,
            paginator,
            completion,
        };
        let page = core.first_page(Page::UNSPECIFIED_SIZE);
        Self {
            inner: core.request_for(page),
        }
    }

    /// Equivalent first page request with another page size.
    pub fn with_page_size(&self, size: u32) -> FirstPageRequest<T> {
        let core = &self.inner.core;
        Self {
            inner: core.request_for(core.first_page(size)),
        }
    }

    /// Convert into the underlying page request.
    pub fn into_page_request(self) -> PageRequest<T> {
        self.inner
    }
}

impl<T: Send + Sync + 'static> BaseRequest for FirstPageRequest<T> {
    fn resume(&self) {
        self.inner.resume();
    }

    fn cancel(&self) {
        self.inner.cancel();
    }

    fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    fn subscribe_running(&self) -> watch::Receiver<bool> {
        self.inner.subscribe_running()
    }

    fn url_request(&self) -> &UrlRequest {
        self.inner.url_request()
    }

    fn options(&self) -> RequestOptions {
        self.inner.options()
    }

    fn handle(&self) -> RequestHandle {
        self.inner.handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::NetworkActivity;
    use crate::config::SessionConfig;
    use crate::paginators::{query_page_paginator, query_sizer};
    use crate::retry::RetryConfig;
    use crate::transport::Transport;
    use crate::url_request::RawResponse;
    use async_trait::async_trait;
    use reqwest::header::HeaderMap;
    use reqwest::StatusCode;
    use tokio::sync::mpsc;

    /// Serves `total` items, honouring `pageSize` and `page` query parameters.
    struct ListTransport {
        total: usize,
    }

    #[async_trait]
    impl Transport for ListTransport {
        async fn send(&self, request: &UrlRequest) -> Result<RawResponse> {
            let size: usize = request
                .query_value("pageSize")
                .and_then(|s| s.parse().ok())
                .unwrap_or(10);
            let page: usize = request
                .query_value("page")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            let items: Vec<usize> = (page * size..((page + 1) * size).min(self.total)).collect();
            Ok(RawResponse {
                response: HttpResponse::new(request.url().clone(), StatusCode::OK, HeaderMap::new()),
                body: Bytes::from(serde_json::to_vec(&items).unwrap()),
            })
        }
    }

    fn session(total: usize) -> Session {
        Session::builder()
            .config(SessionConfig::new().with_retry(RetryConfig::disabled()))
            .transport(Arc::new(ListTransport { total }))
            .activity(Arc::new(NetworkActivity::new()))
            .build()
            .unwrap()
    }

    fn url_request() -> UrlRequest {
        UrlRequest::get("https://example.com/items").unwrap()
    }

    #[test]
    fn test_sizer_not_called_for_unspecified_size() {
        let request = FirstPageRequest::json_array(
            url_request(),
            &session(0),
            RequestOptions::default(),
            |_, _| panic!("sizer must not be called"),
            |_, _, _, _, _| None,
            |_, _, _, _| {},
        );

        assert_eq!(request.page().size(), Page::UNSPECIFIED_SIZE);
        assert_eq!(request.page().number(), 0);
        assert_eq!(request.page().url_request(), &url_request());
    }

    #[tokio::test]
    async fn test_with_page_size_applies_sizer() {
        let request = FirstPageRequest::json_array(
            url_request(),
            &session(0),
            RequestOptions::new().with_http_errors_disabled(true),
            query_sizer("pageSize"),
            query_page_paginator("page"),
            |_, _, _, _| {},
        )
        .with_page_size(5);

        assert_eq!(request.page().size(), 5);
        assert_eq!(
            request.page().url_request().query_value("pageSize").as_deref(),
            Some("5")
        );
        assert!(request.options().http_errors_disabled);
    }

    #[tokio::test]
    async fn test_follow_pages_until_the_end() {
        let session = session(12);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let first = FirstPageRequest::json_array(
            url_request(),
            &session,
            RequestOptions::default(),
            query_sizer("pageSize"),
            query_page_paginator("page"),
            move |result, page, next_page, _| {
                let _ = tx.send((result.map(|items| items.len()), page, next_page));
            },
        )
        .with_page_size(5);

        first.resume();
        let (count, page, next_page) = rx.recv().await.unwrap();
        assert_eq!(count.unwrap(), 5);
        assert_eq!(page.number(), 0);
        let next_page = next_page.unwrap();
        assert_eq!(next_page.number(), 1);
        assert_eq!(next_page.size(), 5);

        let second = first.with_page(Some(&next_page));
        second.resume();
        let (_, page, next_page) = rx.recv().await.unwrap();
        assert_eq!(page.number(), 1);

        let third = first.with_page(next_page.as_ref());
        let response = third.execute().await.unwrap();
        assert_eq!(response.value.len(), 2);
        assert_eq!(response.page.number(), 2);
        assert!(response.next_page.is_none());
    }

    #[tokio::test]
    async fn test_with_page_none_returns_first_page() {
        let session = session(30);
        let first = FirstPageRequest::json_array(
            url_request(),
            &session,
            RequestOptions::default(),
            query_sizer("pageSize"),
            query_page_paginator("page"),
            |_, _, _, _| {},
        )
        .with_page_size(10);

        let next_page = first.execute().await.unwrap().next_page.unwrap();
        let again = first.with_page(Some(&next_page)).with_page(None);

        assert_eq!(again.page(), first.page());
    }
}
