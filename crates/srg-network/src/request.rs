//! Resumable, cancellable requests.
//!
//! Requests are not started when created. [`Request::resume`] spawns the
//! exchange on the Tokio runtime and the completion handler is called once it
//! ends, on a worker task. A started request keeps itself alive while it runs,
//! so it can be fired without keeping a handle around (a handle is only needed
//! to cancel it).
//!
//! A request is running from `resume()` until right after its completion
//! handler has returned, and stops running immediately when cancelled.
//! Finished or cancelled requests can be resumed again.

use crate::cancel::CancellationToken;
use crate::options::RequestOptions;
use crate::parsers::{data_parser, json_array_parser, json_decoder, json_dictionary_parser};
use crate::session::Session;
use crate::url_request::{HttpResponse, UrlRequest};
use crate::{NetworkError, Result};
use bytes::Bytes;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

/// Turns response data into a value.
pub type ResponseParser<T> = Arc<dyn Fn(&[u8]) -> Result<T> + Send + Sync>;

/// Called when a request ends, with its outcome and the response if one was received.
pub type CompletionHandler<T> = Arc<dyn Fn(Result<T>, Option<HttpResponse>) + Send + Sync>;

/// Common interface of every request kind.
pub trait BaseRequest {
    /// Start the request. Does nothing if it is already running.
    fn resume(&self);

    /// Cancel the request. Its completion handler is not called, unless
    /// cancellation errors are enabled.
    fn cancel(&self);

    fn is_running(&self) -> bool;

    /// Observe running state changes.
    fn subscribe_running(&self) -> watch::Receiver<bool>;

    fn url_request(&self) -> &UrlRequest;

    fn options(&self) -> RequestOptions;

    /// Weak handle used by request queues.
    fn handle(&self) -> RequestHandle;
}

/// Notified synchronously when a request starts or stops running.
pub(crate) trait RunningObserver: Send + Sync {
    fn running_changed(&self);
}

/// Type-erased control over a request.
pub(crate) trait RunControl: Send + Sync {
    fn resume(self: Arc<Self>);
    fn cancel(&self);
    fn is_running(&self) -> bool;
    fn add_observer(&self, observer: Weak<dyn RunningObserver>);
}

/// Weak, type-erased reference to a request.
#[derive(Clone)]
pub struct RequestHandle {
    control: Weak<dyn RunControl>,
}

impl RequestHandle {
    pub(crate) fn upgrade(&self) -> Option<Arc<dyn RunControl>> {
        self.control.upgrade()
    }

    /// Whether the referenced request still exists.
    pub fn is_alive(&self) -> bool {
        self.control.strong_count() > 0
    }
}

impl std::fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// A failed exchange, with the response when one was received.
#[derive(Debug, Clone)]
pub(crate) struct Failure {
    pub error: NetworkError,
    pub response: Option<HttpResponse>,
}

impl Failure {
    fn new(error: NetworkError, response: Option<HttpResponse>) -> Self {
        Self { error, response }
    }
}

/// Dispatch a request and interpret its response according to `options`.
pub(crate) async fn perform<T>(
    session: &Session,
    url_request: &UrlRequest,
    options: RequestOptions,
    parser: &ResponseParser<T>,
) -> std::result::Result<(T, HttpResponse), Failure> {
    let raw = session
        .dispatch(url_request)
        .await
        .map_err(|e| Failure::new(friendly(e, options), None))?;

    let response = raw.response;
    let status = response.status();

    if !options.http_errors_disabled {
        if status.is_client_error() || status.is_server_error() {
            let error = NetworkError::http(status, response.url().clone());
            return Err(Failure::new(error, Some(response)));
        }

        if status.is_redirection() {
            let redirection_url = response
                .header(reqwest::header::LOCATION.as_str())
                .and_then(|location| response.url().join(location).ok());
            let error = friendly(
                NetworkError::redirect(response.url().clone(), redirection_url),
                options,
            );
            return Err(Failure::new(error, Some(response)));
        }
    }

    match parser(&raw.body) {
        Ok(value) => Ok((value, response)),
        Err(error) => Err(Failure::new(error, Some(response))),
    }
}

fn friendly(error: NetworkError, options: RequestOptions) -> NetworkError {
    if options.friendly_wifi_messages_disabled {
        error
    } else {
        error.with_friendly_message()
    }
}

struct RunState {
    generation: u64,
    /// Present while running.
    token: Option<CancellationToken>,
}

struct RequestInner<T> {
    id: Uuid,
    url_request: UrlRequest,
    session: Session,
    options: RequestOptions,
    parser: ResponseParser<T>,
    completion: CompletionHandler<T>,
    run: Mutex<RunState>,
    running: watch::Sender<bool>,
    observers: Mutex<Vec<Weak<dyn RunningObserver>>>,
}

impl<T: Send + 'static> RequestInner<T> {
    fn set_running(&self, running: bool) {
        self.running.send_replace(running);
        if running {
            self.session.activity().increase();
        } else {
            self.session.activity().decrease();
        }

        let observers: Vec<Arc<dyn RunningObserver>> = {
            let mut observers = self.observers.lock();
            observers.retain(|o| o.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };
        for observer in observers {
            observer.running_changed();
        }
    }

    async fn run(self: Arc<Self>, generation: u64, token: CancellationToken) {
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            outcome = perform(&self.session, &self.url_request, self.options, &self.parser) => Some(outcome),
        };

        if token.is_cancelled() {
            if self.options.cancellation_errors_enabled {
                (self.completion)(Err(NetworkError::Cancelled), None);
            }
            return;
        }

        match outcome {
            Some(Ok((value, response))) => (self.completion)(Ok(value), Some(response)),
            Some(Err(failure)) => {
                debug!("Request {} failed: {}", self.id, failure.error);
                (self.completion)(Err(failure.error), failure.response)
            }
            None => {}
        }

        self.finish(generation);
    }

    fn finish(&self, generation: u64) {
        {
            let mut run = self.run.lock();
            if run.generation != generation || run.token.is_none() {
                return;
            }
            run.token = None;
        }
        debug!("Request {} finished", self.id);
        self.set_running(false);
    }
}

impl<T: Send + 'static> RunControl for RequestInner<T> {
    fn resume(self: Arc<Self>) {
        let (generation, token) = {
            let mut run = self.run.lock();
            if run.token.is_some() {
                return;
            }
            run.generation += 1;
            let token = CancellationToken::new();
            run.token = Some(token.clone());
            (run.generation, token)
        };

        info!(
            "Request {} started: {} {}",
            self.id,
            self.url_request.method(),
            self.url_request.url()
        );
        self.set_running(true);
        tokio::spawn(self.run(generation, token));
    }

    fn cancel(&self) {
        let token = self.run.lock().token.take();
        if let Some(token) = token {
            token.cancel();
            info!("Request {} cancelled", self.id);
            self.set_running(false);
        }
    }

    fn is_running(&self) -> bool {
        self.run.lock().token.is_some()
    }

    fn add_observer(&self, observer: Weak<dyn RunningObserver>) {
        self.observers.lock().push(observer);
    }
}

/// A request delivering a value of type `T`.
pub struct Request<T> {
    inner: Arc<RequestInner<T>>,
}

impl<T> Clone for Request<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Request<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.inner.id)
            .field("method", self.inner.url_request.method())
            .field("url", &self.inner.url_request.url().as_str())
            .field("options", &self.inner.options)
            .finish()
    }
}

impl Request<Bytes> {
    /// Request delivering the raw response data.
    pub fn data<F>(
        url_request: UrlRequest,
        session: &Session,
        options: RequestOptions,
        completion: F,
    ) -> Self
    where
        F: Fn(Result<Bytes>, Option<HttpResponse>) + Send + Sync + 'static,
    {
        Self::from_parts(
            url_request,
            session,
            options,
            Arc::new(data_parser),
            Arc::new(completion),
        )
    }
}

impl Request<Map<String, Value>> {
    /// Request delivering a JSON dictionary. Fails with invalid data otherwise.
    pub fn json_dictionary<F>(
        url_request: UrlRequest,
        session: &Session,
        options: RequestOptions,
        completion: F,
    ) -> Self
    where
        F: Fn(Result<Map<String, Value>>, Option<HttpResponse>) + Send + Sync + 'static,
    {
        Self::from_parts(
            url_request,
            session,
            options,
            Arc::new(json_dictionary_parser),
            Arc::new(completion),
        )
    }
}

impl Request<Vec<Value>> {
    /// Request delivering a JSON array. Fails with invalid data otherwise.
    pub fn json_array<F>(
        url_request: UrlRequest,
        session: &Session,
        options: RequestOptions,
        completion: F,
    ) -> Self
    where
        F: Fn(Result<Vec<Value>>, Option<HttpResponse>) + Send + Sync + 'static,
    {
        Self::from_parts(
            url_request,
            session,
            options,
            Arc::new(json_array_parser),
            Arc::new(completion),
        )
    }
}

impl<T: Send + 'static> Request<T> {
    /// Request turning the response data into an object with `parser`.
    pub fn object<P, F>(
        url_request: UrlRequest,
        session: &Session,
        options: RequestOptions,
        parser: P,
        completion: F,
    ) -> Self
    where
        P: Fn(&[u8]) -> Result<T> + Send + Sync + 'static,
        F: Fn(Result<T>, Option<HttpResponse>) + Send + Sync + 'static,
    {
        Self::from_parts(
            url_request,
            session,
            options,
            Arc::new(parser),
            Arc::new(completion),
        )
    }

    /// Request deserializing a JSON response into `T`.
    pub fn decode<F>(
        url_request: UrlRequest,
        session: &Session,
        options: RequestOptions,
        completion: F,
    ) -> Self
    where
        T: DeserializeOwned,
        F: Fn(Result<T>, Option<HttpResponse>) + Send + Sync + 'static,
    {
        Self::from_parts(
            url_request,
            session,
            options,
            Arc::new(json_decoder::<T>),
            Arc::new(completion),
        )
    }

    pub(crate) fn from_parts(
        url_request: UrlRequest,
        session: &Session,
        options: RequestOptions,
        parser: ResponseParser<T>,
        completion: CompletionHandler<T>,
    ) -> Self {
        let (running, _) = watch::channel(false);
        Self {
            inner: Arc::new(RequestInner {
                id: Uuid::new_v4(),
                url_request,
                session: session.clone(),
                options,
                parser,
                completion,
                run: Mutex::new(RunState {
                    generation: 0,
                    token: None,
                }),
                running,
                observers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Unique identifier, used in logs.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Session the request is sent through.
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Perform the exchange on the current task and return its outcome.
    ///
    /// The completion handler is not called and the running state is not
    /// affected.
    pub async fn execute(&self) -> Result<(T, HttpResponse)> {
        self.execute_with_response()
            .await
            .map_err(|failure| failure.error)
    }

    pub(crate) async fn execute_with_response(
        &self,
    ) -> std::result::Result<(T, HttpResponse), Failure> {
        let inner = &self.inner;
        inner.session.activity().increase();
        let outcome = perform(
            &inner.session,
            &inner.url_request,
            inner.options,
            &inner.parser,
        )
        .await;
        inner.session.activity().decrease();
        outcome
    }
}

impl<T: Send + 'static> BaseRequest for Request<T> {
    fn resume(&self) {
        self.inner.clone().resume();
    }

    fn cancel(&self) {
        RunControl::cancel(&*self.inner);
    }

    fn is_running(&self) -> bool {
        RunControl::is_running(&*self.inner)
    }

    fn subscribe_running(&self) -> watch::Receiver<bool> {
        self.inner.running.subscribe()
    }

    fn url_request(&self) -> &UrlRequest {
        &self.inner.url_request
    }

    fn options(&self) -> RequestOptions {
        self.inner.options
    }

    fn handle(&self) -> RequestHandle {
        let control: Arc<dyn RunControl> = self.inner.clone();
        RequestHandle {
            control: Arc::downgrade(&control),
        }
    }
}
