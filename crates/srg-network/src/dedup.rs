//! In-flight request deduplication.
//!
//! Identical concurrent requests share a single exchange: the first caller
//! registers a shared future, later callers await the same future, and the
//! entry disappears as soon as a waiter observes completion. Waiters dropped
//! early leave the entry in place for the others. The last one to leave
//! removes it.

use crate::url_request::{RawResponse, UrlRequest};
use crate::Result;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

type SharedExchange = Shared<BoxFuture<'static, Result<RawResponse>>>;

/// Identity of a request for deduplication purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RequestKey {
    method: String,
    url: String,
    headers: Vec<(String, Vec<u8>)>,
    body: Option<bytes::Bytes>,
}

impl From<&UrlRequest> for RequestKey {
    fn from(request: &UrlRequest) -> Self {
        let mut headers: Vec<(String, Vec<u8>)> = request
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
            .collect();
        headers.sort();

        Self {
            method: request.method().as_str().to_string(),
            url: request.url().to_string(),
            headers,
            body: request.body().cloned(),
        }
    }
}

struct Entry {
    id: u64,
    exchange: SharedExchange,
    waiters: usize,
}

/// Table of exchanges currently in flight, keyed by request.
#[derive(Default)]
pub struct InFlightTable {
    entries: Mutex<HashMap<RequestKey, Entry>>,
    next_id: AtomicU64,
}

impl InFlightTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct exchanges currently in flight.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a request may share its exchange with identical ones.
    pub fn is_shareable(request: &UrlRequest) -> bool {
        matches!(
            *request.method(),
            reqwest::Method::GET | reqwest::Method::HEAD
        ) && request.body().is_none()
    }

    /// Run `exchange` for `request`, or join an identical exchange already in flight.
    pub async fn run<F>(&self, request: &UrlRequest, exchange: F) -> Result<RawResponse>
    where
        F: Future<Output = Result<RawResponse>> + Send + 'static,
    {
        let key = RequestKey::from(request);
        let (id, shared) = {
            let mut entries = self.entries.lock();
            match entries.get_mut(&key) {
                Some(entry) => {
                    debug!("Joining in-flight exchange for {}", request.url());
                    entry.waiters += 1;
                    (entry.id, entry.exchange.clone())
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let shared = exchange.boxed().shared();
                    entries.insert(
                        key.clone(),
                        Entry {
                            id,
                            exchange: shared.clone(),
                            waiters: 1,
                        },
                    );
                    (id, shared)
                }
            }
        };

        let mut waiter = Waiter {
            table: self,
            key,
            id,
            completed: false,
        };
        let outcome = shared.await;
        waiter.completed = true;
        outcome
    }
}

/// Registration of one caller on a table entry.
struct Waiter<'a> {
    table: &'a InFlightTable,
    key: RequestKey,
    id: u64,
    completed: bool,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        let mut entries = self.table.entries.lock();
        let Some(entry) = entries.get_mut(&self.key) else {
            return;
        };
        if entry.id != self.id {
            return;
        }
        entry.waiters = entry.waiters.saturating_sub(1);
        if self.completed || entry.waiters == 0 {
            entries.remove(&self.key);
        }
    }
}
