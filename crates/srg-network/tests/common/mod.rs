//! In-process mock service used by the integration tests.

#![allow(dead_code)]

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use srg_network::{NetworkActivity, RetryConfig, Session, SessionConfig, UrlRequest};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Number of items served by the paginated endpoints.
pub const TOTAL_ITEMS: usize = 23;

#[derive(Debug, Default)]
pub struct MockState {
    pub counted_hits: AtomicU32,
    pub flaky_hits: AtomicU32,
}

pub struct MockServer {
    pub base_url: String,
    pub state: Arc<MockState>,
}

impl MockServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn request(&self, path: &str) -> UrlRequest {
        UrlRequest::get(&self.url(path)).unwrap()
    }
}

pub async fn start_mock_service() -> MockServer {
    let state = Arc::new(MockState::default());
    let app = mock_app_router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockServer {
        base_url: format!("http://{}", addr),
        state,
    }
}

/// Session with retries disabled and a private activity monitor.
pub fn test_session() -> Session {
    test_session_with(SessionConfig::new().with_retry(RetryConfig::disabled()))
}

pub fn test_session_with(config: SessionConfig) -> Session {
    Session::builder()
        .config(config)
        .activity(Arc::new(NetworkActivity::new()))
        .build()
        .unwrap()
}

fn mock_app_router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/json/dictionary", get(handle_dictionary))
        .route("/json/array", get(handle_array))
        .route("/html", get(handle_html))
        .route("/status/:code", get(handle_status))
        .route("/redirect", get(handle_redirect))
        .route("/slow", get(handle_slow))
        .route("/counted", get(handle_counted))
        .route("/flaky", get(handle_flaky))
        .route("/items", get(handle_items))
        .route("/linked", get(handle_linked))
        .route("/feed", get(handle_feed))
        .with_state(state)
}

async fn handle_dictionary() -> impl IntoResponse {
    Json(json!({ "name": "Play SRG", "items": [1, 2, 3] }))
}

async fn handle_array() -> impl IntoResponse {
    Json(json!([1, 2, 3]))
}

async fn handle_html() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/html")], "<html><body>Login</body></html>")
}

async fn handle_status(Path(code): Path<u16>) -> Response {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    (status, format!("status {}", code)).into_response()
}

async fn handle_redirect() -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, "/json/dictionary")],
        "",
    )
        .into_response()
}

async fn handle_slow() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_millis(500)).await;
    Json(json!([]))
}

async fn handle_counted(State(state): State<Arc<MockState>>) -> impl IntoResponse {
    let hit = state.counted_hits.fetch_add(1, Ordering::SeqCst) + 1;
    tokio::time::sleep(Duration::from_millis(150)).await;
    Json(json!({ "hit": hit }))
}

/// Fails twice with 503, then succeeds.
async fn handle_flaky(State(state): State<Arc<MockState>>) -> Response {
    let hit = state.flaky_hits.fetch_add(1, Ordering::SeqCst) + 1;
    if hit <= 2 {
        return (StatusCode::SERVICE_UNAVAILABLE, [(header::RETRY_AFTER, "0")], "busy")
            .into_response();
    }
    Json(json!({ "hit": hit })).into_response()
}

#[derive(Debug, Deserialize)]
struct ItemsQuery {
    page: Option<usize>,
    #[serde(rename = "pageSize")]
    page_size: Option<usize>,
}

fn items(page: usize, size: usize) -> Vec<usize> {
    let start = (page * size).min(TOTAL_ITEMS);
    let end = ((page + 1) * size).min(TOTAL_ITEMS);
    (start..end).collect()
}

async fn handle_items(Query(query): Query<ItemsQuery>) -> impl IntoResponse {
    Json(items(query.page.unwrap_or(0), query.page_size.unwrap_or(10)))
}

async fn handle_linked(Query(query): Query<ItemsQuery>) -> Response {
    let page = query.page.unwrap_or(0);
    let size = query.page_size.unwrap_or(10);
    let body = items(page, size);

    let mut headers = HeaderMap::new();
    if (page + 1) * size < TOTAL_ITEMS {
        let link = format!("</linked?page={}&pageSize={}>; rel=\"next\"", page + 1, size);
        headers.insert(header::LINK, link.parse().unwrap());
    }
    (headers, Json(body)).into_response()
}

#[derive(Debug, Deserialize)]
struct FeedQuery {
    cursor: Option<usize>,
}

async fn handle_feed(Query(query): Query<FeedQuery>) -> impl IntoResponse {
    let cursor = query.cursor.unwrap_or(0);
    let mut body = json!({ "items": items(cursor, 10) });
    if (cursor + 1) * 10 < TOTAL_ITEMS {
        body["next"] = json!(format!("/feed?cursor={}", cursor + 1));
    }
    Json(body)
}
