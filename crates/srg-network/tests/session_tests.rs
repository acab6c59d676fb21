//! Integration tests for sessions: deduplication, activity and versioning.

mod common;

use common::{start_mock_service, test_session};
use parking_lot::Mutex;
use srg_network::{
    marketing_version, BaseRequest, NetworkActivity, Request, RequestOptions, RetryConfig,
    Session, SessionConfig, MARKETING_VERSION,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[tokio::test]
async fn test_identical_requests_share_one_exchange() {
    let server = start_mock_service().await;
    let session = test_session();

    let requests: Vec<_> = (0..4)
        .map(|_| {
            Request::json_dictionary(
                server.request("/counted"),
                &session,
                RequestOptions::default(),
                |_, _| {},
            )
        })
        .collect();

    let outcomes = futures::future::join_all(requests.iter().map(|r| r.execute())).await;

    for outcome in outcomes {
        let (dictionary, _) = outcome.unwrap();
        assert_eq!(dictionary["hit"], 1);
    }
    assert_eq!(server.state.counted_hits.load(Ordering::SeqCst), 1);
    assert_eq!(session.in_flight_count(), 0);
}

#[tokio::test]
async fn test_sequential_requests_are_not_shared() {
    let server = start_mock_service().await;
    let session = test_session();

    for expected in 1..=2 {
        let request = Request::json_dictionary(
            server.request("/counted"),
            &session,
            RequestOptions::default(),
            |_, _| {},
        );
        let (dictionary, _) = request.execute().await.unwrap();
        assert_eq!(dictionary["hit"], expected);
    }
}

#[tokio::test]
async fn test_deduplication_disabled() {
    let server = start_mock_service().await;
    let session = Session::builder()
        .config(
            SessionConfig::new()
                .with_retry(RetryConfig::disabled())
                .with_deduplication(false),
        )
        .activity(Arc::new(NetworkActivity::new()))
        .build()
        .unwrap();

    let a = Request::data(server.request("/counted"), &session, RequestOptions::default(), |_, _| {});
    let b = Request::data(server.request("/counted"), &session, RequestOptions::default(), |_, _| {});
    let (ra, rb) = tokio::join!(a.execute(), b.execute());

    assert!(ra.is_ok() && rb.is_ok());
    assert_eq!(server.state.counted_hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_activity_handler_follows_running_requests() {
    let server = start_mock_service().await;
    let activity = Arc::new(NetworkActivity::new());
    let session = Session::builder()
        .config(SessionConfig::new().with_retry(RetryConfig::disabled()))
        .activity(activity.clone())
        .build()
        .unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    activity.enable_with_handler(move |active| sink.lock().push(active));

    let r1 = Request::json_array(server.request("/json/array"), &session, RequestOptions::default(), |_, _| {});
    let r2 = Request::json_array(server.request("/slow"), &session, RequestOptions::default(), |_, _| {});

    let mut r2_running = r2.subscribe_running();
    r1.resume();
    r2.resume();
    assert_eq!(activity.running_requests(), 2);

    r2_running.wait_for(|running| !*running).await.unwrap();
    assert!(!r1.is_running());
    assert!(!activity.is_active());
    assert_eq!(*events.lock(), vec![false, true, false]);

    activity.disable();
    assert_eq!(events.lock().last(), Some(&false));
}

#[test]
fn test_marketing_version_matches_package() {
    assert_eq!(MARKETING_VERSION, env!("CARGO_PKG_VERSION"));
    assert_eq!(marketing_version(), "3.1.1");
}
