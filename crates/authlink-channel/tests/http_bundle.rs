#![cfg(feature = "http")]

use std::time::Duration;

use authlink_channel::{AuthBundleSource, FetchError, HttpAuthBundleSource};
use serde_json::json;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

fn bundle_json() -> serde_json::Value {
    json!({
        "x": "11".repeat(32),
        "y": "22".repeat(32),
        "salt": "33".repeat(32),
        "ch1": "44".repeat(32),
    })
}

#[tokio::test]
async fn fetches_with_cache_buster() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/auth.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bundle_json()))
        .expect(1)
        .mount(&server)
        .await;

    let source = HttpAuthBundleSource::new(format!("{}/auth.json", server.uri()));
    let bundle = source.fetch().await.expect("bundle");
    assert_eq!(bundle.x, [0x11; 32]);
    assert_eq!(bundle.static_challenge, [0x44; 32]);

    let requests = server.received_requests().await.expect("recording enabled");
    let cache_buster = requests[0]
        .url
        .query_pairs()
        .find(|(key, _)| key == "t")
        .map(|(_, value)| value.into_owned())
        .expect("t query parameter");
    assert!(cache_buster.parse::<u128>().is_ok());
}

#[tokio::test]
async fn missing_bundle_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(matchers::any())
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let source = HttpAuthBundleSource::new(format!("{}/auth.json", server.uri()))
        .with_retry(5, Duration::from_millis(10));
    assert_eq!(source.fetch().await, Err(FetchError::NotFound));
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(matchers::any())
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(matchers::any())
        .respond_with(ResponseTemplate::new(200).set_body_json(bundle_json()))
        .mount(&server)
        .await;

    let source = HttpAuthBundleSource::new(format!("{}/auth.json", server.uri()))
        .with_retry(5, Duration::from_millis(10));
    source.fetch().await.expect("third attempt succeeds");
    assert_eq!(server.received_requests().await.map(|r| r.len()), Some(3));
}

#[tokio::test]
async fn gives_up_after_configured_attempts() {
    let server = MockServer::start().await;
    Mock::given(matchers::any())
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let source = HttpAuthBundleSource::new(format!("{}/auth.json", server.uri()))
        .with_retry(2, Duration::from_millis(10));
    assert!(matches!(source.fetch().await, Err(FetchError::Http(_))));
}

#[tokio::test]
async fn invalid_bundle_is_reported() {
    let server = MockServer::start().await;
    Mock::given(matchers::any())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "x": "zz" })))
        .mount(&server)
        .await;

    let source = HttpAuthBundleSource::new(format!("{}/auth.json", server.uri()))
        .with_retry(1, Duration::from_millis(10));
    assert!(matches!(
        source.fetch().await,
        Err(FetchError::InvalidBundle(_))
    ));
}
