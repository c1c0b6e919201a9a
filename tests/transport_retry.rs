//! HTTP-level tests for the resilient transport, against a mock server.
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use attune_core::transport::{Transport, TransportConfig};
use attune_core::TransportError;

fn transport(retries: u32) -> Transport {
    let _ = env_logger::builder().is_test(true).try_init();
    Transport::new(TransportConfig {
        retries,
        min_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        timeout: Duration::from_millis(500),
    })
}

#[tokio::test]
async fn persistent_503_performs_exactly_retries_plus_one_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/unavailable"))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&server)
        .await;

    let transport = transport(3);
    let request = transport.client().get(format!("{}/unavailable", server.uri()));
    let err = transport.send(request).await.unwrap_err();

    assert!(matches!(err, TransportError::Retryable { status: 503 }));
    server.verify().await;
}

#[tokio::test]
async fn recovery_after_503_short_circuits() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let transport = transport(5);
    let request = transport.client().get(format!("{}/flaky", server.uri()));
    let response = transport.send(request).await.unwrap();

    assert!(response.status().is_success());
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn non_retryable_status_aborts_immediately() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forbidden"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport(5);
    let request = transport.client().get(format!("{}/forbidden", server.uri()));
    let err = transport.send(request).await.unwrap_err();

    assert!(matches!(err, TransportError::NonRetryable { status: 403 }));
    server.verify().await;
}

#[tokio::test]
async fn slow_response_fails_with_timeout_and_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(503).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let transport = Transport::new(TransportConfig {
        retries: 5,
        min_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        timeout: Duration::from_millis(50),
    });
    let request = transport.client().get(format!("{}/slow", server.uri()));
    let err = transport.send(request).await.unwrap_err();

    assert!(matches!(err, TransportError::Timeout));
    // The timed-out attempt is terminal, no second request goes out.
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
