//! End-to-end tests for the client surface against a mock profile/events API.
use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use attune_core::events::NoAmbient;
use attune_core::storage::InMemoryStorage;
use attune_core::view_tracking::{ComponentViewData, ElementId};
use attune_core::{Client, ClientConfig, Error};

fn profile_response() -> serde_json::Value {
    serde_json::json!({
        "data": {
            "profile": {
                "id": "p-1",
                "stableId": "s-1",
                "random": 0.42,
                "audiences": ["aud-1"],
                "traits": {},
            },
            "experiences": [{
                "experienceId": "E1",
                "variantIndex": 1,
                "variants": {"B1": "V1"},
                "sticky": true,
            }],
            "changes": [],
        },
        "message": "ok",
        "error": null,
    })
}

fn config(server: &MockServer) -> ClientConfig {
    let mut config = ClientConfig::new("org-1", "main");
    config.base_url = server.uri();
    config.transport.retries = 0;
    config.transport.min_backoff = Duration::from_millis(1);
    config.delivery_interval = Duration::from_secs(3600);
    config
}

fn client(server: &MockServer) -> Client {
    let _ = env_logger::builder().is_test(true).try_init();
    Client::new(
        config(server),
        Arc::new(InMemoryStorage::new()),
        Arc::new(NoAmbient),
    )
    .unwrap()
}

#[tokio::test]
async fn track_updates_profile_and_selection_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/organizations/org-1/environments/main/profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_response()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    client.track("clicked_cta", Default::default()).await.unwrap();

    let profile = client.get_profile().unwrap();
    assert_eq!(profile.id, "p-1");
    assert_eq!(profile.audiences, vec!["aud-1".to_owned()]);

    // The fresh selection set now drives resolution.
    let entry: attune_core::personalization::Entry =
        serde_json::from_value(serde_json::json!({
            "id": "B1",
            "experiences": [{
                "id": "E1",
                "type": "experiment",
                "config": {
                    "distribution": [0.5, 0.5],
                    "components": [{
                        "type": "entryReplacement",
                        "baseline": {"id": "B1"},
                        "variants": [{"id": "V1"}],
                    }],
                },
                "variants": [{"id": "V1"}],
            }],
        }))
        .unwrap();
    let resolution = client.resolve(entry);
    assert_eq!(resolution.entry.id, "V1");
    assert_eq!(
        resolution.personalization.map(|p| p.variant_index),
        Some(1)
    );
    server.verify().await;
}

#[tokio::test]
async fn subsequent_mutations_address_the_known_profile() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/organizations/org-1/environments/main/profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_response()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/organizations/org-1/environments/main/profiles/p-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_response()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    client.track("first", Default::default()).await.unwrap();
    client.track("second", Default::default()).await.unwrap();
    server.verify().await;
}

#[tokio::test]
async fn plain_text_body_mode_posts_json_as_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/organizations/org-1/environments/main/profiles"))
        .and(header("content-type", "text/plain"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_response()))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config(&server);
    config.plain_text_body = true;
    let client = Client::new(
        config,
        Arc::new(InMemoryStorage::new()),
        Arc::new(NoAmbient),
    )
    .unwrap();

    client.page(Default::default()).await.unwrap();
    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["events"][0]["type"], "page");
    server.verify().await;
}

#[tokio::test]
async fn malformed_success_response_is_a_schema_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/organizations/org-1/environments/main/profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client.track("clicked", Default::default()).await.unwrap_err();
    assert!(matches!(err, Error::SchemaValidation(_)));
}

#[tokio::test]
async fn envelope_error_surfaces_as_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/organizations/org-1/environments/main/profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": null,
            "message": null,
            "error": "environment not found",
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client.track("clicked", Default::default()).await.unwrap_err();
    assert!(matches!(err, Error::Api { .. }));
}

#[tokio::test]
async fn denied_consent_keeps_component_views_off_the_wire() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/organizations/org-1/environments/main/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let client = client(&server);
    let element = ElementId::from("el-1");
    client
        .observe(
            element.clone(),
            ComponentViewData {
                entry_id: "V1".to_owned(),
                experience_id: Some("E1".to_owned()),
                variant_index: 1,
                sticky: true,
                duplication_scope: None,
            },
        )
        .unwrap();

    // Consent withdrawn between observation and the visibility notification.
    client.set_consent(attune_core::Consent::Denied);
    client.view_tracking().element_visible(&element).await;
    client.flush_events().await;

    assert!(server.received_requests().await.unwrap().is_empty());
    server.verify().await;
}

#[tokio::test]
async fn flushed_component_views_reach_the_batch_endpoint_with_anonymous_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/organizations/org-1/environments/main/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let element = ElementId::from("el-1");
    client
        .observe(
            element.clone(),
            ComponentViewData {
                entry_id: "V1".to_owned(),
                experience_id: Some("E1".to_owned()),
                variant_index: 1,
                sticky: true,
                duplication_scope: None,
            },
        )
        .unwrap();
    client.view_tracking().element_visible(&element).await;
    client.flush_events().await;

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let event = &body["events"][0];
    assert_eq!(event["type"], "component");
    assert_eq!(event["properties"]["component"], "V1");
    assert_eq!(event["properties"]["variantIndex"], 1);
    assert!(event["anonymousId"].is_string());
    server.verify().await;
}
