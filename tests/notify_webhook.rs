// tests/notify_webhook.rs

//! Webhook notifier against a stub HTTP server.

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use procwarden::notify::{Notifier, WebhookNotifier};
use procwarden_test_utils::init_tracing;

#[tokio::test]
async fn posts_a_text_payload() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(json!({
            "msgtype": "text",
            "text": { "content": "child exited with code 7" }
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = WebhookNotifier::new(format!("{}/hook", server.uri()));
    notifier
        .notify("child exited with code 7")
        .await
        .expect("webhook accepts the message");
}

#[tokio::test]
async fn surfaces_http_failures_with_status_and_body() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let notifier = WebhookNotifier::new(server.uri());
    let err = notifier.notify("anything").await.unwrap_err();

    let text = err.to_string();
    assert!(text.contains("500"), "missing status: {text}");
    assert!(text.contains("boom"), "missing body: {text}");
}
