// ABOUTME: Integration tests for the chat orchestration and model discovery routes
// ABOUTME: Covers auth/entitlement rejection ordering and stream relay fidelity

mod helpers;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde_json::{json, Value};

use helpers::axum_test::AxumTestRequest;
use helpers::{test_resources, RecordingAdapter};
use tidechat::llm::AdapterSet;
use tidechat::server::router;

fn chat_body(provider: &str) -> Value {
    json!({
        "provider": provider,
        "messages": [{"role": "user", "content": "hello"}]
    })
}

#[tokio::test]
async fn test_chat_requires_authentication() {
    let adapter = Arc::new(RecordingAdapter::new("ollama", vec!["hi"]));
    let calls = Arc::clone(&adapter.calls);
    let mut adapters = AdapterSet::new();
    adapters.register(adapter);
    let app = router(test_resources(adapters));

    let response = AxumTestRequest::post("/chat")
        .json(&chat_body("ollama"))
        .send(app)
        .await;

    assert_eq!(response.status(), 401);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_chat_rejects_unentitled_provider_before_dispatch() {
    let adapter = Arc::new(RecordingAdapter::new("openai", vec!["hi"]));
    let calls = Arc::clone(&adapter.calls);
    let mut adapters = AdapterSet::new();
    adapters.register(adapter);
    let app = router(test_resources(adapters));

    // openai is PRO-only; the basic token must be turned away with no
    // outbound call recorded
    let response = AxumTestRequest::post("/chat")
        .bearer("basic-token")
        .json(&chat_body("openai"))
        .send(app)
        .await;

    assert_eq!(response.status(), 403);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "PERMISSION_DENIED");
}

#[tokio::test]
async fn test_chat_rejects_unknown_provider() {
    let app = router(test_resources(AdapterSet::new()));

    let response = AxumTestRequest::post("/chat")
        .bearer("pro-token")
        .json(&chat_body("does-not-exist"))
        .send(app)
        .await;

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_chat_relays_stream_in_order() {
    let adapter = Arc::new(RecordingAdapter::new("ollama", vec!["Hel", "lo ", "world"]));
    let calls = Arc::clone(&adapter.calls);
    let mut adapters = AdapterSet::new();
    adapters.register(adapter);
    let app = router(test_resources(adapters));

    let response = AxumTestRequest::post("/chat")
        .bearer("basic-token")
        .json(&chat_body("ollama"))
        .send(app)
        .await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text(), "Hello world");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_chat_allows_entitled_provider_for_pro() {
    let adapter = Arc::new(RecordingAdapter::new("openai", vec!["ok"]));
    let mut adapters = AdapterSet::new();
    adapters.register(adapter);
    let app = router(test_resources(adapters));

    let response = AxumTestRequest::post("/chat")
        .bearer("pro-token")
        .json(&chat_body("openai"))
        .send(app)
        .await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text(), "ok");
}

#[tokio::test]
async fn test_models_requires_authentication() {
    let app = router(test_resources(AdapterSet::new()));

    let response = AxumTestRequest::get("/models?provider=ollama").send(app).await;

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_models_unknown_provider_yields_empty_list() {
    let app = router(test_resources(AdapterSet::new()));

    let response = AxumTestRequest::get("/models?provider=openai")
        .bearer("basic-token")
        .send(app)
        .await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json();
    assert_eq!(body["provider"], "openai");
    assert_eq!(body["models"], json!([]));
}

#[tokio::test]
async fn test_health_probe() {
    let app = router(test_resources(AdapterSet::new()));

    let response = AxumTestRequest::get("/health").send(app).await;

    assert_eq!(response.status(), 200);
}
