use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use orp_catalog::ModelCatalog;
use orp_core::crypto::CryptoEnvelope;
use orp_core::settings::SettingsStore;
use orp_keymanager::KeyManager;
use orp_server::{AppState, build_router};
use orp_upstream::UpstreamClient;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct TestHarness {
    state: AppState,
    _temp_dir: tempfile::TempDir,
    _upstream_mock: MockServer,
}

async fn build_harness() -> TestHarness {
    let upstream_mock = MockServer::start().await;
    let temp_dir = tempfile::tempdir().expect("failed to create temp dir");

    let key_path = temp_dir.path().join("key");
    let crypto = Arc::new(CryptoEnvelope::load_or_init(&key_path).expect("init crypto"));
    let settings_path = temp_dir.path().join("settings.json");
    let settings = Arc::new(
        SettingsStore::load_or_init(settings_path, crypto).expect("init settings"),
    );
    settings
        .set_api_key_plaintext("sk-test-managed-key")
        .expect("seed api key");

    let http = reqwest::Client::builder().build().unwrap();
    let streaming_http = reqwest::Client::builder().build().unwrap();
    let upstream = Arc::new(
        UpstreamClient::new(http, streaming_http).with_base_url(upstream_mock.uri()),
    );
    let catalog = Arc::new(ModelCatalog::new(upstream.clone()));
    let key_manager = Arc::new(KeyManager::new(upstream.clone(), settings.clone()));

    let state = AppState {
        settings,
        upstream,
        catalog,
        key_manager,
        start_time: Instant::now(),
    };

    TestHarness {
        state,
        _temp_dir: temp_dir,
        _upstream_mock: upstream_mock,
    }
}

async fn send(harness: &TestHarness, request: Request<Body>) -> (StatusCode, Value) {
    let router = build_router(harness.state.clone());
    let response = router.oneshot(request).await.expect("request failed");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn chat_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn non_streaming_chat_completion_round_trips_exactly_one_upstream_call() {
    let harness = build_harness().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "gen-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "hi"}, "finish_reason": "stop"}],
            "model": "openai/gpt-4o-mini",
        })))
        .expect(1)
        .mount(&harness._upstream_mock)
        .await;

    let request = chat_request(json!({
        "model": "openai/gpt-4o-mini",
        "messages": [{"role": "user", "content": "hello"}],
    }));

    let (status, body) = send(&harness, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["choices"][0]["message"]["content"], "hi");
}

#[tokio::test]
async fn malformed_json_body_is_rejected_before_reaching_upstream() {
    let harness = build_harness().await;

    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = send(&harness, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn request_missing_messages_is_rejected() {
    let harness = build_harness().await;

    let request = chat_request(json!({ "model": "openai/gpt-4o-mini" }));

    let (status, body) = send(&harness, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn missing_managed_key_yields_unauthorized_without_calling_upstream() {
    let harness = build_harness().await;
    harness
        .state
        .settings
        .set_api_key_plaintext("")
        .expect("clear api key");

    let request = chat_request(json!({
        "model": "openai/gpt-4o-mini",
        "messages": [{"role": "user", "content": "hello"}],
    }));

    let (status, _body) = send(&harness, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn upstream_rate_limit_is_surfaced_as_openai_shaped_error() {
    let harness = build_harness().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "rate limited", "type": "rate_limit_error"}
        })))
        .mount(&harness._upstream_mock)
        .await;

    let request = chat_request(json!({
        "model": "openai/gpt-4o-mini",
        "messages": [{"role": "user", "content": "hello"}],
    }));

    let (status, body) = send(&harness, request).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["error"].is_object());
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let harness = build_harness().await;
    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(&harness, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn models_endpoint_falls_back_to_curated_list_when_upstream_is_unreachable() {
    let harness = build_harness().await;
    // No /models mock mounted: ModelCatalog::all() must fall back to the
    // curated list rather than propagating an error.
    let request = Request::builder()
        .method("GET")
        .uri("/v1/models")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(&harness, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().is_some_and(|d| !d.is_empty()));
}

#[tokio::test]
async fn streaming_chat_completion_relays_sse_with_exactly_one_upstream_call() {
    let harness = build_harness().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_raw(
                    "data: {\"id\":\"gen-1\",\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\n\
                     data: [DONE]\n\n",
                    "text/event-stream",
                ),
        )
        .expect(1)
        .mount(&harness._upstream_mock)
        .await;

    let request = chat_request(json!({
        "model": "openai/gpt-4o-mini",
        "messages": [{"role": "user", "content": "hello"}],
        "stream": true,
    }));

    let router = build_router(harness.state.clone());
    let response = router.oneshot(request).await.expect("request failed");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("\"content\":\"hi\""));
    assert_eq!(text.matches("[DONE]").count(), 1);
    assert!(text.ends_with("data: [DONE]\n\n"));
}

#[tokio::test]
async fn multimodal_request_for_text_only_model_is_rejected_without_calling_upstream() {
    let harness = build_harness().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "id": "text-only/model",
                "name": "Text Only Model",
                "architecture": {
                    "inputModalities": ["text"],
                    "outputModalities": ["text"],
                },
            }],
        })))
        .mount(&harness._upstream_mock)
        .await;
    // chat/completions must never be hit once the image part is rejected.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&harness._upstream_mock)
        .await;

    // Populate the catalog cache so `by_id` can see the model above.
    let models_request = Request::builder()
        .method("GET")
        .uri("/v1/models")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&harness, models_request).await;
    assert_eq!(status, StatusCode::OK);

    let request = chat_request(json!({
        "model": "text-only/model",
        "messages": [{
            "role": "user",
            "content": [
                {"type": "text", "text": "what is this?"},
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,xx"}},
            ],
        }],
    }));

    let (status, body) = send(&harness, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_request_error");
}
