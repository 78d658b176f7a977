//! Wiremock tests for the OpenAI-compatible adapter.

use std::time::Duration;

use cuecard::providers::{OpenAiCompatClient, ProviderAdapter, ProviderInfo};
use cuecard::{AnalyzeOptions, CallFailure, CuecardError};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

fn client(server: &MockServer) -> OpenAiCompatClient {
    let info = ProviderInfo::new("Groq", "test-model")
        .max_tokens(2000)
        .temperature(0.7);
    OpenAiCompatClient::new("groq", info, "test-key", server.uri()).unwrap()
}

/// Unwrap the call failure, checking it is attributed to the client's key.
fn failure(err: CuecardError) -> CallFailure {
    match err {
        CuecardError::ProviderCallFailed { provider, reason } => {
            assert_eq!(provider, "groq");
            reason
        }
        other => panic!("expected ProviderCallFailed, got {other:?}"),
    }
}

// ============================================================================
// Success paths
// ============================================================================

#[tokio::test]
async fn sends_single_user_turn_and_returns_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({
            "model": "test-model",
            "stream": false,
            "max_tokens": 2000,
            "messages": [{ "role": "user", "content": "Explain X" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("X is a letter.")))
        .expect(1)
        .mount(&server)
        .await;

    let text = client(&server)
        .analyze("Explain X", &AnalyzeOptions::new())
        .await
        .unwrap();
    assert_eq!(text, "X is a letter.");
}

#[tokio::test]
async fn options_override_descriptor_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "max_tokens": 500,
            "temperature": 0.5
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("short")))
        .expect(1)
        .mount(&server)
        .await;

    let options = AnalyzeOptions::new().temperature(0.5).max_tokens(500);
    let text = client(&server).analyze("p", &options).await.unwrap();
    assert_eq!(text, "short");
}

#[tokio::test]
async fn trailing_slash_in_base_url_is_tolerated() {
    let server = MockServer::start().await;
    Mock::given(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
        .mount(&server)
        .await;

    let info = ProviderInfo::new("Qwen", "m");
    let client =
        OpenAiCompatClient::new("qwen", info, "k", format!("{}/", server.uri())).unwrap();
    assert_eq!(client.analyze("p", &AnalyzeOptions::new()).await.unwrap(), "ok");
}

// ============================================================================
// Status mapping
// ============================================================================

#[tokio::test]
async fn unauthorized_maps_to_authentication_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let err = client(&server)
        .analyze("p", &AnalyzeOptions::new())
        .await
        .unwrap_err();
    assert!(!err.is_transient());
    assert!(matches!(failure(err), CallFailure::AuthenticationFailed));
}

#[tokio::test]
async fn too_many_requests_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;

    let err = client(&server)
        .analyze("p", &AnalyzeOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_transient());
    assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
}

#[tokio::test]
async fn server_error_maps_to_api_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let err = client(&server)
        .analyze("p", &AnalyzeOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_transient());
    match failure(err) {
        CallFailure::Api { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "overloaded");
        }
        other => panic!("expected Api, got {other:?}"),
    }
}

#[tokio::test]
async fn client_error_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad model"))
        .mount(&server)
        .await;

    let err = client(&server)
        .analyze("p", &AnalyzeOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(!err.is_transient());
}

// ============================================================================
// Body problems
// ============================================================================

#[tokio::test]
async fn missing_choices_is_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })))
        .mount(&server)
        .await;

    let err = client(&server)
        .analyze("p", &AnalyzeOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(failure(err), CallFailure::EmptyResponse));
}

#[tokio::test]
async fn blank_content_is_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("   ")))
        .mount(&server)
        .await;

    let err = client(&server)
        .analyze("p", &AnalyzeOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(failure(err), CallFailure::EmptyResponse));
}

#[tokio::test]
async fn malformed_body_is_decode_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server)
        .analyze("p", &AnalyzeOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(failure(err), CallFailure::Decode(_)));
}

// ============================================================================
// Cancellation and timeouts
// ============================================================================

#[tokio::test]
async fn cancellation_abandons_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("late"))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let options = AnalyzeOptions::new().cancel_on(token);
    let err = client(&server).analyze("p", &options).await.unwrap_err();
    assert!(matches!(failure(err), CallFailure::Cancelled));
}

#[tokio::test]
async fn slow_endpoint_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("late"))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = OpenAiCompatClient::with_timeout(
        "groq",
        ProviderInfo::new("Groq", "m"),
        "k",
        server.uri(),
        Duration::from_millis(100),
    )
    .unwrap();
    let err = client.analyze("p", &AnalyzeOptions::new()).await.unwrap_err();
    assert!(err.is_transient());
    assert!(matches!(failure(err), CallFailure::Timeout));
}
