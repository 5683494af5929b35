//! Integration tests for provider adapters and the router
//!
//! Each backend is replaced by a wiremock server speaking the
//! OpenAI-compatible `/v1/chat/completions` protocol.

use alkulous_engine::config::LLMConfig;
use alkulous_engine::llm::router::LOCAL_BRAIN_UNREACHABLE;
use alkulous_engine::llm::{
    ChatProvider, HostedProvider, LLMError, LocalBrainProvider, Message, OllamaProvider,
    ProviderReply, ProviderRequest, ProviderRouter, RouteOutcome, RouteState,
};
use alkulous_engine::secrets::SecretString;
use sdk::types::{Backend, ProviderPreference};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn reply_body(content: &str) -> serde_json::Value {
    json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
}

fn hosted_for(server: &MockServer) -> HostedProvider {
    HostedProvider::with_endpoint(
        &format!("{}/v1", server.uri()),
        "gpt-4o",
        Some(SecretString::from("sk-test-key")),
    )
}

#[tokio::test]
async fn test_hosted_sends_model_messages_and_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o",
            "stream": false,
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "hello"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("hi there")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = hosted_for(&server);
    let reply = provider
        .complete(&[Message::system("be brief"), Message::user("hello")])
        .await
        .unwrap();

    assert_eq!(reply, ProviderReply::Completed("hi there".to_string()));
}

#[tokio::test]
async fn test_hosted_status_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let err = hosted_for(&server)
        .complete(&[Message::user("hello")])
        .await
        .unwrap_err();
    assert_eq!(err.backend, Backend::Hosted);
    assert!(matches!(err.cause, LLMError::AuthenticationFailed(_)));
    assert!(!err.is_connection_failure());

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    let err = hosted_for(&server)
        .complete(&[Message::user("hello")])
        .await
        .unwrap_err();
    assert!(matches!(err.cause, LLMError::RateLimitExceeded));

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    let err = hosted_for(&server)
        .complete(&[Message::user("hello")])
        .await
        .unwrap_err();
    match err.cause {
        LLMError::HttpStatus { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("Expected HttpStatus, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_error_bodies_are_scrubbed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_string("invalid key sk-abcdefghijklmnopqrstuvwxyz123456"),
        )
        .mount(&server)
        .await;

    let err = hosted_for(&server)
        .complete(&[Message::user("hello")])
        .await
        .unwrap_err();

    let text = err.to_string();
    assert!(text.contains("[REDACTED]"));
    assert!(!text.contains("sk-abcdefghijklmnopqrstuvwxyz123456"));
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .mount(&server)
        .await;

    let err = hosted_for(&server)
        .complete(&[Message::user("hello")])
        .await
        .unwrap_err();
    assert!(matches!(err.cause, LLMError::ParseError(_)));
}

#[tokio::test]
async fn test_empty_replies_use_backend_placeholders() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": null}}]
        })))
        .mount(&server)
        .await;

    let hosted = hosted_for(&server);
    let brain = LocalBrainProvider::new(&server.uri(), "local-brain");
    let ollama = OllamaProvider::new(&server.uri(), "llama3");
    let messages = [Message::user("hello")];

    assert_eq!(
        hosted.complete(&messages).await.unwrap(),
        ProviderReply::Empty("I am processing your request.".to_string())
    );
    assert_eq!(
        brain.complete(&messages).await.unwrap(),
        ProviderReply::Empty("Local AI Brain failed to respond.".to_string())
    );
    assert_eq!(
        ollama.complete(&messages).await.unwrap(),
        ProviderReply::Empty("Ollama failed to respond.".to_string())
    );
}

#[tokio::test]
async fn test_local_backends_send_fixed_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer local-brain"))
        .and(body_partial_json(json!({"model": "local-brain"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("brain")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer ollama"))
        .and(body_partial_json(json!({"model": "llama3"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("ollama")))
        .mount(&server)
        .await;

    let messages = [Message::user("hello")];
    let brain = LocalBrainProvider::new(&server.uri(), "local-brain");
    let ollama = OllamaProvider::new(&server.uri(), "llama3");

    assert_eq!(brain.complete(&messages).await.unwrap().text(), "brain");
    assert_eq!(ollama.complete(&messages).await.unwrap().text(), "ollama");
}

#[tokio::test]
async fn test_connection_refused_is_connection_failure() {
    let provider = OllamaProvider::new("http://127.0.0.1:1", "llama3");
    let err = provider
        .complete(&[Message::user("hello")])
        .await
        .unwrap_err();

    assert_eq!(err.backend, Backend::Ollama);
    assert!(err.is_connection_failure());
}

#[tokio::test]
async fn test_router_times_out_slow_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(reply_body("too late"))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let router = ProviderRouter::new(Arc::new(hosted_for(&server)))
        .with_timeouts(Duration::from_millis(50), Duration::from_millis(50));

    let outcome = router.route_hosted(&[Message::user("hello")]).await;
    match outcome {
        RouteOutcome::Unavailable { backend, error } => {
            assert_eq!(backend, Backend::Hosted);
            assert!(error.contains("Timeout"));
        }
        other => panic!("Expected Unavailable, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_slow_local_brain_yields_fixed_error() {
    let brain = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(reply_body("too late"))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&brain)
        .await;
    let hosted = MockServer::start().await;

    let router = ProviderRouter::new(Arc::new(hosted_for(&hosted)))
        .with_local_brain(Arc::new(LocalBrainProvider::new(&brain.uri(), "local-brain")))
        .with_timeouts(Duration::from_secs(5), Duration::from_millis(50));

    let outcome = router
        .route(&ProviderRequest::new(
            vec![Message::user("hello")],
            ProviderPreference::LocalBrain,
        ))
        .await;

    assert_eq!(outcome.text(), Some(LOCAL_BRAIN_UNREACHABLE));
    assert_eq!(outcome.backend(), Backend::LocalBrain);
    assert!(hosted.received_requests().await.unwrap().is_empty());
}

#[test]
fn test_router_from_config() {
    let router = ProviderRouter::from_config(&LLMConfig::default());
    assert_eq!(router.configured_backends(), vec![Backend::Hosted]);
    assert_eq!(
        router.state_for(ProviderPreference::LocalBrain),
        RouteState::Default
    );

    let mut config = LLMConfig::default();
    config.local_brain.base_url = Some("http://brain.lan:8000".to_string());
    config.ollama.base_url = Some("http://localhost:11434".to_string());

    let router = ProviderRouter::from_config(&config);
    assert_eq!(
        router.configured_backends(),
        vec![Backend::Hosted, Backend::LocalBrain, Backend::Ollama]
    );
    assert_eq!(
        router.state_for(ProviderPreference::LocalBrain),
        RouteState::PreferLocalBrain
    );
    assert_eq!(
        router.state_for(ProviderPreference::AlternateLocal),
        RouteState::PreferAlternateLocal
    );
    assert_eq!(router.state_for(ProviderPreference::None), RouteState::Default);
}

#[tokio::test]
async fn test_ollama_probe() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
        .mount(&server)
        .await;

    let provider = OllamaProvider::new(&server.uri(), "llama3");
    let status = provider.check_connection(Duration::from_secs(2)).await;
    assert!(status.reachable);
    assert!(status.last_checked.is_some());
    assert!(status.error.is_none());
    assert!(provider.check_health().await);

    let down = OllamaProvider::new("http://127.0.0.1:1", "llama3");
    let status = down.check_connection(Duration::from_secs(2)).await;
    assert!(!status.reachable);
    assert!(status.error.unwrap().contains("Cannot connect to Ollama"));
}
