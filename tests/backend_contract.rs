//! HTTP backend contract tests.
//!
//! Verify the exact request format sent to the OpenAI-compatible API and
//! that responses and errors are mapped correctly, without any real backend.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use coro::backend::{Backend, ExchangeInput, HttpBackend, SessionHandle};
use coro::config::BackendConfig;
use coro::voice::VoiceIdentity;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend_for(server: &MockServer) -> HttpBackend {
    HttpBackend::new(&BackendConfig {
        api_url: server.uri(),
        api_model: "test-model".to_owned(),
        api_key: "test-key".to_owned(),
    })
}

#[tokio::test]
async fn generate_text_sends_model_and_bearer_auth() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "messages": [{"role": "user", "content": "hello prompt"}],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": " generated " } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = backend_for(&server)
        .generate_text("hello prompt")
        .await
        .expect("generation should succeed");
    assert_eq!(text, "generated");
}

#[tokio::test]
async fn generate_text_omits_auth_header_without_key() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "ok" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = HttpBackend::new(&BackendConfig {
        api_url: server.uri(),
        api_model: "test-model".to_owned(),
        api_key: String::new(),
    });
    let text = backend.generate_text("hi").await.expect("should succeed");
    assert_eq!(text, "ok");

    let requests = server.received_requests().await.expect("recorded requests");
    assert!(!requests[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn generate_text_maps_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = backend_for(&server)
        .generate_text("hi")
        .await
        .expect_err("server error should map to BotError");
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn generate_text_rejects_empty_content() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "" } }]
        })))
        .mount(&server)
        .await;

    assert!(backend_for(&server).generate_text("hi").await.is_err());
}

#[tokio::test]
async fn open_voice_session_sends_voice_and_instructions() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/voice/sessions"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "voice": "Kore",
            "instructions": "be brief",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "sess-42" })))
        .expect(1)
        .mount(&server)
        .await;

    let handle = backend_for(&server)
        .open_voice_session("be brief", VoiceIdentity::Kore)
        .await
        .expect("session open should succeed");
    assert_eq!(handle.id, "sess-42");
}

#[tokio::test]
async fn exchange_text_posts_to_session_route_and_decodes_audio() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/voice/sessions/sess-42/exchange"))
        .and(body_partial_json(json!({ "text": "say this" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "text": "said it",
            "audio": BASE64.encode(b"pcm-bytes"),
            "mime": "audio/wav",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = backend_for(&server)
        .exchange(
            &SessionHandle {
                id: "sess-42".to_owned(),
            },
            ExchangeInput::Text("say this".to_owned()),
        )
        .await
        .expect("exchange should succeed");

    assert_eq!(reply.text.as_deref(), Some("said it"));
    let audio = reply.audio.expect("audio expected");
    assert_eq!(audio.data, b"pcm-bytes");
    assert_eq!(audio.mime, "audio/wav");
}

#[tokio::test]
async fn exchange_audio_is_base64_on_the_wire() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/voice/sessions/sess-1/exchange"))
        .and(body_partial_json(json!({
            "audio": BASE64.encode(b"ogg-bytes"),
            "mime": "audio/ogg",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "heard you" })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = backend_for(&server)
        .exchange(
            &SessionHandle {
                id: "sess-1".to_owned(),
            },
            ExchangeInput::Audio(coro::backend::AudioPayload {
                data: b"ogg-bytes".to_vec(),
                mime: "audio/ogg".to_owned(),
            }),
        )
        .await
        .expect("exchange should succeed");

    assert_eq!(reply.text.as_deref(), Some("heard you"));
    assert!(reply.audio.is_none());
}
