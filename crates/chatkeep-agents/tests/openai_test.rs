use chatkeep_agents::{HttpProvider, LlmProvider, LlmRequest, OpenAiAdapter};
use chatkeep_common::{Attachment, Error, Message};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer) -> HttpProvider {
    let base_url = format!("{}/openai/v1/chat/completions", server.uri());
    HttpProvider::new(Box::new(OpenAiAdapter::new(base_url)))
}

fn request(system: Option<&str>) -> LlmRequest {
    LlmRequest {
        model: "llama-3.3-70b-versatile".to_string(),
        messages: vec![Message::user("Hello")],
        system: system.map(str::to_string),
        temperature: 0.7,
        max_tokens: 2048,
    }
}

#[tokio::test]
async fn test_openai_completion() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "llama-3.3-70b-versatile",
            "messages": [
                {"role": "system", "content": "You are a helpful assistant."},
                {"role": "user", "content": "Hello"}
            ],
            "temperature": 0.7,
            "max_tokens": 2048
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hello there!"},
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let reply = provider(&mock_server)
        .complete("test-key", &request(Some("You are a helpful assistant.")))
        .await
        .unwrap();

    assert_eq!(reply, "Hello there!");
}

#[tokio::test]
async fn test_openai_no_system_message_when_absent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "ok"}}]
        })))
        .mount(&mock_server)
        .await;

    provider(&mock_server)
        .complete("test-key", &request(None))
        .await
        .unwrap();

    let received = mock_server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "user");
}

#[tokio::test]
async fn test_openai_image_parts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": "Describe"},
                    {"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,/9j/4AAQ"}}
                ]
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "A photo."}}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut req = request(None);
    req.messages = vec![Message::user("Describe").with_attachment(Attachment {
        media_type: "image/jpeg".to_string(),
        data: "/9j/4AAQ".to_string(),
    })];

    let reply = provider(&mock_server).complete("test-key", &req).await.unwrap();
    assert_eq!(reply, "A photo.");
}

#[tokio::test]
async fn test_openai_provider_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {
                "message": "Invalid API Key",
                "type": "invalid_request_error",
                "code": "invalid_api_key"
            }
        })))
        .mount(&mock_server)
        .await;

    let err = provider(&mock_server)
        .complete("bad-key", &request(None))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Provider(ref m) if m == "Invalid API Key"));
    assert_eq!(err.to_string(), "provider error: Invalid API Key");
}

#[tokio::test]
async fn test_openai_error_in_success_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": {"message": "model overloaded"}
        })))
        .mount(&mock_server)
        .await;

    let err = provider(&mock_server)
        .complete("test-key", &request(None))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Provider(ref m) if m == "model overloaded"));
}

#[tokio::test]
async fn test_openai_server_error_is_transport() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let err = provider(&mock_server)
        .complete("test-key", &request(None))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Transport(ref m) if m == "status 500"));
}

#[tokio::test]
async fn test_openai_empty_choices() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": ""}}]
        })))
        .mount(&mock_server)
        .await;

    let err = provider(&mock_server)
        .complete("test-key", &request(None))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::EmptyCompletion));
}
