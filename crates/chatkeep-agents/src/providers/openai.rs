use super::{LlmRequest, RequestDescriptor, WireAdapter};
use chatkeep_common::{Error, Message, Result, Role};
use serde::Deserialize;
use serde_json::{Value, json};

/// Message-list wire format (OpenAI, Groq and compatible endpoints).
pub struct OpenAiAdapter {
    base_url: String,
}

impl OpenAiAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn convert_message(msg: &Message) -> Value {
        let role = match msg.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };

        let content = match (&msg.attachment, msg.role) {
            (Some(attachment), Role::User) => {
                let mut parts = Vec::new();
                if !msg.content.is_empty() {
                    parts.push(json!({"type": "text", "text": msg.content}));
                }
                parts.push(json!({
                    "type": "image_url",
                    "image_url": {"url": attachment.to_data_url()}
                }));
                Value::Array(parts)
            }
            _ => Value::String(msg.content.clone()),
        };

        json!({"role": role, "content": content})
    }
}

impl WireAdapter for OpenAiAdapter {
    fn provider_id(&self) -> &str {
        "openai"
    }

    fn build_request(&self, api_key: &str, request: &LlmRequest) -> RequestDescriptor {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.extend(request.messages.iter().map(Self::convert_message));

        let body = json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        RequestDescriptor {
            url: self.base_url.clone(),
            query: Vec::new(),
            bearer: Some(api_key.to_string()),
            body,
        }
    }

    fn parse_response(&self, body: &Value) -> Result<String> {
        let response: OpenAiResponse =
            serde_json::from_value(body.clone()).map_err(|_| Error::EmptyCompletion)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.is_empty())
            .ok_or(Error::EmptyCompletion)
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}
