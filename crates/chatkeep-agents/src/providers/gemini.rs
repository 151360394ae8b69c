use super::{LlmRequest, RequestDescriptor, WireAdapter};
use chatkeep_common::{Error, Message, Result, Role};
use serde_json::json;

/// Turn-content wire format: `contents[].parts[]`, API key as `?key=`.
pub struct GeminiAdapter {
    base_url: String,
}

impl GeminiAdapter {
    /// `base_url` may contain a `{model}` placeholder.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn convert_message(msg: &Message) -> serde_json::Value {
        let role = match msg.role {
            Role::User => "user",
            Role::Assistant => "model",
        };

        let mut parts = Vec::new();
        if !msg.content.is_empty() || msg.attachment.is_none() {
            parts.push(json!({"text": msg.content}));
        }
        if let Some(attachment) = &msg.attachment {
            parts.push(json!({
                "inlineData": {
                    "mimeType": attachment.media_type,
                    "data": attachment.data
                }
            }));
        }

        json!({"role": role, "parts": parts})
    }
}

impl WireAdapter for GeminiAdapter {
    fn provider_id(&self) -> &str {
        "gemini"
    }

    fn build_request(&self, api_key: &str, request: &LlmRequest) -> RequestDescriptor {
        let contents: Vec<_> = request.messages.iter().map(Self::convert_message).collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_tokens,
            }
        });

        if let Some(system) = &request.system {
            body["systemInstruction"] = json!({"parts": [{"text": system}]});
        }

        RequestDescriptor {
            url: self.base_url.replace("{model}", &request.model),
            query: vec![("key", api_key.to_string())],
            bearer: None,
            body,
        }
    }

    fn parse_response(&self, body: &serde_json::Value) -> Result<String> {
        body.pointer("/candidates/0/content/parts/0/text")
            .and_then(|t| t.as_str())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or(Error::EmptyCompletion)
    }
}
