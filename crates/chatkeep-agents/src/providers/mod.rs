use async_trait::async_trait;
use chatkeep_common::{Error, Message, Result};
use chatkeep_config::{ProviderConfig, ProviderKind};
use chatkeep_security::redact_secrets;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

pub mod gemini;
pub mod openai;

pub use gemini::GeminiAdapter;
pub use openai::OpenAiAdapter;

/// Trait for completion endpoints.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identifier (e.g. "gemini", "openai").
    fn provider_id(&self) -> &str;

    /// Send a completion request and return the reply text.
    async fn complete(&self, api_key: &str, request: &LlmRequest) -> Result<String>;
}

/// Translates the canonical request into one wire format and back.
pub trait WireAdapter: Send + Sync {
    fn provider_id(&self) -> &str;

    fn build_request(&self, api_key: &str, request: &LlmRequest) -> RequestDescriptor;

    /// Extract the reply text from a success body.
    fn parse_response(&self, body: &serde_json::Value) -> Result<String>;
}

/// Provider-neutral completion request.
#[derive(Debug, Clone, Serialize)]
pub struct LlmRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub system: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Everything needed to issue one HTTP POST. Holds credentials, so no `Debug`.
pub struct RequestDescriptor {
    pub url: String,
    pub query: Vec<(&'static str, String)>,
    pub bearer: Option<String>,
    pub body: serde_json::Value,
}

/// Sends adapter-built requests over HTTP and classifies failures.
pub struct HttpProvider {
    client: Client,
    adapter: Box<dyn WireAdapter>,
}

impl HttpProvider {
    pub fn new(adapter: Box<dyn WireAdapter>) -> Self {
        Self {
            client: Client::new(),
            adapter,
        }
    }
}

#[async_trait]
impl LlmProvider for HttpProvider {
    fn provider_id(&self) -> &str {
        self.adapter.provider_id()
    }

    async fn complete(&self, api_key: &str, request: &LlmRequest) -> Result<String> {
        let descriptor = self.adapter.build_request(api_key, request);
        debug!(
            provider = self.adapter.provider_id(),
            model = %request.model,
            turns = request.messages.len(),
            "sending completion request"
        );

        let mut builder = self.client.post(&descriptor.url).json(&descriptor.body);
        if !descriptor.query.is_empty() {
            builder = builder.query(&descriptor.query);
        }
        if let Some(token) = &descriptor.bearer {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Transport(redact_secrets(&e.to_string())))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Transport(redact_secrets(&e.to_string())))?;
        let body: Option<serde_json::Value> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            if let Some(message) = body.as_ref().and_then(provider_error_message) {
                return Err(Error::Provider(message));
            }
            return Err(Error::Transport(format!("status {}", status.as_u16())));
        }

        let body =
            body.ok_or_else(|| Error::Transport("response body is not valid JSON".to_string()))?;
        if let Some(message) = provider_error_message(&body) {
            return Err(Error::Provider(message));
        }

        self.adapter.parse_response(&body)
    }
}

/// Pull `error.message` (or a bare `error` string) out of a response body.
pub fn provider_error_message(body: &serde_json::Value) -> Option<String> {
    let error = body.get("error")?;
    match error {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(
            other
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| other.to_string()),
        ),
    }
}

/// Build the provider selected by configuration.
pub fn provider_from_config(config: &ProviderConfig) -> Arc<dyn LlmProvider> {
    let base_url = config.base_url();
    let adapter: Box<dyn WireAdapter> = match config.kind {
        ProviderKind::Gemini => Box::new(GeminiAdapter::new(base_url)),
        ProviderKind::OpenAi => Box::new(OpenAiAdapter::new(base_url)),
    };
    Arc::new(HttpProvider::new(adapter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_structured_error_message() {
        let body = json!({"error": {"code": 400, "message": "API key not valid"}});
        assert_eq!(
            provider_error_message(&body).as_deref(),
            Some("API key not valid")
        );
    }

    #[test]
    fn extracts_bare_error_string() {
        let body = json!({"error": "rate limited"});
        assert_eq!(provider_error_message(&body).as_deref(), Some("rate limited"));
    }

    #[test]
    fn no_error_field_means_none() {
        assert!(provider_error_message(&json!({"choices": []})).is_none());
        assert!(provider_error_message(&json!({"error": null})).is_none());
    }

    #[test]
    fn config_selects_adapter() {
        let gemini = provider_from_config(&ProviderConfig::default());
        assert_eq!(gemini.provider_id(), "gemini");

        let openai = provider_from_config(&ProviderConfig {
            kind: ProviderKind::OpenAi,
            ..Default::default()
        });
        assert_eq!(openai.provider_id(), "openai");
    }
}
