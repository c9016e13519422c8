//! External AI completion collaborator.
//!
//! The completion service is treated as untrusted and unreliable: callers
//! always re-validate and re-normalize whatever comes back (see
//! [`crate::parse`]). Calls are blocking from the request's point of view,
//! single attempt, no retry, transport default timeout.

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// A structured-completion collaborator returning raw JSON content.
///
/// Production uses [`DeepSeekClient`]; tests substitute a canned stub.
pub trait Completions: Send + Sync {
    fn complete(
        &self,
        system: &str,
        user: &str,
    ) -> impl Future<Output = Result<String, EngineError>> + Send;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat<'a>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat-completion client (DeepSeek wire format).
///
/// Requests force JSON-object output and a low temperature so the reply
/// can be fed straight into serde.
#[derive(Debug, Clone)]
pub struct DeepSeekClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl DeepSeekClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

impl Completions for DeepSeekClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, EngineError> {
        let endpoint = format!("{}/chat/completions", self.base_url);
        let payload = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            response_format: ResponseFormat { kind: "json_object" },
            temperature: 0.1,
            max_tokens: 4000,
        };

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| EngineError::Upstream(format!("completion request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("completion service returned {status}: {body}");
            return Err(EngineError::Upstream(format!(
                "completion service returned {status}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|err| EngineError::Upstream(format!("malformed completion reply: {err}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| EngineError::Upstream("empty completion content".to_string()))
    }
}
