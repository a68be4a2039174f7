//! OpenAI-compatible chat-completions client behind the [`LlmClient`] seam.

use std::borrow::Cow;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{LlmSettings, OPENAI_API_KEY_ENV};
use crate::error::MatcherError;

const OPENAI_API: &str = "openai";

/// One system + user exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the endpoint for a JSON object response.
    pub json_mode: bool,
}

/// Chat completion backend shared by query translation and reranking.
#[async_trait]
pub trait LlmClient: Send + Sync {
    fn model(&self) -> &str;

    /// Returns the assistant message content.
    async fn complete(&self, request: &ChatRequest) -> Result<String, MatcherError>;
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: [WireMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct WireChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiChatClient {
    client: reqwest::Client,
    base: Cow<'static, str>,
    api_key: Option<String>,
    model: String,
}

impl OpenAiChatClient {
    pub fn new(settings: &LlmSettings) -> Result<Self, MatcherError> {
        Ok(Self {
            client: crate::sources::shared_client()?,
            base: Cow::Owned(settings.base_url.clone()),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
        })
    }

    #[cfg(test)]
    fn new_for_test(base: String, api_key: Option<&str>) -> Result<Self, MatcherError> {
        Ok(Self {
            client: crate::sources::shared_client()?,
            base: Cow::Owned(base),
            api_key: api_key.map(str::to_string),
            model: "test-model".into(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base.as_ref().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn require_key(&self) -> Result<&str, MatcherError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| MatcherError::ApiKeyRequired {
                api: OPENAI_API.to_string(),
                env_var: OPENAI_API_KEY_ENV.to_string(),
            })
    }
}

#[async_trait]
impl LlmClient for OpenAiChatClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, MatcherError> {
        let key = self.require_key()?;
        let body = WireRequest {
            model: &self.model,
            messages: [
                WireMessage {
                    role: "system",
                    content: &request.system,
                },
                WireMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let resp = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        let content_type = resp.headers().get(reqwest::header::CONTENT_TYPE).cloned();
        let bytes = crate::sources::read_limited_body(resp, OPENAI_API).await?;
        if !status.is_success() {
            return Err(MatcherError::ApiStatus {
                api: OPENAI_API.to_string(),
                status: status.as_u16(),
                excerpt: crate::sources::body_excerpt(&bytes),
            });
        }
        crate::sources::ensure_json_content_type(OPENAI_API, content_type.as_ref(), &bytes)?;

        let parsed: WireResponse =
            serde_json::from_slice(&bytes).map_err(|source| MatcherError::ApiJson {
                api: OPENAI_API.to_string(),
                source,
            })?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| MatcherError::Api {
                api: OPENAI_API.to_string(),
                message: "Response contained no message content".into(),
            })?;
        debug!(model = %self.model, chars = content.len(), "LLM completion received");
        Ok(content)
    }
}
