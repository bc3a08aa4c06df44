//! OpenAI-compatible chat-completions backend (vLLM, TGI, hosted APIs).

use async_openai::types::chat::{CreateChatCompletionRequest, CreateChatCompletionResponse};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, error, instrument};

use super::{ReasoningError, ReasoningInvoker, SamplingParams};
use crate::patch::encode_png_base64;
use crate::prompt::{PromptPart, PromptRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiConfig {
    /// Base URL up to and including the API version, e.g. `http://localhost:8000/v1`.
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl OpenAiConfig {
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiInvoker {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiInvoker {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    /// Renders the prompt as a chat request: one system message, then one user message
    /// holding the user text followed by every image in prompt order.
    pub fn build_request(
        &self,
        prompt: &PromptRequest,
        params: &SamplingParams,
    ) -> Result<CreateChatCompletionRequest, ReasoningError> {
        let mut messages = Vec::new();
        let mut user_content: Vec<Value> = Vec::new();

        for part in prompt.parts() {
            match part {
                PromptPart::SystemText(text) => {
                    messages.push(json!({ "role": "system", "content": text }));
                }
                PromptPart::UserText(text) => {
                    user_content.push(json!({ "type": "text", "text": text }));
                }
                PromptPart::QueryImage { pixels } | PromptPart::EvidenceImage { pixels, .. } => {
                    let encoded =
                        encode_png_base64(pixels).map_err(|e| ReasoningError::Encoding {
                            reason: e.to_string(),
                        })?;
                    user_content.push(json!({
                        "type": "image_url",
                        "image_url": { "url": format!("data:image/png;base64,{}", encoded) }
                    }));
                }
            }
        }
        messages.push(json!({ "role": "user", "content": user_content }));

        let request_value = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": params.temperature,
            "top_p": params.top_p,
            "max_completion_tokens": params.max_new_tokens,
            "stream": false,
        });

        serde_json::from_value(request_value).map_err(|e| ReasoningError::Encoding {
            reason: format!("invalid chat request: {}", e),
        })
    }
}

#[async_trait]
impl ReasoningInvoker for OpenAiInvoker {
    #[instrument(skip_all, fields(model = %self.config.model, images = prompt.image_count()))]
    async fn generate(
        &self,
        prompt: &PromptRequest,
        params: &SamplingParams,
    ) -> Result<String, ReasoningError> {
        params.validate()?;
        let request = self.build_request(prompt, params)?;

        let mut builder = self.client.post(self.config.endpoint()).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            error!(error = %e, "Reasoning request failed");
            ReasoningError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Reasoning service rejected request");
            return Err(ReasoningError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: CreateChatCompletionResponse = response.json().await?;
        debug!(id = %completion.id, choices = completion.choices.len(), "Completion received");

        transcript_from(completion)
    }

    fn backend_name(&self) -> &'static str {
        "openai"
    }
}

/// First choice's text content.
pub(crate) fn transcript_from(
    completion: CreateChatCompletionResponse,
) -> Result<String, ReasoningError> {
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(ReasoningError::EmptyTranscript)
}
