use crate::error::RelayError;
use crate::types::openai::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

/// Hosted text generation: one prompt in, one completion out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, RelayError>;
}

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub base_url: Url,
    pub model: String,
}

/// OpenAI-compatible chat-completions client.
pub struct OpenAiClient {
    client: reqwest::Client,
    settings: OpenAiSettings,
}

impl OpenAiClient {
    pub fn new(client: reqwest::Client, settings: OpenAiSettings) -> Self {
        Self { client, settings }
    }

    fn completions_url(&self) -> Result<Url, RelayError> {
        Ok(Url::parse(&format!(
            "{}/chat/completions",
            self.settings.base_url.as_str().trim_end_matches('/')
        ))?)
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, RelayError> {
        let body = ChatCompletionRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens,
            temperature: 0.7,
        };

        let resp = self
            .client
            .post(self.completions_url()?)
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::TextGeneration(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            warn!(%status, model = %self.settings.model, "text generation request rejected");
            return Err(RelayError::TextGeneration(format!(
                "upstream status {status}"
            )));
        }

        let parsed: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| RelayError::TextGeneration(format!("invalid response: {e}")))?;
        let text = parsed
            .first_text()
            .ok_or_else(|| RelayError::TextGeneration("no choices in response".to_string()))?;
        debug!(chars = text.len(), "text generation completed");
        Ok(text)
    }
}
