//! HTTP chat-completion client, grounded on `callChatCompletion`'s request
//! shape (`model`, `messages`, `temperature`, `max_tokens`) and response
//! decode (`choices[0].message.content`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::parse::parse_competitor_report;
use crate::prompt::build_competitor_analysis_prompt;
use crate::{CompetitorAnalysisData, CompetitorReport, LlmError};

/// Explicit provider selection (spec §9 OQ4) — never inferred from the
/// shape of the configured API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProviderKind {
    OpenAi,
    DeepSeek,
}

impl LlmProviderKind {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmProviderKind::OpenAi => "https://api.openai.com/v1",
            LlmProviderKind::DeepSeek => "https://api.deepseek.com/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProviderKind::OpenAi => "gpt-4o-mini",
            LlmProviderKind::DeepSeek => "deepseek-chat",
        }
    }

    /// Parses the `LLM_PROVIDER` config value. Unrecognized values fall
    /// back to DeepSeek rather than guessing from the API key's shape
    /// (spec §9 OQ4).
    pub fn from_config_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => LlmProviderKind::OpenAi,
            _ => LlmProviderKind::DeepSeek,
        }
    }
}

#[async_trait]
pub trait ChatCompletionClient: Send + Sync {
    async fn generate_competitor_report(
        &self,
        data: &CompetitorAnalysisData,
    ) -> Result<CompetitorReport, LlmError>;
}

pub struct HttpLlmClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl HttpLlmClient {
    pub fn new(kind: LlmProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .expect("reqwest client build"),
            base_url: kind.default_base_url().to_string(),
            model: kind.default_model().to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    async fn chat_completion(&self, prompt: &str) -> Result<String, LlmError> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.3,
            "max_tokens": 1500,
        });

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Failed { status, body });
        }

        let envelope: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        envelope
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(LlmError::EmptyChoices)
    }
}

#[async_trait]
impl ChatCompletionClient for HttpLlmClient {
    async fn generate_competitor_report(
        &self,
        data: &CompetitorAnalysisData,
    ) -> Result<CompetitorReport, LlmError> {
        let prompt = build_competitor_analysis_prompt(data);
        let content = self.chat_completion(&prompt).await?;
        parse_competitor_report(&content)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize, Serialize)]
struct ChatMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kinds_have_distinct_defaults() {
        assert_ne!(
            LlmProviderKind::OpenAi.default_base_url(),
            LlmProviderKind::DeepSeek.default_base_url()
        );
        assert_eq!(LlmProviderKind::DeepSeek.default_model(), "deepseek-chat");
    }

    #[test]
    fn provider_kind_parses_explicit_config_never_api_key_shape() {
        assert_eq!(LlmProviderKind::from_config_str("openai"), LlmProviderKind::OpenAi);
        assert_eq!(LlmProviderKind::from_config_str("OpenAI"), LlmProviderKind::OpenAi);
        assert_eq!(LlmProviderKind::from_config_str("deepseek"), LlmProviderKind::DeepSeek);
        assert_eq!(LlmProviderKind::from_config_str("unknown"), LlmProviderKind::DeepSeek);
    }
}
