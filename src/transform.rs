use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use crate::config;
use crate::tiers::StyleId;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("language-model credential is not configured")]
    MissingCredential,
    #[error("language-model call failed: {0}")]
    Upstream(#[from] reqwest::Error),
    #[error("language-model response had no rewritten text")]
    EmptyCompletion,
}

/// Opaque text-transform collaborator. The gateway only needs "rewrite this
/// text in that tone"; everything else is provider detail.
#[async_trait]
pub trait TextTransformer: Send + Sync {
    async fn rewrite(&self, text: &str, style: StyleId) -> Result<String, TransformError>;
}

/// OpenAI-compatible chat-completions client.
pub struct OpenAiTransformer {
    client: Client,
    base: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiTransformer {
    pub fn from_env() -> Self {
        Self::new(
            config::OPENAI_BASE_URL.clone(),
            config::OPENAI_API_KEY.clone(),
            config::OPENAI_MODEL.clone(),
            Duration::from_secs(*config::REWRITE_TIMEOUT_SECS),
        )
    }

    pub fn new(
        base: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("client build"),
            base: base.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        }
    }
}

fn style_instruction(style: StyleId) -> &'static str {
    match style {
        StyleId::Professional => "a polished, professional tone",
        StyleId::Direct => "a direct, concise tone that gets to the point",
        StyleId::Email => "a well-structured email, with greeting and sign-off",
        StyleId::Casual => "a relaxed, casual tone",
        StyleId::Friendly => "a warm, friendly tone",
        StyleId::Formal => "a formal, precise register",
        StyleId::Persuasive => "a persuasive tone that motivates the reader",
        StyleId::Creative => "a vivid, creative voice",
    }
}

#[async_trait]
impl TextTransformer for OpenAiTransformer {
    async fn rewrite(&self, text: &str, style: StyleId) -> Result<String, TransformError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(TransformError::MissingCredential)?;

        let body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": format!(
                        "You rewrite the user's text in {}. Preserve the meaning. \
                         Reply with the rewritten text only.",
                        style_instruction(style)
                    ),
                },
                { "role": "user", "content": text },
            ],
        });

        let response: Value = self
            .client
            .post(format!("{}/v1/chat/completions", self.base))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let result = response["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(TransformError::EmptyCompletion)?;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_credential_is_reported_without_a_network_call() {
        let transformer = OpenAiTransformer::new(
            "http://127.0.0.1:9",
            None,
            "test-model",
            Duration::from_secs(1),
        );
        let err = transformer
            .rewrite("buy milk", StyleId::Professional)
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::MissingCredential));
    }
}
