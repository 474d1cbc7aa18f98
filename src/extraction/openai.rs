//! Chat-completions client for the contact extraction model

use crate::config::ExtractorConfig;
use crate::extraction::prompt::render_prompt;
use crate::extraction::{
    parse_contact_payload, ContactExtractor, ExtractionError, ExtractionResult,
};
use crate::session::ContactRecord;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Contact extractor backed by an OpenAI-style chat-completions API
pub struct OpenAiExtractor {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiExtractor {
    /// Builds an extractor from configuration, reading the API key from the
    /// environment variable the config names
    pub fn new(config: &ExtractorConfig) -> ExtractionResult<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| ExtractionError::MissingApiKey(config.api_key_env.clone()))?;

        Self::from_parts(
            &config.api_base_url,
            &config.model,
            &api_key,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Builds an extractor from explicit parts (used by tests to point at a
    /// mock server)
    pub fn from_parts(
        base_url: &str,
        model: &str,
        api_key: &str,
        timeout: Duration,
    ) -> ExtractionResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl ContactExtractor for OpenAiExtractor {
    async fn extract(
        &self,
        blocks: &[String],
        source_url: &str,
    ) -> ExtractionResult<Vec<ContactRecord>> {
        let prompt = render_prompt(blocks, source_url);

        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ExtractionError::Status {
                status: response.status().as_u16(),
            });
        }

        let reply: ChatResponse = response.json().await?;
        let content = reply
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .ok_or_else(|| ExtractionError::Parse("reply carried no choices".to_string()))?;

        tracing::debug!(
            "Extraction reply for {}: {} bytes",
            source_url,
            content.len()
        );

        let mut contacts = parse_contact_payload(content)?;
        for contact in &mut contacts {
            // The model is told to stamp the source URL; backfill if it didn't.
            if contact.source.is_empty() {
                contact.source = source_url.to_string();
            }
        }
        Ok(contacts)
    }
}
