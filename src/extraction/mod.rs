//! Contact extraction collaborator
//!
//! The crawler does not parse contacts out of markup itself; it hands
//! candidate text blocks to an external classification model and treats the
//! model's JSON reply as the source of truth. This module defines the trait
//! seam, the payload validation rules, and the chat-completions client
//! implementation.

mod openai;
mod prompt;

pub use openai::OpenAiExtractor;
pub use prompt::render_prompt;

use crate::session::ContactRecord;
use async_trait::async_trait;
use thiserror::Error;

/// Errors from the extraction collaborator
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("extraction API request failed: {0}")]
    Api(#[from] reqwest::Error),

    #[error("extraction API returned HTTP {status}")]
    Status { status: u16 },

    #[error("malformed extraction payload: {0}")]
    Parse(String),

    #[error("missing API key: environment variable {0} is not set")]
    MissingApiKey(String),
}

/// Result type for extraction operations
pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Turns candidate text blocks into structured contact records
#[async_trait]
pub trait ContactExtractor: Send + Sync {
    /// Extracts contact candidates from the given blocks
    ///
    /// `source_url` is stamped into each returned record. A malformed reply
    /// is an extraction failure for the calling page only; the caller decides
    /// the propagation.
    async fn extract(
        &self,
        blocks: &[String],
        source_url: &str,
    ) -> ExtractionResult<Vec<ContactRecord>>;
}

/// Strips markdown code-fence wrappers the model sometimes puts around the
/// JSON payload
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "")
}

/// Parses and validates the collaborator's reply
///
/// The payload must be a JSON array. Entries that are not objects, lack a
/// name, or carry neither email nor phone are dropped; they never reach
/// storage. A non-array payload is a parse error.
pub fn parse_contact_payload(raw: &str) -> ExtractionResult<Vec<ContactRecord>> {
    let cleaned = strip_code_fences(raw);

    let value: serde_json::Value = serde_json::from_str(cleaned.trim())
        .map_err(|e| ExtractionError::Parse(e.to_string()))?;

    let entries = value
        .as_array()
        .ok_or_else(|| ExtractionError::Parse("expected a JSON array".to_string()))?;

    let contacts = entries
        .iter()
        .filter_map(|entry| serde_json::from_value::<ContactRecord>(entry.clone()).ok())
        .filter(|contact| !contact.name.trim().is_empty())
        .filter(ContactRecord::has_reachable_detail)
        .collect();

    Ok(contacts)
}
