//! Prompt template for the contact extraction model

/// Instructions sent with every extraction call. `{text}` and `{source_url}`
/// are filled in by [`render_prompt`].
const CONTACT_EXTRACTOR_PROMPT: &str = r#"
  You are an information extractor. Your task is to extract valid and actionable contact details only from the text provided below. Use no external knowledge. Make no assumptions. Extract only information explicitly present in the text.

  A valid contact must meet both of these conditions:
  1. It must clearly represent a person or identifiable department.
  2. It must include at least one direct contact method: an email or a phone number.

  Ignore:
  - Entries with no email and no phone.
  - Entries with no email and no phone! - I can not emphasize this enough. We want these leads to be useful.
  - Generic locations (e.g., "Brazil", "Asia Pacific") unless clearly representing a contactable department with email/phone.
  - Entries without any identifying name or label.

  Extract contacts in the following JSON format (as a JSON array):
  [
    {
      "name": "...",       // REQUIRED! If not present, skip this entry.
      "email": "...",      // optional - include only if present
      "phone": "...",      // optional - include only if present
      "role": "...",       // optional - include only if explicitly present
      "source": "{source_url}"
    },
    ...
  ]

  Instructions:
  - Return ONLY the raw JSON array. No commentary, no explanation.
  - Do NOT fabricate or infer any missing data.
  - Field values must be exactly as they appear in the input.
  - Omit any field that is not present.
  - At the end of the run, scan the contacts and remove any that a sales rep might not be able to contact or find useful.

  Begin processing the text below:

  {text}
"#;

/// Renders the extraction prompt for one page
///
/// The candidate blocks are embedded as a JSON array so quoting inside the
/// page text cannot break the prompt structure.
pub fn render_prompt(blocks: &[String], source_url: &str) -> String {
    let text = serde_json::to_string(blocks).unwrap_or_else(|_| "[]".to_string());
    CONTACT_EXTRACTOR_PROMPT
        .replace("{source_url}", source_url)
        .replace("{text}", &text)
}
