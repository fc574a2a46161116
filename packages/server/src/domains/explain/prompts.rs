//! Prompt text and request assembly for the generation backend.

use explain_stream::Source;
use openai_client::{ChatRequest, Message};

/// Characters of redacted text used to build the retrieval query.
pub const RETRIEVAL_QUERY_CHARS: usize = 400;

pub const EXPLAIN_TEMPERATURE: f32 = 0.3;
pub const EXPLAIN_MAX_TOKENS: u32 = 2000;

pub const SYSTEM_PROMPT: &str = r#"You are a sharp analyst who helps readers make sense of dense or complicated text. Explain what the reader is looking at clearly and intelligently.

Respond with a single JSON object containing these fields:

{
  "summary": "Two or three sentences on what the text says and why it matters, written for a smart non-specialist.",
  "keyPoints": ["Three to five of the most important takeaways"],
  "context": "Background the reader needs to fully understand this: history, industry knowledge, related events.",
  "implications": "What this means from here on. Concrete consequences or opportunities.",
  "criticalAnalysis": "An honest read on reliability. Note any angle or bias, anything missing, and the questions a careful reader should ask.",
  "bottomLine": "The single most important takeaway, in one sentence."
}

Rules:
- Use plain language rather than jargon
- Be specific and insightful rather than generic
- Call out anything questionable directly
- Prioritize what actually matters to the reader
- Leave out filler
- When sources are supplied, cite them where they support the analysis"#;

pub const FOLLOWUP_SYSTEM_PROMPT: &str = "User follow-up question about previously explained text. \
Answer concisely in bullets. Keep style consistent with prior answer JSON.";

/// Search query derived from the (already redacted) selection.
///
/// Takes the leading characters, blanks out anything that is not a word
/// character or whitespace, then trims.
pub fn retrieval_query(redacted: &str) -> String {
    redacted
        .chars()
        .take(RETRIEVAL_QUERY_CHARS)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Numbered source excerpts appended to the user message. Empty when there
/// are no sources.
pub fn sources_context(sources: &[Source]) -> String {
    if sources.is_empty() {
        return String::new();
    }

    let entries: Vec<String> = sources
        .iter()
        .enumerate()
        .map(|(i, s)| format!("[{}] {}\nURL: {}\nExcerpt: {}", i + 1, s.title, s.url, s.content))
        .collect();
    format!("\n\nRelevant sources found:\n{}", entries.join("\n\n"))
}

pub fn user_message(redacted: &str, sources: &[Source]) -> String {
    format!("Analyze this text:\n\n{}{}", redacted, sources_context(sources))
}

/// The streamed explanation request.
pub fn explain_chat_request(model: &str, redacted: &str, sources: &[Source]) -> ChatRequest {
    ChatRequest::new(model)
        .message(Message::system(SYSTEM_PROMPT))
        .message(Message::user(user_message(redacted, sources)))
        .temperature(EXPLAIN_TEMPERATURE)
        .token_limit(EXPLAIN_MAX_TOKENS)
}

/// The one-shot follow-up request.
pub fn followup_chat_request(
    model: &str,
    prior_answer: &serde_json::Value,
    original_text: &str,
    question: &str,
) -> ChatRequest {
    ChatRequest::new(model)
        .message(Message::system(FOLLOWUP_SYSTEM_PROMPT))
        .message(Message::user(format!(
            "Prior answer: {}\nOriginal text: {}\nQuestion: {}",
            prior_answer, original_text, question
        )))
}
