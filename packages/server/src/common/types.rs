//! Request validation and the persisted record.

use explain_stream::{ContextLevel, ExplainRequest, Mode, PageMetadata};
use serde::Serialize;
use serde_json::{Map, Value};

/// One rejected field, as reported in a 400 body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Collects every violation instead of stopping at the first.
#[derive(Debug, Default)]
struct Violations(Vec<FieldError>);

impl Violations {
    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    fn required_string(&mut self, object: &Map<String, Value>, field: &str, min_len: usize) -> Option<String> {
        match object.get(field) {
            Some(Value::String(s)) if s.chars().count() >= min_len => Some(s.clone()),
            Some(Value::String(_)) => {
                self.push(field, format!("must be at least {} characters", min_len));
                None
            }
            Some(_) => {
                self.push(field, "expected string");
                None
            }
            None => {
                self.push(field, "required");
                None
            }
        }
    }

    fn optional_string(&mut self, object: &Map<String, Value>, field: &str) -> Option<String> {
        match object.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.push(field, "expected string");
                None
            }
        }
    }

    fn optional_bool(&mut self, object: &Map<String, Value>, field: &str) -> Option<bool> {
        match object.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::Bool(b)) => Some(*b),
            Some(_) => {
                self.push(field, "expected boolean");
                None
            }
        }
    }

    fn enumerated<T>(
        &mut self,
        object: &Map<String, Value>,
        field: &str,
        variants: &[&str],
        parse: fn(&str) -> Option<T>,
    ) -> Option<T> {
        let value = object.get(field).and_then(Value::as_str).and_then(parse);
        if value.is_none() {
            self.push(field, format!("expected one of: {}", variants.join(", ")));
        }
        value
    }

    fn finish<T>(self, value: Option<T>) -> Result<T, Vec<FieldError>> {
        match value {
            Some(value) if self.0.is_empty() => Ok(value),
            _ => Err(self.0),
        }
    }
}

fn parse_object(body: &[u8]) -> Result<Map<String, Value>, Vec<FieldError>> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(vec![FieldError::new("body", "expected JSON object")]),
        Err(e) => Err(vec![FieldError::new("body", format!("invalid JSON: {}", e))]),
    }
}

/// Parse and validate an explain request body, reporting every violating field.
pub fn parse_explain_request(body: &[u8]) -> Result<ExplainRequest, Vec<FieldError>> {
    let object = parse_object(body)?;
    let mut violations = Violations::default();

    let text = violations.required_string(&object, "text", 1);
    let mode = violations.enumerated(&object, "mode", &Mode::VARIANTS, Mode::parse);
    let context_level = violations.enumerated(
        &object,
        "contextLevel",
        &ContextLevel::VARIANTS,
        ContextLevel::parse,
    );
    let metadata = parse_metadata(object.get("metadata"), &mut violations);
    let redaction_enabled = violations
        .optional_bool(&object, "redactionEnabled")
        .unwrap_or(true);
    let context_snippet = violations.optional_string(&object, "contextSnippet");
    let expanded_context_enabled = violations.optional_bool(&object, "expandedContextEnabled");
    let conversation_id = violations.optional_string(&object, "conversationId");

    let request = match (text, mode, context_level, metadata) {
        (Some(text), Some(mode), Some(context_level), Some(metadata)) => Some(ExplainRequest {
            text,
            mode,
            context_level,
            metadata,
            redaction_enabled,
            context_snippet,
            expanded_context_enabled,
            conversation_id,
        }),
        _ => None,
    };
    violations.finish(request)
}

fn parse_metadata(value: Option<&Value>, violations: &mut Violations) -> Option<PageMetadata> {
    let object = match value {
        Some(Value::Object(object)) => object,
        Some(_) => {
            violations.push("metadata", "expected object");
            return None;
        }
        None => {
            violations.push("metadata", "required");
            return None;
        }
    };

    let mut nested = Violations::default();
    let url = nested.optional_string(object, "url");
    let domain = nested.optional_string(object, "domain");
    let title = nested.optional_string(object, "title");

    if let Some(url) = &url {
        if url::Url::parse(url).is_err() {
            nested.push("url", "invalid url");
        }
    }

    let ok = nested.0.is_empty();
    for error in nested.0 {
        violations.push(&format!("metadata.{}", error.field), error.message);
    }
    ok.then_some(PageMetadata { url, domain, title })
}

/// Follow-up question about an explanation already shown.
#[derive(Debug, Clone, PartialEq)]
pub struct FollowupRequest {
    pub conversation_id: String,
    pub question: String,
    pub prior_answer_json: Value,
    pub original_text: String,
}

impl FollowupRequest {
    pub fn from_json(body: &[u8]) -> Result<Self, Vec<FieldError>> {
        let object = parse_object(body)?;
        let mut violations = Violations::default();

        let conversation_id = violations.required_string(&object, "conversationId", 0);
        let question = violations.required_string(&object, "question", 3);
        let original_text = violations.required_string(&object, "originalText", 1);
        let prior_answer_json = match object.get("priorAnswerJson") {
            Some(value @ Value::Object(_)) => Some(value.clone()),
            _ => {
                violations.push("priorAnswerJson", "expected object");
                None
            }
        };

        let request = match (conversation_id, question, prior_answer_json, original_text) {
            (Some(conversation_id), Some(question), Some(prior_answer_json), Some(original_text)) => {
                Some(FollowupRequest {
                    conversation_id,
                    question,
                    prior_answer_json,
                    original_text,
                })
            }
            _ => None,
        };
        violations.finish(request)
    }
}

/// What gets persisted once an explanation completes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplanationRecord {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    pub mode: Mode,
    pub context_level: ContextLevel,
    pub metadata: PageMetadata,
    pub text_hash: String,
    /// The parsed explanation, or the raw collected text when parsing failed.
    pub response_json: Value,
}
