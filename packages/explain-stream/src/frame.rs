//! Frame model shared by the server and every stream consumer.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A retrieved supporting source, as carried in the terminal frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub score: f64,
}

impl Source {
    /// The `{title, url}` projection attached to a parsed explanation.
    pub fn link(&self) -> SourceLink {
        SourceLink {
            title: self.title.clone(),
            url: self.url.clone(),
        }
    }
}

/// Source reference attached to a structured explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLink {
    pub title: String,
    pub url: String,
}

/// The structured breakdown produced once per request, at stream completion.
///
/// Every section is optional. Fields of the wrong JSON type are treated as
/// absent rather than failing the whole object, so the renderer can simply
/// omit what is missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredExplanation {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, deserialize_with = "lenient_text_list")]
    pub key_points: Vec<String>,

    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub implications: Option<String>,

    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub critical_analysis: Option<String>,

    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub bottom_line: Option<String>,

    #[serde(default, deserialize_with = "lenient_links")]
    pub sources: Vec<SourceLink>,
}

impl StructuredExplanation {
    /// Build from an arbitrary JSON value. Only objects qualify.
    pub fn from_value(value: Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value).ok()
    }

    /// True when no section would render anything.
    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.key_points.is_empty()
            && self.context.is_none()
            && self.implications.is_none()
            && self.critical_analysis.is_none()
            && self.bottom_line.is_none()
    }

    /// Replace the attached sources with the given retrieval results.
    pub fn attach_sources(&mut self, sources: &[Source]) {
        self.sources = sources.iter().map(Source::link).collect();
    }
}

/// Payload of the terminal success frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonePayload {
    #[serde(default, deserialize_with = "lenient_explanation")]
    pub json: Option<StructuredExplanation>,
    #[serde(default)]
    pub text_hash: String,
    #[serde(default, deserialize_with = "lenient_sources")]
    pub sources: Vec<Source>,
}

/// One discrete unit of the streaming wire protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// Incremental fragment of generated text, order-significant.
    ///
    /// Line endings arrive normalized (see `encoder::normalize_newlines`).
    Delta { content: String },
    /// Terminal success marker.
    Done(DonePayload),
    /// Terminal failure marker.
    Error { message: String },
}

impl StreamFrame {
    pub fn delta(content: impl Into<String>) -> Self {
        StreamFrame::Delta {
            content: content.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamFrame::Error {
            message: message.into(),
        }
    }

    /// `Done` and `Error` end a stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamFrame::Delta { .. })
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    })
}

fn lenient_text_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

fn lenient_links<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<SourceLink>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

fn lenient_sources<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Source>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

fn lenient_explanation<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<StructuredExplanation>, D::Error> {
    Ok(StructuredExplanation::from_value(Value::deserialize(deserializer)?))
}
