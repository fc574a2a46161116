//! The explain request as sent by every client.

use serde::{Deserialize, Serialize};

/// Audience the explanation is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    Executive,
    Manager,
    Investor,
    TechnicalLite,
}

impl Mode {
    pub const VARIANTS: [&'static str; 4] = ["executive", "manager", "investor", "technical-lite"];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "executive" => Some(Mode::Executive),
            "manager" => Some(Mode::Manager),
            "investor" => Some(Mode::Investor),
            "technical-lite" => Some(Mode::TechnicalLite),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        Self::VARIANTS[self as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextLevel {
    Minimal,
    Standard,
    Expanded,
}

impl ContextLevel {
    pub const VARIANTS: [&'static str; 3] = ["minimal", "standard", "expanded"];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "minimal" => Some(ContextLevel::Minimal),
            "standard" => Some(ContextLevel::Standard),
            "expanded" => Some(ContextLevel::Expanded),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        Self::VARIANTS[self as usize]
    }
}

/// Where the selection came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainRequest {
    pub text: String,
    pub mode: Mode,
    pub context_level: ContextLevel,
    pub metadata: PageMetadata,
    #[serde(default = "default_true")]
    pub redaction_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_context_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let request = ExplainRequest {
            text: "Rates went up".into(),
            mode: Mode::TechnicalLite,
            context_level: ContextLevel::Standard,
            metadata: PageMetadata {
                url: Some("https://news.example.com/a".into()),
                ..Default::default()
            },
            redaction_enabled: true,
            context_snippet: None,
            expanded_context_enabled: None,
            conversation_id: None,
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "text": "Rates went up",
                "mode": "technical-lite",
                "contextLevel": "standard",
                "metadata": {"url": "https://news.example.com/a"},
                "redactionEnabled": true
            })
        );
    }

    #[test]
    fn test_redaction_defaults_on() {
        let request: ExplainRequest = serde_json::from_value(json!({
            "text": "t",
            "mode": "investor",
            "contextLevel": "minimal",
            "metadata": {}
        }))
        .unwrap();
        assert!(request.redaction_enabled);
        assert_eq!(request.mode.as_str(), "investor");
        assert_eq!(ContextLevel::parse("expanded"), Some(ContextLevel::Expanded));
    }
}
