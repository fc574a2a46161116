//! Canned output used when no generation credential is configured.

use explain_stream::StructuredExplanation;

pub fn demo_explanation() -> StructuredExplanation {
    StructuredExplanation {
        summary: Some(
            "This is a demo explanation. Set OPENAI_API_KEY in the server environment to get real analysis."
                .to_string(),
        ),
        key_points: vec![
            "Demo mode is active".to_string(),
            "Set OPENAI_API_KEY to enable real analysis".to_string(),
            "The extension is connected and working".to_string(),
        ],
        context: Some(
            "Scribe Overlay sends selected text to a language model and streams back a structured breakdown."
                .to_string(),
        ),
        implications: Some(
            "Once a key is configured, every selection gets a full explanation.".to_string(),
        ),
        critical_analysis: Some("This is placeholder content for testing.".to_string()),
        bottom_line: Some("Configure an API key to unlock the full experience.".to_string()),
        sources: Vec::new(),
    }
}

/// Follow-up answer returned in demo mode.
pub const DEMO_FOLLOWUP_ANSWER: &str =
    "- Demo mode is active\n- Set OPENAI_API_KEY to get real follow-up answers";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_explanation_renders_every_section() {
        let demo = demo_explanation();
        assert!(!demo.is_empty());
        assert_eq!(demo.key_points.len(), 3);
        assert!(demo.bottom_line.is_some());
        assert!(demo.sources.is_empty());
    }
}
