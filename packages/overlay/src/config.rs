use std::time::Duration;

use explain_stream::{ContextLevel, ExplainRequest, Mode, PageMetadata};

pub const DEFAULT_API_BASE: &str = "http://localhost:3000";

/// Overlay settings. `Default` matches the shipped extension.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayConfig {
    pub api_base: String,
    pub mode: Mode,
    pub context_level: ContextLevel,
    pub redaction_enabled: bool,
    /// Quiet period after a selection change before the bubble shows
    pub selection_debounce: Duration,
    /// Shortest selection (in characters) that offers the bubble
    pub min_selection_len: usize,
    /// Longest wait for the surface to report ready
    pub mount_timeout: Duration,
    /// Quiet period after host mutations before a pinned panel reattaches
    pub reattach_debounce: Duration,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            mode: Mode::Executive,
            context_level: ContextLevel::Expanded,
            redaction_enabled: true,
            selection_debounce: Duration::from_millis(300),
            min_selection_len: 3,
            mount_timeout: Duration::from_millis(200),
            reattach_debounce: Duration::from_millis(400),
        }
    }
}

impl OverlayConfig {
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Request body for `text` using the configured mode and redaction.
    pub fn request(&self, text: impl Into<String>, metadata: PageMetadata) -> ExplainRequest {
        ExplainRequest {
            text: text.into(),
            mode: self.mode,
            context_level: self.context_level,
            metadata,
            redaction_enabled: self.redaction_enabled,
            context_snippet: None,
            expanded_context_enabled: None,
            conversation_id: None,
        }
    }

    /// Shrink every timer, for tests.
    pub fn with_timers(mut self, debounce: Duration, mount_timeout: Duration) -> Self {
        self.selection_debounce = debounce;
        self.reattach_debounce = debounce;
        self.mount_timeout = mount_timeout;
        self
    }
}
