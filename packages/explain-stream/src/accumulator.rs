//! Fold decoded frames into the final renderable result.

use crate::extract::parse_structured;
use crate::frame::{DonePayload, Source, StreamFrame, StructuredExplanation};

/// What a consumer ends up rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A well-formed explanation, from the terminal frame or recovered from
    /// the accumulated text.
    Structured {
        explanation: StructuredExplanation,
        text_hash: String,
        sources: Vec<Source>,
    },
    /// Nothing parsed; show the accumulated text as-is.
    Raw(String),
    /// The producer terminated the stream with an error frame.
    Failed(String),
}

/// Accumulates deltas in arrival order and remembers the terminal frame.
#[derive(Debug, Default)]
pub struct ExplanationAccumulator {
    text: String,
    done: Option<DonePayload>,
    error: Option<String>,
    deltas: usize,
}

impl ExplanationAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one frame. Returns `true` once a terminal frame has been seen.
    ///
    /// Frames arriving after the terminal frame are ignored.
    pub fn apply(&mut self, frame: StreamFrame) -> bool {
        if self.is_terminated() {
            tracing::debug!("frame after terminal frame ignored");
            return true;
        }
        match frame {
            StreamFrame::Delta { content } => {
                self.text.push_str(&content);
                self.deltas += 1;
                false
            }
            StreamFrame::Done(payload) => {
                self.done = Some(payload);
                true
            }
            StreamFrame::Error { message } => {
                self.error = Some(message);
                true
            }
        }
    }

    /// Text accumulated so far, for render-as-you-go.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Deltas applied so far.
    pub fn delta_count(&self) -> usize {
        self.deltas
    }

    pub fn is_terminated(&self) -> bool {
        self.done.is_some() || self.error.is_some()
    }

    /// Resolve the final result.
    ///
    /// Prefers the terminal frame's object; otherwise bracket-scans the
    /// accumulated text; otherwise falls back to raw text.
    pub fn finish(self) -> Outcome {
        if let Some(message) = self.error {
            return Outcome::Failed(message);
        }

        let (json, text_hash, sources) = match self.done {
            Some(done) => (done.json, done.text_hash, done.sources),
            None => (None, String::new(), Vec::new()),
        };

        match json.or_else(|| parse_structured(&self.text)) {
            Some(explanation) => Outcome::Structured {
                explanation,
                text_hash,
                sources,
            },
            None => Outcome::Raw(self.text),
        }
    }
}
