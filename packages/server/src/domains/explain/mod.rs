//! Explain domain - turns a text selection into a streamed explanation.

pub mod demo;
pub mod error;
pub mod followup;
pub mod pipeline;
pub mod prompts;

pub use error::{ExplainError, Result};
pub use followup::answer_followup;
pub use pipeline::{explain, prepare_text, retrieve_sources, PreparedText};
