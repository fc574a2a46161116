pub mod redaction;
pub mod types;

pub use redaction::{hash_text, redact, RedactionResult, Replacement};
pub use types::*;
