//! Wire protocol for streamed explanations.
//!
//! One response stream carries any number of text deltas followed by exactly
//! one terminal frame (`done` with the structured result, or `error`).
//!
//! # Example
//!
//! ```rust
//! use explain_stream::{encode_frame, ExplanationAccumulator, FrameDecoder, Outcome, StreamFrame};
//!
//! let wire = [
//!     encode_frame(&StreamFrame::delta("Hel")),
//!     encode_frame(&StreamFrame::delta("lo")),
//! ]
//! .concat();
//!
//! let mut decoder = FrameDecoder::new();
//! let mut acc = ExplanationAccumulator::new();
//! for frame in decoder.push(wire.as_bytes()) {
//!     acc.apply(frame);
//! }
//! assert_eq!(acc.finish(), Outcome::Raw("Hello".into()));
//! ```

pub mod accumulator;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod extract;
pub mod frame;
pub mod request;

pub use accumulator::{ExplanationAccumulator, Outcome};
pub use decoder::{parse_block, DecodedStream, FrameDecoder};
pub use encoder::{encode_done, encode_frame, normalize_newlines, EVENT_DONE, EVENT_ERROR};
pub use error::{Result, StreamError};
pub use extract::{bracket_scan, parse_object, parse_structured};
pub use frame::{DonePayload, Source, SourceLink, StreamFrame, StructuredExplanation};
pub use request::{ContextLevel, ExplainRequest, Mode, PageMetadata};

/// Content type of the explanation stream.
pub const CONTENT_TYPE: &str = "text/event-stream";
