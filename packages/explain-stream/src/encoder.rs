//! Serialize frames into the text event stream.
//!
//! ```text
//! data: <delta line>\n           one `data:` line per line of delta text
//! \n                             blank line ends the frame
//! event: done\ndata: {...}\n\n   terminal success
//! event: error\ndata: {...}\n\n  terminal failure
//! ```
//!
//! The server always emits the `event: done` form for the terminal frame.

use serde_json::json;

use crate::frame::{DonePayload, StreamFrame};

pub const EVENT_DONE: &str = "done";
pub const EVENT_ERROR: &str = "error";

/// Encode one frame, including its trailing blank line.
pub fn encode_frame(frame: &StreamFrame) -> String {
    match frame {
        StreamFrame::Delta { content } => encode_data(None, content),
        StreamFrame::Done(payload) => encode_done(payload),
        StreamFrame::Error { message } => {
            let body = json!({ "message": message }).to_string();
            encode_data(Some(EVENT_ERROR), &body)
        }
    }
}

/// Encode a terminal success frame.
pub fn encode_done(payload: &DonePayload) -> String {
    let body = match serde_json::to_string(payload) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize done payload");
            json!({ "json": null, "textHash": payload.text_hash, "sources": [] }).to_string()
        }
    };
    encode_data(Some(EVENT_DONE), &body)
}

/// Line endings as they survive the wire: `\r\n` and lone `\r` become `\n`.
///
/// Producers that keep their own copy of the streamed text apply this to
/// every delta so their copy matches what consumers accumulate.
pub fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

fn encode_data(event: Option<&str>, payload: &str) -> String {
    let normalized = normalize_newlines(payload);
    let mut out = String::with_capacity(normalized.len() + 16);
    if let Some(event) = event {
        out.push_str("event: ");
        out.push_str(event);
        out.push('\n');
    }
    for line in normalized.split('\n') {
        out.push_str("data: ");
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::StructuredExplanation;

    #[test]
    fn test_delta_frame() {
        assert_eq!(encode_frame(&StreamFrame::delta("Hel")), "data: Hel\n\n");
    }

    #[test]
    fn test_multiline_delta_never_contains_blank_line() {
        let encoded = encode_frame(&StreamFrame::delta("line one\n\nline three"));
        assert_eq!(encoded, "data: line one\ndata: \ndata: line three\n\n");
        assert_eq!(encoded.matches("\n\n").count(), 1);
    }

    #[test]
    fn test_carriage_returns_decode_as_normalized_text() {
        for content in ["a\r\nb", "trailing\r", "lone\rmiddle", "\r\n\r\n", "mixed\r\r\n"] {
            let frame = StreamFrame::delta(content);
            let decoded = crate::decoder::parse_block(encode_frame(&frame).trim_end_matches('\n'));
            assert_eq!(decoded, Some(StreamFrame::delta(normalize_newlines(content))), "{:?}", content);
        }
    }

    #[test]
    fn test_done_frame_uses_event_form() {
        let payload = DonePayload {
            json: Some(StructuredExplanation {
                summary: Some("ok".into()),
                ..Default::default()
            }),
            text_hash: "abc".into(),
            sources: vec![],
        };
        let encoded = encode_frame(&StreamFrame::Done(payload));
        assert!(encoded.starts_with("event: done\ndata: {"));
        assert!(encoded.contains("\"textHash\":\"abc\""));
        assert!(encoded.ends_with("}\n\n"));
    }

    #[test]
    fn test_error_frame() {
        let encoded = encode_frame(&StreamFrame::error("backend exploded"));
        assert_eq!(
            encoded,
            "event: error\ndata: {\"message\":\"backend exploded\"}\n\n"
        );
    }
}
