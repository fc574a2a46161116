//! Incremental decoder for the explanation event stream.
//!
//! Buffers raw bytes until a blank-line delimiter is seen, so chunk
//! boundaries may fall anywhere: inside a delimiter, inside a multi-byte
//! character, or inside a JSON payload. Only complete frames are decoded; the
//! incomplete tail is kept for the next chunk.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use serde_json::Value;

use crate::encoder::{EVENT_DONE, EVENT_ERROR};
use crate::error::StreamError;
use crate::frame::{DonePayload, StreamFrame};

/// Byte-level frame splitter and parser.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    search_from: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every frame it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(block) = self.next_block() {
            if let Some(frame) = parse_block(&block) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush the trailing remainder once the transport has ended.
    ///
    /// A final frame missing its closing blank line is still honoured.
    pub fn finish(&mut self) -> Option<StreamFrame> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        self.search_from = 0;
        parse_block(&decode_utf8(&rest))
    }

    /// Bytes held back waiting for a delimiter.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    fn next_block(&mut self) -> Option<String> {
        match find_delimiter(&self.buffer, self.search_from) {
            Some((end, delimiter_len)) => {
                let block: Vec<u8> = self.buffer.drain(..end + delimiter_len).collect();
                self.search_from = 0;
                Some(decode_utf8(&block[..end]))
            }
            None => {
                // A delimiter may straddle the next chunk.
                self.search_from = self.buffer.len().saturating_sub(2);
                None
            }
        }
    }
}

/// Position of the first `\n\n` or `\n\r\n` at or after `from`.
fn find_delimiter(buffer: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut index = from;
    while index < buffer.len() {
        if buffer[index] == b'\n' {
            match (buffer.get(index + 1), buffer.get(index + 2)) {
                (Some(b'\n'), _) => return Some((index, 2)),
                (Some(b'\r'), Some(b'\n')) => return Some((index, 3)),
                _ => {}
            }
        }
        index += 1;
    }
    None
}

fn decode_utf8(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(e) => {
            tracing::warn!(error = %e, len = bytes.len(), "invalid UTF-8 in stream frame");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Parse one delimited block into a frame.
///
/// Returns `None` for blocks that carry nothing for the consumer: comments,
/// keep-alives, and events this protocol does not define.
pub fn parse_block(block: &str) -> Option<StreamFrame> {
    let mut event: Option<&str> = None;
    let mut data: Vec<&str> = Vec::new();

    for line in block.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.trim()),
            "data" => data.push(value),
            // id, retry, and unknown fields carry nothing here
            _ => {}
        }
    }

    if data.is_empty() && event.is_none() {
        return None;
    }
    let payload = data.join("\n");

    match event {
        Some(EVENT_DONE) => Some(StreamFrame::Done(parse_done(&payload))),
        Some(EVENT_ERROR) => Some(StreamFrame::Error {
            message: parse_error_message(&payload),
        }),
        None | Some("message") => {
            if data.is_empty() {
                return None;
            }
            Some(match sniff_done_marker(&payload) {
                Some(done) => StreamFrame::Done(done),
                None => StreamFrame::Delta { content: payload },
            })
        }
        Some(other) => {
            tracing::trace!(event = other, "ignoring unknown stream event");
            None
        }
    }
}

/// A `data:` payload counts as the end marker only when it is a JSON object
/// carrying both `json` and `textHash`.
fn sniff_done_marker(payload: &str) -> Option<DonePayload> {
    let trimmed = payload.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    let value: Value = serde_json::from_str(trimmed).ok()?;
    let object = value.as_object()?;
    if !(object.contains_key("json") && object.contains_key("textHash")) {
        return None;
    }
    serde_json::from_value(value).ok()
}

fn parse_done(payload: &str) -> DonePayload {
    match serde_json::from_str::<DonePayload>(payload.trim()) {
        Ok(done) => done,
        Err(e) => {
            tracing::debug!(error = %e, "malformed done payload, treating as empty");
            DonePayload::default()
        }
    }
}

fn parse_error_message(payload: &str) -> String {
    if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(payload.trim()) {
        for key in ["message", "error"] {
            if let Some(Value::String(message)) = object.get(key) {
                return message.clone();
            }
        }
    }
    payload.to_string()
}

type ByteStream = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, String>> + Send>>;

/// Stream adapter turning a transport byte stream into decoded frames.
pub struct DecodedStream {
    inner: ByteStream,
    decoder: FrameDecoder,
    ready: VecDeque<StreamFrame>,
    exhausted: bool,
}

impl std::fmt::Debug for DecodedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedStream")
            .field("pending_bytes", &self.decoder.pending_len())
            .field("ready", &self.ready.len())
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

impl DecodedStream {
    pub fn new<S, E>(byte_stream: S) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
        E: std::fmt::Display + 'static,
    {
        Self {
            inner: Box::pin(byte_stream.map(|chunk| chunk.map_err(|e| e.to_string()))),
            decoder: FrameDecoder::new(),
            ready: VecDeque::new(),
            exhausted: false,
        }
    }
}

impl Stream for DecodedStream {
    type Item = std::result::Result<StreamFrame, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(frame) = this.ready.pop_front() {
                return Poll::Ready(Some(Ok(frame)));
            }
            if this.exhausted {
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.ready.extend(this.decoder.push(&bytes));
                }
                Poll::Ready(Some(Err(e))) => {
                    this.exhausted = true;
                    return Poll::Ready(Some(Err(StreamError::Transport(e))));
                }
                Poll::Ready(None) => {
                    this.exhausted = true;
                    this.ready.extend(this.decoder.finish());
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
