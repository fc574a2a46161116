//! Line parser for streamed chat completions.
//!
//! Turns the upstream byte stream into `ChatCompletionChunk` values. Bytes are
//! buffered until a full line is available, so a network chunk that splits a
//! multi-byte character or a `data:` line is handled transparently.

use bytes::Bytes;
use futures::stream::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::OpenAIError;

/// One parsed upstream event.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletionChunk {
    /// Text delta, possibly empty (role-only or keep-alive events).
    pub delta: String,
    /// Set on the `[DONE]` sentinel.
    pub done: bool,
}

#[derive(Debug, serde::Deserialize)]
struct StreamChunkRaw {
    #[serde(default)]
    choices: Vec<StreamChoiceRaw>,
}

#[derive(Debug, serde::Deserialize)]
struct StreamChoiceRaw {
    delta: DeltaRaw,
}

#[derive(Debug, serde::Deserialize)]
struct DeltaRaw {
    #[serde(default)]
    content: Option<String>,
}

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, String>> + Send>>;

pub struct ChatCompletionStream {
    inner: ByteStream,
    buffer: Vec<u8>,
    finished: bool,
}

impl ChatCompletionStream {
    pub fn new<S, E>(byte_stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: std::fmt::Display + 'static,
    {
        use futures::StreamExt;

        Self {
            inner: Box::pin(byte_stream.map(|chunk| chunk.map_err(|e| e.to_string()))),
            buffer: Vec::new(),
            finished: false,
        }
    }
}

impl Stream for ChatCompletionStream {
    type Item = Result<ChatCompletionChunk, OpenAIError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(chunk) = next_event(&mut this.buffer) {
                return Poll::Ready(Some(chunk));
            }
            if this.finished {
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => this.buffer.extend_from_slice(&bytes),
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    this.buffer.clear();
                    return Poll::Ready(Some(Err(OpenAIError::Stream(e))));
                }
                Poll::Ready(None) => {
                    this.finished = true;
                    // Last line may be missing its newline.
                    if !this.buffer.is_empty() && !this.buffer.ends_with(b"\n") {
                        this.buffer.push(b'\n');
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Pop complete lines off the buffer until one yields an event.
fn next_event(buffer: &mut Vec<u8>) -> Option<Result<ChatCompletionChunk, OpenAIError>> {
    loop {
        let newline = buffer.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = buffer.drain(..=newline).collect();
        let line = String::from_utf8_lossy(&line);
        let line = line.trim();

        let data = match line.strip_prefix("data:") {
            Some(data) => data.trim(),
            // blank separators, event:, id:, retry:
            None => continue,
        };

        if data == "[DONE]" {
            return Some(Ok(ChatCompletionChunk {
                delta: String::new(),
                done: true,
            }));
        }

        return Some(match serde_json::from_str::<StreamChunkRaw>(data) {
            Ok(raw) => Ok(ChatCompletionChunk {
                delta: raw
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.delta.content)
                    .unwrap_or_default(),
                done: false,
            }),
            Err(e) => Err(OpenAIError::Parse(format!(
                "Failed to parse stream chunk: {} (data: {})",
                e,
                crate::types::truncate_to_char_boundary(data, 200)
            ))),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn chunks(parts: Vec<Vec<u8>>) -> impl Stream<Item = Result<Bytes, String>> {
        futures::stream::iter(parts.into_iter().map(|p| Ok(Bytes::from(p))))
    }

    async fn collect(stream: ChatCompletionStream) -> Vec<ChatCompletionChunk> {
        stream.map(|c| c.unwrap()).collect().await
    }

    #[tokio::test]
    async fn test_parse_tokens_and_done() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\n\n",
            "data: [DONE]\n\n"
        );
        let out = collect(ChatCompletionStream::new(chunks(vec![body.as_bytes().to_vec()]))).await;

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].delta, "Hello");
        assert_eq!(out[1].delta, " world");
        assert!(out[2].done);
    }

    #[tokio::test]
    async fn test_multibyte_character_split_across_chunks() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"naïve ☕\"}}]}\n\n";
        let bytes = line.as_bytes();
        let cut = bytes.iter().position(|&b| b == 0xE2).unwrap() + 1;

        let out = collect(ChatCompletionStream::new(chunks(vec![
            bytes[..cut].to_vec(),
            bytes[cut..].to_vec(),
        ])))
        .await;

        assert_eq!(out, vec![ChatCompletionChunk {
            delta: "naïve ☕".into(),
            done: false
        }]);
    }

    #[tokio::test]
    async fn test_role_only_delta_is_empty() {
        let body = "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n";
        let out = collect(ChatCompletionStream::new(chunks(vec![body.as_bytes().to_vec()]))).await;
        assert_eq!(out[0].delta, "");
    }

    #[tokio::test]
    async fn test_trailing_line_without_newline() {
        let out = collect(ChatCompletionStream::new(chunks(vec![b"data: [DONE]".to_vec()]))).await;
        assert_eq!(out.len(), 1);
        assert!(out[0].done);
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let parts: Vec<Result<Bytes, String>> = vec![
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n")),
            Err("reset by peer".into()),
        ];
        let mut stream = ChatCompletionStream::new(futures::stream::iter(parts));

        assert_eq!(stream.next().await.unwrap().unwrap().delta, "a");
        assert!(matches!(stream.next().await, Some(Err(OpenAIError::Stream(_)))));
        assert!(stream.next().await.is_none());
    }
}
