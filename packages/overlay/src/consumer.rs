//! HTTP consumer of the explanation stream.
//!
//! Shared by the in-page panel, the background relay and the standalone page.
//! Every suspension point observes the cancellation token; a cancelled read
//! ends with `OverlayError::Cancelled` and nothing else.

use std::time::Duration;

use explain_stream::{DecodedStream, ExplainRequest, ExplanationAccumulator, Outcome, StreamFrame};
use futures::StreamExt;
use reqwest::{header, StatusCode};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::credentials::Credential;
use crate::error::{OverlayError, Result};

pub const EXPLAIN_PATH: &str = "/api/explain";
pub const EXTENSION_TOKEN_HEADER: &str = "x-extension-token";
pub const SESSION_COOKIE: &str = "session_token";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(Clone)]
pub struct ExplainClient {
    http: reqwest::Client,
    api_base: String,
}

impl std::fmt::Debug for ExplainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplainClient")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl ExplainClient {
    pub fn new(api_base: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self::with_http_client(http, api_base))
    }

    pub fn with_http_client(http: reqwest::Client, api_base: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Send the request and return the decoded frame stream.
    ///
    /// Fails before any network traffic when there is no credential.
    pub async fn open_stream(
        &self,
        request: &ExplainRequest,
        credential: Option<&Credential>,
        cancel: &CancellationToken,
    ) -> Result<DecodedStream> {
        let credential = credential.ok_or(OverlayError::NotConnected)?;

        let builder = self
            .http
            .post(format!("{}{}", self.api_base, EXPLAIN_PATH))
            .json(request);
        let builder = match credential {
            Credential::Extension(token) => builder.header(EXTENSION_TOKEN_HEADER, token),
            Credential::Session(token) => {
                builder.header(header::COOKIE, format!("{}={}", SESSION_COOKIE, token))
            }
        };

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(OverlayError::Cancelled),
            response = builder.send() => response?,
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(OverlayError::SessionExpired);
        }
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            return Err(OverlayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        if response.content_length() == Some(0) {
            return Err(OverlayError::NoResponseBody);
        }

        Ok(DecodedStream::new(response.bytes_stream()))
    }

    /// Run one explanation to completion, reporting accumulated text after
    /// every delta.
    pub async fn explain<F>(
        &self,
        request: &ExplainRequest,
        credential: Option<&Credential>,
        cancel: &CancellationToken,
        on_text: F,
    ) -> Result<Outcome>
    where
        F: FnMut(&str),
    {
        let frames = self.open_stream(request, credential, cancel).await?;
        consume(frames, cancel, on_text).await
    }
}

/// Fold a frame stream into an outcome.
///
/// A stream that ends without a terminal frame still yields an outcome from
/// whatever text arrived.
pub async fn consume<S, F>(mut frames: S, cancel: &CancellationToken, mut on_text: F) -> Result<Outcome>
where
    S: futures::Stream<Item = std::result::Result<StreamFrame, explain_stream::StreamError>> + Unpin,
    F: FnMut(&str),
{
    let mut accumulator = ExplanationAccumulator::new();

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return Err(OverlayError::Cancelled),
            next = frames.next() => next,
        };

        match next {
            Some(Ok(frame)) => {
                let is_delta = matches!(frame, StreamFrame::Delta { .. });
                if accumulator.apply(frame) {
                    break;
                }
                if is_delta {
                    on_text(accumulator.text());
                }
            }
            Some(Err(e)) => {
                if cancel.is_cancelled() {
                    return Err(OverlayError::Cancelled);
                }
                warn!(error = %e, "stream read failed");
                return Err(e.into());
            }
            None => {
                debug!("stream ended without a terminal frame");
                break;
            }
        }
    }

    debug!(deltas = accumulator.delta_count(), chars = accumulator.text().len(), "stream consumed");
    let outcome = accumulator.finish();
    if let Outcome::Failed(message) = &outcome {
        warn!(message = %message, "server reported a failure");
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use explain_stream::{DonePayload, StreamError};
    use futures::stream;

    fn frames(
        items: Vec<std::result::Result<StreamFrame, StreamError>>,
    ) -> impl futures::Stream<Item = std::result::Result<StreamFrame, StreamError>> + Unpin {
        stream::iter(items)
    }

    #[tokio::test]
    async fn test_consume_reports_growing_text() {
        let mut seen = Vec::new();
        let outcome = consume(
            frames(vec![
                Ok(StreamFrame::delta("Hel")),
                Ok(StreamFrame::delta("lo wo")),
                Ok(StreamFrame::delta("rld")),
                Ok(StreamFrame::Done(DonePayload::default())),
            ]),
            &CancellationToken::new(),
            |text| seen.push(text.to_string()),
        )
        .await
        .unwrap();

        assert_eq!(seen, vec!["Hel", "Hello wo", "Hello world"]);
        assert_eq!(outcome, Outcome::Raw("Hello world".into()));
    }

    #[tokio::test]
    async fn test_consume_cancelled_is_silent() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = consume(stream::pending(), &cancel, |_| {}).await.unwrap_err();
        assert!(err.is_silent());
    }

    #[tokio::test]
    async fn test_consume_transport_error() {
        let err = consume(
            frames(vec![
                Ok(StreamFrame::delta("partial")),
                Err(StreamError::Transport("connection reset".into())),
            ]),
            &CancellationToken::new(),
            |_| {},
        )
        .await
        .unwrap_err();
        assert_eq!(err, OverlayError::Transport("connection reset".into()));
    }

    #[tokio::test]
    async fn test_missing_credential_fails_without_request() {
        let client = ExplainClient::with_http_client(reqwest::Client::new(), "http://127.0.0.1:9");
        let request: ExplainRequest = serde_json::from_value(serde_json::json!({
            "text": "t", "mode": "executive", "contextLevel": "standard", "metadata": {}
        }))
        .unwrap();

        let err = client
            .open_stream(&request, None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, OverlayError::NotConnected);
    }
}
