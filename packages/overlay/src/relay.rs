//! Background relay.
//!
//! Runs the HTTP stream on behalf of a page and forwards it as port
//! messages on the `scribeoverlay-stream` channel, and delivers explain
//! triggers (context menu, keyboard command) into tabs.

use async_trait::async_trait;
use explain_stream::{DonePayload, ExplainRequest, StreamFrame};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::consumer::ExplainClient;
use crate::credentials::CredentialStore;
use crate::error::{OverlayError, Result};

/// Port name the page connects on.
pub const STREAM_CHANNEL: &str = "scribeoverlay-stream";

/// Request sent by the page over the port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RelayRequest {
    Explain { payload: ExplainRequest },
}

/// Messages posted back to the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum PortMessage {
    /// One delta's text
    Chunk(String),
    /// Terminal payload as JSON text
    Done(String),
    Error(String),
}

impl PortMessage {
    /// Normalize a decoded frame. Both server terminal framings arrive here
    /// as `Done`.
    pub fn from_frame(frame: StreamFrame) -> Self {
        match frame {
            StreamFrame::Delta { content } => PortMessage::Chunk(content),
            StreamFrame::Done(payload) => {
                PortMessage::Done(serde_json::to_string(&payload).unwrap_or_else(|_| "{}".into()))
            }
            StreamFrame::Error { message } => PortMessage::Error(message),
        }
    }

    /// Page-side inverse of `from_frame`.
    pub fn into_frame(self) -> StreamFrame {
        match self {
            PortMessage::Chunk(content) => StreamFrame::Delta { content },
            PortMessage::Done(data) => {
                StreamFrame::Done(serde_json::from_str::<DonePayload>(&data).unwrap_or_default())
            }
            PortMessage::Error(message) => StreamFrame::Error { message },
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PortMessage::Chunk(_))
    }
}

/// The page end of a connected port.
pub trait Port: Send {
    /// Fails once the page has disconnected.
    fn post(&mut self, message: PortMessage) -> Result<()>;
}

/// Relay one request. Exactly one terminal message is posted unless the
/// page disconnects or the relay is cancelled.
///
/// Credentials are read from `credentials` for every request, so pairing or
/// disconnecting takes effect on the next relay.
pub async fn relay_stream<P: Port>(
    client: &ExplainClient,
    request: RelayRequest,
    credentials: &CredentialStore,
    port: &mut P,
    cancel: &CancellationToken,
) {
    let RelayRequest::Explain { payload } = request;

    let credential = match credentials.load().await {
        Ok(stored) => stored.map(|c| c.credential()),
        Err(e) => {
            warn!(error = %e, "failed to read credentials");
            None
        }
    };

    let mut frames = match client.open_stream(&payload, credential.as_ref(), cancel).await {
        Ok(frames) => frames,
        Err(e) if e.is_silent() => return,
        Err(e) => {
            let _ = port.post(PortMessage::Error(e.user_message().to_string()));
            return;
        }
    };

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return,
            next = frames.next() => next,
        };

        let message = match next {
            Some(Ok(frame)) => PortMessage::from_frame(frame),
            Some(Err(e)) => {
                let e = OverlayError::from(e);
                if e.is_silent() || cancel.is_cancelled() {
                    return;
                }
                warn!(error = %e, "relay stream failed");
                PortMessage::Error(e.user_message().to_string())
            }
            None => {
                debug!("stream ended without a terminal frame");
                PortMessage::Done(
                    serde_json::to_string(&DonePayload::default()).unwrap_or_else(|_| "{}".into()),
                )
            }
        };

        let terminal = message.is_terminal();
        if port.post(message).is_err() {
            debug!("port disconnected, relay stopped");
            return;
        }
        if terminal {
            return;
        }
    }
}

// =============================================================================
// Trigger delivery
// =============================================================================

/// Message asking a tab's content script to open the panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerMessage {
    Explain {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selection: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub id: i64,
    pub url: Option<String>,
}

impl Tab {
    /// Browser-internal pages never receive triggers.
    pub fn is_restricted(&self) -> bool {
        self.url
            .as_deref()
            .is_some_and(|url| url.starts_with("chrome://"))
    }
}

#[async_trait]
pub trait TabMessenger: Send + Sync {
    async fn send(&self, tab_id: i64, message: &TriggerMessage) -> Result<()>;

    /// Install the content script capability into the tab.
    async fn install(&self, tab_id: i64) -> Result<()>;
}

/// Deliver a trigger, bootstrapping the capability and retrying exactly
/// once when the first attempt fails.
pub async fn deliver_trigger(
    messenger: &dyn TabMessenger,
    tab: &Tab,
    message: &TriggerMessage,
) -> Result<()> {
    if tab.is_restricted() {
        return Err(OverlayError::Delivery("restricted page".into()));
    }

    match messenger.send(tab.id, message).await {
        Ok(()) => Ok(()),
        Err(first) => {
            info!(tab_id = tab.id, error = %first, "content script missing, installing");
            messenger.install(tab.id).await.map_err(|e| {
                warn!(tab_id = tab.id, error = %e, "cannot install on this page");
                OverlayError::Delivery(e.to_string())
            })?;
            messenger
                .send(tab.id, message)
                .await
                .map_err(|e| OverlayError::Delivery(e.to_string()))
        }
    }
}
