//! Standalone explain page (share target and paste box).
//!
//! Authenticates with the web session cookie and always asks for expanded
//! context.

use explain_stream::{ContextLevel, Outcome, PageMetadata};
use reqwest::Url;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::OverlayConfig;
use crate::consumer::ExplainClient;
use crate::credentials::Credential;
use crate::error::OverlayError;
use crate::render::{self, Rendered};

/// Shown when the server gives no reason.
pub const FALLBACK_ERROR: &str = "Something went wrong";

/// Text handed over by the share sheet: `text`, else `title`.
pub fn shared_text(location: &str) -> Option<String> {
    let url = Url::parse(location).ok()?;
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    ["text", "title"].iter().find_map(|key| {
        pairs
            .iter()
            .find(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.clone())
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageResult {
    /// Blank input; nothing was sent
    Skipped,
    Rendered(Rendered),
    Error(String),
}

#[derive(Debug, Clone)]
pub struct ExplainPage {
    client: ExplainClient,
    config: OverlayConfig,
    session_token: Option<String>,
}

impl ExplainPage {
    pub fn new(client: ExplainClient, session_token: Option<String>) -> Self {
        let config = OverlayConfig {
            context_level: ContextLevel::Expanded,
            ..OverlayConfig::default()
        };
        Self {
            client,
            config,
            session_token,
        }
    }

    pub async fn analyze(&self, text: &str, cancel: &CancellationToken) -> PageResult {
        if text.trim().is_empty() {
            return PageResult::Skipped;
        }

        let request = self.config.request(text, PageMetadata::default());
        let credential = self.session_token.clone().map(Credential::Session);

        match self
            .client
            .explain(&request, credential.as_ref(), cancel, |_| {})
            .await
        {
            Ok(Outcome::Failed(message)) => {
                debug!(message = %message, "analysis failed");
                PageResult::Error(FALLBACK_ERROR.to_string())
            }
            Ok(outcome) => PageResult::Rendered(render::outcome(&outcome)),
            Err(OverlayError::Rejected { message, .. }) => PageResult::Error(message),
            Err(e) if e.is_silent() => PageResult::Skipped,
            Err(e) => PageResult::Error(e.user_message().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_text_prefers_text_param() {
        assert_eq!(
            shared_text("https://app.example.com/explain?title=Headline&text=Body%20copy").as_deref(),
            Some("Body copy")
        );
        assert_eq!(
            shared_text("https://app.example.com/explain?text=&title=Headline").as_deref(),
            Some("Headline")
        );
        assert_eq!(shared_text("https://app.example.com/explain"), None);
    }

    #[tokio::test]
    async fn test_blank_input_sends_nothing() {
        let page = ExplainPage::new(
            ExplainClient::with_http_client(reqwest::Client::new(), "http://127.0.0.1:9"),
            None,
        );
        assert_eq!(page.analyze("  \n", &CancellationToken::new()).await, PageResult::Skipped);
    }

    #[tokio::test]
    async fn test_signed_out_page() {
        let page = ExplainPage::new(
            ExplainClient::with_http_client(reqwest::Client::new(), "http://127.0.0.1:9"),
            None,
        );
        assert_eq!(
            page.analyze("some text", &CancellationToken::new()).await,
            PageResult::Error("Not connected".into())
        );
    }
}
