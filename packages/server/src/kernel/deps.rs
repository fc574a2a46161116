//! Server dependencies (using traits for testability)
//!
//! Central container handed to the explain pipeline and the HTTP layer.
//! Every external service sits behind a trait so tests can swap in mocks.

use std::sync::Arc;

use anyhow::Result;
use openai_client::OpenAIClient;

use crate::config::Config;
use crate::domains::auth::{ExtensionTokenService, SessionLookup, SessionStore};
use crate::kernel::{
    BaseExplanationStore, BaseGenerator, BaseSearchService, InMemoryExplanationStore,
    OpenAIGenerator, TavilyClient,
};

/// Model names used per call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSettings {
    pub explain_model: String,
    pub followup_model: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            explain_model: crate::config::DEFAULT_MODEL.to_string(),
            followup_model: crate::config::DEFAULT_FOLLOWUP_MODEL.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct ServerDeps {
    /// `None` puts the server in demo mode
    pub generator: Option<Arc<dyn BaseGenerator>>,
    /// `None` disables source retrieval
    pub search: Option<Arc<dyn BaseSearchService>>,
    pub store: Arc<dyn BaseExplanationStore>,
    pub sessions: Arc<dyn SessionLookup>,
    pub extension_tokens: Arc<ExtensionTokenService>,
    pub models: ModelSettings,
}

impl ServerDeps {
    pub fn new(
        generator: Option<Arc<dyn BaseGenerator>>,
        search: Option<Arc<dyn BaseSearchService>>,
        store: Arc<dyn BaseExplanationStore>,
        sessions: Arc<dyn SessionLookup>,
        extension_tokens: Arc<ExtensionTokenService>,
        models: ModelSettings,
    ) -> Self {
        Self {
            generator,
            search,
            store,
            sessions,
            extension_tokens,
            models,
        }
    }

    /// Wire production services from configuration.
    pub fn from_config(config: &Config, sessions: SessionStore) -> Result<Self> {
        let generator = config.openai_api_key.as_ref().map(|key| {
            Arc::new(OpenAIGenerator::new(OpenAIClient::new(key.clone()))) as Arc<dyn BaseGenerator>
        });

        let search = match &config.tavily_api_key {
            Some(key) => Some(Arc::new(TavilyClient::new(key.clone())?) as Arc<dyn BaseSearchService>),
            None => {
                tracing::info!("TAVILY_API_KEY not set, source retrieval disabled");
                None
            }
        };

        Ok(Self::new(
            generator,
            search,
            Arc::new(InMemoryExplanationStore::new()),
            Arc::new(sessions),
            Arc::new(ExtensionTokenService::new(&config.extension_token_secret)),
            ModelSettings {
                explain_model: config.openai_model.clone(),
                followup_model: config.followup_model.clone(),
            },
        ))
    }

    pub fn demo_mode(&self) -> bool {
        self.generator.is_none()
    }

    pub fn retrieval_enabled(&self) -> bool {
        self.search.is_some()
    }
}
