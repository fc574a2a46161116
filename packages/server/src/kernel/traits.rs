// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// The explain pipeline in domains/explain composes them.
//
// Naming convention: Base* for trait names (e.g., BaseGenerator, BaseSearchService)

use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use openai_client::ChatRequest;

use crate::common::ExplanationRecord;

/// Text deltas from a streamed completion, in arrival order.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

// =============================================================================
// Generation Trait (Infrastructure - LLM chat completions)
// =============================================================================

#[async_trait]
pub trait BaseGenerator: Send + Sync {
    /// Start a streamed completion. Resolves once the backend has accepted
    /// the request; tokens then arrive through the returned stream.
    async fn stream_chat(&self, request: ChatRequest) -> Result<TokenStream>;

    /// One-shot completion, returning the full text.
    async fn complete(&self, request: ChatRequest) -> Result<String>;
}

// =============================================================================
// Search Service Trait (Infrastructure - source retrieval)
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
    pub score: f64,
}

#[async_trait]
pub trait BaseSearchService: Send + Sync {
    /// Ranked results for `query`, best first.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>>;
}

// =============================================================================
// Explanation Store Trait (Infrastructure - persistence collaborator)
// =============================================================================

#[async_trait]
pub trait BaseExplanationStore: Send + Sync {
    async fn save(&self, record: ExplanationRecord) -> Result<()>;
}
