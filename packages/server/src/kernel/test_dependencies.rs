// TestDependencies - mock implementations for testing
//
// Provides mock services that can be injected into ServerDeps for tests.
// Every mock records its calls so tests can assert on side effects.

use anyhow::Result;
use async_trait::async_trait;
use futures::stream;
use openai_client::ChatRequest;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{
    BaseExplanationStore, BaseGenerator, BaseSearchService, ModelSettings, SearchResult,
    ServerDeps, TokenStream,
};
use crate::common::ExplanationRecord;
use crate::domains::auth::{ExtensionTokenService, Session, SessionStore};

pub const TEST_TOKEN_SECRET: &str = "test_extension_secret";

// =============================================================================
// Mock Generator
// =============================================================================

pub struct MockGenerator {
    tokens: Mutex<Vec<String>>,
    fail_after: Mutex<Option<usize>>,
    fail_on_start: Mutex<bool>,
    hang_after: Mutex<Option<usize>>,
    completion: Mutex<String>,
    calls: Arc<Mutex<Vec<ChatRequest>>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(Vec::new()),
            fail_after: Mutex::new(None),
            fail_on_start: Mutex::new(false),
            hang_after: Mutex::new(None),
            completion: Mutex::new("- Mock follow-up answer".to_string()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Tokens every stream will yield, in order
    pub fn with_tokens(self, tokens: &[&str]) -> Self {
        *self.tokens.lock().unwrap() = tokens.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Yield `n` tokens then fail mid-stream
    pub fn failing_after(self, n: usize) -> Self {
        *self.fail_after.lock().unwrap() = Some(n);
        self
    }

    /// Reject the request before any token is produced
    pub fn failing_on_start(self) -> Self {
        *self.fail_on_start.lock().unwrap() = true;
        self
    }

    /// Yield `n` tokens then never finish
    pub fn hanging_after(self, n: usize) -> Self {
        *self.hang_after.lock().unwrap() = Some(n);
        self
    }

    pub fn with_completion(self, text: &str) -> Self {
        *self.completion.lock().unwrap() = text.to_string();
        self
    }

    pub fn calls(&self) -> Vec<ChatRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseGenerator for MockGenerator {
    async fn stream_chat(&self, request: ChatRequest) -> Result<TokenStream> {
        self.calls.lock().unwrap().push(request);

        if *self.fail_on_start.lock().unwrap() {
            anyhow::bail!("mock generator rejected the request");
        }

        let tokens = self.tokens.lock().unwrap().clone();
        let fail_after = *self.fail_after.lock().unwrap();
        let hang_after = *self.hang_after.lock().unwrap();

        let mut items: Vec<Result<String>> = tokens.into_iter().map(Ok).collect();
        if let Some(n) = fail_after.or(hang_after) {
            items.truncate(n);
        }
        if fail_after.is_some() {
            items.push(Err(anyhow::anyhow!("mock generator failed mid-stream")));
        }

        let scripted = stream::iter(items);
        if hang_after.is_some() {
            use futures::StreamExt;
            return Ok(Box::pin(scripted.chain(stream::pending())));
        }
        Ok(Box::pin(scripted))
    }

    async fn complete(&self, request: ChatRequest) -> Result<String> {
        self.calls.lock().unwrap().push(request);
        if *self.fail_on_start.lock().unwrap() {
            anyhow::bail!("mock generator rejected the request");
        }
        Ok(self.completion.lock().unwrap().clone())
    }
}

// =============================================================================
// Mock Search Service
// =============================================================================

pub struct MockSearchService {
    results: Mutex<Vec<SearchResult>>,
    fail: Mutex<bool>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockSearchService {
    pub fn new() -> Self {
        Self {
            results: Mutex::new(Vec::new()),
            fail: Mutex::new(false),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_result(self, title: &str, url: &str, content: &str) -> Self {
        self.results.lock().unwrap().push(SearchResult {
            title: title.to_string(),
            url: url.to_string(),
            content: content.to_string(),
            score: 0.9,
        });
        self
    }

    pub fn failing(self) -> Self {
        *self.fail.lock().unwrap() = true;
        self
    }

    /// Queries received, in order
    pub fn queries(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for MockSearchService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseSearchService for MockSearchService {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        self.calls.lock().unwrap().push(query.to_string());
        if *self.fail.lock().unwrap() {
            anyhow::bail!("mock search unavailable");
        }
        let results = self.results.lock().unwrap();
        Ok(results.iter().take(max_results).cloned().collect())
    }
}

// =============================================================================
// Mock Explanation Store
// =============================================================================

pub struct MockExplanationStore {
    saved: Arc<Mutex<Vec<ExplanationRecord>>>,
    fail: Mutex<bool>,
    attempts: Arc<Mutex<usize>>,
}

impl MockExplanationStore {
    pub fn new() -> Self {
        Self {
            saved: Arc::new(Mutex::new(Vec::new())),
            fail: Mutex::new(false),
            attempts: Arc::new(Mutex::new(0)),
        }
    }

    pub fn failing(self) -> Self {
        *self.fail.lock().unwrap() = true;
        self
    }

    pub fn saved(&self) -> Vec<ExplanationRecord> {
        self.saved.lock().unwrap().clone()
    }

    /// Write attempts, including failed ones
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }

    /// Persistence runs in the background; poll until `n` attempts were made.
    pub async fn wait_for_attempts(&self, n: usize) -> usize {
        for _ in 0..100 {
            if self.attempts() >= n {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.attempts()
    }
}

impl Default for MockExplanationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseExplanationStore for MockExplanationStore {
    async fn save(&self, record: ExplanationRecord) -> Result<()> {
        *self.attempts.lock().unwrap() += 1;
        if *self.fail.lock().unwrap() {
            anyhow::bail!("mock store write failed");
        }
        self.saved.lock().unwrap().push(record);
        Ok(())
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

pub struct TestDependencies {
    pub generator: Arc<MockGenerator>,
    pub search: Arc<MockSearchService>,
    pub store: Arc<MockExplanationStore>,
    pub sessions: SessionStore,
    pub extension_tokens: Arc<ExtensionTokenService>,
    demo: bool,
    retrieval: bool,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            generator: Arc::new(MockGenerator::new()),
            search: Arc::new(MockSearchService::new()),
            store: Arc::new(MockExplanationStore::new()),
            sessions: SessionStore::new(),
            extension_tokens: Arc::new(ExtensionTokenService::new(TEST_TOKEN_SECRET)),
            demo: false,
            retrieval: true,
        }
    }

    pub fn with_generator(mut self, generator: MockGenerator) -> Self {
        self.generator = Arc::new(generator);
        self
    }

    pub fn with_search(mut self, search: MockSearchService) -> Self {
        self.search = Arc::new(search);
        self
    }

    pub fn with_store(mut self, store: MockExplanationStore) -> Self {
        self.store = Arc::new(store);
        self
    }

    /// No generator configured
    pub fn demo(mut self) -> Self {
        self.demo = true;
        self
    }

    pub fn without_retrieval(mut self) -> Self {
        self.retrieval = false;
        self
    }

    /// A valid extension credential for `user_id`
    pub fn extension_token(&self, user_id: &str) -> String {
        self.extension_tokens
            .sign(user_id, Some("ws-test"))
            .expect("signing a test token")
    }

    /// A live web session token for `user_id`
    pub async fn session_token(&self, user_id: &str) -> String {
        self.sessions
            .create_session(Session::new(user_id, format!("{}@example.com", user_id)))
            .await
    }

    pub fn server_deps(&self) -> ServerDeps {
        ServerDeps::new(
            (!self.demo).then(|| self.generator.clone() as Arc<dyn BaseGenerator>),
            self.retrieval
                .then(|| self.search.clone() as Arc<dyn BaseSearchService>),
            self.store.clone(),
            Arc::new(self.sessions.clone()),
            self.extension_tokens.clone(),
            ModelSettings::default(),
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
