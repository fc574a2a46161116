//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod explanation_store;
pub mod openai_generator;
pub mod tavily_client;
pub mod test_dependencies;
pub mod traits;

pub use deps::{ModelSettings, ServerDeps};
pub use explanation_store::InMemoryExplanationStore;
pub use openai_generator::OpenAIGenerator;
pub use tavily_client::TavilyClient;
pub use test_dependencies::TestDependencies;
pub use traits::*;
