//! `BaseGenerator` backed by the OpenAI chat completions API.

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use openai_client::{ChatRequest, OpenAIClient};

use super::{BaseGenerator, TokenStream};

pub struct OpenAIGenerator {
    client: OpenAIClient,
}

impl OpenAIGenerator {
    pub fn new(client: OpenAIClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BaseGenerator for OpenAIGenerator {
    async fn stream_chat(&self, request: ChatRequest) -> Result<TokenStream> {
        let stream = self.client.chat_completion_stream(request).await?;

        let tokens = stream.filter_map(|chunk| async move {
            match chunk {
                Ok(chunk) if chunk.done || chunk.delta.is_empty() => None,
                Ok(chunk) => Some(Ok(chunk.delta)),
                Err(e) => Some(Err(anyhow::Error::new(e))),
            }
        });
        Ok(Box::pin(tokens))
    }

    async fn complete(&self, request: ChatRequest) -> Result<String> {
        let response = self.client.chat_completion(request).await?;
        if let Some(usage) = &response.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "completion usage"
            );
        }
        Ok(response.content)
    }
}
