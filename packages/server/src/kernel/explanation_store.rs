use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::BaseExplanationStore;
use crate::common::ExplanationRecord;

const DEFAULT_CAPACITY: usize = 1_000;

/// Keeps the most recent explanations in memory.
///
/// Stands in for the history database until one is wired up.
#[derive(Clone)]
pub struct InMemoryExplanationStore {
    records: Arc<RwLock<VecDeque<ExplanationRecord>>>,
    capacity: usize,
}

impl InMemoryExplanationStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(VecDeque::with_capacity(capacity.min(64)))),
            capacity: capacity.max(1),
        }
    }

    /// Records for one user, newest first.
    #[cfg(test)]
    async fn recent_for_user(&self, user_id: &str) -> Vec<ExplanationRecord> {
        self.records
            .read()
            .await
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect()
    }
}

impl Default for InMemoryExplanationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseExplanationStore for InMemoryExplanationStore {
    async fn save(&self, record: ExplanationRecord) -> Result<()> {
        let mut records = self.records.write().await;
        if records.len() == self.capacity {
            records.pop_front();
        }
        tracing::debug!(
            user_id = %record.user_id,
            text_hash = %record.text_hash,
            "explanation stored"
        );
        records.push_back(record);
        Ok(())
    }
}
