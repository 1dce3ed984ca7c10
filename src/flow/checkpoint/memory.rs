// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{Checkpoint, CheckpointStore, StoreError};

/// Process-local checkpoint store
///
/// Clones share the same underlying map, so one store can be handed to the
/// engine and kept by the host for inspection.
#[derive(Clone, Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: Arc<RwLock<HashMap<String, Checkpoint>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.checkpoints.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.checkpoints.read().await.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), StoreError> {
        let mut checkpoints = self.checkpoints.write().await;

        let found = checkpoints
            .get(&checkpoint.run_id)
            .map(|c| c.version)
            .unwrap_or(0);
        let expected = checkpoint.version.saturating_sub(1);
        if checkpoint.version == 0 || found != expected {
            return Err(StoreError::Conflict {
                run_id: checkpoint.run_id,
                expected,
                found,
            });
        }

        checkpoints.insert(checkpoint.run_id.clone(), checkpoint);
        Ok(())
    }

    async fn load(&self, run_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        Ok(self.checkpoints.read().await.get(run_id).cloned())
    }

    async fn delete(&self, run_id: &str) -> Result<bool, StoreError> {
        Ok(self.checkpoints.write().await.remove(run_id).is_some())
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self.checkpoints.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
