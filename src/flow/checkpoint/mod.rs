// SPDX-License-Identifier: MIT

//! Checkpoint persistence
//!
//! A checkpoint is the durable record of one run: where it stopped, the state
//! snapshot at that moment and the pending interrupt. Stores are pluggable;
//! [`InMemoryCheckpointStore`] is the process-local reference backend.

mod memory;

pub use memory::InMemoryCheckpointStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use super::interrupt::InterruptPayload;

/// Lifecycle status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Suspended at an approval checkpoint
    AwaitingApproval,
    /// Stage sequence exhausted
    Complete,
    /// A stage produced an update the state could not accept
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingApproval => "awaiting_approval",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted snapshot of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub run_id: String,
    pub status: RunStatus,
    /// Index of the stage the run is paused at (or the stage count once complete)
    pub position: usize,
    pub paused_stage: Option<String>,
    pub state: Value,
    pub interrupt: Option<InterruptPayload>,
    pub error: Option<String>,
    /// Incremented on every save
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Error type for checkpoint backends
#[derive(Debug, Error)]
pub enum StoreError {
    /// Compare-and-swap on the version failed
    #[error("Version conflict for '{run_id}': expected {expected}, found {found}")]
    Conflict {
        run_id: String,
        expected: u64,
        found: u64,
    },

    /// Backend-specific failure
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Keyed storage for run checkpoints
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Write a checkpoint.
    ///
    /// Accepted only if the stored version equals `checkpoint.version - 1`,
    /// or nothing is stored and `checkpoint.version == 1`. The write must be
    /// atomic with respect to concurrent loads of the same run id.
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), StoreError>;

    /// Load the checkpoint for a run, if any
    async fn load(&self, run_id: &str) -> Result<Option<Checkpoint>, StoreError>;

    /// Remove a checkpoint; returns whether one existed
    async fn delete(&self, run_id: &str) -> Result<bool, StoreError>;

    /// All stored run ids
    async fn list(&self) -> Result<Vec<String>, StoreError>;
}
