// SPDX-License-Identifier: MIT

//! Typed error handling for the flow engine
//!
//! Every rejected engine operation maps to a stable error code so that
//! callers (HTTP routes, CLI) can report it without matching on messages.

use thiserror::Error;

use super::checkpoint::{RunStatus, StoreError};

/// Top-level error type for the flow engine
#[derive(Debug, Error)]
pub enum FlowError {
    /// Invalid engine configuration (e.g. empty pipeline)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A stage with the same name is already registered
    #[error("Stage '{0}' is already registered")]
    DuplicateStage(String),

    /// No checkpoint exists for the run id
    #[error("Run '{0}' not found")]
    RunNotFound(String),

    /// A run with the requested id already exists
    #[error("Run '{0}' already exists")]
    RunExists(String),

    /// The run exists but is not waiting for approval
    #[error("Run '{run_id}' is not suspended (status: {status})")]
    NotSuspended { run_id: String, status: RunStatus },

    /// The run has finished and can no longer be resumed
    #[error("Run '{0}' is already complete")]
    AlreadyComplete(String),

    /// A partial update referenced fields the state does not declare
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Another writer advanced the run first
    #[error("Run '{run_id}' was modified concurrently (expected version {expected}, found {found})")]
    Conflict {
        run_id: String,
        expected: u64,
        found: u64,
    },

    /// Checkpoint backend failure
    #[error("Checkpoint store error: {0}")]
    Store(String),

    /// Snapshot serialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl FlowError {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::DuplicateStage(_) => "CONFIG_ERROR",
            Self::RunNotFound(_) => "RUN_NOT_FOUND",
            Self::RunExists(_) => "RUN_EXISTS",
            Self::NotSuspended { .. } => "NOT_SUSPENDED",
            Self::AlreadyComplete(_) => "ALREADY_COMPLETE",
            Self::SchemaMismatch(_) => "SCHEMA_MISMATCH",
            Self::Conflict { .. } => "CONFLICT",
            Self::Store(_) => "STORE_ERROR",
            Self::Json(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a schema mismatch error
    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::SchemaMismatch(message.into())
    }
}

impl From<StoreError> for FlowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict {
                run_id,
                expected,
                found,
            } => Self::Conflict {
                run_id,
                expected,
                found,
            },
            StoreError::Backend(message) => Self::Store(message),
        }
    }
}
