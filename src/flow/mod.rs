// SPDX-License-Identifier: MIT

//! Checkpointed, resumable stage execution
//!
//! This module provides:
//! - `StageRegistry` / `Stage` - the fixed, linear stage order
//! - `SharedState` - per-field merge rules for run state
//! - `Engine` - drives runs, suspends at interrupts, resumes later
//! - `CheckpointStore` - pluggable persistence of suspended runs

pub mod checkpoint;
pub mod engine;
pub mod error;
pub mod interrupt;
pub mod stage;
pub mod state;

pub use checkpoint::{Checkpoint, CheckpointStore, InMemoryCheckpointStore, RunStatus, StoreError};
pub use engine::{Engine, RunReport};
pub use error::FlowError;
pub use interrupt::{InterruptPayload, Resume};
pub use stage::{FnStage, Stage, StageContext, StageOutcome, StageRegistry};
pub use state::{MergeRule, SharedState, StateSchema};
