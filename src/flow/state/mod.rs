// SPDX-License-Identifier: MIT

//! Shared state management for flow runs
//!
//! This module provides:
//! - `StateSchema` - declared fields and their merge rules
//! - `SharedState` - the trait every run state implements
//! - `merge` - replace/append strategies used by `shared_state!`

mod schema;
mod store;

pub use schema::{MergeRule, StateSchema};
pub use store::{merge, SharedState};
