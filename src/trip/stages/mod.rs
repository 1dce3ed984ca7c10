// SPDX-License-Identifier: MIT

//! Stage bodies of the trip planning pipeline
//!
//! Each stage is a pure function of the trip state (research may consult an
//! external weather provider). None of them know about suspension
//! bookkeeping; approval gates only return an interrupt payload.

mod approval;
mod budget;
mod coordinator;
mod intent;
mod planner;
mod research;

pub use approval::{ApprovalCheckpoint, ApprovalGate};
pub use budget::{allocate, BudgetStage};
pub use coordinator::{booking_options, CoordinatorStage};
pub use intent::{parse_request, IntentStage};
pub use planner::{build_itinerary, PlannerStage};
pub use research::{demo_catalog, ResearchStage};
