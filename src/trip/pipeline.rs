// SPDX-License-Identifier: MIT

use chrono::TimeDelta;
use std::sync::Arc;
use std::time::Duration;

use crate::flow::{CheckpointStore, Engine, FlowError, Stage, StageRegistry};

use super::config::AppConfig;
use super::stages::{
    ApprovalCheckpoint, ApprovalGate, BudgetStage, CoordinatorStage, IntentStage, PlannerStage,
    ResearchStage,
};
use super::state::TripState;
use super::weather::OpenMeteoProvider;

/// Engine specialized to the trip planning state
pub type TripPlanner = Engine<TripState>;

/// Register the trip stages in pipeline order
pub fn build_registry(config: &AppConfig) -> Result<StageRegistry<TripState>, FlowError> {
    let planner = &config.planner;
    let gate = |checkpoint: ApprovalCheckpoint| -> Arc<dyn Stage<TripState>> {
        let auto = planner.auto_approve.contains(&checkpoint);
        Arc::new(ApprovalGate::new(checkpoint).auto_approve(auto))
    };

    let mut research = ResearchStage::new(&planner.default_origin, &planner.default_destination);
    if config.research.live_weather {
        let provider = OpenMeteoProvider::new(Duration::from_secs(config.research.timeout_secs))
            .map_err(|e| FlowError::config(format!("weather provider: {}", e)))?;
        research = research.with_weather(Arc::new(provider));
    }

    StageRegistry::<TripState>::new()
        .with(Arc::new(IntentStage::new(&planner.currency)))?
        .with(Arc::new(research))?
        .with(gate(ApprovalCheckpoint::DestinationShortlist))?
        .with(Arc::new(BudgetStage::new(
            planner.budget_split,
            planner.default_budget,
            &planner.currency,
        )))?
        .with(gate(ApprovalCheckpoint::BudgetAllocation))?
        .with(Arc::new(PlannerStage::new(planner.default_days)))?
        .with(gate(ApprovalCheckpoint::FinalItinerary))?
        .with(Arc::new(CoordinatorStage))
}

/// Build the trip planner engine over `store`
pub fn build_planner(
    config: &AppConfig,
    store: Arc<dyn CheckpointStore>,
) -> Result<TripPlanner, FlowError> {
    let engine = Engine::new(build_registry(config)?, store)?;
    Ok(match config.runs.ttl_secs {
        Some(secs) => engine.with_run_ttl(run_ttl(secs)?),
        None => engine,
    })
}

fn run_ttl(secs: u64) -> Result<TimeDelta, FlowError> {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(|| FlowError::config(format!("run TTL of {} seconds is out of range", secs)))
}
