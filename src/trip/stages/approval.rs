// SPDX-License-Identifier: MIT

//! Human approval gates
//!
//! Each gate suspends the run with an interrupt payload describing what is
//! being approved. The resume value is either a plain acknowledgement, which
//! accepts the proposal as is, or a structured override:
//!
//! - budget: an object with a `transport` key, adopted exactly
//! - itinerary: a non-empty array of day plans
//!
//! The destination gate only takes acknowledgements, since research has
//! already run for the parsed destination. Anything that does not fit the
//! shapes above is treated as an acknowledgement.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::flow::{InterruptPayload, Resume, Stage, StageContext, StageOutcome};
use crate::trip::state::{BudgetAllocation, DayPlan, DecisionLogEntry, TripState, TripUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalCheckpoint {
    DestinationShortlist,
    BudgetAllocation,
    FinalItinerary,
}

impl ApprovalCheckpoint {
    /// Name carried in the interrupt payload
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DestinationShortlist => "destination_shortlist",
            Self::BudgetAllocation => "budget_allocation",
            Self::FinalItinerary => "final_itinerary",
        }
    }

    pub fn stage_name(&self) -> &'static str {
        match self {
            Self::DestinationShortlist => "approve_destinations",
            Self::BudgetAllocation => "approve_budget",
            Self::FinalItinerary => "approve_itinerary",
        }
    }

    /// Value of `current_checkpoint` once approved
    pub fn approved_marker(&self) -> &'static str {
        match self {
            Self::DestinationShortlist => "destinations_approved",
            Self::BudgetAllocation => "budget_approved",
            Self::FinalItinerary => "itinerary_approved",
        }
    }

    fn prompt(&self) -> &'static str {
        match self {
            Self::DestinationShortlist => "Approve destination shortlist?",
            Self::BudgetAllocation => "Approve budget allocation?",
            Self::FinalItinerary => "Approve final itinerary?",
        }
    }
}

/// Stage that pauses for approval unless configured to pass through
pub struct ApprovalGate {
    checkpoint: ApprovalCheckpoint,
    auto_approve: bool,
}

impl ApprovalGate {
    pub fn new(checkpoint: ApprovalCheckpoint) -> Self {
        Self {
            checkpoint,
            auto_approve: false,
        }
    }

    pub fn auto_approve(mut self, auto: bool) -> Self {
        self.auto_approve = auto;
        self
    }

    fn payload(&self, state: &TripState) -> InterruptPayload {
        let payload = InterruptPayload::new(self.checkpoint.as_str(), self.checkpoint.prompt());
        match self.checkpoint {
            ApprovalCheckpoint::DestinationShortlist => {
                let summary = state.researched_data.as_ref().map(|r| {
                    serde_json::json!({
                        "flights_count": r.flights.len(),
                        "hotels_count": r.hotels.len(),
                        "activities_count": r.activities.len(),
                    })
                });
                payload
                    .with("destination_shortlist", &state.destination_shortlist)
                    .with("researched_summary", summary)
            }
            ApprovalCheckpoint::BudgetAllocation => {
                let allocation = state.budget_allocation.as_ref();
                payload
                    .with("budget_allocation", allocation)
                    .with("budget_total", allocation.map(BudgetAllocation::total))
                    .with("currency", allocation.map(|a| a.currency.as_str()))
            }
            ApprovalCheckpoint::FinalItinerary => payload
                .with("day_count", state.day_by_day_itinerary.len())
                .with("day_by_day_itinerary", &state.day_by_day_itinerary),
        }
    }

    /// Apply the approver's answer; `None` means auto-approved
    fn decide(&self, state: &TripState, resume: Option<&Resume>) -> TripUpdate {
        let mut update = TripUpdate {
            current_checkpoint: Some(Some(self.checkpoint.approved_marker().to_string())),
            ..Default::default()
        };

        let message = match self.checkpoint {
            ApprovalCheckpoint::DestinationShortlist => format!(
                "Shortlist approved: {}",
                state.destination_shortlist.join(", ")
            ),
            ApprovalCheckpoint::BudgetAllocation => {
                let proposal = state.budget_allocation.as_ref();
                match resume.and_then(|r| budget_override(r, proposal)) {
                    Some(adjusted) => {
                        let msg = format!(
                            "Approver set budget: transport {}, stay {}, food {}, activities {}, buffer {} ({})",
                            adjusted.transport,
                            adjusted.stay,
                            adjusted.food,
                            adjusted.activities,
                            adjusted.buffer,
                            adjusted.currency
                        );
                        update.approved_budget = Some(Some(adjusted));
                        msg
                    }
                    None => {
                        update.approved_budget = Some(proposal.cloned());
                        "Proposed budget approved".to_string()
                    }
                }
            }
            ApprovalCheckpoint::FinalItinerary => {
                match resume.and_then(|r| r.override_as::<Vec<DayPlan>>()) {
                    Some(days) if !days.is_empty() => {
                        let msg = format!("Approver replaced itinerary ({} days)", days.len());
                        update.day_by_day_itinerary = Some(days);
                        msg
                    }
                    _ => format!(
                        "Itinerary approved ({} days)",
                        state.day_by_day_itinerary.len()
                    ),
                }
            }
        };

        let message = if resume.is_none() {
            format!("{} (auto-approved by configuration)", message)
        } else {
            message
        };
        update.decision_log = Some(vec![DecisionLogEntry::new(
            "approval",
            self.checkpoint.as_str(),
            message,
        )]);
        update
    }
}

fn budget_override(resume: &Resume, proposal: Option<&BudgetAllocation>) -> Option<BudgetAllocation> {
    let Value::Object(fields) = resume.value() else {
        return None;
    };
    if fields.get("transport").map_or(true, Value::is_null) {
        return None;
    }

    let mut fields = fields.clone();
    if let Some(proposal) = proposal {
        fields
            .entry("currency")
            .or_insert_with(|| Value::String(proposal.currency.clone()));
    }
    fields
        .entry("reasoning")
        .or_insert_with(|| Value::String("Adjusted by approver".to_string()));

    match serde_json::from_value(Value::Object(fields)) {
        Ok(adjusted) => Some(adjusted),
        Err(e) => {
            log::warn!("Ignoring budget override that does not parse: {}", e);
            None
        }
    }
}

#[async_trait]
impl Stage<TripState> for ApprovalGate {
    fn name(&self) -> &str {
        self.checkpoint.stage_name()
    }

    async fn run(&self, ctx: StageContext<'_, TripState>) -> StageOutcome<TripUpdate> {
        match ctx.resume {
            Some(resume) => StageOutcome::Continue(self.decide(ctx.state, Some(resume))),
            None if self.auto_approve => StageOutcome::Continue(self.decide(ctx.state, None)),
            None => StageOutcome::Suspend(self.payload(ctx.state)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trip::config::BudgetSplit;
    use crate::trip::stages::{allocate, demo_catalog};
    use crate::trip::state::DayItem;
    use serde_json::json;

    fn state() -> TripState {
        TripState {
            destination_shortlist: vec!["Goa".into(), "Gokarna".into()],
            researched_data: Some(demo_catalog("Goa", "Delhi", None)),
            budget_allocation: Some(allocate(20000.0, &BudgetSplit::default(), "INR")),
            day_by_day_itinerary: vec![DayPlan {
                day: 1,
                date: None,
                items: vec![DayItem::new("09:00", "Beach", 120)],
                travel_notes: None,
            }],
            ..Default::default()
        }
    }

    async fn run(gate: &ApprovalGate, state: &TripState, resume: Option<Value>) -> StageOutcome<TripUpdate> {
        let resume = resume.map(Resume::new);
        gate.run(StageContext {
            run_id: "r",
            state,
            resume: resume.as_ref(),
        })
        .await
    }

    async fn approve(checkpoint: ApprovalCheckpoint, resume: Value) -> TripUpdate {
        match run(&ApprovalGate::new(checkpoint), &state(), Some(resume)).await {
            StageOutcome::Continue(update) => update,
            StageOutcome::Suspend(_) => panic!("gate suspended on resume"),
        }
    }

    #[test]
    fn test_checkpoint_serde() {
        assert_eq!(
            serde_json::to_value(ApprovalCheckpoint::BudgetAllocation).unwrap(),
            json!("budget_allocation")
        );
        let parsed: ApprovalCheckpoint = serde_json::from_value(json!("final_itinerary")).unwrap();
        assert_eq!(parsed, ApprovalCheckpoint::FinalItinerary);
    }

    #[tokio::test]
    async fn test_destination_payload() {
        let gate = ApprovalGate::new(ApprovalCheckpoint::DestinationShortlist);
        let StageOutcome::Suspend(payload) = run(&gate, &state(), None).await else {
            panic!("expected suspension");
        };
        assert_eq!(payload.checkpoint, "destination_shortlist");
        assert_eq!(payload.message, "Approve destination shortlist?");
        assert_eq!(payload.get("destination_shortlist"), Some(&json!(["Goa", "Gokarna"])));
        assert_eq!(
            payload.get("researched_summary"),
            Some(&json!({"flights_count": 1, "hotels_count": 1, "activities_count": 3}))
        );
    }

    #[tokio::test]
    async fn test_budget_payload() {
        let gate = ApprovalGate::new(ApprovalCheckpoint::BudgetAllocation);
        let StageOutcome::Suspend(payload) = run(&gate, &state(), None).await else {
            panic!("expected suspension");
        };
        assert_eq!(payload.get("budget_total"), Some(&json!(20000.0)));
        assert_eq!(payload.get("budget_allocation").unwrap()["transport"], json!(6000.0));
    }

    #[tokio::test]
    async fn test_itinerary_payload() {
        let gate = ApprovalGate::new(ApprovalCheckpoint::FinalItinerary);
        let StageOutcome::Suspend(payload) = run(&gate, &state(), None).await else {
            panic!("expected suspension");
        };
        assert_eq!(payload.get("day_count"), Some(&json!(1)));
        assert_eq!(payload.get("day_by_day_itinerary").unwrap()[0]["day"], json!(1));
    }

    #[tokio::test]
    async fn test_acknowledgement_keeps_shortlist() {
        let update = approve(ApprovalCheckpoint::DestinationShortlist, json!(true)).await;
        assert!(update.destination_shortlist.is_none());
        assert_eq!(
            update.current_checkpoint.flatten().as_deref(),
            Some("destinations_approved")
        );
    }

    #[tokio::test]
    async fn test_shortlist_values_are_acknowledgements() {
        for resume in [json!(["Gokarna"]), json!(["Paris"]), json!([]), json!([1, 2])] {
            let update = approve(ApprovalCheckpoint::DestinationShortlist, resume).await;
            assert!(update.destination_shortlist.is_none());
        }
    }

    #[tokio::test]
    async fn test_budget_override_adopted_exactly() {
        let update = approve(
            ApprovalCheckpoint::BudgetAllocation,
            json!({"transport": 5000, "stay": 6000, "food": 4000, "activities": 4000, "buffer": 1000}),
        )
        .await;
        let approved = update.approved_budget.flatten().unwrap();
        assert_eq!(
            (approved.transport, approved.stay, approved.food, approved.activities, approved.buffer),
            (5000.0, 6000.0, 4000.0, 4000.0, 1000.0)
        );
        assert_eq!(approved.currency, "INR");
        assert_eq!(approved.reasoning.as_deref(), Some("Adjusted by approver"));
        assert_eq!(
            update.current_checkpoint.flatten().as_deref(),
            Some("budget_approved")
        );
    }

    #[tokio::test]
    async fn test_budget_acknowledgement_copies_proposal() {
        for resume in [json!(true), json!("ok"), json!({"stay": 1}), json!({"transport": null})] {
            let update = approve(ApprovalCheckpoint::BudgetAllocation, resume).await;
            assert_eq!(update.approved_budget.flatten(), state().budget_allocation);
        }
    }

    #[tokio::test]
    async fn test_malformed_budget_override_falls_back() {
        let update = approve(
            ApprovalCheckpoint::BudgetAllocation,
            json!({"transport": "lots"}),
        )
        .await;
        assert_eq!(update.approved_budget.flatten(), state().budget_allocation);
    }

    #[tokio::test]
    async fn test_itinerary_override() {
        let days = json!([
            {"day": 1, "date": null, "items": [], "travel_notes": "Rest"},
            {"day": 2, "date": null, "items": [], "travel_notes": null}
        ]);
        let update = approve(ApprovalCheckpoint::FinalItinerary, days).await;
        let itinerary = update.day_by_day_itinerary.unwrap();
        assert_eq!(itinerary.len(), 2);
        assert_eq!(itinerary[0].travel_notes.as_deref(), Some("Rest"));

        let update = approve(ApprovalCheckpoint::FinalItinerary, json!([])).await;
        assert!(update.day_by_day_itinerary.is_none());
    }

    #[tokio::test]
    async fn test_auto_approve_passes_through() {
        let gate = ApprovalGate::new(ApprovalCheckpoint::BudgetAllocation).auto_approve(true);
        let StageOutcome::Continue(update) = run(&gate, &state(), None).await else {
            panic!("auto-approved gate suspended");
        };
        assert_eq!(update.approved_budget.flatten(), state().budget_allocation);
        let log = update.decision_log.unwrap();
        assert!(log[0].message.contains("auto-approved"));
    }
}
