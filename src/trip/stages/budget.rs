// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::flow::{Stage, StageContext, StageOutcome};
use crate::trip::config::BudgetSplit;
use crate::trip::state::{BudgetAllocation, DecisionLogEntry, TripState, TripUpdate};

/// Split `total` across categories by `split`, in whole currency units
///
/// Each fixed share is capped at what is still unallocated, and activities
/// take the rest, so the categories always add up to the rounded total.
pub fn allocate(total: f64, split: &BudgetSplit, currency: &str) -> BudgetAllocation {
    let total = total.max(0.0).round();
    let mut remaining = total;
    let mut share = |ratio: f64| {
        let amount = (total * ratio).round().clamp(0.0, remaining);
        remaining -= amount;
        amount
    };

    let transport = share(split.transport);
    let stay = share(split.stay);
    let food = share(split.food);
    let buffer = share(split.buffer);
    let activities = remaining;

    BudgetAllocation {
        transport,
        stay,
        food,
        activities,
        buffer,
        currency: currency.to_string(),
        reasoning: None,
    }
}

fn reasoning_for(style: Option<&str>) -> &'static str {
    match style {
        Some("solo_backpacking") => {
            "Balanced for solo backpacking: transport (flights + local), budget stay (hostel), food, and adventure activities."
        }
        Some("family") => "Family trip: comfortable stay and transport, steady food budget, shared activities.",
        Some("luxury") => "Premium trip: generous stay and transport, curated dining and experiences.",
        Some("couple") => "Couple trip: cosy stay, relaxed transport, dining and experiences for two.",
        _ => "Balanced split across transport, stay, food and activities.",
    }
}

/// Proposes how the trip budget is spent
pub struct BudgetStage {
    split: BudgetSplit,
    default_budget: f64,
    default_currency: String,
}

impl BudgetStage {
    pub fn new(split: BudgetSplit, default_budget: f64, default_currency: impl Into<String>) -> Self {
        Self {
            split,
            default_budget,
            default_currency: default_currency.into(),
        }
    }
}

#[async_trait]
impl Stage<TripState> for BudgetStage {
    fn name(&self) -> &str {
        "budget"
    }

    async fn run(&self, ctx: StageContext<'_, TripState>) -> StageOutcome<TripUpdate> {
        let intent = ctx.state.parsed_intent.as_ref();
        let total = intent
            .and_then(|i| i.budget_total)
            .filter(|t| *t > 0.0)
            .unwrap_or(self.default_budget);
        let currency = intent
            .map(|i| i.currency.as_str())
            .unwrap_or(&self.default_currency);

        let mut allocation = allocate(total, &self.split, currency);
        allocation.reasoning = Some(
            reasoning_for(intent.and_then(|i| i.travel_style.as_deref())).to_string(),
        );

        let entry = DecisionLogEntry::new(
            "budget_optimizer",
            "allocate",
            format!(
                "Proposed allocation: transport {}, stay {}, food {}, activities {} ({})",
                allocation.transport,
                allocation.stay,
                allocation.food,
                allocation.activities,
                allocation.currency
            ),
        )
        .with_data(&allocation);

        StageOutcome::Continue(TripUpdate {
            budget_allocation: Some(Some(allocation)),
            decision_log: Some(vec![entry]),
            ..Default::default()
        })
    }
}
