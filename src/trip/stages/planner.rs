// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use std::collections::VecDeque;

use crate::flow::{Stage, StageContext, StageOutcome};
use crate::trip::state::{
    ActivityOption, DayItem, DayPlan, DecisionLogEntry, TripState, TripUpdate, WeatherInfo,
};

fn activity_item(time: &str, activity: &ActivityOption) -> DayItem {
    DayItem {
        description: activity.kind.clone(),
        map_link: activity.map_link.clone(),
        booking_link: activity.booking_link.clone(),
        price: activity.price,
        currency: activity.currency.clone(),
        ..DayItem::new(time, activity.name.clone(), activity.duration_minutes.unwrap_or(120))
    }
}

fn weather_note(weather: &[WeatherInfo], index: usize) -> Option<String> {
    let info = weather.get(index).or_else(|| weather.last())?;
    let conditions = info
        .conditions
        .as_deref()
        .or(info.summary.as_deref())
        .unwrap_or("Weather unknown");
    Some(match (info.temp_min, info.temp_max) {
        (Some(lo), Some(hi)) => format!("{}, {:.0}-{:.0}°C", conditions, lo, hi),
        _ => conditions.to_string(),
    })
}

/// Day-by-day schedule from the researched options
///
/// Day one is arrival, the last day (for trips longer than a day) is the
/// return journey, and the days in between consume researched activities in
/// order, falling back to free exploration once they run out.
pub fn build_itinerary(state: &TripState, default_days: u32) -> Vec<DayPlan> {
    let intent = state.parsed_intent.as_ref();
    let num_days = intent
        .and_then(|i| i.num_days)
        .filter(|d| *d > 0)
        .unwrap_or(default_days.max(1));
    let destination = intent
        .and_then(|i| i.destination.clone())
        .or_else(|| state.destination_shortlist.first().cloned())
        .unwrap_or_else(|| "destination".to_string());
    let origin = intent
        .and_then(|i| i.origin.clone())
        .or_else(|| {
            state
                .researched_data
                .as_ref()
                .and_then(|r| r.flights.first())
                .map(|f| f.origin.clone())
        })
        .unwrap_or_else(|| "home".to_string());
    let start = intent
        .and_then(|i| i.start_date.as_deref())
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

    let researched = state.researched_data.clone().unwrap_or_default();
    let hotel = researched.hotels.first().map(|h| h.name.clone());
    let mut activities: VecDeque<ActivityOption> = researched.activities.into_iter().collect();

    let budget = state.approved_budget.as_ref().or(state.budget_allocation.as_ref());
    let food_note = budget.map(|b| {
        format!(
            "Food allowance about {:.0} {} per day",
            b.food / f64::from(num_days),
            b.currency
        )
    });

    (1..=num_days)
        .map(|day| {
            let mut items = Vec::new();
            if day == 1 {
                items.push(DayItem {
                    description: researched
                        .flights
                        .first()
                        .and_then(|f| f.carrier.as_ref())
                        .map(|c| format!("{} flight + cab", c)),
                    ..DayItem::new("06:00", format!("Travel to {}", destination), 315)
                });
                items.push(DayItem {
                    location: hotel.clone(),
                    ..DayItem::new("12:00", "Check-in & lunch", 90)
                });
                match activities.pop_front() {
                    Some(activity) => items.push(activity_item("15:00", &activity)),
                    None => items.push(DayItem::new(
                        "14:00",
                        format!("Explore {}", destination),
                        180,
                    )),
                }
            } else if day == num_days {
                items.push(DayItem {
                    location: hotel.clone(),
                    ..DayItem::new("09:00", "Check-out", 30)
                });
                if let Some(activity) = activities.pop_front() {
                    items.push(activity_item("10:00", &activity));
                }
                items.push(DayItem::new(
                    "14:00",
                    format!("Return journey to {}", origin),
                    315,
                ));
            } else {
                match activities.pop_front() {
                    Some(activity) => items.push(activity_item("08:00", &activity)),
                    None => items.push(DayItem::new("09:00", "Morning activity / yoga", 120)),
                }
                items.push(DayItem::new("12:00", "Lunch", 60));
                match activities.pop_front() {
                    Some(activity) => items.push(activity_item("14:00", &activity)),
                    None => items.push(DayItem::new("14:00", "Local exploration", 240)),
                }
            }

            let notes: Vec<String> = weather_note(&researched.weather, (day - 1) as usize)
                .into_iter()
                .chain(food_note.clone())
                .collect();

            DayPlan {
                day,
                date: start.map(|d| (d + Duration::days(i64::from(day - 1))).to_string()),
                items,
                travel_notes: (!notes.is_empty()).then(|| notes.join(". ")),
            }
        })
        .collect()
}

/// Builds the day-by-day itinerary
pub struct PlannerStage {
    default_days: u32,
}

impl PlannerStage {
    pub fn new(default_days: u32) -> Self {
        Self { default_days }
    }
}

#[async_trait]
impl Stage<TripState> for PlannerStage {
    fn name(&self) -> &str {
        "planner"
    }

    async fn run(&self, ctx: StageContext<'_, TripState>) -> StageOutcome<TripUpdate> {
        let days = build_itinerary(ctx.state, self.default_days);
        let entry = DecisionLogEntry::new(
            "planner",
            "itinerary",
            format!(
                "Built {}-day itinerary with timings and travel duration.",
                days.len()
            ),
        );

        StageOutcome::Continue(TripUpdate {
            day_by_day_itinerary: Some(days),
            decision_log: Some(vec![entry]),
            ..Default::default()
        })
    }
}
