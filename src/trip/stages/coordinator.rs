// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::flow::{Stage, StageContext, StageOutcome};
use crate::trip::state::{BookingOption, DecisionLogEntry, ResearchedData, TripState, TripUpdate};

fn details(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// One booking-ready option per researched flight, hotel and activity
pub fn booking_options(researched: &ResearchedData) -> Vec<BookingOption> {
    let flights = researched.flights.iter().map(|f| BookingOption {
        kind: "flight".to_string(),
        label: format!("{} → {}", f.origin, f.destination),
        details: details(json!({
            "departure": f.departure,
            "arrival": f.arrival,
            "carrier": f.carrier,
        })),
        booking_link: f.booking_link.clone(),
        map_link: None,
        contact: None,
        price: f.price,
        currency: f.currency.clone(),
    });

    let hotels = researched.hotels.iter().map(|h| BookingOption {
        kind: "hotel".to_string(),
        label: h.name.clone(),
        details: details(json!({"address": h.address, "rating": h.rating})),
        booking_link: h.booking_link.clone(),
        map_link: h.map_link.clone(),
        contact: h.contact.clone(),
        price: h.price_per_night,
        currency: h.currency.clone(),
    });

    let activities = researched.activities.iter().map(|a| BookingOption {
        kind: "activity".to_string(),
        label: a.name.clone(),
        details: details(json!({
            "duration_minutes": a.duration_minutes,
            "type": a.kind,
            "opening_hours": a.opening_hours,
        })),
        booking_link: a.booking_link.clone(),
        map_link: a.map_link.clone(),
        contact: None,
        price: a.price,
        currency: a.currency.clone(),
    });

    flights.chain(hotels).chain(activities).collect()
}

/// Turns research results into booking-ready options
pub struct CoordinatorStage;

#[async_trait]
impl Stage<TripState> for CoordinatorStage {
    fn name(&self) -> &str {
        "coordinator"
    }

    async fn run(&self, ctx: StageContext<'_, TripState>) -> StageOutcome<TripUpdate> {
        let mut update = TripUpdate::default();

        let options = match &ctx.state.researched_data {
            Some(researched) => booking_options(researched),
            None => {
                log::warn!("Run {} reached booking without research data", ctx.run_id);
                update.error_message = Some(Some(
                    "No research data available to prepare bookings".to_string(),
                ));
                Vec::new()
            }
        };

        update.decision_log = Some(vec![DecisionLogEntry::new(
            "coordinator",
            "bookings",
            format!(
                "Prepared {} booking-ready options with links.",
                options.len()
            ),
        )]);
        update.booking_options = Some(options);
        StageOutcome::Continue(update)
    }
}
