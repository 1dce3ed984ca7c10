// SPDX-License-Identifier: MIT

//! Trip planning state shared by all stages
//!
//! Every field is replaced by its latest writer except `decision_log`, which
//! accumulates one entry per decision across the whole run.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_CURRENCY: &str = "INR";

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

/// Structured intent extracted from the user's request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedIntent {
    pub budget_total: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub num_days: Option<u32>,
    pub travel_style: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
}

impl Default for ParsedIntent {
    fn default() -> Self {
        Self {
            budget_total: None,
            currency: default_currency(),
            origin: None,
            destination: None,
            start_date: None,
            end_date: None,
            num_days: None,
            travel_style: None,
            interests: Vec::new(),
            constraints: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightOption {
    pub origin: String,
    pub destination: String,
    pub departure: String,
    pub arrival: String,
    pub carrier: Option<String>,
    pub price: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub booking_link: Option<String>,
    #[serde(default)]
    pub is_demo: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotelOption {
    pub name: String,
    pub address: Option<String>,
    pub price_per_night: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub rating: Option<f64>,
    pub booking_link: Option<String>,
    pub map_link: Option<String>,
    pub contact: Option<String>,
    #[serde(default)]
    pub is_demo: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityOption {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub duration_minutes: Option<u32>,
    pub price: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub opening_hours: Option<String>,
    pub booking_link: Option<String>,
    pub map_link: Option<String>,
    #[serde(default)]
    pub is_demo: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherInfo {
    pub location: String,
    pub date: String,
    pub summary: Option<String>,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    pub conditions: Option<String>,
}

/// Everything the research stage found for the destination
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchedData {
    #[serde(default)]
    pub flights: Vec<FlightOption>,
    #[serde(default)]
    pub hotels: Vec<HotelOption>,
    #[serde(default)]
    pub activities: Vec<ActivityOption>,
    #[serde(default)]
    pub weather: Vec<WeatherInfo>,
    #[serde(default)]
    pub local_tips: Vec<String>,
    pub raw_notes: Option<String>,
}

/// Budget split across spending categories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAllocation {
    #[serde(default)]
    pub transport: f64,
    #[serde(default)]
    pub stay: f64,
    #[serde(default)]
    pub food: f64,
    #[serde(default)]
    pub activities: f64,
    #[serde(default)]
    pub buffer: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub reasoning: Option<String>,
}

impl BudgetAllocation {
    pub fn total(&self) -> f64 {
        self.transport + self.stay + self.food + self.activities + self.buffer
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayItem {
    pub time: Option<String>,
    pub title: String,
    pub duration_minutes: Option<u32>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub map_link: Option<String>,
    pub booking_link: Option<String>,
    pub price: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl DayItem {
    pub fn new(time: &str, title: impl Into<String>, duration_minutes: u32) -> Self {
        Self {
            time: Some(time.to_string()),
            title: title.into(),
            duration_minutes: Some(duration_minutes),
            description: None,
            location: None,
            map_link: None,
            booking_link: None,
            price: None,
            currency: default_currency(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    pub day: u32,
    pub date: Option<String>,
    #[serde(default)]
    pub items: Vec<DayItem>,
    pub travel_notes: Option<String>,
}

/// Booking-ready option (flight, hotel or activity)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingOption {
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
    #[serde(default)]
    pub details: serde_json::Map<String, Value>,
    pub booking_link: Option<String>,
    pub map_link: Option<String>,
    pub contact: Option<String>,
    pub price: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

/// One entry in the transparency log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionLogEntry {
    pub agent: String,
    pub step: String,
    pub message: String,
    pub data: Option<Value>,
}

impl DecisionLogEntry {
    pub fn new(agent: &str, step: &str, message: impl Into<String>) -> Self {
        Self {
            agent: agent.to_string(),
            step: step.to_string(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: impl Serialize) -> Self {
        self.data = serde_json::to_value(data).ok();
        self
    }
}

crate::shared_state! {
    /// Full trip planning state
    #[derive(PartialEq)]
    pub struct TripState, update TripUpdate {
        user_input: String => replace,
        parsed_intent: Option<ParsedIntent> => replace,
        destination_shortlist: Vec<String> => replace,
        researched_data: Option<ResearchedData> => replace,
        budget_allocation: Option<BudgetAllocation> => replace,
        approved_budget: Option<BudgetAllocation> => replace,
        day_by_day_itinerary: Vec<DayPlan> => replace,
        booking_options: Vec<BookingOption> => replace,
        decision_log: Vec<DecisionLogEntry> => append,
        current_checkpoint: Option<String> => replace,
        error_message: Option<String> => replace,
    }
}

impl TripUpdate {
    /// Initial fields for a new run
    pub fn from_input(user_input: impl Into<String>) -> Self {
        Self {
            user_input: Some(user_input.into()),
            ..Default::default()
        }
    }

    /// Update carrying only a decision log entry
    pub fn log(entry: DecisionLogEntry) -> Self {
        Self {
            decision_log: Some(vec![entry]),
            ..Default::default()
        }
    }
}
