// SPDX-License-Identifier: MIT

//! Intent parsing: pulls budget, duration, places and preferences out of the
//! user's free-text request.

use async_trait::async_trait;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::flow::{Stage, StageContext, StageOutcome};
use crate::trip::state::{DecisionLogEntry, ParsedIntent, TripState, TripUpdate};

macro_rules! static_regex {
    ($pattern:expr, $name:expr) => {
        Regex::new($pattern)
            .unwrap_or_else(|_| panic!("Static regex '{}' failed to compile", $name))
    };
}

/// "4 day", "5-days", "3 nights"
static DURATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    static_regex!(
        r"(?i)\b(\d{1,3})\s*-?\s*(days?|nights?)\b",
        "DURATION_PATTERN"
    )
});

/// "under 20000", "budget of Rs 15,000", "within 20k", "max 1.5 lakh"
static BUDGET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    static_regex!(
        r"(?i)\b(?:under|below|within|budget(?:\s+of)?|max(?:imum)?|up\s*to)\s*(?:rs\.?|inr|usd|eur|₹|\$|€)?\s*(\d[\d,]*(?:\.\d+)?)\s*(k|thousand|lakhs?|l)?\b",
        "BUDGET_PATTERN"
    )
});

/// Amount written next to a currency marker: "₹20000", "$1500", "20000 rupees"
static AMOUNT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    static_regex!(
        r"(?i)(?:(?:₹|\$|€|\brs\.?|\binr|\busd|\beur)\s*(\d[\d,]*(?:\.\d+)?)\s*(k)?\b|\b(\d[\d,]*(?:\.\d+)?)\s*(k)?\s*(?:rupees|inr|usd|dollars|euros?)\b)",
        "AMOUNT_PATTERN"
    )
});

static USD_PATTERN: Lazy<Regex> =
    Lazy::new(|| static_regex!(r"(?i)\$|\busd\b|\bdollars?\b", "USD_PATTERN"));

static EUR_PATTERN: Lazy<Regex> =
    Lazy::new(|| static_regex!(r"(?i)€|\beur\b|\beuros?\b", "EUR_PATTERN"));

/// "to Goa", "visit North Goa"
static DESTINATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    static_regex!(
        r"\b(?i:to|visit|visiting|explore|exploring)\s+([A-Z][\w'-]*(?:\s+[A-Z][\w'-]*)*)",
        "DESTINATION_PATTERN"
    )
});

/// "from Delhi"
static ORIGIN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    static_regex!(
        r"\b(?i:from)\s+([A-Z][\w'-]*(?:\s+[A-Z][\w'-]*)*)",
        "ORIGIN_PATTERN"
    )
});

static DATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| static_regex!(r"\b(\d{4}-\d{2}-\d{2})\b", "DATE_PATTERN"));

/// Destinations recognized even when written in lowercase
const KNOWN_DESTINATIONS: &[&str] = &[
    "Goa",
    "Rishikesh",
    "Manali",
    "Jaipur",
    "Udaipur",
    "Varanasi",
    "Ladakh",
    "Kerala",
    "Shimla",
    "Darjeeling",
];

const TRAVEL_STYLES: &[(&str, &[&str])] = &[
    ("solo_backpacking", &["solo", "backpack"]),
    ("family", &["family", "kids", "parents"]),
    ("luxury", &["luxury", "luxurious", "5-star", "five star"]),
    ("couple", &["honeymoon", "couple", "romantic"]),
    ("weekend", &["weekend"]),
];

const INTERESTS: &[(&str, &[&str])] = &[
    ("beaches", &["beach"]),
    (
        "adventure sports",
        &["adventure", "rafting", "paragliding", "trek", "scuba"],
    ),
    ("spiritual experiences", &["spiritual", "temple", "yoga", "aarti"]),
    ("food", &["food", "cuisine", "street food"]),
    ("nightlife", &["nightlife", "party", "clubs"]),
    ("culture", &["culture", "heritage", "museum", "history"]),
    ("nature", &["nature", "mountain", "hills", "wildlife"]),
];

const CONSTRAINTS: &[(&str, &[&str])] = &[
    ("vegetarian food", &["vegetarian", "veg only"]),
    ("no flights", &["no flight", "no flying", "avoid flights"]),
    ("wheelchair accessible", &["wheelchair"]),
];

/// Extract a structured intent from free text
pub fn parse_request(text: &str, default_currency: &str) -> ParsedIntent {
    let lower = text.to_lowercase();

    let mut intent = ParsedIntent {
        currency: detect_currency(text).unwrap_or(default_currency).to_string(),
        budget_total: extract_budget(text),
        destination: extract_destination(text),
        origin: ORIGIN_PATTERN
            .captures(text)
            .map(|c| c[1].trim().to_string()),
        travel_style: TRAVEL_STYLES
            .iter()
            .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
            .map(|(style, _)| style.to_string()),
        interests: matching_labels(&lower, INTERESTS),
        constraints: matching_labels(&lower, CONSTRAINTS),
        ..Default::default()
    };

    let dates: Vec<NaiveDate> = DATE_PATTERN
        .captures_iter(text)
        .filter_map(|c| NaiveDate::parse_from_str(&c[1], "%Y-%m-%d").ok())
        .collect();
    intent.start_date = dates.first().map(|d| d.to_string());
    intent.end_date = dates.get(1).map(|d| d.to_string());

    intent.num_days = extract_days(text).or_else(|| match dates.as_slice() {
        [start, end, ..] if end >= start => u32::try_from((*end - *start).num_days() + 1).ok(),
        _ => None,
    });

    intent
}

fn extract_days(text: &str) -> Option<u32> {
    let caps = DURATION_PATTERN.captures(text)?;
    let n: u32 = caps[1].parse().ok()?;
    if n == 0 {
        return None;
    }
    if caps[2].to_lowercase().starts_with("night") {
        Some(n + 1)
    } else {
        Some(n)
    }
}

fn extract_budget(text: &str) -> Option<f64> {
    if let Some(caps) = BUDGET_PATTERN.captures(text) {
        return scale_amount(&caps[1], caps.get(2).map(|m| m.as_str()));
    }
    let caps = AMOUNT_PATTERN.captures(text)?;
    match (caps.get(1), caps.get(3)) {
        (Some(amount), _) => scale_amount(amount.as_str(), caps.get(2).map(|m| m.as_str())),
        (None, Some(amount)) => scale_amount(amount.as_str(), caps.get(4).map(|m| m.as_str())),
        (None, None) => None,
    }
}

fn scale_amount(amount: &str, suffix: Option<&str>) -> Option<f64> {
    let value: f64 = amount.replace(',', "").parse().ok()?;
    let multiplier = match suffix.map(|s| s.to_lowercase()) {
        Some(s) if s == "k" || s == "thousand" => 1_000.0,
        Some(s) if s.starts_with('l') => 100_000.0,
        _ => 1.0,
    };
    Some(value * multiplier).filter(|v| v.is_finite())
}

fn detect_currency(text: &str) -> Option<&'static str> {
    if USD_PATTERN.is_match(text) {
        Some("USD")
    } else if EUR_PATTERN.is_match(text) {
        Some("EUR")
    } else {
        None
    }
}

fn extract_destination(text: &str) -> Option<String> {
    if let Some(caps) = DESTINATION_PATTERN.captures(text) {
        return Some(caps[1].trim().to_string());
    }
    let lower = text.to_lowercase();
    KNOWN_DESTINATIONS
        .iter()
        .find(|name| {
            lower
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| word == name.to_lowercase())
        })
        .map(|name| name.to_string())
}

fn matching_labels(lower: &str, table: &[(&str, &[&str])]) -> Vec<String> {
    table
        .iter()
        .filter(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(label, _)| label.to_string())
        .collect()
}

/// First stage: parse the request and propose the destination shortlist
pub struct IntentStage {
    default_currency: String,
}

impl IntentStage {
    pub fn new(default_currency: impl Into<String>) -> Self {
        Self {
            default_currency: default_currency.into(),
        }
    }
}

#[async_trait]
impl Stage<TripState> for IntentStage {
    fn name(&self) -> &str {
        "intent"
    }

    async fn run(&self, ctx: StageContext<'_, TripState>) -> StageOutcome<TripUpdate> {
        let parsed = parse_request(&ctx.state.user_input, &self.default_currency);
        log::info!(
            "Parsed intent for run {}: destination={:?}, days={:?}, budget={:?}",
            ctx.run_id,
            parsed.destination,
            parsed.num_days,
            parsed.budget_total
        );

        let entry = DecisionLogEntry::new(
            "intent_parser",
            "parse",
            format!(
                "Parsed intent: budget={} {}, origin={}, destination={}, days={}",
                fmt_opt(parsed.budget_total),
                parsed.currency,
                fmt_opt(parsed.origin.as_deref()),
                fmt_opt(parsed.destination.as_deref()),
                fmt_opt(parsed.num_days)
            ),
        )
        .with_data(&parsed);

        StageOutcome::Continue(TripUpdate {
            destination_shortlist: Some(parsed.destination.iter().cloned().collect()),
            parsed_intent: Some(Some(parsed)),
            decision_log: Some(vec![entry]),
            ..Default::default()
        })
    }
}

fn fmt_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "unknown".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_request() {
        let intent = parse_request("4 day trip to Goa under 20000", "INR");
        assert_eq!(intent.num_days, Some(4));
        assert_eq!(intent.destination.as_deref(), Some("Goa"));
        assert_eq!(intent.budget_total, Some(20000.0));
        assert_eq!(intent.currency, "INR");
        assert!(intent.origin.is_none());
    }

    #[test]
    fn test_full_request() {
        let intent = parse_request(
            "Solo backpacking from Delhi to Rishikesh for 5 days, budget of Rs 15,000. \
             Love rafting and yoga, vegetarian only.",
            "INR",
        );
        assert_eq!(intent.origin.as_deref(), Some("Delhi"));
        assert_eq!(intent.destination.as_deref(), Some("Rishikesh"));
        assert_eq!(intent.num_days, Some(5));
        assert_eq!(intent.budget_total, Some(15000.0));
        assert_eq!(intent.travel_style.as_deref(), Some("solo_backpacking"));
        assert_eq!(
            intent.interests,
            vec!["adventure sports", "spiritual experiences"]
        );
        assert_eq!(intent.constraints, vec!["vegetarian food"]);
    }

    #[test]
    fn test_budget_suffixes() {
        assert_eq!(extract_budget("within 20k please"), Some(20000.0));
        assert_eq!(extract_budget("max 1.5 lakh"), Some(150000.0));
        assert_eq!(extract_budget("I can spend ₹25,000"), Some(25000.0));
        assert_eq!(extract_budget("about 900 dollars"), Some(900.0));
        assert_eq!(extract_budget("a long trip"), None);
        let huge = format!("under {}", "9".repeat(400));
        assert_eq!(extract_budget(&huge), None);
    }

    #[test]
    fn test_currency_detection() {
        assert_eq!(parse_request("trip to Bali under $1500", "INR").currency, "USD");
        assert_eq!(parse_request("Paris for 300 euros", "INR").currency, "EUR");
        assert_eq!(parse_request("Goa under 20000", "INR").currency, "INR");
    }

    #[test]
    fn test_nights_become_days() {
        assert_eq!(extract_days("3 nights in the hills"), Some(4));
        assert_eq!(extract_days("0 days"), None);
    }

    #[test]
    fn test_dates_give_duration() {
        let intent = parse_request("Trip to Jaipur from 2025-03-01 to 2025-03-03", "INR");
        assert_eq!(intent.start_date.as_deref(), Some("2025-03-01"));
        assert_eq!(intent.end_date.as_deref(), Some("2025-03-03"));
        assert_eq!(intent.num_days, Some(3));
        assert_eq!(intent.destination.as_deref(), Some("Jaipur"));
    }

    #[test]
    fn test_lowercase_known_destination() {
        let intent = parse_request("weekend in manali with friends", "INR");
        assert_eq!(intent.destination.as_deref(), Some("Manali"));
        assert_eq!(intent.travel_style.as_deref(), Some("weekend"));
    }

    #[test]
    fn test_multiword_destination() {
        let intent = parse_request("3 days to North Goa with family", "INR");
        assert_eq!(intent.destination.as_deref(), Some("North Goa"));
        assert_eq!(intent.travel_style.as_deref(), Some("family"));
    }

    #[tokio::test]
    async fn test_stage_output() {
        let state = TripState {
            user_input: "4 day trip to Goa under 20000".into(),
            ..Default::default()
        };
        let outcome = IntentStage::new("INR")
            .run(StageContext {
                run_id: "r",
                state: &state,
                resume: None,
            })
            .await;

        let StageOutcome::Continue(update) = outcome else {
            panic!("intent stage never suspends");
        };
        assert_eq!(update.destination_shortlist, Some(vec!["Goa".to_string()]));
        let intent = update.parsed_intent.flatten().unwrap();
        assert_eq!(intent.budget_total, Some(20000.0));
        assert_eq!(update.decision_log.unwrap()[0].agent, "intent_parser");
    }
}
