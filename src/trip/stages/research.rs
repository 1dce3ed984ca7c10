// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::sync::Arc;

use crate::flow::{Stage, StageContext, StageOutcome};
use crate::trip::state::{
    ActivityOption, DecisionLogEntry, FlightOption, HotelOption, ResearchedData, TripState,
    TripUpdate, WeatherInfo, DEFAULT_CURRENCY,
};
use crate::trip::weather::WeatherProvider;

const DEMO_DATE: &str = "2025-03-01";

fn flight(
    origin: &str,
    destination: &str,
    date: &str,
    times: (&str, &str),
    carrier: &str,
    price: f64,
    link: &str,
) -> FlightOption {
    FlightOption {
        origin: origin.to_string(),
        destination: destination.to_string(),
        departure: format!("{} {}", date, times.0),
        arrival: format!("{} {}", date, times.1),
        carrier: Some(carrier.to_string()),
        price: Some(price),
        currency: DEFAULT_CURRENCY.to_string(),
        booking_link: Some(link.to_string()),
        is_demo: true,
    }
}

fn hotel(name: &str, address: &str, price: f64, rating: f64, link: &str) -> HotelOption {
    HotelOption {
        name: name.to_string(),
        address: Some(address.to_string()),
        price_per_night: Some(price),
        currency: DEFAULT_CURRENCY.to_string(),
        rating: Some(rating),
        booking_link: Some(link.to_string()),
        map_link: Some(map_link(name)),
        contact: None,
        is_demo: true,
    }
}

fn activity(name: &str, kind: &str, minutes: u32, price: f64, map_query: &str) -> ActivityOption {
    ActivityOption {
        name: name.to_string(),
        kind: Some(kind.to_string()),
        duration_minutes: Some(minutes),
        price: Some(price),
        currency: DEFAULT_CURRENCY.to_string(),
        opening_hours: None,
        booking_link: None,
        map_link: Some(map_link(map_query)),
        is_demo: true,
    }
}

fn map_link(query: &str) -> String {
    format!("https://maps.google.com/?q={}", query.replace(' ', "+"))
}

fn demo_weather(location: &str, date: &str, range: (f64, f64), conditions: &str) -> WeatherInfo {
    WeatherInfo {
        location: location.to_string(),
        date: date.to_string(),
        summary: Some("Pleasant".to_string()),
        temp_min: Some(range.0),
        temp_max: Some(range.1),
        conditions: Some(conditions.to_string()),
    }
}

/// Demo research results for a destination
///
/// Rishikesh and Goa have curated entries; any other place gets a generic set
/// named after it. Every option is flagged `is_demo`.
pub fn demo_catalog(destination: &str, origin: &str, date: Option<&str>) -> ResearchedData {
    let date = date.unwrap_or(DEMO_DATE);

    match destination.to_lowercase().as_str() {
        "rishikesh" => ResearchedData {
            flights: vec![flight(
                origin,
                "Dehradun",
                date,
                ("06:00", "07:15"),
                "IndiGo",
                2500.0,
                "https://www.goindigo.in/",
            )],
            hotels: vec![hotel(
                "Zostel Rishikesh",
                "Tapovan, Rishikesh",
                600.0,
                4.5,
                "https://www.zostel.com/",
            )],
            activities: vec![
                ActivityOption {
                    booking_link: Some("https://example.com/rafting".to_string()),
                    ..activity(
                        "White Water Rafting",
                        "adventure",
                        180,
                        1500.0,
                        "Rishikesh rafting",
                    )
                },
                ActivityOption {
                    opening_hours: Some("18:00".to_string()),
                    ..activity("Evening Ganga Aarti", "spiritual", 60, 0.0, "Triveni Ghat")
                },
            ],
            weather: vec![demo_weather(destination, date, (15.0, 28.0), "Partly cloudy")],
            local_tips: vec!["Book rafting in advance in peak season.".to_string()],
            raw_notes: None,
        },
        "goa" => ResearchedData {
            flights: vec![flight(
                origin,
                "Goa",
                date,
                ("07:30", "10:00"),
                "IndiGo",
                4500.0,
                "https://www.goindigo.in/",
            )],
            hotels: vec![hotel(
                "Zostel Goa",
                "Anjuna, Goa",
                800.0,
                4.4,
                "https://www.zostel.com/",
            )],
            activities: vec![
                ActivityOption {
                    booking_link: Some("https://example.com/parasailing".to_string()),
                    ..activity("Parasailing at Baga Beach", "adventure", 60, 1200.0, "Baga Beach")
                },
                ActivityOption {
                    opening_hours: Some("09:00-18:30".to_string()),
                    ..activity("Old Goa Churches Walk", "culture", 120, 0.0, "Old Goa")
                },
                activity("Sunset at Chapora Fort", "sightseeing", 90, 0.0, "Chapora Fort"),
            ],
            weather: vec![demo_weather(destination, date, (22.0, 32.0), "Sunny")],
            local_tips: vec![
                "Rent a scooter to move between beaches.".to_string(),
                "Carry cash for beach shacks.".to_string(),
            ],
            raw_notes: None,
        },
        _ => ResearchedData {
            flights: vec![flight(
                origin,
                destination,
                date,
                ("08:00", "10:30"),
                "Air India",
                5000.0,
                "https://www.airindia.com/",
            )],
            hotels: vec![hotel(
                &format!("{} Central Guesthouse", destination),
                &format!("City centre, {}", destination),
                1200.0,
                4.0,
                "https://www.booking.com/",
            )],
            activities: vec![
                activity(
                    &format!("{} Walking Tour", destination),
                    "sightseeing",
                    120,
                    500.0,
                    destination,
                ),
                activity(
                    "Local Food Trail",
                    "food",
                    90,
                    800.0,
                    &format!("{} food market", destination),
                ),
            ],
            weather: vec![demo_weather(destination, date, (18.0, 30.0), "Partly cloudy")],
            local_tips: vec!["Check local holidays before booking.".to_string()],
            raw_notes: None,
        },
    }
}

/// Gathers flights, stays, activities and weather for the chosen destination
pub struct ResearchStage {
    default_origin: String,
    default_destination: String,
    weather: Option<Arc<dyn WeatherProvider>>,
}

impl ResearchStage {
    pub fn new(default_origin: impl Into<String>, default_destination: impl Into<String>) -> Self {
        Self {
            default_origin: default_origin.into(),
            default_destination: default_destination.into(),
            weather: None,
        }
    }

    /// Use a live provider for the forecast instead of demo weather
    pub fn with_weather(mut self, provider: Arc<dyn WeatherProvider>) -> Self {
        self.weather = Some(provider);
        self
    }
}

#[async_trait]
impl Stage<TripState> for ResearchStage {
    fn name(&self) -> &str {
        "research"
    }

    async fn run(&self, ctx: StageContext<'_, TripState>) -> StageOutcome<TripUpdate> {
        let intent = ctx.state.parsed_intent.as_ref();
        let destination = intent
            .and_then(|i| i.destination.clone())
            .or_else(|| ctx.state.destination_shortlist.first().cloned())
            .unwrap_or_else(|| self.default_destination.clone());
        let origin = intent
            .and_then(|i| i.origin.clone())
            .unwrap_or_else(|| self.default_origin.clone());
        let start_date = intent.and_then(|i| i.start_date.as_deref());

        let mut entries = vec![DecisionLogEntry::new(
            "research",
            "fetch",
            format!("Researching destination: {}", destination),
        )];

        let mut researched = demo_catalog(&destination, &origin, start_date);
        let mut live_weather = false;

        if let Some(provider) = &self.weather {
            match provider.forecast(&destination).await {
                Ok(days) if !days.is_empty() => {
                    researched.weather = days;
                    live_weather = true;
                }
                Ok(_) => log::warn!("No forecast for {}, using demo weather", destination),
                Err(e) => log::warn!(
                    "Weather lookup for {} failed, using demo weather: {}",
                    destination,
                    e
                ),
            }
        }

        researched.raw_notes = Some(if live_weather {
            "Demo travel options with live weather.".to_string()
        } else {
            "Demo data used.".to_string()
        });

        entries.push(DecisionLogEntry::new(
            "research",
            "complete",
            format!(
                "Found {} flight(s), {} hotel(s), {} activity(ies). {}",
                researched.flights.len(),
                researched.hotels.len(),
                researched.activities.len(),
                researched.raw_notes.as_deref().unwrap_or_default()
            ),
        ));
        log::info!(
            "Run {} researched {} ({} activities)",
            ctx.run_id,
            destination,
            researched.activities.len()
        );

        StageOutcome::Continue(TripUpdate {
            researched_data: Some(Some(researched)),
            decision_log: Some(entries),
            ..Default::default()
        })
    }
}
