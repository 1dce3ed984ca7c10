// SPDX-License-Identifier: MIT

//! Weather forecasts for the research stage
//!
//! The live provider talks to Open-Meteo, which needs no API key: a
//! geocoding lookup turns the place name into coordinates, then the daily
//! forecast endpoint returns a few days of min/max temperatures.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use super::state::WeatherInfo;

const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
const FORECAST_DAYS: u32 = 3;

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Location not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Daily forecast for the named place, earliest day first
    async fn forecast(&self, location: &str) -> Result<Vec<WeatherInfo>, WeatherError>;
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<Place>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Place {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    daily: Option<Daily>,
}

#[derive(Debug, Deserialize)]
struct Daily {
    time: Vec<String>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    weather_code: Vec<Option<u32>>,
}

/// First geocoding match, if any
pub fn parse_geocoding(body: Value, location: &str) -> Result<Place, WeatherError> {
    let response: GeocodingResponse = serde_json::from_value(body)
        .map_err(|e| WeatherError::InvalidResponse(e.to_string()))?;
    response
        .results
        .into_iter()
        .next()
        .ok_or_else(|| WeatherError::NotFound(location.to_string()))
}

/// Turn the `daily` block of a forecast response into one entry per day
pub fn parse_forecast(body: Value, location: &str) -> Result<Vec<WeatherInfo>, WeatherError> {
    let response: ForecastResponse = serde_json::from_value(body)
        .map_err(|e| WeatherError::InvalidResponse(e.to_string()))?;
    let daily = response
        .daily
        .ok_or_else(|| WeatherError::InvalidResponse("missing daily block".into()))?;

    let days = daily
        .time
        .iter()
        .enumerate()
        .map(|(i, date)| {
            let conditions = daily
                .weather_code
                .get(i)
                .copied()
                .flatten()
                .map(|code| describe_weather_code(code).to_string());
            WeatherInfo {
                location: location.to_string(),
                date: date.clone(),
                summary: conditions.as_deref().map(summarize),
                temp_min: daily.temperature_2m_min.get(i).copied().flatten(),
                temp_max: daily.temperature_2m_max.get(i).copied().flatten(),
                conditions,
            }
        })
        .collect();
    Ok(days)
}

/// WMO weather interpretation codes as used by Open-Meteo
pub fn describe_weather_code(code: u32) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 | 48 => "Fog",
        51 | 53 | 55 | 56 | 57 => "Drizzle",
        61 | 63 | 65 | 66 | 67 => "Rain",
        71 | 73 | 75 | 77 => "Snow",
        80..=82 => "Rain showers",
        85 | 86 => "Snow showers",
        95..=99 => "Thunderstorm",
        _ => "Unknown",
    }
}

fn summarize(conditions: &str) -> String {
    match conditions {
        "Clear sky" | "Mainly clear" | "Partly cloudy" => "Pleasant",
        "Rain" | "Rain showers" | "Drizzle" | "Thunderstorm" => "Wet",
        "Snow" | "Snow showers" => "Cold",
        _ => "Mixed",
    }
    .to_string()
}

fn endpoint(base: &str) -> Result<reqwest::Url, WeatherError> {
    reqwest::Url::parse(base).map_err(|e| WeatherError::InvalidResponse(e.to_string()))
}

/// Live forecasts from Open-Meteo
pub struct OpenMeteoProvider {
    client: Client,
}

impl OpenMeteoProvider {
    pub fn new(timeout: Duration) -> Result<Self, WeatherError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn get_json(&self, url: reqwest::Url) -> Result<Value, WeatherError> {
        let resp = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await?;
            return Err(WeatherError::InvalidResponse(format!(
                "Open-Meteo returned {}: {}",
                status, text
            )));
        }

        Ok(resp.json().await?)
    }

    async fn geocode(&self, location: &str) -> Result<Place, WeatherError> {
        let mut url = endpoint(GEOCODING_URL)?;
        url.query_pairs_mut()
            .append_pair("name", location)
            .append_pair("count", "1");
        parse_geocoding(self.get_json(url).await?, location)
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    async fn forecast(&self, location: &str) -> Result<Vec<WeatherInfo>, WeatherError> {
        let place = self.geocode(location).await?;
        log::debug!(
            "Geocoded {} to ({}, {})",
            location,
            place.latitude,
            place.longitude
        );

        let mut url = endpoint(FORECAST_URL)?;
        url.query_pairs_mut()
            .append_pair("latitude", &place.latitude.to_string())
            .append_pair("longitude", &place.longitude.to_string())
            .append_pair(
                "daily",
                "temperature_2m_max,temperature_2m_min,weather_code",
            )
            .append_pair("timezone", "auto")
            .append_pair("forecast_days", &FORECAST_DAYS.to_string());

        parse_forecast(self.get_json(url).await?, location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_geocoding() {
        let body = json!({
            "results": [
                {"id": 1, "name": "Goa", "latitude": 15.3, "longitude": 74.0, "country": "India"},
                {"id": 2, "name": "Goa", "latitude": 13.7, "longitude": 123.4}
            ],
            "generationtime_ms": 0.5
        });
        let place = parse_geocoding(body, "Goa").unwrap();
        assert_eq!(place.name, "Goa");
        assert_eq!(place.latitude, 15.3);
    }

    #[test]
    fn test_geocoding_without_results() {
        let err = parse_geocoding(json!({"generationtime_ms": 0.2}), "Atlantis").unwrap_err();
        assert!(matches!(err, WeatherError::NotFound(name) if name == "Atlantis"));
    }

    #[test]
    fn test_parse_forecast() {
        let body = json!({
            "latitude": 15.3,
            "daily": {
                "time": ["2025-03-01", "2025-03-02"],
                "temperature_2m_max": [31.2, 30.1],
                "temperature_2m_min": [22.4, null],
                "weather_code": [1, 63]
            }
        });
        let days = parse_forecast(body, "Goa").unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, "2025-03-01");
        assert_eq!(days[0].conditions.as_deref(), Some("Mainly clear"));
        assert_eq!(days[0].summary.as_deref(), Some("Pleasant"));
        assert_eq!(days[1].temp_min, None);
        assert_eq!(days[1].summary.as_deref(), Some("Wet"));
        assert!(days.iter().all(|d| d.location == "Goa"));
    }

    #[test]
    fn test_forecast_missing_daily() {
        let err = parse_forecast(json!({"latitude": 1.0}), "Goa").unwrap_err();
        assert!(matches!(err, WeatherError::InvalidResponse(_)));
    }

    #[test]
    fn test_weather_codes() {
        assert_eq!(describe_weather_code(0), "Clear sky");
        assert_eq!(describe_weather_code(81), "Rain showers");
        assert_eq!(describe_weather_code(96), "Thunderstorm");
        assert_eq!(describe_weather_code(1000), "Unknown");
    }
}
