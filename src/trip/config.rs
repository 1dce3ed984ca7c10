// SPDX-License-Identifier: MIT

//! Application configuration
//!
//! Loaded from an optional YAML file, then overridden by `TRIPFLOW_*`
//! environment variables (a `.env` file is honored by the binary).

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::stages::ApprovalCheckpoint;

/// Longest accepted run TTL (100 years)
pub const MAX_RUN_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub planner: PlannerConfig,
    pub research: ResearchConfig,
    pub runs: RunsConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Defaults used when the request leaves something out
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub currency: String,
    pub default_budget: f64,
    pub default_days: u32,
    pub default_origin: String,
    pub default_destination: String,
    /// Checkpoints that continue without waiting for the approver
    pub auto_approve: Vec<ApprovalCheckpoint>,
    pub budget_split: BudgetSplit,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            currency: "INR".to_string(),
            default_budget: 15000.0,
            default_days: 4,
            default_origin: "Delhi".to_string(),
            default_destination: "Rishikesh".to_string(),
            auto_approve: Vec::new(),
            budget_split: BudgetSplit::default(),
        }
    }
}

/// Fractions of the total budget per category; must sum to 1
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BudgetSplit {
    pub transport: f64,
    pub stay: f64,
    pub food: f64,
    pub activities: f64,
    pub buffer: f64,
}

impl Default for BudgetSplit {
    fn default() -> Self {
        Self {
            transport: 0.30,
            stay: 0.30,
            food: 0.20,
            activities: 0.20,
            buffer: 0.0,
        }
    }
}

impl BudgetSplit {
    fn ratios(&self) -> [f64; 5] {
        [
            self.transport,
            self.stay,
            self.food,
            self.activities,
            self.buffer,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Query Open-Meteo for the forecast instead of using demo weather
    pub live_weather: bool,
    pub timeout_secs: u64,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            live_weather: false,
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RunsConfig {
    /// Runs untouched for longer than this are evicted; unset keeps them forever
    pub ttl_secs: Option<u64>,
    pub prune_interval_secs: u64,
}

impl Default for RunsConfig {
    fn default() -> Self {
        Self {
            ttl_secs: None,
            prune_interval_secs: 60,
        }
    }
}

impl AppConfig {
    /// Load from an optional YAML file and apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::parse_yaml(&fs::read_to_string(p)?)?,
            None => Self::default(),
        };
        config.apply_env(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply `TRIPFLOW_*` overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("TRIPFLOW_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("TRIPFLOW_PORT") {
            self.server.port = parse_env("TRIPFLOW_PORT", &port)?;
        }
        if let Some(live) = lookup("TRIPFLOW_LIVE_WEATHER") {
            self.research.live_weather = parse_env("TRIPFLOW_LIVE_WEATHER", &live)?;
        }
        if let Some(ttl) = lookup("TRIPFLOW_RUN_TTL_SECS") {
            self.runs.ttl_secs = Some(parse_env("TRIPFLOW_RUN_TTL_SECS", &ttl)?);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ratios = self.planner.budget_split.ratios();
        if ratios.iter().any(|r| *r < 0.0 || !r.is_finite()) {
            return Err(ConfigError::Invalid(
                "budget_split ratios must be non-negative".into(),
            ));
        }
        let sum: f64 = ratios.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::Invalid(format!(
                "budget_split ratios must sum to 1 (got {})",
                sum
            )));
        }
        if self.planner.default_days == 0 {
            return Err(ConfigError::Invalid("default_days must be positive".into()));
        }
        if self.planner.default_budget <= 0.0 {
            return Err(ConfigError::Invalid(
                "default_budget must be positive".into(),
            ));
        }
        if self.runs.ttl_secs.is_some_and(|ttl| ttl > MAX_RUN_TTL_SECS) {
            return Err(ConfigError::Invalid(format!(
                "ttl_secs must not exceed {}",
                MAX_RUN_TTL_SECS
            )));
        }
        if self.runs.prune_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "prune_interval_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} has an invalid value: {}", key, value)))
}
