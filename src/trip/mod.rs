// SPDX-License-Identifier: MIT

//! Trip planning application built on the flow engine
//!
//! Eight stages in a fixed order: intent parsing, research, destination
//! approval, budget allocation, budget approval, itinerary planning,
//! itinerary approval and booking assembly.

pub mod config;
pub mod pipeline;
pub mod server;
pub mod stages;
pub mod state;
pub mod weather;

pub use config::AppConfig;
pub use pipeline::{build_planner, build_registry, TripPlanner};
pub use state::{TripState, TripUpdate};
