//! `Inkboard` - backend for a fixed-size e-ink information dashboard
//!
//! This library aggregates three independent providers - weather, calendar,
//! and transit departures - into a normalized, renderer-agnostic dashboard
//! model that the frontend lays out at 600x800.

use std::sync::LazyLock;
use std::time::Duration;

pub mod api;
pub mod auth;
pub mod calendar;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod localtime;
pub mod models;
pub mod transit;
pub mod weather;
pub mod web;

// Re-export core types for public API
pub use config::DashboardConfig;
pub use error::InkboardError;
pub use models::{CalendarAgenda, Dashboard, TransitBoard, WeatherSnapshot};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, InkboardError>;

/// Shared HTTP client for the plain REST providers (weather, transit).
/// The client timeout is the only transport bound a refresh cycle gets;
/// there are no retries.
pub static API_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to build HTTP client")
});
