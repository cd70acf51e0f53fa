//! Refresh-cycle orchestration
//!
//! One inbound render request runs one cycle: all three adapters fire
//! concurrently, every branch settles on its own, and whatever succeeded
//! flows into the composed model. A failed adapter degrades its section for
//! this cycle only; the next request starts fresh.

use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::config::DashboardConfig;
use crate::models::Dashboard;
use crate::{Result, calendar, transit, weather};

/// Run one refresh cycle. Never fails; failed sections come back as `None`.
#[instrument(skip(config))]
pub async fn assemble(config: &DashboardConfig, now: DateTime<Utc>) -> Dashboard {
    let tz = config.display.tz();

    // Wait for all three to settle; no branch short-circuits another
    let (weather, calendar, transit) = tokio::join!(
        weather::fetch_weather(&config.weather, tz, now),
        calendar::fetch_agenda(&config.calendar, tz, now),
        transit::fetch_transit(&config.transit, tz, now),
    );

    Dashboard {
        now,
        weather: section("weather", weather),
        calendar: section("calendar", calendar),
        transit: section("transit", transit),
    }
}

fn section<T>(name: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(section = name, error = %err, "section degraded for this cycle");
            None
        }
    }
}
