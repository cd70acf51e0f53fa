//! Normalized dashboard data model
//!
//! Every type here is an immutable value object produced fresh per refresh
//! cycle and handed to the frontend as camelCase JSON. Nothing is shared or
//! mutated across cycles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Weather ──────────────────────────────────────────────────────────────────

/// Icon classification shared by current, hourly, and daily conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WeatherIcon {
    Sunny,
    PartlyCloudy,
    Cloudy,
    LightRain,
    Rain,
    Snow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentConditions {
    pub temperature: i32,
    pub apparent_temperature: i32,
    /// Relative humidity in percent
    pub humidity: i32,
    pub wind_speed: i32,
    pub icon: WeatherIcon,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyEntry {
    /// Local hour label, "00".."23"
    pub hour: String,
    pub temperature: i32,
    pub icon: WeatherIcon,
    /// Absent when the provider reports exactly 0%
    pub precipitation_probability: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyEntry {
    /// "Today", "Tomorr.", or a 3-letter weekday
    pub day: String,
    pub icon: WeatherIcon,
    pub description: String,
    pub temp_low: i32,
    pub temp_high: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    pub current: CurrentConditions,
    /// Up to 8 entries starting at the current local hour
    pub hourly: Vec<HourlyEntry>,
    /// Up to 6 days
    pub forecast: Vec<DailyEntry>,
    /// "HH:MM" in the configured timezone
    pub sunrise: String,
    pub sunset: String,
    /// Bounds across forecast lows/highs, used by the consumer for bar scaling
    pub temp_range_min: i32,
    pub temp_range_max: i32,
}

// ── Calendar ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaEvent {
    pub id: String,
    pub title: String,
    /// "HH:MM" local, `None` for all-day events
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
    /// True only when not all-day and the current instant lies in [start, end)
    pub is_now: bool,
    pub is_all_day: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayGroup {
    /// "Today", "Tomorrow", or "Thu, 27 Feb"
    pub label: String,
    /// Events in start-time order
    pub events: Vec<AgendaEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarAgenda {
    pub days: Vec<DayGroup>,
}

// ── Transit ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Departure {
    pub id: String,
    pub line_name: String,
    pub line_product: String,
    pub direction: String,
    /// "HH:MM", "N min", "now", "Cancelled", or a placeholder dash
    pub when_display: String,
    pub delay_minutes: Option<i64>,
    pub platform: Option<String>,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub text: String,
    /// "warning", "disruption", or "status"
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitBoard {
    /// Up to 10 departures in provider order
    pub departures: Vec<Departure>,
    /// Up to 3 alerts, deduplicated by text
    pub alerts: Vec<Alert>,
}

// ── Composed dashboard ───────────────────────────────────────────────────────

/// One refresh cycle's output. Any section may be absent; the frontend
/// renders a degraded placeholder for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub now: DateTime<Utc>,
    pub weather: Option<WeatherSnapshot>,
    pub calendar: Option<CalendarAgenda>,
    pub transit: Option<TransitBoard>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_is_camel_case() {
        let snapshot = WeatherSnapshot {
            current: CurrentConditions {
                temperature: 21,
                apparent_temperature: 19,
                humidity: 40,
                wind_speed: 12,
                icon: WeatherIcon::PartlyCloudy,
                description: "Partly Cloudy".to_string(),
            },
            hourly: vec![],
            forecast: vec![],
            sunrise: "04:43".to_string(),
            sunset: "21:32".to_string(),
            temp_range_min: 12,
            temp_range_max: 27,
        };

        let value = serde_json::to_value(&snapshot).unwrap();
        assert!(value.get("tempRangeMin").is_some());
        assert!(value.get("tempRangeMax").is_some());
        assert_eq!(value["current"]["icon"], "partly-cloudy");
        assert_eq!(value["current"]["apparentTemperature"], 19);
    }

    #[test]
    fn test_absent_sections_serialize_as_null() {
        let dashboard = Dashboard {
            now: Utc::now(),
            weather: None,
            calendar: None,
            transit: None,
        };
        let value = serde_json::to_value(&dashboard).unwrap();
        assert!(value["weather"].is_null());
        assert!(value["calendar"].is_null());
        assert!(value["transit"].is_null());
    }
}
