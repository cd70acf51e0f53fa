use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use chrono_tz::Tz;
use tracing::instrument;

use crate::config::WeatherConfig;
use crate::error::InkboardError;
use crate::models::{CurrentConditions, DailyEntry, HourlyEntry, WeatherSnapshot};
use crate::{API_CLIENT, Result};

/// Provider timestamps arrive as local wall-clock time, no offset.
const PROVIDER_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Fetch current, hourly, and daily conditions and normalize them into one
/// display-ready snapshot.
#[instrument(skip(config))]
pub async fn fetch_weather(
    config: &WeatherConfig,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<WeatherSnapshot> {
    let url = format!("{}/forecast", config.base_url);
    let response = API_CLIENT
        .get(&url)
        .query(&[
            ("latitude", config.latitude.to_string()),
            ("longitude", config.longitude.to_string()),
            (
                "current",
                "temperature_2m,relative_humidity_2m,apparent_temperature,weather_code,wind_speed_10m"
                    .to_string(),
            ),
            (
                "hourly",
                "temperature_2m,weather_code,precipitation_probability".to_string(),
            ),
            (
                "daily",
                "weather_code,temperature_2m_max,temperature_2m_min,sunrise,sunset".to_string(),
            ),
            ("timezone", tz.name().to_string()),
            ("forecast_days", "7".to_string()),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(InkboardError::provider(format!(
            "weather provider returned {}",
            response.status()
        )));
    }

    let forecast: openmeteo::ForecastResponse = response
        .json()
        .await
        .map_err(|err| InkboardError::provider(format!("undecodable weather payload: {err}")))?;

    Ok(build_snapshot(&forecast, now, tz))
}

/// Normalize a provider response into the dashboard snapshot.
fn build_snapshot(
    response: &openmeteo::ForecastResponse,
    now: DateTime<Utc>,
    tz: Tz,
) -> WeatherSnapshot {
    let now_local = now.with_timezone(&tz).naive_local();

    // Hourly: slice 8 entries starting at the entry matching the current
    // local date and hour; the series is already local wall-clock time.
    let start = response
        .hourly
        .time
        .iter()
        .position(|t| {
            NaiveDateTime::parse_from_str(t, PROVIDER_TIME_FORMAT).is_ok_and(|stamp| {
                stamp.date() == now_local.date() && stamp.hour() == now_local.hour()
            })
        })
        .unwrap_or(0);

    let mut hourly = Vec::new();
    for i in start..response.hourly.time.len().min(start + 8) {
        let Ok(stamp) = NaiveDateTime::parse_from_str(&response.hourly.time[i], PROVIDER_TIME_FORMAT)
        else {
            continue;
        };
        let (icon, _) = openmeteo::classify(
            response
                .hourly
                .weather_code
                .get(i)
                .copied()
                .unwrap_or(u16::MAX),
        );
        // A probability of exactly 0 is absent rather than a false "0%"
        let precipitation_probability = response
            .hourly
            .precipitation_probability
            .as_ref()
            .and_then(|probabilities| probabilities.get(i).copied().flatten())
            .filter(|p| *p > 0.0)
            .map(|p| p.round() as u8);

        hourly.push(HourlyEntry {
            hour: format!("{:02}", stamp.hour()),
            temperature: response
                .hourly
                .temperature
                .get(i)
                .copied()
                .unwrap_or_default()
                .round() as i32,
            icon,
            precipitation_probability,
        });
    }

    // Daily forecast: today + 5 more days
    let today = now_local.date();
    let tomorrow = today.succ_opt().unwrap_or(today);

    let mut forecast = Vec::new();
    for (i, day) in response.daily.time.iter().take(6).enumerate() {
        let Ok(date) = NaiveDate::parse_from_str(day, "%Y-%m-%d") else {
            continue;
        };
        // Anchor at noon so the label never straddles a date boundary
        let anchor = date.and_hms_opt(12, 0, 0).unwrap_or(now_local);
        let label = if anchor.date() == today {
            "Today".to_string()
        } else if anchor.date() == tomorrow {
            "Tomorr.".to_string()
        } else {
            anchor.format("%a").to_string()
        };

        let (icon, description) = openmeteo::classify(
            response
                .daily
                .weather_code
                .get(i)
                .copied()
                .unwrap_or(u16::MAX),
        );
        forecast.push(DailyEntry {
            day: label,
            icon,
            description: description.to_string(),
            temp_low: response
                .daily
                .temperature_min
                .get(i)
                .copied()
                .unwrap_or_default()
                .round() as i32,
            temp_high: response
                .daily
                .temperature_max
                .get(i)
                .copied()
                .unwrap_or_default()
                .round() as i32,
        });
    }

    // Range bounds come from the forecast only, not hourly or current
    // readings; an empty forecast degenerates to a span of 1.
    let temp_range_min = forecast.iter().map(|f| f.temp_low).min().unwrap_or(0);
    let temp_range_max = forecast.iter().map(|f| f.temp_high).max().unwrap_or(1);

    let (icon, description) = openmeteo::classify(response.current.weather_code);
    let current = CurrentConditions {
        temperature: response.current.temperature.round() as i32,
        apparent_temperature: response.current.apparent_temperature.round() as i32,
        humidity: response.current.humidity.round() as i32,
        wind_speed: response.current.wind_speed.round() as i32,
        icon,
        description: description.to_string(),
    };

    WeatherSnapshot {
        current,
        hourly,
        forecast,
        sunrise: first_entry_time(&response.daily.sunrise),
        sunset: first_entry_time(&response.daily.sunset),
        temp_range_min,
        temp_range_max,
    }
}

fn first_entry_time(times: &[String]) -> String {
    times
        .first()
        .and_then(|t| NaiveDateTime::parse_from_str(t, PROVIDER_TIME_FORMAT).ok())
        .map_or_else(|| "—".to_string(), |stamp| stamp.format("%H:%M").to_string())
}

/// Open-Meteo API response structures and the WMO code table
pub(crate) mod openmeteo {
    use serde::Deserialize;

    use crate::models::WeatherIcon;

    /// Forecast response with parallel arrays per field
    #[derive(Debug, Deserialize)]
    pub struct ForecastResponse {
        pub current: CurrentData,
        pub hourly: HourlyData,
        pub daily: DailyData,
    }

    #[derive(Debug, Deserialize)]
    pub struct CurrentData {
        #[serde(rename = "temperature_2m")]
        pub temperature: f64,
        #[serde(rename = "relative_humidity_2m")]
        pub humidity: f64,
        pub apparent_temperature: f64,
        pub weather_code: u16,
        #[serde(rename = "wind_speed_10m")]
        pub wind_speed: f64,
    }

    #[derive(Debug, Deserialize)]
    pub struct HourlyData {
        pub time: Vec<String>,
        #[serde(rename = "temperature_2m")]
        pub temperature: Vec<f64>,
        pub weather_code: Vec<u16>,
        pub precipitation_probability: Option<Vec<Option<f64>>>,
    }

    #[derive(Debug, Deserialize)]
    pub struct DailyData {
        pub time: Vec<String>,
        pub weather_code: Vec<u16>,
        #[serde(rename = "temperature_2m_max")]
        pub temperature_max: Vec<f64>,
        #[serde(rename = "temperature_2m_min")]
        pub temperature_min: Vec<f64>,
        pub sunrise: Vec<String>,
        pub sunset: Vec<String>,
    }

    /// Map a WMO weather interpretation code to an icon class and description.
    /// Codes outside the table collapse to `(Cloudy, "Unknown")` - an
    /// unrecognized code never fails the adapter.
    #[must_use]
    pub fn classify(code: u16) -> (WeatherIcon, &'static str) {
        match code {
            0 => (WeatherIcon::Sunny, "Clear Sky"),
            1 => (WeatherIcon::PartlyCloudy, "Mainly Clear"),
            2 => (WeatherIcon::PartlyCloudy, "Partly Cloudy"),
            3 => (WeatherIcon::Cloudy, "Overcast"),
            45 => (WeatherIcon::Cloudy, "Fog"),
            48 => (WeatherIcon::Cloudy, "Icy Fog"),
            51 => (WeatherIcon::LightRain, "Light Drizzle"),
            53 => (WeatherIcon::LightRain, "Drizzle"),
            55 => (WeatherIcon::Rain, "Heavy Drizzle"),
            61 => (WeatherIcon::LightRain, "Light Rain"),
            63 => (WeatherIcon::Rain, "Rain"),
            65 => (WeatherIcon::Rain, "Heavy Rain"),
            71 => (WeatherIcon::Snow, "Light Snow"),
            73 => (WeatherIcon::Snow, "Snow"),
            75 => (WeatherIcon::Snow, "Heavy Snow"),
            77 => (WeatherIcon::Snow, "Snow Grains"),
            80 => (WeatherIcon::LightRain, "Light Showers"),
            81 => (WeatherIcon::Rain, "Rain Showers"),
            82 => (WeatherIcon::Rain, "Heavy Showers"),
            85 => (WeatherIcon::Snow, "Snow Showers"),
            86 => (WeatherIcon::Snow, "Heavy Snow Showers"),
            95 => (WeatherIcon::Rain, "Thunderstorm"),
            96 => (WeatherIcon::Rain, "Thunderstorm w/ Hail"),
            99 => (WeatherIcon::Rain, "Thunderstorm w/ Heavy Hail"),
            _ => (WeatherIcon::Cloudy, "Unknown"),
        }
    }
}
