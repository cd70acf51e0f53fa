//! Configuration management for the `Inkboard` service
//!
//! Handles loading configuration from files and environment variables,
//! and provides validation for all configuration settings. Only the values
//! are consumed by the adapters; the loading mechanism stays here.

use crate::InkboardError;
use anyhow::{Context, Result};
use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure for the `Inkboard` service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// HTTP server settings
    pub server: ServerConfig,
    /// Display/timezone settings
    pub display: DisplayConfig,
    /// Weather provider settings
    pub weather: WeatherConfig,
    /// Calendar provider settings
    pub calendar: CalendarConfig,
    /// Transit provider settings
    pub transit: TransitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen port for the dashboard server
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// IANA timezone identifier all displayed times are rendered in
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl DisplayConfig {
    /// Parsed timezone. Validation rejects unknown identifiers at load time,
    /// so the fallback only covers hand-built configs.
    #[must_use]
    pub fn tz(&self) -> Tz {
        self.timezone.parse().unwrap_or(chrono_tz::UTC)
    }
}

/// Weather provider settings (Open-Meteo, no API key required)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_latitude")]
    pub latitude: f64,
    #[serde(default = "default_longitude")]
    pub longitude: f64,
    /// Base URL for the forecast API
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,
}

/// Calendar provider settings (Google Calendar, read-only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Calendar ids to aggregate
    #[serde(default = "default_calendar_ids")]
    pub ids: Vec<String>,
    /// OAuth2 client id
    pub client_id: Option<String>,
    /// OAuth2 client secret
    pub client_secret: Option<String>,
    /// Long-lived refresh token from the one-time consent flow
    pub refresh_token: Option<String>,
}

/// The complete credential set the calendar adapter needs.
#[derive(Debug, Clone)]
pub struct GoogleCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl CalendarConfig {
    /// Returns the credential set, or `None` when any part is missing.
    #[must_use]
    pub fn credentials(&self) -> Option<GoogleCredentials> {
        Some(GoogleCredentials {
            client_id: self.client_id.clone()?,
            client_secret: self.client_secret.clone()?,
            refresh_token: self.refresh_token.clone()?,
        })
    }
}

/// Transit provider settings (HAFAS-style stop departures endpoint)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitConfig {
    /// Stop/station identifier to query departures for
    #[serde(default = "default_stop_id")]
    pub stop_id: String,
    /// Base URL for the departures API
    #[serde(default = "default_transit_base_url")]
    pub base_url: String,
}

// Default value functions
fn default_port() -> u16 {
    3000
}

fn default_timezone() -> String {
    "Europe/Berlin".to_string()
}

fn default_latitude() -> f64 {
    52.52
}

fn default_longitude() -> f64 {
    13.405
}

fn default_weather_base_url() -> String {
    "https://api.open-meteo.com/v1".to_string()
}

fn default_calendar_ids() -> Vec<String> {
    vec!["primary".to_string()]
}

fn default_stop_id() -> String {
    "900003201".to_string()
}

fn default_transit_base_url() -> String {
    "https://v6.bvg.transport.rest".to_string()
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: default_port(),
            },
            display: DisplayConfig {
                timezone: default_timezone(),
            },
            weather: WeatherConfig {
                latitude: default_latitude(),
                longitude: default_longitude(),
                base_url: default_weather_base_url(),
            },
            calendar: CalendarConfig {
                ids: default_calendar_ids(),
                client_id: None,
                client_secret: None,
                refresh_token: None,
            },
            transit: TransitConfig {
                stop_id: default_stop_id(),
                base_url: default_transit_base_url(),
            },
        }
    }
}

impl DashboardConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment variable overrides with INKBOARD_ prefix,
        // e.g. INKBOARD_CALENDAR__REFRESH_TOKEN
        builder = builder.add_source(
            Environment::with_prefix("INKBOARD")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let config: DashboardConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("inkboard").join("config.toml"))
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        if self.display.timezone.parse::<Tz>().is_err() {
            return Err(InkboardError::config(format!(
                "Unknown timezone identifier '{}'",
                self.display.timezone
            ))
            .into());
        }

        if !(-90.0..=90.0).contains(&self.weather.latitude) {
            return Err(
                InkboardError::config("Latitude must be between -90 and 90 degrees").into(),
            );
        }

        if !(-180.0..=180.0).contains(&self.weather.longitude) {
            return Err(
                InkboardError::config("Longitude must be between -180 and 180 degrees").into(),
            );
        }

        for base_url in [&self.weather.base_url, &self.transit.base_url] {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err(InkboardError::config(format!(
                    "Provider base URL must be a valid HTTP or HTTPS URL, got '{base_url}'"
                ))
                .into());
            }
        }

        if self.calendar.ids.is_empty() {
            return Err(
                InkboardError::config("At least one calendar id must be configured").into(),
            );
        }

        if self.transit.stop_id.is_empty() {
            return Err(InkboardError::config("Transit stop id cannot be empty").into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DashboardConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.display.timezone, "Europe/Berlin");
        assert_eq!(config.weather.base_url, "https://api.open-meteo.com/v1");
        assert_eq!(config.calendar.ids, vec!["primary".to_string()]);
        assert_eq!(config.transit.base_url, "https://v6.bvg.transport.rest");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_timezone_accessor() {
        let config = DashboardConfig::default();
        assert_eq!(config.display.tz(), chrono_tz::Europe::Berlin);
    }

    #[test]
    fn test_validation_rejects_unknown_timezone() {
        let mut config = DashboardConfig::default();
        config.display.timezone = "Mars/Olympus_Mons".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("timezone"));
    }

    #[test]
    fn test_validation_rejects_out_of_range_coordinates() {
        let mut config = DashboardConfig::default();
        config.weather.latitude = 123.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_non_http_base_url() {
        let mut config = DashboardConfig::default();
        config.transit.base_url = "ftp://example.org".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_credentials_require_all_three_parts() {
        let mut calendar = CalendarConfig {
            ids: default_calendar_ids(),
            client_id: Some("id".to_string()),
            client_secret: Some("secret".to_string()),
            refresh_token: None,
        };
        assert!(calendar.credentials().is_none());

        calendar.refresh_token = Some("token".to_string());
        let credentials = calendar.credentials().unwrap();
        assert_eq!(credentials.client_id, "id");
        assert_eq!(credentials.refresh_token, "token");
    }

    #[test]
    fn test_config_path_generation() {
        let path = DashboardConfig::get_config_path();
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.to_string_lossy().contains("inkboard"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }
}
