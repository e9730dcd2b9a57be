//! Configuration management.
//!
//! Loads configuration from environment variables with sensible defaults.
//! The binary calls `dotenvy::dotenv()` first, so a `.env` file works too.

use chrono_tz::Tz;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default booking service host
pub const DEFAULT_API_URL: &str = "https://hub612.cosoft.fr";
/// Default coworking space
pub const DEFAULT_SPACE_ID: &str = "a4928a70-38c1-42b9-96f9-b2dd00db5b02";
/// Default meeting-room category
pub const DEFAULT_CATEGORY_ID: &str = "7f1e5757-b9b9-4530-84ad-b2dd00db5f0f";
/// Default locale of the coworking space
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Paris;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Booking service
    pub api: ApiConfig,
    /// Calendar aggregation
    pub calendar: CalendarConfig,
    /// Chat webhook server
    pub server: ServerConfig,
    /// Where sessions, accounts and the room cache are stored
    pub data_dir: PathBuf,
}

/// Booking service configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Scheme and host, without the API path
    pub base_url: String,
    /// Coworking space identifier
    pub space_id: String,
    /// Meeting-room category identifier
    pub category_id: String,
    /// Wall-clock zone used for every date and time
    pub timezone: Tz,
    /// Per-request timeout
    pub http_timeout: Duration,
    /// Room names never offered (comma-separated in the environment)
    pub hidden_rooms: Vec<String>,
}

/// Calendar configuration
#[derive(Debug, Clone)]
pub struct CalendarConfig {
    /// Deadline for one room's busy-time fetch
    pub fetch_timeout: Duration,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

impl Config {
    /// Load configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source.
    ///
    /// Missing or unparsable values fall back to their defaults; an unknown
    /// timezone is logged and replaced by the default.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let timezone = match lookup("BOOKING_TIMEZONE") {
            Some(name) => name.parse::<Tz>().unwrap_or_else(|_| {
                tracing::warn!(timezone = %name, default = %DEFAULT_TIMEZONE, "Unknown timezone, using default");
                DEFAULT_TIMEZONE
            }),
            None => DEFAULT_TIMEZONE,
        };

        Self {
            api: ApiConfig {
                base_url: lookup("BOOKING_API_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
                space_id: lookup("BOOKING_SPACE_ID").unwrap_or_else(|| DEFAULT_SPACE_ID.to_string()),
                category_id: lookup("BOOKING_CATEGORY_ID").unwrap_or_else(|| DEFAULT_CATEGORY_ID.to_string()),
                timezone,
                http_timeout: Duration::from_secs(
                    lookup("BOOKING_HTTP_TIMEOUT_SECS")
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(15),
                ),
                hidden_rooms: lookup("BOOKING_HIDDEN_ROOMS")
                    .unwrap_or_else(|| "HUBMIT".to_string())
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect(),
            },
            calendar: CalendarConfig {
                fetch_timeout: Duration::from_millis(
                    lookup("CALENDAR_FETCH_TIMEOUT_MS")
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(5000),
                ),
            },
            server: ServerConfig {
                host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: lookup("PORT").and_then(|s| s.parse().ok()).unwrap_or(11111),
            },
            data_dir: lookup("ROOMBOOK_DATA_DIR").map_or_else(
                || {
                    lookup("HOME").map_or_else(
                        || PathBuf::from(".roombook"),
                        |home| PathBuf::from(home).join(".config").join("roombook"),
                    )
                },
                PathBuf::from,
            ),
        }
    }

    /// Server bind address
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::default();
        assert_eq!(config.api.base_url, DEFAULT_API_URL);
        assert_eq!(config.api.timezone, chrono_tz::Europe::Paris);
        assert_eq!(config.api.hidden_rooms, vec!["HUBMIT".to_string()]);
        assert_eq!(config.calendar.fetch_timeout, Duration::from_secs(5));
        assert_eq!(config.bind_address(), "0.0.0.0:11111");
        assert_eq!(config.data_dir, PathBuf::from(".roombook"));
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = config(&[
            ("BOOKING_API_URL", "http://localhost:9000/"),
            ("BOOKING_TIMEZONE", "America/New_York"),
            ("BOOKING_HIDDEN_ROOMS", "HUBMIT, Phone Box ,"),
            ("CALENDAR_FETCH_TIMEOUT_MS", "250"),
            ("PORT", "8080"),
            ("HOME", "/home/ada"),
        ]);
        assert_eq!(config.api.base_url, "http://localhost:9000");
        assert_eq!(config.api.timezone, chrono_tz::America::New_York);
        assert_eq!(config.api.hidden_rooms, vec!["HUBMIT".to_string(), "Phone Box".to_string()]);
        assert_eq!(config.calendar.fetch_timeout, Duration::from_millis(250));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.data_dir, PathBuf::from("/home/ada/.config/roombook"));
    }

    #[test]
    fn bad_values_fall_back() {
        let config = config(&[("BOOKING_TIMEZONE", "Mars/Olympus"), ("PORT", "eleven")]);
        assert_eq!(config.api.timezone, DEFAULT_TIMEZONE);
        assert_eq!(config.server.port, 11111);
    }
}
