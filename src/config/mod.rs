//! Configuration module for the atlas application.
//!
//! Values are read from raw environment variables (after `.env` is loaded),
//! with a default for every field so the service starts with no configuration.

use fundu::{DurationParser, TimeUnit};
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration containing all sub-configurations
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Log level for the application
    ///
    /// This value is used to set the log level for this application's target
    /// specifically. e.g. "debug" would be similar to "warn,atlas=debug,..."
    ///
    /// Valid values are: "trace", "debug", "info", "warn", "error"
    /// Defaults to "info" if not specified
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Port for the web server (default: 8080)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Graceful shutdown timeout duration
    ///
    /// Accepts both numeric values (seconds) and duration strings
    /// Defaults to 8 seconds if not specified
    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub shutdown_timeout: Duration,

    #[serde(default = "default_countries_base_url")]
    pub countries_base_url: String,
    #[serde(default = "default_weather_base_url")]
    pub weather_base_url: String,
    /// Weather lookups are skipped when unset.
    #[serde(default)]
    pub weather_api_key: Option<String>,
    #[serde(default = "default_unsplash_base_url")]
    pub unsplash_base_url: String,
    /// Photo search is skipped when unset.
    #[serde(default)]
    pub unsplash_access_key: Option<String>,
    #[serde(default = "default_wikipedia_base_url")]
    pub wikipedia_base_url: String,

    /// How long the sorted country directory is served from cache (default: 24h)
    #[serde(
        default = "default_directory_ttl",
        deserialize_with = "deserialize_duration"
    )]
    pub directory_ttl: Duration,
    /// Quiet period before typed search text commits (default: 300ms)
    #[serde(
        default = "default_search_debounce",
        deserialize_with = "deserialize_duration"
    )]
    pub search_debounce: Duration,
    /// Directory for per-user saved-country files
    #[serde(default = "default_saved_countries_dir")]
    pub saved_countries_dir: PathBuf,
    /// Request header carrying the authenticated user's email, set by the auth proxy
    #[serde(default = "default_identity_header")]
    pub identity_header: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(8)
}

fn default_countries_base_url() -> String {
    crate::upstream::countries::DEFAULT_BASE_URL.to_string()
}

fn default_weather_base_url() -> String {
    crate::upstream::weather::DEFAULT_BASE_URL.to_string()
}

fn default_unsplash_base_url() -> String {
    crate::upstream::photos::DEFAULT_BASE_URL.to_string()
}

fn default_wikipedia_base_url() -> String {
    crate::upstream::encyclopedia::DEFAULT_BASE_URL.to_string()
}

fn default_directory_ttl() -> Duration {
    crate::countries::directory::DEFAULT_TTL
}

fn default_search_debounce() -> Duration {
    crate::sync::synchronizer::DEFAULT_DEBOUNCE
}

fn default_saved_countries_dir() -> PathBuf {
    PathBuf::from("data/saved")
}

fn default_identity_header() -> String {
    "x-auth-request-email".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            port: default_port(),
            shutdown_timeout: default_shutdown_timeout(),
            countries_base_url: default_countries_base_url(),
            weather_base_url: default_weather_base_url(),
            weather_api_key: None,
            unsplash_base_url: default_unsplash_base_url(),
            unsplash_access_key: None,
            wikipedia_base_url: default_wikipedia_base_url(),
            directory_ttl: default_directory_ttl(),
            search_debounce: default_search_debounce(),
            saved_countries_dir: default_saved_countries_dir(),
            identity_header: default_identity_header(),
        }
    }
}

/// Time units accepted in duration values; bare numbers are seconds.
const DURATION_UNITS: &[TimeUnit] = &[
    TimeUnit::MilliSecond,
    TimeUnit::Second,
    TimeUnit::Minute,
    TimeUnit::Hour,
    TimeUnit::Day,
];

/// Parse a human duration such as `300ms`, `90s`, `24h` or a bare number of seconds.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let parsed = DurationParser::with_time_units(DURATION_UNITS)
        .parse(value.trim())
        .map_err(|e| format!("Invalid duration format '{value}': {e}"))?;
    Duration::try_from(parsed).map_err(|e| format!("Duration '{value}' out of range: {e}"))
}

/// Custom deserializer for duration fields that accepts both numeric and string values
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Visitor;

    struct DurationVisitor;

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a duration string or number")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            parse_duration(value).map_err(serde::de::Error::custom)
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Duration::from_secs(value))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            u64::try_from(value)
                .map(Duration::from_secs)
                .map_err(|_| serde::de::Error::custom("Duration cannot be negative"))
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}
