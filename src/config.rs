use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;
use crate::models::coordinate::Coordinate;
use crate::tracking::TrackingConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub api_base_url: String,
    pub auth_token_file: Option<PathBuf>,
    pub auth_token: Option<String>,
    pub location_fix_timeout_ms: u64,
    pub report_interval_secs: u64,
    pub report_distance_meters: f64,
    pub event_buffer_size: usize,
    pub simulated_position: Option<Coordinate>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let simulated_lat: Option<f64> = parse_optional(&lookup, "SIMULATED_LAT")?;
        let simulated_lng: Option<f64> = parse_optional(&lookup, "SIMULATED_LNG")?;
        let simulated_position = match (simulated_lat, simulated_lng) {
            (Some(lat), Some(lng)) => Some(Coordinate::new(lat, lng)),
            (None, None) => None,
            _ => {
                return Err(AppError::Internal(
                    "SIMULATED_LAT and SIMULATED_LNG must be set together".to_string(),
                ))
            }
        };

        Ok(Self {
            http_port: parse_or_default(&lookup, "HTTP_PORT", 7070)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            api_base_url: lookup("API_BASE_URL")
                .unwrap_or_else(|| "http://localhost:8000".to_string()),
            auth_token_file: lookup("AUTH_TOKEN_FILE").map(PathBuf::from),
            auth_token: lookup("AUTH_TOKEN").filter(|token| !token.trim().is_empty()),
            location_fix_timeout_ms: parse_or_default(&lookup, "LOCATION_FIX_TIMEOUT_MS", 8_000)?,
            report_interval_secs: parse_or_default(&lookup, "REPORT_INTERVAL_SECS", 30)?,
            report_distance_meters: parse_or_default(&lookup, "REPORT_DISTANCE_METERS", 50.0)?,
            event_buffer_size: parse_or_default(&lookup, "EVENT_BUFFER_SIZE", 256)?,
            simulated_position,
        })
    }

    pub fn tracking(&self) -> TrackingConfig {
        TrackingConfig {
            fix_timeout: Duration::from_millis(self.location_fix_timeout_ms),
            report_interval: Duration::from_secs(self.report_interval_secs),
            report_distance_m: self.report_distance_meters,
            ..TrackingConfig::default()
        }
    }
}

fn parse_or_default<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_optional(lookup, key)?.unwrap_or(default))
}

fn parse_optional<F, T>(lookup: &F, key: &str) -> Result<Option<T>, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        None => Ok(None),
    }
}
