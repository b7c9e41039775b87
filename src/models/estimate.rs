use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::coordinate::Coordinate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Urgency {
    #[default]
    Routine,
    Urgent,
    Emergency,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Routine => "ROUTINE",
            Urgency::Urgent => "URGENT",
            Urgency::Emergency => "EMERGENCY",
        }
    }

    /// Factor applied to a locally computed ETA.
    pub fn eta_multiplier(&self) -> f64 {
        match self {
            Urgency::Routine => 1.0,
            Urgency::Urgent => 0.8,
            Urgency::Emergency => 0.7,
        }
    }

    pub fn payment_multiplier(&self) -> f64 {
        match self {
            Urgency::Routine => 1.0,
            Urgency::Urgent => 1.5,
            Urgency::Emergency => 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EstimateSource {
    Remote,
    LocalFallback,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EtaBreakdown {
    pub travel_minutes: i64,
    pub buffer_minutes: i64,
    pub assignment_minutes: i64,
    pub pickup_minutes: i64,
    pub total_minutes: i64,
    pub urgency_multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DistanceEstimate {
    pub distance_km: f64,
    pub duration_minutes: i64,
    pub duration_in_traffic_minutes: Option<i64>,
    pub source: EstimateSource,
    pub eta_minutes: Option<i64>,
    pub eta_timestamp: Option<DateTime<Utc>>,
    pub breakdown: Option<EtaBreakdown>,
}

impl DistanceEstimate {
    pub fn distance_text(&self) -> String {
        let meters = (self.distance_km * 1000.0).round();
        if meters < 1000.0 {
            format!("{} m", meters as i64)
        } else {
            format!("{:.1} km", self.distance_km)
        }
    }

    pub fn duration_text(&self) -> String {
        format_minutes(self.duration_minutes)
    }
}

fn format_minutes(minutes: i64) -> String {
    let minutes = minutes.max(0);
    let unit = |n: i64, word: &str| {
        if n == 1 {
            format!("{n} {word}")
        } else {
            format!("{n} {word}s")
        }
    };

    if minutes < 60 {
        return unit(minutes, "min");
    }

    let hours = minutes / 60;
    let rest = minutes % 60;
    if rest == 0 {
        unit(hours, "hour")
    } else {
        format!("{} {}", unit(hours, "hour"), unit(rest, "min"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobCostEstimate {
    #[serde(flatten)]
    pub estimate: DistanceEstimate,
    pub urgency: Urgency,
    pub estimated_payment: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Directions {
    #[serde(flatten)]
    pub estimate: DistanceEstimate,
    pub route_points: Vec<Coordinate>,
    pub polyline: Option<String>,
    pub start_address: Option<String>,
    pub end_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderStatus {
    pub available: bool,
    pub configured: bool,
    pub provider: String,
}

impl ProviderStatus {
    pub fn local_fallback() -> Self {
        Self {
            available: false,
            configured: false,
            provider: "local_fallback".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate(distance_km: f64, duration_minutes: i64) -> DistanceEstimate {
        DistanceEstimate {
            distance_km,
            duration_minutes,
            duration_in_traffic_minutes: None,
            source: EstimateSource::Remote,
            eta_minutes: None,
            eta_timestamp: None,
            breakdown: None,
        }
    }

    #[test]
    fn short_distances_render_in_meters() {
        assert_eq!(estimate(0.85, 2).distance_text(), "850 m");
        assert_eq!(estimate(4.24, 10).distance_text(), "4.2 km");
    }

    #[test]
    fn distances_rounding_to_a_kilometre_switch_units() {
        assert_eq!(estimate(0.9994, 2).distance_text(), "999 m");
        assert_eq!(estimate(0.9996, 2).distance_text(), "1.0 km");
        assert_eq!(estimate(0.9999, 2).distance_text(), "1.0 km");
    }

    #[test]
    fn durations_render_hours_and_minutes() {
        assert_eq!(estimate(1.0, 1).duration_text(), "1 min");
        assert_eq!(estimate(1.0, 13).duration_text(), "13 mins");
        assert_eq!(estimate(1.0, 60).duration_text(), "1 hour");
        assert_eq!(estimate(1.0, 125).duration_text(), "2 hours 5 mins");
    }

    #[test]
    fn urgency_serializes_upper_case() {
        let raw = serde_json::to_string(&Urgency::Emergency).unwrap();
        assert_eq!(raw, "\"EMERGENCY\"");
        let parsed: Urgency = serde_json::from_str("\"URGENT\"").unwrap();
        assert_eq!(parsed, Urgency::Urgent);
    }
}
