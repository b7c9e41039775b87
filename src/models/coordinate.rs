use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A WGS84 point in degrees. Values are not range-checked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A fix as delivered by a location provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub coordinate: Coordinate,
    pub accuracy_m: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

impl Position {
    pub fn new(coordinate: Coordinate, accuracy_m: Option<f64>) -> Self {
        Self {
            coordinate,
            accuracy_m,
            recorded_at: Utc::now(),
        }
    }
}
