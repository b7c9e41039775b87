use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::ApiError;
use crate::estimator::fallback::eta_after;
use crate::models::coordinate::Coordinate;
use crate::models::estimate::{DistanceEstimate, EstimateSource};
use crate::models::rider::RiderStatus;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
}

/// `data` of the distance, eta and directions endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteDistance {
    pub distance_km: f64,
    pub duration_minutes: f64,
    #[serde(default)]
    pub duration_in_traffic_minutes: Option<f64>,
    #[serde(default)]
    pub eta_minutes: Option<f64>,
    #[serde(default)]
    pub eta_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub route_points: Option<Vec<Coordinate>>,
    #[serde(default)]
    pub polyline: Option<String>,
    #[serde(default)]
    pub start_address: Option<String>,
    #[serde(default)]
    pub end_address: Option<String>,
}

impl RemoteDistance {
    /// Rejects negative or out-of-range minutes and ETAs that cannot be
    /// stamped, so the caller can fall back to the local estimate.
    pub fn to_estimate(&self, now: DateTime<Utc>) -> Result<DistanceEstimate, ApiError> {
        let eta_minutes = self
            .eta_minutes
            .map(|minutes| whole_minutes("eta_minutes", minutes))
            .transpose()?;
        let eta_timestamp = match (self.eta_timestamp, eta_minutes) {
            (Some(timestamp), _) => Some(timestamp),
            (None, Some(minutes)) => Some(eta_after(now, minutes).ok_or(ApiError::Malformed {
                field: "eta_minutes",
                value: minutes as f64,
            })?),
            (None, None) => None,
        };

        Ok(DistanceEstimate {
            distance_km: self.distance_km.max(0.0),
            duration_minutes: whole_minutes("duration_minutes", self.duration_minutes)?,
            duration_in_traffic_minutes: self
                .duration_in_traffic_minutes
                .map(|minutes| whole_minutes("duration_in_traffic_minutes", minutes))
                .transpose()?,
            source: EstimateSource::Remote,
            eta_minutes,
            eta_timestamp,
            breakdown: None,
        })
    }
}

fn whole_minutes(field: &'static str, value: f64) -> Result<i64, ApiError> {
    let rounded = value.round();
    if !rounded.is_finite() || rounded < 0.0 || rounded >= i64::MAX as f64 {
        return Err(ApiError::Malformed { field, value });
    }
    Ok(rounded as i64)
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteStatus {
    pub configured: bool,
    pub api_provider: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl From<Coordinate> for LatLng {
    fn from(coordinate: Coordinate) -> Self {
        Self {
            lat: coordinate.latitude,
            lng: coordinate.longitude,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RiderStatusUpdate {
    pub status: RiderStatus,
    pub location: LatLng,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn remote_eta_without_timestamp_is_stamped_locally() {
        let now = Utc::now();
        let payload: RemoteDistance = serde_json::from_value(json!({
            "distance_km": 12.4,
            "duration_minutes": 21.6,
            "eta_minutes": 30
        }))
        .unwrap();

        let estimate = payload.to_estimate(now).unwrap();
        assert_eq!(estimate.source, EstimateSource::Remote);
        assert_eq!(estimate.duration_minutes, 22);
        assert_eq!(estimate.eta_minutes, Some(30));
        assert_eq!(estimate.eta_timestamp, Some(now + chrono::Duration::minutes(30)));
        assert!(estimate.breakdown.is_none());
    }

    #[test]
    fn out_of_range_minutes_are_malformed() {
        let huge: RemoteDistance = serde_json::from_value(json!({
            "distance_km": 3.0,
            "duration_minutes": 9,
            "eta_minutes": 1e17
        }))
        .unwrap();
        assert!(matches!(
            huge.to_estimate(Utc::now()),
            Err(ApiError::Malformed { field: "eta_minutes", .. })
        ));

        let negative: RemoteDistance = serde_json::from_value(json!({
            "distance_km": 3.0,
            "duration_minutes": -4
        }))
        .unwrap();
        assert!(matches!(
            negative.to_estimate(Utc::now()),
            Err(ApiError::Malformed { field: "duration_minutes", .. })
        ));
    }

    #[test]
    fn envelope_tolerates_missing_data() {
        let envelope: ApiEnvelope<RemoteStatus> = serde_json::from_value(json!({
            "success": false,
            "error": { "message": "routing provider offline" }
        }))
        .unwrap();

        assert!(!envelope.success);
        assert!(envelope.data.is_none());
        assert_eq!(envelope.error.unwrap().message, "routing provider offline");
    }
}
