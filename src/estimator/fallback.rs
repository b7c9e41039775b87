//! Deterministic, offline distance and ETA approximation.
//!
//! Used whenever the routing backend cannot answer. Everything here is pure
//! apart from reading the clock for `eta_timestamp`.

use chrono::{DateTime, Duration, Utc};

use crate::geo::haversine_km;
use crate::models::coordinate::Coordinate;
use crate::models::estimate::{DistanceEstimate, EstimateSource, EtaBreakdown, Urgency};

const URBAN_RANGE_KM: f64 = 5.0;
const SUBURBAN_RANGE_KM: f64 = 15.0;
const URBAN_SPEED_KMH: f64 = 25.0;
const SUBURBAN_SPEED_KMH: f64 = 35.0;
const OPEN_ROAD_SPEED_KMH: f64 = 45.0;

const TRAFFIC_FACTOR: f64 = 1.3;

pub const BUFFER_MINUTES: i64 = 10;
pub const ASSIGNMENT_MINUTES: i64 = 5;
pub const PICKUP_MINUTES: i64 = 3;

pub const BASE_RATE_PER_KM: f64 = 50.0;

/// Average speed for a trip of the given length. Boundaries are inclusive.
pub fn speed_for_distance(distance_km: f64) -> f64 {
    if distance_km <= URBAN_RANGE_KM {
        URBAN_SPEED_KMH
    } else if distance_km <= SUBURBAN_RANGE_KM {
        SUBURBAN_SPEED_KMH
    } else {
        OPEN_ROAD_SPEED_KMH
    }
}

/// `now` plus `minutes`, or `None` when the instant is not representable.
pub fn eta_after(now: DateTime<Utc>, minutes: i64) -> Option<DateTime<Utc>> {
    Duration::try_minutes(minutes).and_then(|delta| now.checked_add_signed(delta))
}

pub fn local_estimate(origin: &Coordinate, destination: &Coordinate) -> DistanceEstimate {
    estimate_from_distance(haversine_km(origin, destination), Utc::now())
}

pub fn estimate_from_distance(distance_km: f64, now: DateTime<Utc>) -> DistanceEstimate {
    let speed_kmh = speed_for_distance(distance_km);
    let base_minutes = distance_km / speed_kmh * 60.0;
    let traffic_minutes = (base_minutes * TRAFFIC_FACTOR).round() as i64;

    let total_minutes = traffic_minutes + BUFFER_MINUTES + ASSIGNMENT_MINUTES + PICKUP_MINUTES;

    DistanceEstimate {
        distance_km,
        duration_minutes: base_minutes.round() as i64,
        duration_in_traffic_minutes: Some(traffic_minutes),
        source: EstimateSource::LocalFallback,
        eta_minutes: Some(total_minutes),
        eta_timestamp: eta_after(now, total_minutes),
        breakdown: Some(EtaBreakdown {
            travel_minutes: traffic_minutes,
            buffer_minutes: BUFFER_MINUTES,
            assignment_minutes: ASSIGNMENT_MINUTES,
            pickup_minutes: PICKUP_MINUTES,
            total_minutes,
            urgency_multiplier: 1.0,
        }),
    }
}

/// Scales a fallback ETA for the given urgency and re-stamps it against `now`.
/// The breakdown total follows the adjusted ETA.
pub fn apply_urgency(
    mut estimate: DistanceEstimate,
    urgency: Urgency,
    now: DateTime<Utc>,
) -> DistanceEstimate {
    let multiplier = urgency.eta_multiplier();
    let base_total = estimate
        .breakdown
        .as_ref()
        .map(|breakdown| breakdown.total_minutes)
        .or(estimate.eta_minutes)
        .unwrap_or(estimate.duration_minutes);

    let eta_minutes = (base_total as f64 * multiplier).round() as i64;

    estimate.eta_minutes = Some(eta_minutes);
    estimate.eta_timestamp = eta_after(now, eta_minutes);
    if let Some(breakdown) = estimate.breakdown.as_mut() {
        breakdown.total_minutes = eta_minutes;
        breakdown.urgency_multiplier = multiplier;
    }

    estimate
}

pub fn job_payment(distance_km: f64, urgency: Urgency) -> i64 {
    (distance_km * BASE_RATE_PER_KM * urgency.payment_multiplier()).round() as i64
}
