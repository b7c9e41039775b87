pub mod fallback;

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::backend::{ApiError, BackendClient};
use crate::models::coordinate::Coordinate;
use crate::models::estimate::{
    Directions, DistanceEstimate, EstimateSource, JobCostEstimate, ProviderStatus, Urgency,
};
use crate::observability::metrics::Metrics;

pub use fallback::local_estimate;

/// Distance and ETA answers for the rider UI. Prefers the routing backend and
/// falls back to [`local_estimate`] on any failure, so every operation
/// returns a usable value.
pub struct DistanceEstimator {
    backend: Arc<BackendClient>,
    metrics: Metrics,
}

impl DistanceEstimator {
    pub fn new(backend: Arc<BackendClient>, metrics: Metrics) -> Self {
        Self { backend, metrics }
    }

    pub async fn estimate(&self, origin: &Coordinate, destination: &Coordinate) -> DistanceEstimate {
        let remote = self
            .backend
            .calculate_distance(origin, destination)
            .await
            .and_then(|remote| remote.to_estimate(Utc::now()));

        match remote {
            Ok(estimate) => {
                self.record("estimate", EstimateSource::Remote);
                estimate
            }
            Err(err) => {
                self.fall_back("estimate", &err);
                local_estimate(origin, destination)
            }
        }
    }

    pub async fn estimate_eta(
        &self,
        origin: &Coordinate,
        destination: &Coordinate,
        urgency: Urgency,
    ) -> DistanceEstimate {
        let remote = self
            .backend
            .distance_eta(origin, destination, urgency)
            .await
            .and_then(|remote| remote.to_estimate(Utc::now()));

        match remote {
            Ok(estimate) => {
                self.record("eta", EstimateSource::Remote);
                estimate
            }
            Err(err) => {
                self.fall_back("eta", &err);
                fallback::apply_urgency(local_estimate(origin, destination), urgency, Utc::now())
            }
        }
    }

    pub async fn estimate_job_cost(
        &self,
        pickup: &Coordinate,
        delivery: &Coordinate,
        urgency: Urgency,
    ) -> JobCostEstimate {
        let estimate = self.estimate(pickup, delivery).await;
        let estimated_payment = fallback::job_payment(estimate.distance_km, urgency);

        debug!(
            distance_km = estimate.distance_km,
            urgency = urgency.as_str(),
            estimated_payment,
            "job cost estimated"
        );

        JobCostEstimate {
            estimate,
            urgency,
            estimated_payment,
        }
    }

    pub async fn get_directions(&self, origin: &Coordinate, destination: &Coordinate) -> Directions {
        let remote = self
            .backend
            .directions(origin, destination)
            .await
            .and_then(|remote| Ok((remote.to_estimate(Utc::now())?, remote)));

        match remote {
            Ok((estimate, remote)) => {
                self.record("directions", EstimateSource::Remote);
                Directions {
                    estimate,
                    route_points: remote.route_points.unwrap_or_default(),
                    polyline: remote.polyline,
                    start_address: remote.start_address,
                    end_address: remote.end_address,
                }
            }
            Err(err) => {
                self.fall_back("directions", &err);
                Directions {
                    estimate: local_estimate(origin, destination),
                    route_points: vec![*origin, *destination],
                    polyline: None,
                    start_address: None,
                    end_address: None,
                }
            }
        }
    }

    pub async fn check_provider_status(&self) -> ProviderStatus {
        match self.backend.distance_status().await {
            Ok(status) => ProviderStatus {
                available: status.configured,
                configured: status.configured,
                provider: status.api_provider,
            },
            Err(err) => {
                warn!(error = %err, "routing provider status check failed");
                ProviderStatus::local_fallback()
            }
        }
    }

    fn fall_back(&self, operation: &'static str, err: &ApiError) {
        warn!(
            operation,
            error = %err,
            "routing backend unavailable; using local estimate"
        );
        self.record(operation, EstimateSource::LocalFallback);
    }

    fn record(&self, operation: &'static str, source: EstimateSource) {
        let source = match source {
            EstimateSource::Remote => "remote",
            EstimateSource::LocalFallback => "local_fallback",
        };
        self.metrics
            .estimates_total
            .with_label_values(&[operation, source])
            .inc();
    }
}
