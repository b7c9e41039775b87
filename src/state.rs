use std::sync::Arc;

use crate::estimator::DistanceEstimator;
use crate::observability::metrics::Metrics;
use crate::tracking::TrackingService;

pub struct AppState {
    pub estimator: Arc<DistanceEstimator>,
    pub tracker: Arc<TrackingService>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        estimator: Arc<DistanceEstimator>,
        tracker: Arc<TrackingService>,
        metrics: Metrics,
    ) -> Self {
        Self {
            estimator,
            tracker,
            metrics,
        }
    }
}
