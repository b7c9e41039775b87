use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::models::coordinate::Coordinate;
use crate::models::estimate::{
    Directions, DistanceEstimate, JobCostEstimate, ProviderStatus, Urgency,
};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/distance/estimate", get(estimate))
        .route("/distance/eta", get(estimate_eta))
        .route("/distance/job-cost", get(estimate_job_cost))
        .route("/distance/directions", get(directions))
        .route("/distance/status", get(provider_status))
}

#[derive(Debug, Deserialize)]
pub struct RouteQuery {
    pub origin_lat: f64,
    pub origin_lng: f64,
    pub destination_lat: f64,
    pub destination_lng: f64,
    #[serde(default)]
    pub urgency: Urgency,
}

impl RouteQuery {
    fn origin(&self) -> Coordinate {
        Coordinate::new(self.origin_lat, self.origin_lng)
    }

    fn destination(&self) -> Coordinate {
        Coordinate::new(self.destination_lat, self.destination_lng)
    }
}

#[derive(Serialize)]
pub struct EstimateResponse {
    #[serde(flatten)]
    pub estimate: DistanceEstimate,
    pub distance_text: String,
    pub duration_text: String,
}

impl From<DistanceEstimate> for EstimateResponse {
    fn from(estimate: DistanceEstimate) -> Self {
        Self {
            distance_text: estimate.distance_text(),
            duration_text: estimate.duration_text(),
            estimate,
        }
    }
}

async fn estimate(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RouteQuery>,
) -> Json<EstimateResponse> {
    let estimate = state
        .estimator
        .estimate(&query.origin(), &query.destination())
        .await;
    Json(estimate.into())
}

async fn estimate_eta(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RouteQuery>,
) -> Json<EstimateResponse> {
    let estimate = state
        .estimator
        .estimate_eta(&query.origin(), &query.destination(), query.urgency)
        .await;
    Json(estimate.into())
}

async fn estimate_job_cost(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RouteQuery>,
) -> Json<JobCostEstimate> {
    let cost = state
        .estimator
        .estimate_job_cost(&query.origin(), &query.destination(), query.urgency)
        .await;
    Json(cost)
}

async fn directions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RouteQuery>,
) -> Json<Directions> {
    let directions = state
        .estimator
        .get_directions(&query.origin(), &query.destination())
        .await;
    Json(directions)
}

async fn provider_status(State(state): State<Arc<AppState>>) -> Json<ProviderStatus> {
    Json(state.estimator.check_provider_status().await)
}
