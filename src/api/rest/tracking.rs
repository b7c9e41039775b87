use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Serialize;

use crate::error::AppError;
use crate::models::coordinate::Position;
use crate::models::tracking::{TrackingSession, TrackingState};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/location/current", get(current_location))
        .route("/tracking", get(tracking_status))
        .route("/tracking/start", post(start_tracking))
        .route("/tracking/stop", post(stop_tracking))
        .route("/tracking/orders/stop", post(stop_order_tracking))
        .route("/tracking/orders/:order_id/start", post(start_order_tracking))
        .route("/tracking/orders/:order_id/complete", post(complete_delivery))
}

#[derive(Serialize)]
pub struct TrackingStatusResponse {
    pub state: TrackingState,
    #[serde(flatten)]
    pub session: TrackingSession,
}

#[derive(Serialize)]
pub struct StartResponse {
    pub started: bool,
    pub state: TrackingState,
    pub order_id: Option<String>,
}

#[derive(Serialize)]
pub struct CompleteResponse {
    pub stopped: bool,
    pub state: TrackingState,
}

fn status_of(state: &AppState) -> TrackingStatusResponse {
    let session = state.tracker.session();
    TrackingStatusResponse {
        state: session.state(),
        session,
    }
}

fn start_response(state: &AppState, started: bool) -> StartResponse {
    StartResponse {
        started,
        state: state.tracker.state(),
        order_id: state.tracker.tracking_order_id(),
    }
}

async fn current_location(State(state): State<Arc<AppState>>) -> Result<Json<Position>, AppError> {
    state
        .tracker
        .get_current_location()
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound("no location available".to_string()))
}

async fn tracking_status(State(state): State<Arc<AppState>>) -> Json<TrackingStatusResponse> {
    Json(status_of(&state))
}

async fn start_tracking(State(state): State<Arc<AppState>>) -> Json<StartResponse> {
    let started = state.tracker.start_tracking().await;
    Json(start_response(&state, started))
}

async fn stop_tracking(State(state): State<Arc<AppState>>) -> Json<TrackingStatusResponse> {
    state.tracker.stop_tracking().await;
    Json(status_of(&state))
}

async fn start_order_tracking(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Json<StartResponse>, AppError> {
    let order_id = order_id.trim();
    if order_id.is_empty() {
        return Err(AppError::BadRequest("order id cannot be empty".to_string()));
    }

    let started = state
        .tracker
        .start_background_order_tracking(order_id)
        .await;
    Ok(Json(start_response(&state, started)))
}

async fn stop_order_tracking(State(state): State<Arc<AppState>>) -> Json<TrackingStatusResponse> {
    state.tracker.stop_background_order_tracking().await;
    Json(status_of(&state))
}

async fn complete_delivery(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Json<CompleteResponse> {
    let stopped = state.tracker.complete_delivery(&order_id).await;
    Json(CompleteResponse {
        stopped,
        state: state.tracker.state(),
    })
}
