mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use rider_core::api::rest::router;
use rider_core::backend::{BackendClient, StaticTokenStore};
use rider_core::estimator::DistanceEstimator;
use rider_core::models::coordinate::Coordinate;
use rider_core::models::tracking::TrackingState;
use rider_core::observability::metrics::Metrics;
use rider_core::state::AppState;
use rider_core::tracking::{PermissionStatus, SimulatedLocationProvider, TrackingService};
use serde_json::Value;
use tower::ServiceExt;
use wiremock::MockServer;

use common::{depot, fast_config, RecordingReporter};

struct TestApp {
    app: axum::Router,
    provider: Arc<SimulatedLocationProvider>,
    tracker: Arc<TrackingService>,
    _backend: MockServer,
}

/// Backend with no routes mounted: every distance call answers 404.
async fn setup(start: Option<Coordinate>) -> TestApp {
    let backend_server = MockServer::start().await;
    let backend = Arc::new(BackendClient::new(
        backend_server.uri(),
        Arc::new(StaticTokenStore::default()),
    ));

    let metrics = Metrics::new();
    let estimator = Arc::new(DistanceEstimator::new(backend, metrics.clone()));

    let provider = Arc::new(SimulatedLocationProvider::new(start));
    let (reporter, _reports) = RecordingReporter::new(false);
    let tracker = Arc::new(TrackingService::new(
        provider.clone(),
        reporter,
        fast_config(),
        64,
        metrics.clone(),
    ));

    let state = AppState::new(estimator, tracker.clone(), metrics);

    TestApp {
        app: router(Arc::new(state)),
        provider,
        tracker,
        _backend: backend_server,
    }
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

const ROUTE: &str =
    "origin_lat=-1.2864&origin_lng=36.8172&destination_lat=-1.2864&destination_lng=36.8172";

#[tokio::test]
async fn health_returns_ok() {
    let t = setup(Some(depot())).await;
    let response = t.app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["tracking"], "idle");
    assert_eq!(body["tracking_order"], false);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let t = setup(Some(depot())).await;

    let estimate = t
        .app
        .clone()
        .oneshot(get_request(&format!("/distance/estimate?{ROUTE}")))
        .await
        .unwrap();
    assert_eq!(estimate.status(), StatusCode::OK);

    let response = t.app.oneshot(get_request("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("estimates_total"));
    assert!(body.contains("local_fallback"));
}

#[tokio::test]
async fn estimate_for_same_point_falls_back_with_fixed_overhead() {
    let t = setup(Some(depot())).await;
    let response = t
        .app
        .oneshot(get_request(&format!("/distance/estimate?{ROUTE}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["source"], "local_fallback");
    assert_eq!(body["distance_km"], 0.0);
    assert_eq!(body["eta_minutes"], 18);
    assert_eq!(body["breakdown"]["total_minutes"], 18);
    assert_eq!(body["distance_text"], "0 m");
    assert_eq!(body["duration_text"], "0 mins");
}

#[tokio::test]
async fn eta_applies_urgency_on_fallback() {
    let t = setup(Some(depot())).await;
    let response = t
        .app
        .oneshot(get_request(&format!(
            "/distance/eta?{ROUTE}&urgency=EMERGENCY"
        )))
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(body["eta_minutes"], 13);
    assert_eq!(body["breakdown"]["urgency_multiplier"], 0.7);
}

#[tokio::test]
async fn job_cost_and_directions_answer_offline() {
    let t = setup(Some(depot())).await;

    let cost = t
        .app
        .clone()
        .oneshot(get_request(&format!("/distance/job-cost?{ROUTE}&urgency=URGENT")))
        .await
        .unwrap();
    let cost = body_json(cost).await;
    assert_eq!(cost["estimated_payment"], 0);
    assert_eq!(cost["urgency"], "URGENT");

    let directions = t
        .app
        .oneshot(get_request(&format!("/distance/directions?{ROUTE}")))
        .await
        .unwrap();
    let directions = body_json(directions).await;
    assert_eq!(directions["route_points"].as_array().unwrap().len(), 2);
    assert!(directions["polyline"].is_null());
}

#[tokio::test]
async fn missing_coordinates_return_400() {
    let t = setup(Some(depot())).await;
    let response = t
        .app
        .oneshot(get_request("/distance/estimate?origin_lat=1.0"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn provider_status_reports_local_fallback_when_backend_is_down() {
    let t = setup(Some(depot())).await;
    let response = t
        .app
        .oneshot(get_request("/distance/status"))
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(body["available"], false);
    assert_eq!(body["provider"], "local_fallback");
}

#[tokio::test]
async fn tracking_lifecycle_over_http() {
    let t = setup(Some(depot())).await;

    let started = t
        .app
        .clone()
        .oneshot(post_request("/tracking/start"))
        .await
        .unwrap();
    let started = body_json(started).await;
    assert_eq!(started["started"], true);
    assert_eq!(started["state"], "foreground_only");

    let order = t
        .app
        .clone()
        .oneshot(post_request("/tracking/orders/ord-21/start"))
        .await
        .unwrap();
    let order = body_json(order).await;
    assert_eq!(order["started"], true);
    assert_eq!(order["order_id"], "ord-21");
    assert_eq!(order["state"], "foreground_and_background");

    let status = t
        .app
        .clone()
        .oneshot(get_request("/tracking"))
        .await
        .unwrap();
    let status = body_json(status).await;
    assert_eq!(status["order_id"], "ord-21");
    assert_eq!(status["is_background_active"], true);

    let completed = t
        .app
        .clone()
        .oneshot(post_request("/tracking/orders/ord-21/complete"))
        .await
        .unwrap();
    let completed = body_json(completed).await;
    assert_eq!(completed["stopped"], true);
    assert_eq!(completed["state"], "foreground_only");

    let stopped = t
        .app
        .oneshot(post_request("/tracking/stop"))
        .await
        .unwrap();
    let stopped = body_json(stopped).await;
    assert_eq!(stopped["state"], "idle");
    assert!(stopped["order_id"].is_null());

    assert_eq!(t.provider.watch_subscriptions(), 1);
}

#[tokio::test]
async fn denied_permission_is_reported_not_raised() {
    let t = setup(Some(depot())).await;
    t.provider
        .set_permissions(PermissionStatus::Denied, PermissionStatus::Denied);

    let response = t
        .app
        .clone()
        .oneshot(post_request("/tracking/start"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["started"], false);
    assert_eq!(body["state"], "idle");

    let location = t
        .app
        .oneshot(get_request("/location/current"))
        .await
        .unwrap();
    assert_eq!(location.status(), StatusCode::OK);
    let location = body_json(location).await;
    assert_eq!(location["coordinate"]["latitude"], -1.2864);
}

#[tokio::test]
async fn current_location_is_404_when_nothing_is_known() {
    let t = setup(None).await;
    t.provider
        .set_fix_behaviour(std::time::Duration::ZERO, false);

    let response = t
        .app
        .oneshot(get_request("/location/current"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(!t.tracker.is_tracking_order());
}

#[tokio::test]
async fn stopping_order_tracking_without_session_is_ok() {
    let t = setup(Some(depot())).await;

    let response = t
        .app
        .oneshot(post_request("/tracking/orders/stop"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["state"], "idle");
    assert!(body["order_id"].is_null());
}

#[tokio::test]
async fn health_reflects_feeds_that_ended_on_their_own() {
    let t = setup(Some(depot())).await;

    assert!(t.tracker.start_tracking().await);
    assert!(t.tracker.start_background_order_tracking("ord-30").await);

    t.provider.interrupt_feeds();
    let tracker = t.tracker.clone();
    common::eventually(move || tracker.state() == TrackingState::Idle).await;

    let health = t
        .app
        .clone()
        .oneshot(get_request("/health"))
        .await
        .unwrap();
    let health = body_json(health).await;
    assert_eq!(health["tracking"], "idle");
    assert_eq!(health["tracking_order"], false);

    let metrics = t.app.oneshot(get_request("/metrics")).await.unwrap();
    let metrics = body_string(metrics).await;
    assert!(metrics.contains("tracking_active{mode=\"foreground\"} 0"));
    assert!(metrics.contains("tracking_active{mode=\"background\"} 0"));
}
