use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::backend::auth::TokenStore;
use crate::backend::error::ApiError;
use crate::backend::reporter::PositionReporter;
use crate::backend::types::{
    ApiEnvelope, LatLng, RemoteDistance, RemoteStatus, RiderStatusUpdate,
};
use crate::models::coordinate::Coordinate;
use crate::models::estimate::Urgency;
use crate::models::rider::RiderStatus;

/// HTTP client for the rider backend. The bearer token is read from the
/// token store on first use and kept for the lifetime of the client.
pub struct BackendClient {
    client: Client,
    base_url: String,
    token_store: Arc<dyn TokenStore>,
    token: OnceCell<Option<String>>,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, token_store: Arc<dyn TokenStore>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            base_url,
            token_store,
            token: OnceCell::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn calculate_distance(
        &self,
        origin: &Coordinate,
        destination: &Coordinate,
    ) -> Result<RemoteDistance, ApiError> {
        let query = route_query(origin, destination);
        self.fetch("/api/distance/calculate", &query).await
    }

    pub async fn distance_eta(
        &self,
        origin: &Coordinate,
        destination: &Coordinate,
        urgency: Urgency,
    ) -> Result<RemoteDistance, ApiError> {
        let mut query = route_query(origin, destination);
        query.push(("urgency", urgency.as_str().to_string()));
        self.fetch("/api/distance/eta", &query).await
    }

    pub async fn directions(
        &self,
        origin: &Coordinate,
        destination: &Coordinate,
    ) -> Result<RemoteDistance, ApiError> {
        let query = route_query(origin, destination);
        self.fetch("/api/distance/directions", &query).await
    }

    pub async fn distance_status(&self) -> Result<RemoteStatus, ApiError> {
        self.fetch("/api/distance/status", &[]).await
    }

    async fn fetch<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let request = self.request(Method::GET, path).await.query(query);
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status));
        }

        let envelope = response.json::<ApiEnvelope<T>>().await?;
        if !envelope.success {
            let message = envelope
                .error
                .map(|error| error.message)
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(ApiError::Unsuccessful(message));
        }

        envelope.data.ok_or(ApiError::MissingData)
    }

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, url);

        match self.bearer_token().await {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn bearer_token(&self) -> Option<String> {
        self.token
            .get_or_init(|| async {
                match self.token_store.load_token().await {
                    Ok(Some(token)) => {
                        debug!("auth token loaded");
                        Some(token)
                    }
                    Ok(None) => {
                        warn!("no auth token found; backend calls will be unauthenticated");
                        None
                    }
                    Err(err) => {
                        warn!(error = %err, "failed to load auth token; backend calls will be unauthenticated");
                        None
                    }
                }
            })
            .await
            .clone()
    }

    async fn send_report(
        &self,
        method: Method,
        path: &str,
        body: serde_json::Value,
    ) -> Result<(), ApiError> {
        let response = self.request(method, path).await.json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status));
        }

        Ok(())
    }
}

#[async_trait]
impl PositionReporter for BackendClient {
    async fn update_rider_status(
        &self,
        status: RiderStatus,
        coordinate: Coordinate,
    ) -> Result<(), ApiError> {
        let body = RiderStatusUpdate {
            status,
            location: LatLng::from(coordinate),
        };
        let body = serde_json::to_value(body)
            .map_err(|err| ApiError::Unsuccessful(format!("invalid status payload: {err}")))?;

        self.send_report(Method::PATCH, "/api/rider/status", body)
            .await
    }

    async fn track_location(&self, order_id: &str, coordinate: Coordinate) -> Result<(), ApiError> {
        let path = format!("/api/orders/{order_id}/track");
        let body = json!({
            "lat": coordinate.latitude,
            "lng": coordinate.longitude,
        });

        self.send_report(Method::POST, &path, body).await
    }
}

fn route_query(origin: &Coordinate, destination: &Coordinate) -> Vec<(&'static str, String)> {
    vec![
        ("origin_lat", origin.latitude.to_string()),
        ("origin_lng", origin.longitude.to_string()),
        ("destination_lat", destination.latitude.to_string()),
        ("destination_lng", destination.longitude.to_string()),
        ("mode", "driving".to_string()),
    ]
}
