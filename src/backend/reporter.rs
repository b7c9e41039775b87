use async_trait::async_trait;

use crate::backend::error::ApiError;
use crate::models::coordinate::Coordinate;
use crate::models::rider::RiderStatus;

/// Sink for rider position reports. Callers treat every call as
/// fire-and-forget.
#[async_trait]
pub trait PositionReporter: Send + Sync {
    async fn update_rider_status(
        &self,
        status: RiderStatus,
        coordinate: Coordinate,
    ) -> Result<(), ApiError>;

    async fn track_location(&self, order_id: &str, coordinate: Coordinate) -> Result<(), ApiError>;
}
