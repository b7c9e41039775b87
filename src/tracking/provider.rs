use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::LocationError;
use crate::models::coordinate::Position;

/// Positions delivered in chronological order. Dropping the receiver ends
/// the subscription.
pub type PositionFeed = mpsc::Receiver<Position>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationAccuracy {
    Balanced,
    High,
}

/// Bounds for accepting a cached device fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Freshness {
    pub max_age: Duration,
    pub required_accuracy_m: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchOptions {
    pub accuracy: LocationAccuracy,
    pub time_interval: Duration,
    pub distance_interval_m: f64,
}

/// Notice the OS shows while location is collected in the background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistentNotice {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundOptions {
    pub watch: WatchOptions,
    pub notice: PersistentNotice,
}

/// Device location services: permissions, one-shot fixes, a foreground watch
/// and OS-managed background updates registered under a task name.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn request_foreground_permission(&self) -> Result<PermissionStatus, LocationError>;

    async fn request_background_permission(&self) -> Result<PermissionStatus, LocationError>;

    async fn current_position(&self, accuracy: LocationAccuracy)
        -> Result<Position, LocationError>;

    /// Last fix the device already holds. With `freshness`, older or less
    /// accurate fixes are rejected.
    async fn last_known_position(
        &self,
        freshness: Option<Freshness>,
    ) -> Result<Option<Position>, LocationError>;

    async fn watch_position(&self, options: WatchOptions) -> Result<PositionFeed, LocationError>;

    async fn start_background_updates(
        &self,
        task_name: &str,
        options: BackgroundOptions,
    ) -> Result<PositionFeed, LocationError>;

    async fn stop_background_updates(&self, task_name: &str) -> Result<(), LocationError>;
}
