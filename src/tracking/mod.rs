pub mod handler;
pub mod provider;
pub mod service;
pub mod simulated;

use std::time::Duration;

pub use provider::{
    BackgroundOptions, Freshness, LocationAccuracy, LocationProvider, PermissionStatus,
    PersistentNotice, PositionFeed, WatchOptions,
};
pub use service::{LocationTier, TrackingService, BACKGROUND_LOCATION_TASK};
pub use simulated::SimulatedLocationProvider;

#[derive(Debug, Clone, PartialEq)]
pub struct TrackingConfig {
    /// How long a fresh fix may take before recent cached fixes are accepted.
    pub fix_timeout: Duration,
    pub recent_fix: Freshness,
    pub report_interval: Duration,
    pub report_distance_m: f64,
    pub notice: PersistentNotice,
}

impl TrackingConfig {
    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            accuracy: LocationAccuracy::High,
            time_interval: self.report_interval,
            distance_interval_m: self.report_distance_m,
        }
    }

    pub fn background_options(&self) -> BackgroundOptions {
        BackgroundOptions {
            watch: self.watch_options(),
            notice: self.notice.clone(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            fix_timeout: Duration::from_secs(8),
            recent_fix: Freshness {
                max_age: Duration::from_secs(60),
                required_accuracy_m: 100.0,
            },
            report_interval: Duration::from_secs(30),
            report_distance_m: 50.0,
            notice: PersistentNotice {
                title: "Delivery in progress".to_string(),
                body: "Sharing your location with the lab while you deliver".to_string(),
            },
        }
    }
}
