#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rider_core::backend::{ApiError, PositionReporter};
use rider_core::models::coordinate::Coordinate;
use rider_core::models::rider::RiderStatus;
use rider_core::observability::metrics::Metrics;
use rider_core::tracking::{SimulatedLocationProvider, TrackingConfig, TrackingService};
use tokio::sync::{mpsc, Mutex};

pub const WAIT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Status(RiderStatus, Coordinate),
    Order(String, Coordinate),
}

/// Records every report; optionally fails all of them after recording.
pub struct RecordingReporter {
    tx: mpsc::UnboundedSender<Report>,
    fail: bool,
}

impl RecordingReporter {
    pub fn new(fail: bool) -> (Arc<Self>, Reports) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx, fail }), Reports(Mutex::new(rx)))
    }

    fn outcome(&self) -> Result<(), ApiError> {
        if self.fail {
            Err(ApiError::Unsuccessful("backend offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PositionReporter for RecordingReporter {
    async fn update_rider_status(
        &self,
        status: RiderStatus,
        coordinate: Coordinate,
    ) -> Result<(), ApiError> {
        let _ = self.tx.send(Report::Status(status, coordinate));
        self.outcome()
    }

    async fn track_location(&self, order_id: &str, coordinate: Coordinate) -> Result<(), ApiError> {
        let _ = self.tx.send(Report::Order(order_id.to_string(), coordinate));
        self.outcome()
    }
}

pub struct Reports(Mutex<mpsc::UnboundedReceiver<Report>>);

impl Reports {
    /// Waits until a report matching `predicate` arrives, skipping others.
    pub async fn wait_for(&self, predicate: impl Fn(&Report) -> bool) -> Report {
        let mut rx = self.0.lock().await;
        tokio::time::timeout(WAIT, async {
            loop {
                let report = rx.recv().await.expect("reporter dropped");
                if predicate(&report) {
                    return report;
                }
            }
        })
        .await
        .expect("timed out waiting for report")
    }
}

pub fn depot() -> Coordinate {
    Coordinate::new(-1.2864, 36.8172)
}

/// Roughly 1.1 km north of the depot.
pub fn clinic() -> Coordinate {
    Coordinate::new(-1.2764, 36.8172)
}

pub fn fast_config() -> TrackingConfig {
    TrackingConfig {
        fix_timeout: Duration::from_millis(100),
        ..TrackingConfig::default()
    }
}

pub struct Harness {
    pub provider: Arc<SimulatedLocationProvider>,
    pub tracker: TrackingService,
    pub reports: Reports,
}

pub fn harness(start: Option<Coordinate>, failing_reports: bool) -> Harness {
    let provider = Arc::new(SimulatedLocationProvider::new(start));
    let (reporter, reports) = RecordingReporter::new(failing_reports);
    let tracker = TrackingService::new(
        provider.clone(),
        reporter,
        fast_config(),
        64,
        Metrics::new(),
    );

    Harness {
        provider,
        tracker,
        reports,
    }
}

pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
