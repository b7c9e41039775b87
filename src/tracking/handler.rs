use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::backend::PositionReporter;
use crate::models::coordinate::{Coordinate, Position};
use crate::models::rider::RiderStatus;
use crate::models::tracking::{TrackingEvent, TrackingOrigin, TrackingSession};
use crate::observability::metrics::Metrics;

/// Shared by the tracking service and its watch/background tasks. Reports
/// are spawned detached: a failure is logged and counted, nothing else.
#[derive(Clone)]
pub struct PositionHandler {
    reporter: Arc<dyn PositionReporter>,
    session: Arc<RwLock<TrackingSession>>,
    events_tx: broadcast::Sender<TrackingEvent>,
    metrics: Metrics,
}

impl PositionHandler {
    pub fn new(
        reporter: Arc<dyn PositionReporter>,
        session: Arc<RwLock<TrackingSession>>,
        events_tx: broadcast::Sender<TrackingEvent>,
        metrics: Metrics,
    ) -> Self {
        Self {
            reporter,
            session,
            events_tx,
            metrics,
        }
    }

    pub fn on_foreground(&self, position: Position) {
        self.remember(position);
        let order_id = self.current_order();

        self.report_status(RiderStatus::Available, position.coordinate);
        if let Some(order_id) = &order_id {
            self.report_order(order_id.clone(), position.coordinate);
        }

        self.publish(TrackingOrigin::Foreground, position, order_id);
    }

    pub fn on_background(&self, position: Position) {
        self.remember(position);
        let order_id = self.current_order();

        match &order_id {
            Some(order_id) => self.report_order(order_id.clone(), position.coordinate),
            None => debug!("background fix received with no active order"),
        }

        self.publish(TrackingOrigin::Background, position, order_id);
    }

    /// Last write wins.
    pub fn remember(&self, position: Position) {
        self.write_session().last_known_position = Some(position);
    }

    pub fn foreground_ended(&self) {
        self.write_session().is_foreground_active = false;
        self.metrics
            .tracking_active
            .with_label_values(&["foreground"])
            .set(0);
    }

    /// Returns the order that was being tracked.
    pub fn background_ended(&self) -> Option<String> {
        let order_id = {
            let mut session = self.write_session();
            session.is_background_active = false;
            session.order_id.take()
        };
        self.metrics
            .tracking_active
            .with_label_values(&["background"])
            .set(0);
        order_id
    }

    pub fn report_status(&self, status: RiderStatus, coordinate: Coordinate) {
        let reporter = self.reporter.clone();
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            let outcome = match reporter.update_rider_status(status, coordinate).await {
                Ok(()) => "ok",
                Err(err) => {
                    warn!(error = %err, status = status.as_str(), "rider status report failed");
                    "error"
                }
            };
            metrics
                .location_reports_total
                .with_label_values(&["rider_status", outcome])
                .inc();
        });
    }

    fn report_order(&self, order_id: String, coordinate: Coordinate) {
        let reporter = self.reporter.clone();
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            let outcome = match reporter.track_location(&order_id, coordinate).await {
                Ok(()) => "ok",
                Err(err) => {
                    warn!(error = %err, order_id = %order_id, "order position report failed");
                    "error"
                }
            };
            metrics
                .location_reports_total
                .with_label_values(&["order_position", outcome])
                .inc();
        });
    }

    fn current_order(&self) -> Option<String> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order_id
            .clone()
    }

    fn write_session(&self) -> RwLockWriteGuard<'_, TrackingSession> {
        self.session.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, origin: TrackingOrigin, position: Position, order_id: Option<String>) {
        let _ = self.events_tx.send(TrackingEvent {
            origin,
            position,
            order_id,
        });
    }
}
