use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::backend::PositionReporter;
use crate::error::LocationError;
use crate::models::coordinate::Position;
use crate::models::rider::RiderStatus;
use crate::models::tracking::{TrackingEvent, TrackingSession, TrackingState};
use crate::observability::metrics::Metrics;
use crate::tracking::handler::PositionHandler;
use crate::tracking::provider::{
    LocationAccuracy, LocationProvider, PermissionStatus, PositionFeed,
};
use crate::tracking::TrackingConfig;

/// Name the background location task is registered under.
pub const BACKGROUND_LOCATION_TASK: &str = "rider-background-location";

/// Sources consulted by [`TrackingService::get_current_location`], in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationTier {
    /// Fresh fix raced against the fix timeout, then a recent device fix.
    FreshFix,
    CachedPosition,
    DeviceLastKnown,
}

impl LocationTier {
    pub const ORDER: [LocationTier; 3] = [
        LocationTier::FreshFix,
        LocationTier::CachedPosition,
        LocationTier::DeviceLastKnown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LocationTier::FreshFix => "fresh_fix",
            LocationTier::CachedPosition => "cached_position",
            LocationTier::DeviceLastKnown => "device_last_known",
        }
    }
}

struct ForegroundWatch {
    id: Uuid,
    task: JoinHandle<()>,
}

struct BackgroundRegistration {
    id: Uuid,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct TrackingTasks {
    foreground: Option<ForegroundWatch>,
    background: Option<BackgroundRegistration>,
}

/// Owns the single tracking session: the foreground watch, the background
/// order-reporting task and the cached last position.
pub struct TrackingService {
    provider: Arc<dyn LocationProvider>,
    config: TrackingConfig,
    session: Arc<RwLock<TrackingSession>>,
    handler: PositionHandler,
    events_tx: broadcast::Sender<TrackingEvent>,
    tasks: Arc<Mutex<TrackingTasks>>,
    metrics: Metrics,
}

impl TrackingService {
    pub fn new(
        provider: Arc<dyn LocationProvider>,
        reporter: Arc<dyn PositionReporter>,
        config: TrackingConfig,
        event_buffer_size: usize,
        metrics: Metrics,
    ) -> Self {
        let session = Arc::new(RwLock::new(TrackingSession::default()));
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));
        let handler = PositionHandler::new(
            reporter,
            session.clone(),
            events_tx.clone(),
            metrics.clone(),
        );

        Self {
            provider,
            config,
            session,
            handler,
            events_tx,
            tasks: Arc::new(Mutex::new(TrackingTasks::default())),
            metrics,
        }
    }

    /// Foreground permission is required; background permission is only
    /// requested.
    pub async fn request_permissions(&self) -> bool {
        match self.provider.request_foreground_permission().await {
            Ok(PermissionStatus::Granted) => {}
            Ok(status) => {
                warn!(?status, "foreground location permission not granted");
                return false;
            }
            Err(err) => {
                warn!(error = %err, "foreground location permission request failed");
                return false;
            }
        }

        match self.provider.request_background_permission().await {
            Ok(PermissionStatus::Granted) => debug!("background location permission granted"),
            Ok(status) => info!(?status, "background location permission not granted"),
            Err(err) => warn!(error = %err, "background location permission request failed"),
        }

        true
    }

    pub async fn get_current_location(&self) -> Option<Position> {
        for tier in LocationTier::ORDER {
            match self.resolve_tier(tier).await {
                Ok(Some(position)) => {
                    self.metrics
                        .location_tier_total
                        .with_label_values(&[tier.as_str()])
                        .inc();
                    self.handler.remember(position);
                    return Some(position);
                }
                Ok(None) => debug!(tier = tier.as_str(), "location tier had no position"),
                Err(err) => warn!(tier = tier.as_str(), error = %err, "location tier failed"),
            }
        }

        self.metrics
            .location_tier_total
            .with_label_values(&["none"])
            .inc();
        warn!("no location available from any source");
        None
    }

    async fn resolve_tier(&self, tier: LocationTier) -> Result<Option<Position>, LocationError> {
        match tier {
            LocationTier::FreshFix => self.fresh_or_recent_fix().await,
            LocationTier::CachedPosition => Ok(self.session().last_known_position),
            LocationTier::DeviceLastKnown => self.provider.last_known_position(None).await,
        }
    }

    async fn fresh_or_recent_fix(&self) -> Result<Option<Position>, LocationError> {
        let fix = self.provider.current_position(LocationAccuracy::High);

        match tokio::time::timeout(self.config.fix_timeout, fix).await {
            Ok(result) => result.map(Some),
            Err(_) => {
                debug!(
                    timeout_ms = self.config.fix_timeout.as_millis() as u64,
                    "fresh fix timed out; accepting a recent device fix"
                );
                self.provider
                    .last_known_position(Some(self.config.recent_fix))
                    .await
            }
        }
    }

    /// Starts the foreground watch. Calling it while already tracking is a
    /// no-op that returns `true`.
    pub async fn start_tracking(&self) -> bool {
        let mut tasks = self.tasks.lock().await;

        if let Some(watch) = &tasks.foreground {
            if !watch.task.is_finished() {
                debug!("foreground tracking already running");
                return true;
            }
            warn!("foreground watch ended on its own; restarting");
            tasks.foreground = None;
        }

        if !self.request_permissions().await {
            return false;
        }

        match self.get_current_location().await {
            Some(position) => self
                .handler
                .report_status(RiderStatus::Available, position.coordinate),
            None => warn!("no initial position; waiting for the watch"),
        }

        let feed = match self
            .provider
            .watch_position(self.config.watch_options())
            .await
        {
            Ok(feed) => feed,
            Err(err) => {
                error!(error = %err, "failed to start foreground location watch");
                return false;
            }
        };

        let id = Uuid::new_v4();
        let watch = run_foreground_watch(feed, self.handler.clone(), self.tasks.clone(), id);
        let task = tokio::spawn(watch.instrument(info_span!("foreground_watch", watch_id = %id)));
        tasks.foreground = Some(ForegroundWatch { id, task });

        self.update_session(|session| session.is_foreground_active = true);
        self.metrics
            .tracking_active
            .with_label_values(&["foreground"])
            .set(1);

        info!(
            interval_secs = self.config.report_interval.as_secs(),
            distance_m = self.config.report_distance_m,
            "foreground tracking started"
        );
        true
    }

    pub async fn stop_tracking(&self) {
        let mut tasks = self.tasks.lock().await;

        let Some(watch) = tasks.foreground.take() else {
            debug!("foreground tracking not running");
            return;
        };

        watch.task.abort();
        self.update_session(|session| session.is_foreground_active = false);
        self.metrics
            .tracking_active
            .with_label_values(&["foreground"])
            .set(0);

        info!("foreground tracking stopped");
    }

    /// Points background reporting at `order_id`. An existing registration
    /// is re-targeted rather than duplicated.
    pub async fn start_background_order_tracking(&self, order_id: impl Into<String>) -> bool {
        let order_id = order_id.into();
        let mut tasks = self.tasks.lock().await;

        if !self.request_permissions().await {
            return false;
        }

        let previous = self.update_session(|session| session.order_id.replace(order_id.clone()));

        if let Some(registration) = &tasks.background {
            if !registration.task.is_finished() {
                info!(
                    order_id = %order_id,
                    previous_order_id = ?previous,
                    registration_id = %registration.id,
                    "background tracking re-targeted"
                );
                return true;
            }
            warn!(registration_id = %registration.id, "background task ended on its own; registering again");
            tasks.background = None;
            if let Err(err) = self
                .provider
                .stop_background_updates(BACKGROUND_LOCATION_TASK)
                .await
            {
                warn!(error = %err, "failed to clear stale background registration");
            }
        }

        let feed = match self
            .provider
            .start_background_updates(BACKGROUND_LOCATION_TASK, self.config.background_options())
            .await
        {
            Ok(feed) => feed,
            Err(err) => {
                error!(error = %err, order_id = %order_id, "failed to register background location task");
                self.update_session(|session| session.order_id = previous);
                return false;
            }
        };

        let id = Uuid::new_v4();
        let background = run_background_task(
            feed,
            self.handler.clone(),
            self.provider.clone(),
            self.tasks.clone(),
            id,
        );
        let task = tokio::spawn(background.instrument(info_span!(
            "background_task",
            task = BACKGROUND_LOCATION_TASK,
            registration_id = %id
        )));
        tasks.background = Some(BackgroundRegistration { id, task });

        self.update_session(|session| session.is_background_active = true);
        self.metrics
            .tracking_active
            .with_label_values(&["background"])
            .set(1);

        info!(order_id = %order_id, registration_id = %id, "background order tracking started");
        true
    }

    pub async fn stop_background_order_tracking(&self) {
        let mut tasks = self.tasks.lock().await;

        if let Some(registration) = tasks.background.take() {
            registration.task.abort();
            if let Err(err) = self
                .provider
                .stop_background_updates(BACKGROUND_LOCATION_TASK)
                .await
            {
                warn!(error = %err, "failed to unregister background location task");
            }
            info!(registration_id = %registration.id, "background location task unregistered");
        }

        let previous = self.update_session(|session| {
            session.is_background_active = false;
            session.order_id.take()
        });
        self.metrics
            .tracking_active
            .with_label_values(&["background"])
            .set(0);

        match previous {
            Some(order_id) => info!(order_id = %order_id, "background order tracking stopped"),
            None => debug!("no order was being tracked"),
        }
    }

    /// Ends background reporting when `order_id` is the tracked order.
    pub async fn complete_delivery(&self, order_id: &str) -> bool {
        if self.tracking_order_id().as_deref() != Some(order_id) {
            debug!(order_id, "completed order is not the tracked order");
            return false;
        }

        self.stop_background_order_tracking().await;
        true
    }

    /// Stops every running task.
    pub async fn shutdown(&self) {
        self.stop_background_order_tracking().await;
        self.stop_tracking().await;
    }

    pub fn is_tracking_order(&self) -> bool {
        self.read_session().order_id.is_some()
    }

    pub fn tracking_order_id(&self) -> Option<String> {
        self.read_session().order_id.clone()
    }

    pub fn session(&self) -> TrackingSession {
        self.read_session().clone()
    }

    pub fn state(&self) -> TrackingState {
        self.read_session().state()
    }

    pub async fn background_registration_id(&self) -> Option<Uuid> {
        self.tasks
            .lock()
            .await
            .background
            .as_ref()
            .map(|registration| registration.id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackingEvent> {
        self.events_tx.subscribe()
    }

    fn read_session(&self) -> std::sync::RwLockReadGuard<'_, TrackingSession> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_session<T>(&self, update: impl FnOnce(&mut TrackingSession) -> T) -> T {
        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut session)
    }
}

/// A feed that ends while its watch is still the current one means the OS
/// stopped delivering fixes: the entry is dropped and the session cleared so
/// the next start registers afresh.
async fn run_foreground_watch(
    mut feed: PositionFeed,
    handler: PositionHandler,
    tasks: Arc<Mutex<TrackingTasks>>,
    id: Uuid,
) {
    while let Some(position) = feed.recv().await {
        handler.on_foreground(position);
    }

    let mut tasks = tasks.lock().await;
    if tasks.foreground.as_ref().is_some_and(|watch| watch.id == id) {
        tasks.foreground = None;
        handler.foreground_ended();
        warn!("foreground position feed closed; foreground tracking stopped");
    }
}

async fn run_background_task(
    mut feed: PositionFeed,
    handler: PositionHandler,
    provider: Arc<dyn LocationProvider>,
    tasks: Arc<Mutex<TrackingTasks>>,
    id: Uuid,
) {
    while let Some(position) = feed.recv().await {
        handler.on_background(position);
    }

    let mut tasks = tasks.lock().await;
    if tasks.background.as_ref().is_some_and(|registration| registration.id == id) {
        tasks.background = None;
        let order_id = handler.background_ended();
        warn!(order_id = ?order_id, "background position feed closed; order tracking stopped");

        if let Err(err) = provider.stop_background_updates(BACKGROUND_LOCATION_TASK).await {
            warn!(error = %err, "failed to clear closed background registration");
        }
    }
}
