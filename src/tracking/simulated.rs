use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::LocationError;
use crate::geo::haversine_m;
use crate::models::coordinate::{Coordinate, Position};
use crate::tracking::provider::{
    BackgroundOptions, Freshness, LocationAccuracy, LocationProvider, PermissionStatus,
    PositionFeed, WatchOptions,
};

const FEED_CAPACITY: usize = 32;

/// In-memory location provider. Feeds emit the current position every
/// `time_interval` and whenever it moves at least `distance_interval_m`.
pub struct SimulatedLocationProvider {
    state: Arc<Mutex<SimulatedState>>,
    position_tx: watch::Sender<Option<Position>>,
}

enum FeedWake {
    Tick,
    Moved,
    Closed,
}

struct ActiveWatch {
    sender: mpsc::Sender<Position>,
    feed: JoinHandle<()>,
}

struct SimulatedState {
    foreground_permission: PermissionStatus,
    background_permission: PermissionStatus,
    fix_delay: Duration,
    fix_available: bool,
    last_known: Option<Position>,
    watch_subscriptions: usize,
    watches: Vec<ActiveWatch>,
    background_registrations: usize,
    background_tasks: HashMap<String, JoinHandle<()>>,
}

impl SimulatedLocationProvider {
    pub fn new(initial: Option<Coordinate>) -> Self {
        let position = initial.map(|coordinate| Position::new(coordinate, Some(5.0)));
        let (position_tx, _position_rx) = watch::channel(position);

        Self {
            state: Arc::new(Mutex::new(SimulatedState {
                foreground_permission: PermissionStatus::Granted,
                background_permission: PermissionStatus::Granted,
                fix_delay: Duration::ZERO,
                fix_available: true,
                last_known: position,
                watch_subscriptions: 0,
                watches: Vec::new(),
                background_registrations: 0,
                background_tasks: HashMap::new(),
            })),
            position_tx,
        }
    }

    pub fn set_permissions(&self, foreground: PermissionStatus, background: PermissionStatus) {
        let mut state = self.lock();
        state.foreground_permission = foreground;
        state.background_permission = background;
    }

    /// Moves the device. The new fix also becomes the device's last known
    /// position.
    pub fn set_position(&self, coordinate: Coordinate, accuracy_m: Option<f64>) {
        let position = Position::new(coordinate, accuracy_m);
        self.lock().last_known = Some(position);
        self.position_tx.send_replace(Some(position));
    }

    pub fn set_last_known(&self, position: Option<Position>) {
        self.lock().last_known = position;
    }

    /// Controls one-shot fixes: they answer after `delay`, or fail when
    /// `available` is false.
    pub fn set_fix_behaviour(&self, delay: Duration, available: bool) {
        let mut state = self.lock();
        state.fix_delay = delay;
        state.fix_available = available;
    }

    pub fn watch_subscriptions(&self) -> usize {
        self.lock().watch_subscriptions
    }

    pub fn active_watches(&self) -> usize {
        self.lock()
            .watches
            .iter()
            .filter(|watch| !watch.sender.is_closed())
            .count()
    }

    pub fn background_registrations(&self) -> usize {
        self.lock().background_registrations
    }

    pub fn registered_tasks(&self) -> Vec<String> {
        self.lock().background_tasks.keys().cloned().collect()
    }

    /// Ends every open feed without unregistering anything, as when the OS
    /// revokes location access mid-session.
    pub fn interrupt_feeds(&self) {
        let mut state = self.lock();
        for watch in state.watches.drain(..) {
            watch.feed.abort();
        }
        for feed in state.background_tasks.values() {
            feed.abort();
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimulatedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_feed(
        &self,
        options: WatchOptions,
    ) -> (mpsc::Sender<Position>, PositionFeed, JoinHandle<()>) {
        let (feed_tx, feed_rx) = mpsc::channel(FEED_CAPACITY);
        let sender = feed_tx.clone();
        let mut position_rx = self.position_tx.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(options.time_interval.max(Duration::from_millis(1)));
            let mut last_sent: Option<Coordinate> = None;

            loop {
                let wake = tokio::select! {
                    _ = feed_tx.closed() => FeedWake::Closed,
                    _ = ticker.tick() => FeedWake::Tick,
                    changed = position_rx.changed() => match changed {
                        Ok(()) => FeedWake::Moved,
                        Err(_) => FeedWake::Closed,
                    },
                };

                let next = match wake {
                    FeedWake::Closed => break,
                    FeedWake::Tick => *position_rx.borrow(),
                    FeedWake::Moved => {
                        let current = *position_rx.borrow_and_update();
                        current.filter(|position| {
                            last_sent
                                .map(|prev| haversine_m(&prev, &position.coordinate))
                                .is_none_or(|moved| moved >= options.distance_interval_m)
                        })
                    }
                };

                let Some(mut position) = next else {
                    continue;
                };
                position.recorded_at = Utc::now();

                if feed_tx.send(position).await.is_err() {
                    break;
                }
                last_sent = Some(position.coordinate);
                ticker.reset();
            }

            debug!("simulated position feed closed");
        });

        (sender, feed_rx, handle)
    }
}

#[async_trait]
impl LocationProvider for SimulatedLocationProvider {
    async fn request_foreground_permission(&self) -> Result<PermissionStatus, LocationError> {
        Ok(self.lock().foreground_permission)
    }

    async fn request_background_permission(&self) -> Result<PermissionStatus, LocationError> {
        Ok(self.lock().background_permission)
    }

    async fn current_position(
        &self,
        _accuracy: LocationAccuracy,
    ) -> Result<Position, LocationError> {
        let (permission, delay, available) = {
            let state = self.lock();
            (state.foreground_permission, state.fix_delay, state.fix_available)
        };

        if permission != PermissionStatus::Granted {
            return Err(LocationError::PermissionDenied);
        }

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if !available {
            return Err(LocationError::Unavailable("no satellite fix".to_string()));
        }

        let current = *self.position_tx.borrow();
        current
            .map(|position| Position::new(position.coordinate, position.accuracy_m))
            .ok_or_else(|| LocationError::Unavailable("no position set".to_string()))
    }

    async fn last_known_position(
        &self,
        freshness: Option<Freshness>,
    ) -> Result<Option<Position>, LocationError> {
        let last_known = self.lock().last_known;

        let Some(freshness) = freshness else {
            return Ok(last_known);
        };

        Ok(last_known.filter(|position| {
            let age = (Utc::now() - position.recorded_at)
                .to_std()
                .unwrap_or(Duration::ZERO);
            let accurate = position
                .accuracy_m
                .is_none_or(|accuracy| accuracy <= freshness.required_accuracy_m);
            age <= freshness.max_age && accurate
        }))
    }

    async fn watch_position(&self, options: WatchOptions) -> Result<PositionFeed, LocationError> {
        if self.lock().foreground_permission != PermissionStatus::Granted {
            return Err(LocationError::PermissionDenied);
        }

        let (sender, feed, handle) = self.spawn_feed(options);

        let mut state = self.lock();
        state.watch_subscriptions += 1;
        state.watches.retain(|watch| !watch.sender.is_closed());
        state.watches.push(ActiveWatch {
            sender,
            feed: handle,
        });
        Ok(feed)
    }

    async fn start_background_updates(
        &self,
        task_name: &str,
        options: BackgroundOptions,
    ) -> Result<PositionFeed, LocationError> {
        {
            let state = self.lock();
            if state.background_permission != PermissionStatus::Granted {
                return Err(LocationError::PermissionDenied);
            }
            if state.background_tasks.contains_key(task_name) {
                return Err(LocationError::Registration {
                    task: task_name.to_string(),
                    reason: "already registered".to_string(),
                });
            }
        }

        debug!(
            task = task_name,
            notice = %options.notice.title,
            "simulated background updates started"
        );

        let (_sender, feed, handle) = self.spawn_feed(options.watch);

        let mut state = self.lock();
        state.background_registrations += 1;
        state.background_tasks.insert(task_name.to_string(), handle);
        Ok(feed)
    }

    async fn stop_background_updates(&self, task_name: &str) -> Result<(), LocationError> {
        if let Some(handle) = self.lock().background_tasks.remove(task_name) {
            handle.abort();
        }
        Ok(())
    }
}
