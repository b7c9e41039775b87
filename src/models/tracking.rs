use serde::{Deserialize, Serialize};

use crate::models::coordinate::Position;

/// The single active reporting session. `order_id == None` means no order
/// is being tracked.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TrackingSession {
    pub order_id: Option<String>,
    pub is_foreground_active: bool,
    pub is_background_active: bool,
    pub last_known_position: Option<Position>,
}

impl TrackingSession {
    pub fn state(&self) -> TrackingState {
        match (self.is_foreground_active, self.is_background_active) {
            (false, false) => TrackingState::Idle,
            (true, false) => TrackingState::ForegroundOnly,
            (true, true) => TrackingState::ForegroundAndBackground,
            (false, true) => TrackingState::BackgroundOnly,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    Idle,
    ForegroundOnly,
    ForegroundAndBackground,
    BackgroundOnly,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrackingOrigin {
    Foreground,
    Background,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackingEvent {
    pub origin: TrackingOrigin,
    pub position: Position,
    pub order_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{TrackingSession, TrackingState};

    #[test]
    fn state_follows_activity_flags() {
        let mut session = TrackingSession::default();
        assert_eq!(session.state(), TrackingState::Idle);

        session.is_foreground_active = true;
        assert_eq!(session.state(), TrackingState::ForegroundOnly);

        session.is_background_active = true;
        assert_eq!(session.state(), TrackingState::ForegroundAndBackground);

        session.is_foreground_active = false;
        assert_eq!(session.state(), TrackingState::BackgroundOnly);
    }
}
