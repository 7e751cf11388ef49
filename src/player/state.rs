// Observable playback state
use std::time::Duration;

use crate::error::PlaybackError;

/// Where the controller sits in its `Idle -> Ready -> Playing <-> Paused`
/// lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerPhase {
    /// Nothing loaded; every transport operation is a no-op.
    #[default]
    Idle,
    /// Loaded and parked (initially, and again after the track ends).
    Ready,
    Playing,
    Paused,
}

impl PlayerPhase {
    pub fn is_loaded(self) -> bool {
        self != PlayerPhase::Idle
    }
}

/// Snapshot published to observers after every change.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub phase: PlayerPhase,
    pub is_playing: bool,
    pub position: Duration,
    pub duration: Duration,
    pub volume: f32,
    /// Set when `prepare` failed, so a UI can say why the controls are inert.
    pub load_error: Option<PlaybackError>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            phase: PlayerPhase::Idle,
            is_playing: false,
            position: Duration::ZERO,
            duration: Duration::ZERO,
            volume: 1.0,
            load_error: None,
        }
    }
}

impl PlaybackState {
    /// Clamp a position into `[0, duration]`.
    pub fn clamp_position(&self, position: Duration) -> Duration {
        position.min(self.duration)
    }

    /// Progress through the track in `[0, 1]`; zero when nothing is loaded.
    pub fn ratio(&self) -> f64 {
        if self.duration.is_zero() {
            return 0.0;
        }
        (self.position.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }
}

/// `m:ss` as shown under the progress bar.
pub fn format_time(time: Duration) -> String {
    let secs = time.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}
