// Playback controller module
// Drives a RenderEngine and publishes PlaybackState snapshots

pub mod controller;
pub mod state;

pub use controller::{PlaybackController, PlayerConfig, PlayerEvent};
pub use state::{format_time, PlaybackState, PlayerPhase};
