// Application settings

pub mod settings;

pub use settings::{AppSettings, GenerationSettings, PlaybackSettings, TrackSettings};
