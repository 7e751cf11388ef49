// Audio playback module
// Uses Symphonia for decoding and cpal for output

pub mod decoder;
pub mod engine;
pub mod output;
pub mod resample;

pub use engine::{EndOfTrackHook, RenderEngine, SymphoniaEngine, UnavailableEngine};
