// Simulated music generation
// A fixed-length wait with a fake progress bar; nothing is generated.

pub mod progress;
pub mod simulator;

use serde::{Deserialize, Serialize};

pub use progress::{ProgressState, ProgressTracker};
pub use simulator::{
    CancelPolicy, GenerationEvent, GenerationOutcome, ProgressSimulator, SimulatorConfig,
};

/// What the user asked for on the prompt screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub genre: String,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            genre: "pop".to_string(),
        }
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = genre.into();
        self
    }
}
