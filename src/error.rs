// Error types for the playback path
use std::path::PathBuf;
use thiserror::Error;

/// Failures the playback controller can run into while loading or rendering
/// the bundled asset. None of these are fatal: the controller logs them and
/// stays inert.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("audio asset not found: {}", .0.display())]
    AssetNotFound(PathBuf),

    #[error("failed to decode audio asset: {0}")]
    DecodeFailure(String),

    #[error("audio output unavailable: {0}")]
    OutputUnavailable(String),
}

impl PlaybackError {
    pub fn decode(msg: impl Into<String>) -> Self {
        PlaybackError::DecodeFailure(msg.into())
    }

    pub fn output(msg: impl Into<String>) -> Self {
        PlaybackError::OutputUnavailable(msg.into())
    }
}

pub type PlaybackResult<T> = Result<T, PlaybackError>;
