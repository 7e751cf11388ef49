// Transport command handling for the player screen
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::audio::engine::RenderEngine;
use crate::player::PlaybackController;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerCommand {
    PlayPause,
    SkipForward,
    SkipBackward,
    Seek(Duration),
    SetVolume(f32),
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("`{0}` needs a numeric argument")]
    MissingArgument(&'static str),
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
}

impl FromStr for PlayerCommand {
    type Err = CommandError;

    /// `p`, `f`, `b`, `s <seconds>`, `v <level>`, `q`
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let verb = parts.next().ok_or(CommandError::Empty)?;

        match verb {
            "p" | "play" | "pause" => Ok(PlayerCommand::PlayPause),
            "f" | "fwd" => Ok(PlayerCommand::SkipForward),
            "b" | "back" => Ok(PlayerCommand::SkipBackward),
            "s" | "seek" => {
                let secs = number(parts.next(), "seek")?;
                // Negative seeks clamp to the start like any other out-of-range target
                Ok(PlayerCommand::Seek(Duration::from_secs_f64(secs.max(0.0))))
            }
            "v" | "vol" | "volume" => {
                let level = number(parts.next(), "volume")?;
                Ok(PlayerCommand::SetVolume(level as f32))
            }
            "q" | "quit" => Ok(PlayerCommand::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn number(arg: Option<&str>, verb: &'static str) -> Result<f64, CommandError> {
    let arg = arg.ok_or(CommandError::MissingArgument(verb))?;
    arg.parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| CommandError::InvalidNumber(arg.to_string()))
}

/// Apply a transport command. Returns `false` when the player should close.
pub fn apply<E: RenderEngine>(controller: &mut PlaybackController<E>, command: PlayerCommand) -> bool {
    match command {
        PlayerCommand::PlayPause => controller.play_pause(),
        PlayerCommand::SkipForward => controller.skip_forward(),
        PlayerCommand::SkipBackward => controller.skip_backward(),
        PlayerCommand::Seek(target) => controller.seek(target),
        PlayerCommand::SetVolume(level) => controller.set_volume(level),
        PlayerCommand::Quit => return false,
    }
    true
}
