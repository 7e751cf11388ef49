// Playback controller: transport operations over a single audio asset
//
// All state mutation happens on whichever task owns the controller. The
// polling timer and the engine's end-of-track hook only push `PlayerEvent`s
// into the controller's channel; the owner feeds them back through
// `handle_event`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::state::{PlaybackState, PlayerPhase};
use crate::audio::engine::RenderEngine;

#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// How often the render cursor is copied into the published state
    pub poll_interval: Duration,
    /// Jump used by `skip_forward` / `skip_backward`
    pub skip_interval: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            skip_interval: Duration::from_secs(10),
        }
    }
}

/// Messages that cross into the controller's context from timers and the
/// render thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    PollTick,
    /// The engine reached the end of the track. `epoch` is the last seek epoch
    /// the render thread had applied; a later seek makes the notification stale.
    TrackEnded { epoch: u64 },
}

pub struct PlaybackController<E: RenderEngine> {
    engine: E,
    asset: PathBuf,
    config: PlayerConfig,
    state: PlaybackState,
    state_tx: watch::Sender<PlaybackState>,
    events_tx: mpsc::UnboundedSender<PlayerEvent>,
    events_rx: mpsc::UnboundedReceiver<PlayerEvent>,
    poller: Option<JoinHandle<()>>,
    seek_epoch: u64,
}

impl<E: RenderEngine> PlaybackController<E> {
    pub fn new(engine: E, asset: impl Into<PathBuf>, config: PlayerConfig) -> Self {
        let state = PlaybackState::default();
        let (state_tx, _) = watch::channel(state.clone());
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            engine,
            asset: asset.into(),
            config,
            state,
            state_tx,
            events_tx,
            events_rx,
            poller: None,
            seek_epoch: 0,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn asset(&self) -> &Path {
        &self.asset
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Load the asset. Failures are logged and recorded in
    /// `PlaybackState::load_error`; the controller then stays `Idle`.
    pub fn prepare(&mut self) {
        if self.state.phase.is_loaded() {
            debug!("Asset already prepared, ignoring");
            return;
        }

        let events = self.events_tx.clone();
        let on_end = Box::new(move |epoch| {
            let _ = events.send(PlayerEvent::TrackEnded { epoch });
        });

        match self.engine.load(&self.asset, on_end) {
            Ok(duration) => {
                info!("Prepared {:?}, duration {:.1}s", self.asset, duration.as_secs_f64());
                // A fresh load starts at epoch zero
                self.seek_epoch = 0;
                self.engine.set_volume(self.state.volume);
                self.state.phase = PlayerPhase::Ready;
                self.state.duration = duration;
                self.state.position = Duration::ZERO;
                self.state.is_playing = false;
                self.state.load_error = None;
            }
            Err(e) => {
                error!("Error loading audio: {}", e);
                self.state.load_error = Some(e);
            }
        }
        self.publish();
    }

    /// Toggle between playing and paused.
    pub fn play_pause(&mut self) {
        if !self.state.phase.is_loaded() {
            return;
        }

        if self.engine.is_playing() {
            self.engine.pause();
        } else {
            self.engine.play();
        }

        self.state.is_playing = self.engine.is_playing();
        if self.state.is_playing {
            self.state.phase = PlayerPhase::Playing;
            self.start_polling();
        } else {
            self.state.phase = PlayerPhase::Paused;
            self.stop_polling();
        }
        self.publish();
    }

    /// Move the render cursor to `target`, clamped into the track.
    pub fn seek(&mut self, target: Duration) {
        if !self.state.phase.is_loaded() {
            return;
        }

        let target = self.state.clamp_position(target);
        self.seek_epoch += 1;
        self.engine.seek(target, self.seek_epoch);
        self.state.position = target;
        self.publish();
    }

    pub fn skip_forward(&mut self) {
        let target = self.state.position.saturating_add(self.config.skip_interval);
        self.seek(target);
    }

    pub fn skip_backward(&mut self) {
        let target = self.state.position.saturating_sub(self.config.skip_interval);
        self.seek(target);
    }

    /// Set the linear gain. Out-of-range input is clamped into `[0, 1]`.
    pub fn set_volume(&mut self, level: f32) {
        if !self.state.phase.is_loaded() {
            return;
        }

        let level = if level.is_nan() { 0.0 } else { level.clamp(0.0, 1.0) };
        self.state.volume = level;
        self.engine.set_volume(level);
        self.publish();
    }

    /// Wait for the next timer or render-thread event.
    pub async fn next_event(&mut self) -> Option<PlayerEvent> {
        self.events_rx.recv().await
    }

    pub fn handle_event(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::PollTick => {
                // Ticks queued before the timer was stopped
                if self.poller.is_none() {
                    return;
                }
                self.state.position = self.state.clamp_position(self.engine.position());
                self.publish();
            }
            PlayerEvent::TrackEnded { epoch } => {
                if !self.state.phase.is_loaded() {
                    return;
                }
                if epoch != self.seek_epoch {
                    debug!("Ignoring end-of-track superseded by a seek");
                    self.sync_playing();
                    return;
                }
                info!("Track finished");
                self.stop_polling();
                self.engine.pause();
                self.seek_epoch += 1;
                self.engine.seek(Duration::ZERO, self.seek_epoch);
                self.state.is_playing = false;
                self.state.position = Duration::ZERO;
                self.state.phase = PlayerPhase::Ready;
                self.publish();
            }
        }
    }

    /// Tear down the timer and the render engine.
    pub fn shutdown(&mut self) {
        self.stop_polling();
        self.engine.shutdown();
        self.state.is_playing = false;
        self.publish();
    }

    /// Re-read the render state after the engine stopped on its own.
    fn sync_playing(&mut self) {
        self.state.is_playing = self.engine.is_playing();
        if !self.state.is_playing {
            self.stop_polling();
            if self.state.phase == PlayerPhase::Playing {
                self.state.phase = PlayerPhase::Paused;
            }
        }
        self.publish();
    }

    fn start_polling(&mut self) {
        if self.poller.is_some() {
            return;
        }

        let events = self.events_tx.clone();
        let period = self.config.poll_interval;
        self.poller = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                if events.send(PlayerEvent::PollTick).is_err() {
                    break;
                }
            }
        }));
    }

    fn stop_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }
}

impl<E: RenderEngine> Drop for PlaybackController<E> {
    fn drop(&mut self) {
        self.stop_polling();
    }
}
