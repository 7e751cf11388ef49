// Render engine: the decode + render capability the playback controller drives
//
// The cpal stream is not Send, so the output lives on a dedicated render
// thread. The engine handle only talks to it through a command channel and a
// few shared atomics.

use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::decoder::AudioDecoder;
use super::output::AudioOutput;
use super::resample::FormatAdapter;
use crate::error::{PlaybackError, PlaybackResult};

/// Called from the render thread when the loaded track plays to its end,
/// with the last seek epoch the render thread applied.
pub type EndOfTrackHook = Box<dyn Fn(u64) + Send + 'static>;

/// Audio capability injected into the playback controller.
pub trait RenderEngine {
    /// Open `path`, replacing anything previously loaded. Returns the track
    /// duration. The engine is left paused at position zero.
    fn load(&mut self, path: &Path, on_end: EndOfTrackHook) -> PlaybackResult<Duration>;

    fn play(&mut self);

    fn pause(&mut self);

    /// Whether audio is actually being rendered right now.
    fn is_playing(&self) -> bool;

    /// Move the render cursor. `epoch` identifies this seek; the end-of-track
    /// hook reports the epoch of the last seek actually applied. A load
    /// starts at epoch zero.
    fn seek(&mut self, position: Duration, epoch: u64);

    /// Current render cursor.
    fn position(&self) -> Duration;

    /// Linear gain in `[0, 1]`.
    fn set_volume(&mut self, gain: f32);

    fn shutdown(&mut self) {}
}

impl<E: RenderEngine + ?Sized> RenderEngine for Box<E> {
    fn load(&mut self, path: &Path, on_end: EndOfTrackHook) -> PlaybackResult<Duration> {
        (**self).load(path, on_end)
    }

    fn play(&mut self) {
        (**self).play()
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn is_playing(&self) -> bool {
        (**self).is_playing()
    }

    fn seek(&mut self, position: Duration, epoch: u64) {
        (**self).seek(position, epoch)
    }

    fn position(&self) -> Duration {
        (**self).position()
    }

    fn set_volume(&mut self, gain: f32) {
        (**self).set_volume(gain)
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }
}

/// Stand-in used when no output device could be opened: every load fails
/// with the original error, so the controller stays inert.
pub struct UnavailableEngine {
    reason: PlaybackError,
}

impl UnavailableEngine {
    pub fn new(reason: PlaybackError) -> Self {
        Self { reason }
    }
}

impl RenderEngine for UnavailableEngine {
    fn load(&mut self, _path: &Path, _on_end: EndOfTrackHook) -> PlaybackResult<Duration> {
        Err(self.reason.clone())
    }

    fn play(&mut self) {}

    fn pause(&mut self) {}

    fn is_playing(&self) -> bool {
        false
    }

    fn seek(&mut self, _position: Duration, _epoch: u64) {}

    fn position(&self) -> Duration {
        Duration::ZERO
    }

    fn set_volume(&mut self, _gain: f32) {}
}

enum RenderCommand {
    Open {
        decoder: AudioDecoder,
        on_end: EndOfTrackHook,
        reply: Sender<PlaybackResult<()>>,
    },
    Play,
    Pause,
    Seek { target: Duration, epoch: u64 },
    Volume(f32),
    Shutdown,
}

struct RenderShared {
    loaded: AtomicBool,
    playing: AtomicBool,
    position: Mutex<Duration>,
}

/// Symphonia decoding into a cpal output stream.
pub struct SymphoniaEngine {
    commands: Sender<RenderCommand>,
    shared: Arc<RenderShared>,
    thread: Option<JoinHandle<()>>,
}

impl SymphoniaEngine {
    /// Spawn the render thread and open the default output device.
    pub fn new() -> PlaybackResult<Self> {
        let (commands, rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let shared = Arc::new(RenderShared {
            loaded: AtomicBool::new(false),
            playing: AtomicBool::new(false),
            position: Mutex::new(Duration::ZERO),
        });

        let thread_shared = shared.clone();
        let thread = thread::Builder::new()
            .name("musicai-render".into())
            .spawn(move || {
                let output = match AudioOutput::new() {
                    Ok(output) => {
                        let _ = ready_tx.send(Ok(()));
                        output
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                RenderLoop::new(output, rx, thread_shared).run();
            })
            .map_err(|e| PlaybackError::output(format!("failed to spawn render thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                commands,
                shared,
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(PlaybackError::output("render thread exited during startup")),
        }
    }

    fn send(&self, command: RenderCommand) {
        if self.commands.send(command).is_err() {
            warn!("Render thread is gone; dropping command");
        }
    }
}

impl RenderEngine for SymphoniaEngine {
    fn load(&mut self, path: &Path, on_end: EndOfTrackHook) -> PlaybackResult<Duration> {
        let decoder = AudioDecoder::open(path)?;
        let duration = decoder.duration();

        self.shared.playing.store(false, Ordering::SeqCst);
        let (reply, reply_rx) = mpsc::channel();
        self.send(RenderCommand::Open {
            decoder,
            on_end,
            reply,
        });
        reply_rx
            .recv()
            .map_err(|_| PlaybackError::output("render thread is not running"))??;

        self.shared.loaded.store(true, Ordering::SeqCst);
        *self.shared.position.lock() = Duration::ZERO;
        info!("Loaded {:?} ({:.1}s)", path, duration.as_secs_f64());
        Ok(duration)
    }

    fn play(&mut self) {
        if !self.shared.loaded.load(Ordering::SeqCst) {
            return;
        }
        self.shared.playing.store(true, Ordering::SeqCst);
        self.send(RenderCommand::Play);
    }

    fn pause(&mut self) {
        self.shared.playing.store(false, Ordering::SeqCst);
        self.send(RenderCommand::Pause);
    }

    fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::SeqCst)
    }

    fn seek(&mut self, position: Duration, epoch: u64) {
        *self.shared.position.lock() = position;
        self.send(RenderCommand::Seek {
            target: position,
            epoch,
        });
    }

    fn position(&self) -> Duration {
        *self.shared.position.lock()
    }

    fn set_volume(&mut self, gain: f32) {
        self.send(RenderCommand::Volume(gain));
    }

    fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.send(RenderCommand::Shutdown);
            if thread.join().is_err() {
                error!("Render thread panicked");
            }
            self.shared.playing.store(false, Ordering::SeqCst);
        }
    }
}

impl Drop for SymphoniaEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The parts of the device output the render loop drives.
trait OutputSink {
    fn write(&self, samples: &[f32]) -> usize;
    fn buffered(&self) -> usize;
    fn clear(&self);
    fn set_paused(&self, paused: bool);
    fn frames_played(&self) -> u64;
    fn sample_rate(&self) -> u32;
    fn channels(&self) -> u16;
    fn set_volume(&self, gain: f32);
}

impl OutputSink for AudioOutput {
    fn write(&self, samples: &[f32]) -> usize {
        AudioOutput::write(self, samples)
    }

    fn buffered(&self) -> usize {
        AudioOutput::buffered(self)
    }

    fn clear(&self) {
        AudioOutput::clear(self)
    }

    fn set_paused(&self, paused: bool) {
        AudioOutput::set_paused(self, paused)
    }

    fn frames_played(&self) -> u64 {
        AudioOutput::frames_played(self)
    }

    fn sample_rate(&self) -> u32 {
        AudioOutput::sample_rate(self)
    }

    fn channels(&self) -> u16 {
        AudioOutput::channels(self)
    }

    fn set_volume(&self, gain: f32) {
        AudioOutput::set_volume(self, gain)
    }
}

struct LoadedTrack {
    decoder: AudioDecoder,
    adapter: FormatAdapter,
    on_end: EndOfTrackHook,
    // Track time corresponding to the first frame queued after the last seek
    base: Duration,
    // Last seek applied to this track
    epoch: u64,
    pending: Vec<f32>,
    exhausted: bool,
}

struct RenderLoop<S: OutputSink> {
    output: S,
    commands: Receiver<RenderCommand>,
    shared: Arc<RenderShared>,
    track: Option<LoadedTrack>,
    playing: bool,
}

const IDLE_WAIT: Duration = Duration::from_millis(2);

impl<S: OutputSink> RenderLoop<S> {
    fn new(output: S, commands: Receiver<RenderCommand>, shared: Arc<RenderShared>) -> Self {
        Self {
            output,
            commands,
            shared,
            track: None,
            playing: false,
        }
    }

    fn run(mut self) {
        debug!("Render thread started");
        loop {
            let command = if self.playing && self.track.is_some() {
                match self.commands.try_recv() {
                    Ok(command) => Some(command),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => break,
                }
            } else {
                match self.commands.recv() {
                    Ok(command) => Some(command),
                    Err(_) => break,
                }
            };

            match command {
                Some(RenderCommand::Shutdown) => break,
                Some(command) => self.apply(command),
                None => self.render_step(),
            }
        }
        self.output.set_paused(true);
        debug!("Render thread stopped");
    }

    fn apply(&mut self, command: RenderCommand) {
        match command {
            RenderCommand::Open {
                decoder,
                on_end,
                reply,
            } => {
                self.playing = false;
                self.output.set_paused(true);
                self.output.clear();

                let adapter = FormatAdapter::new(
                    decoder.sample_rate(),
                    decoder.channels(),
                    self.output.sample_rate(),
                    self.output.channels() as usize,
                );
                let result = adapter.map(|adapter| {
                    self.track = Some(LoadedTrack {
                        decoder,
                        adapter,
                        on_end,
                        base: Duration::ZERO,
                        epoch: 0,
                        pending: Vec::new(),
                        exhausted: false,
                    });
                });
                let _ = reply.send(result);
            }
            RenderCommand::Play => {
                if self.track.is_some() {
                    self.playing = true;
                    self.output.set_paused(false);
                }
            }
            RenderCommand::Pause => {
                self.playing = false;
                self.output.set_paused(true);
            }
            RenderCommand::Seek { target, epoch } => {
                let Some(track) = self.track.as_mut() else {
                    return;
                };
                track.epoch = epoch;
                track.pending.clear();
                track.adapter.reset();
                self.output.clear();

                let duration = track.decoder.duration();
                if target >= duration {
                    track.base = duration;
                    track.exhausted = true;
                } else {
                    match track.decoder.seek(target) {
                        Ok(landed) => track.base = landed,
                        Err(e) => {
                            warn!("Seek to {:?} failed: {}", target, e);
                            track.base = target;
                        }
                    }
                    track.exhausted = false;
                }
                *self.shared.position.lock() = track.base;
            }
            RenderCommand::Volume(gain) => self.output.set_volume(gain),
            RenderCommand::Shutdown => {}
        }
    }

    fn render_step(&mut self) {
        let Some(track) = self.track.as_mut() else {
            return;
        };

        let rendered = Duration::from_secs_f64(
            self.output.frames_played() as f64 / self.output.sample_rate().max(1) as f64,
        );
        *self.shared.position.lock() = (track.base + rendered).min(track.decoder.duration());

        if !track.pending.is_empty() {
            let written = self.output.write(&track.pending);
            track.pending.drain(..written);
            if !track.pending.is_empty() {
                thread::sleep(IDLE_WAIT);
                return;
            }
        }

        if track.exhausted {
            if self.output.buffered() == 0 {
                self.playing = false;
                self.output.set_paused(true);
                self.shared.playing.store(false, Ordering::SeqCst);
                *self.shared.position.lock() = track.decoder.duration();
                debug!("Reached end of track");
                (track.on_end)(track.epoch);
            } else {
                thread::sleep(IDLE_WAIT);
            }
            return;
        }

        match track.decoder.decode_next() {
            Ok(Some(samples)) => match track.adapter.process(&samples) {
                Ok(converted) => track.pending = converted,
                Err(e) => {
                    error!("Dropping unconvertible audio: {}", e);
                    track.exhausted = true;
                }
            },
            Ok(None) => {
                match track.adapter.flush() {
                    Ok(tail) => track.pending = tail,
                    Err(e) => warn!("Failed to flush resampler: {}", e),
                }
                track.exhausted = true;
            }
            Err(e) => {
                error!("Decoding stopped early: {}", e);
                track.exhausted = true;
            }
        }
    }
}
