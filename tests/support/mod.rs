#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use musicai_lib::audio::{EndOfTrackHook, RenderEngine};
use musicai_lib::PlaybackError;

/// Initialize tracing for tests with proper test output handling
pub fn tracing_init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[derive(Default)]
struct FakeInner {
    duration: Duration,
    load_error: Option<PlaybackError>,
    loaded: bool,
    playing: bool,
    // Simulates a device that refuses to start
    refuse_play: bool,
    position: Duration,
    volume: Option<f32>,
    seeks: Vec<Duration>,
    // Last seek epoch applied
    epoch: u64,
    on_end: Option<EndOfTrackHook>,
}

/// In-memory render engine. The paired [`FakeHandle`] plays the part of the
/// render thread.
pub struct FakeEngine {
    inner: Arc<Mutex<FakeInner>>,
}

#[derive(Clone)]
pub struct FakeHandle {
    inner: Arc<Mutex<FakeInner>>,
}

impl FakeEngine {
    pub fn with_duration(duration: Duration) -> (FakeEngine, FakeHandle) {
        let inner = Arc::new(Mutex::new(FakeInner {
            duration,
            ..Default::default()
        }));
        (
            FakeEngine {
                inner: inner.clone(),
            },
            FakeHandle { inner },
        )
    }

    pub fn failing(error: PlaybackError) -> (FakeEngine, FakeHandle) {
        let (engine, handle) = Self::with_duration(Duration::ZERO);
        handle.inner.lock().unwrap().load_error = Some(error);
        (engine, handle)
    }
}

impl RenderEngine for FakeEngine {
    fn load(&mut self, _path: &Path, on_end: EndOfTrackHook) -> Result<Duration, PlaybackError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(err) = inner.load_error.clone() {
            return Err(err);
        }
        inner.loaded = true;
        inner.position = Duration::ZERO;
        inner.epoch = 0;
        inner.on_end = Some(on_end);
        Ok(inner.duration)
    }

    fn play(&mut self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.loaded && !inner.refuse_play {
            inner.playing = true;
        }
    }

    fn pause(&mut self) {
        self.inner.lock().unwrap().playing = false;
    }

    fn is_playing(&self) -> bool {
        self.inner.lock().unwrap().playing
    }

    fn seek(&mut self, position: Duration, epoch: u64) {
        let mut inner = self.inner.lock().unwrap();
        inner.position = position;
        inner.epoch = epoch;
        inner.seeks.push(position);
    }

    fn position(&self) -> Duration {
        self.inner.lock().unwrap().position
    }

    fn set_volume(&mut self, gain: f32) {
        self.inner.lock().unwrap().volume = Some(gain);
    }
}

impl FakeHandle {
    /// Move the render cursor as if audio had been playing.
    pub fn advance(&self, by: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.position += by;
    }

    pub fn set_position(&self, position: Duration) {
        self.inner.lock().unwrap().position = position;
    }

    /// Play to the end and fire the end-of-track hook.
    pub fn finish(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.playing = false;
        inner.position = inner.duration;
        if let Some(on_end) = inner.on_end.as_ref() {
            on_end(inner.epoch);
        }
    }

    pub fn refuse_play(&self) {
        self.inner.lock().unwrap().refuse_play = true;
    }

    pub fn is_playing(&self) -> bool {
        self.inner.lock().unwrap().playing
    }

    pub fn position(&self) -> Duration {
        self.inner.lock().unwrap().position
    }

    pub fn volume(&self) -> Option<f32> {
        self.inner.lock().unwrap().volume
    }

    pub fn seeks(&self) -> Vec<Duration> {
        self.inner.lock().unwrap().seeks.clone()
    }

    pub fn epoch(&self) -> u64 {
        self.inner.lock().unwrap().epoch
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.lock().unwrap().loaded
    }
}
