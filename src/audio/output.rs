// Audio output using cpal
// Handles cross-platform audio output with a ring buffer

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use parking_lot::Mutex;
use ringbuf::{HeapRb, traits::{Consumer, Observer, Producer, Split}};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

use crate::error::{PlaybackError, PlaybackResult};

const RING_BUFFER_SIZE: usize = 48000 * 2 / 4; // ~250ms of stereo audio at 48kHz

type RingProducer = ringbuf::HeapProd<f32>;
type RingConsumer = ringbuf::HeapCons<f32>;

/// Flags shared between the output handle and the device callback.
struct OutputShared {
    volume: Mutex<f32>,
    paused: AtomicBool,
}

/// Consumer half of the queue plus the count of samples it has handed to the
/// device since the last clear. Both change under one lock so a clear can
/// never interleave with a callback.
struct PlayedQueue {
    consumer: RingConsumer,
    played: u64,
}

impl PlayedQueue {
    fn new(consumer: RingConsumer) -> Self {
        Self { consumer, played: 0 }
    }

    fn clear(&mut self) {
        self.consumer.clear();
        self.played = 0;
    }
}

/// Device callback body: pop queued samples into `data` at `shared`'s volume,
/// or silence while paused.
fn fill_output<T: cpal::SizedSample + cpal::FromSample<f32>>(
    data: &mut [T],
    queue: &Mutex<PlayedQueue>,
    shared: &OutputShared,
) {
    if shared.paused.load(Ordering::SeqCst) {
        data.fill(T::from_sample(0.0f32));
        return;
    }

    let vol = *shared.volume.lock();
    let mut queue = queue.lock();
    let mut popped = 0u64;
    for sample in data.iter_mut() {
        let value = match queue.consumer.try_pop() {
            Some(v) => {
                popped += 1;
                v * vol
            }
            None => 0.0,
        };
        *sample = T::from_sample(value);
    }
    queue.played += popped;
}

pub struct AudioOutput {
    _stream: Stream,
    producer: Mutex<RingProducer>,
    queue: Arc<Mutex<PlayedQueue>>,
    sample_rate: u32,
    channels: u16,
    shared: Arc<OutputShared>,
}

impl AudioOutput {
    /// Open the default output device. The stream starts paused.
    pub fn new() -> PlaybackResult<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| PlaybackError::output("no output device available"))?;

        let config = device
            .default_output_config()
            .map_err(|e| PlaybackError::output(format!("failed to get default output config: {}", e)))?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels();

        let rb = HeapRb::<f32>::new(RING_BUFFER_SIZE);
        let (producer, consumer) = rb.split();

        let queue = Arc::new(Mutex::new(PlayedQueue::new(consumer)));
        let shared = Arc::new(OutputShared {
            volume: Mutex::new(1.0),
            paused: AtomicBool::new(true),
        });

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &config.into(), queue.clone(), shared.clone())?
            }
            cpal::SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &config.into(), queue.clone(), shared.clone())?
            }
            cpal::SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &config.into(), queue.clone(), shared.clone())?
            }
            format => {
                return Err(PlaybackError::output(format!("unsupported sample format: {:?}", format)))
            }
        };

        stream
            .play()
            .map_err(|e| PlaybackError::output(format!("failed to start stream: {}", e)))?;

        info!("Audio output: {} channels, {} Hz", channels, sample_rate);

        Ok(Self {
            _stream: stream,
            producer: Mutex::new(producer),
            queue,
            sample_rate,
            channels,
            shared,
        })
    }

    fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
        device: &cpal::Device,
        config: &StreamConfig,
        queue: Arc<Mutex<PlayedQueue>>,
        shared: Arc<OutputShared>,
    ) -> PlaybackResult<Stream> {
        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    fill_output(data, &queue, &shared);
                },
                move |err| {
                    error!("Audio output error: {}", err);
                },
                None,
            )
            .map_err(|e| PlaybackError::output(format!("failed to build output stream: {}", e)))?;

        Ok(stream)
    }

    /// Push as many samples as fit. Returns the number written.
    pub fn write(&self, samples: &[f32]) -> usize {
        self.producer.lock().push_slice(samples)
    }

    /// Samples queued but not yet handed to the device
    pub fn buffered(&self) -> usize {
        self.producer.lock().occupied_len()
    }

    /// Drop everything queued (used when seeking). Samples written after
    /// this returns are kept.
    pub fn clear(&self) {
        self.queue.lock().clear();
    }

    /// Gate the device callback; while paused it outputs silence and leaves
    /// the queue untouched.
    pub fn set_paused(&self, paused: bool) {
        self.shared.paused.store(paused, Ordering::SeqCst);
    }

    /// Frames rendered since the last [`clear`](Self::clear).
    pub fn frames_played(&self) -> u64 {
        self.queue.lock().played / self.channels.max(1) as u64
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Set the output volume (0.0 to 1.0)
    pub fn set_volume(&self, vol: f32) {
        *self.shared.volume.lock() = vol.clamp(0.0, 1.0);
    }

    pub fn volume(&self) -> f32 {
        *self.shared.volume.lock()
    }
}
