// Audio decoder using Symphonia
// Decodes the bundled asset to interleaved f32 PCM

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};
use tracing::{debug, warn};

use crate::error::{PlaybackError, PlaybackResult};

pub struct AudioDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    time_base: Option<TimeBase>,
    sample_rate: u32,
    channels: usize,
    duration: Duration,
    sample_buf: Option<SampleBuffer<f32>>,
}

impl AudioDecoder {
    /// Open an audio file and prepare for decoding.
    ///
    /// A missing file maps to [`PlaybackError::AssetNotFound`], anything the
    /// prober or codec registry rejects maps to [`PlaybackError::DecodeFailure`].
    pub fn open(path: &Path) -> PlaybackResult<Self> {
        let format = probe(path)?;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| PlaybackError::decode("no audio track found"))?;

        let track_id = track.id;
        let time_base = track.codec_params.time_base;
        let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
        let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2);
        let reported_frames = track.codec_params.n_frames;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| PlaybackError::decode(format!("failed to create decoder: {}", e)))?;

        // Some containers (VBR mp3 without a Xing header) don't report a
        // frame count, so fall back to summing packet durations.
        let duration = match reported_frames {
            Some(frames) => ts_to_duration(time_base, frames, sample_rate),
            None => scan_duration(path, track_id, time_base, sample_rate)?,
        };

        debug!(
            "Opened {:?}: {} Hz, {} channels, {:.3}s",
            path,
            sample_rate,
            channels,
            duration.as_secs_f64()
        );

        Ok(Self {
            format,
            decoder,
            track_id,
            time_base,
            sample_rate,
            channels,
            duration,
            sample_buf: None,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Decode the next packet of the selected track as interleaved f32 samples.
    /// Returns `None` once the stream is exhausted.
    pub fn decode_next(&mut self) -> PlaybackResult<Option<Vec<f32>>> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e)) if e.kind() == ErrorKind::UnexpectedEof => {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(PlaybackError::decode(format!("failed to read packet: {}", e))),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let frames = decoded.capacity();
                    // Channel count can differ from the codec params on some streams
                    self.channels = spec.channels.count();

                    let too_small = self
                        .sample_buf
                        .as_ref()
                        .map_or(true, |b| b.capacity() < frames * self.channels);
                    if too_small {
                        self.sample_buf = Some(SampleBuffer::<f32>::new(frames as u64, spec));
                    }

                    if let Some(buf) = self.sample_buf.as_mut() {
                        buf.copy_interleaved_ref(decoded);
                        return Ok(Some(buf.samples().to_vec()));
                    }
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Decode error (skipping packet): {}", e);
                    continue;
                }
                Err(e) => return Err(PlaybackError::decode(format!("decode failed: {}", e))),
            }
        }
    }

    /// Seek to `position`, returning where the reader actually landed.
    pub fn seek(&mut self, position: Duration) -> PlaybackResult<Duration> {
        let time = Time::new(position.as_secs(), position.subsec_nanos() as f64 / 1e9);

        let seeked_to = self
            .format
            .seek(
                SeekMode::Coarse,
                SeekTo::Time {
                    time,
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| PlaybackError::decode(format!("seek failed: {}", e)))?;

        self.decoder.reset();

        Ok(ts_to_duration(self.time_base, seeked_to.actual_ts, self.sample_rate))
    }
}

fn probe(path: &Path) -> PlaybackResult<Box<dyn FormatReader>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => PlaybackError::AssetNotFound(path.to_path_buf()),
        _ => PlaybackError::decode(format!("failed to open file: {}", e)),
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| PlaybackError::decode(format!("failed to probe file format: {}", e)))?;

    Ok(probed.format)
}

fn scan_duration(
    path: &Path,
    track_id: u32,
    time_base: Option<TimeBase>,
    sample_rate: u32,
) -> PlaybackResult<Duration> {
    let mut format = probe(path)?;
    let mut total: u64 = 0;

    loop {
        match format.next_packet() {
            Ok(packet) if packet.track_id() == track_id => total += packet.dur(),
            Ok(_) => continue,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => continue,
            Err(e) => return Err(PlaybackError::decode(format!("failed to scan packets: {}", e))),
        }
    }

    Ok(ts_to_duration(time_base, total, sample_rate))
}

fn ts_to_duration(time_base: Option<TimeBase>, ts: u64, sample_rate: u32) -> Duration {
    match time_base {
        Some(tb) => {
            let time = tb.calc_time(ts);
            Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac)
        }
        None => Duration::from_secs_f64(ts as f64 / sample_rate.max(1) as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_sine(path: &Path, sample_rate: u32, channels: u16, seconds: f32) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let frames = (sample_rate as f32 * seconds) as u32;
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let s = (t * 440.0 * std::f32::consts::TAU).sin() * 0.25;
            for _ in 0..channels {
                writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn missing_file_is_asset_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.mp3");
        match AudioDecoder::open(&path) {
            Err(PlaybackError::AssetNotFound(p)) => assert_eq!(p, path),
            other => panic!("expected AssetNotFound, got {:?}", other.err()),
        }
    }

    #[test]
    fn garbage_file_is_decode_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.mp3");
        std::fs::write(&path, b"definitely not audio").unwrap();
        assert!(matches!(
            AudioDecoder::open(&path),
            Err(PlaybackError::DecodeFailure(_))
        ));
    }

    #[test]
    fn reports_duration_and_format_of_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_sine(&path, 22050, 2, 1.5);

        let decoder = AudioDecoder::open(&path).unwrap();
        assert_eq!(decoder.sample_rate(), 22050);
        assert_eq!(decoder.channels(), 2);
        let secs = decoder.duration().as_secs_f64();
        assert!((secs - 1.5).abs() < 0.01, "duration was {}", secs);
    }

    #[test]
    fn decodes_every_frame_then_ends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_sine(&path, 8000, 1, 0.5);

        let mut decoder = AudioDecoder::open(&path).unwrap();
        let mut samples = 0usize;
        while let Some(chunk) = decoder.decode_next().unwrap() {
            assert!(chunk.iter().all(|s| s.abs() <= 1.0));
            samples += chunk.len();
        }
        assert_eq!(samples, 4000);
        assert!(decoder.decode_next().unwrap().is_none());
    }

    #[test]
    fn seek_lands_at_or_before_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_sine(&path, 8000, 1, 2.0);

        let mut decoder = AudioDecoder::open(&path).unwrap();
        let landed = decoder.seek(Duration::from_millis(1000)).unwrap();
        assert!(landed <= Duration::from_millis(1000));
        assert!(landed >= Duration::from_millis(900), "landed at {:?}", landed);
        assert!(decoder.decode_next().unwrap().is_some());
    }
}
