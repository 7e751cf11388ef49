// Converts decoded audio to the output device's channel layout and rate

use rubato::{FftFixedIn, Resampler};

use crate::error::{PlaybackError, PlaybackResult};

const CHUNK_FRAMES: usize = 1024;
const SUB_CHUNKS: usize = 2;

pub struct FormatAdapter {
    in_channels: usize,
    out_channels: usize,
    resampler: Option<FftFixedIn<f32>>,
    // Planar frames (already in the output layout) waiting for a full chunk
    pending: Vec<Vec<f32>>,
}

impl FormatAdapter {
    pub fn new(
        in_rate: u32,
        in_channels: usize,
        out_rate: u32,
        out_channels: usize,
    ) -> PlaybackResult<Self> {
        let in_channels = in_channels.max(1);
        let out_channels = out_channels.max(1);

        let resampler = if in_rate == out_rate {
            None
        } else {
            let r = FftFixedIn::<f32>::new(
                in_rate as usize,
                out_rate as usize,
                CHUNK_FRAMES,
                SUB_CHUNKS,
                out_channels,
            )
            .map_err(|e| PlaybackError::decode(format!("failed to create resampler: {}", e)))?;
            Some(r)
        };

        Ok(Self {
            in_channels,
            out_channels,
            resampler,
            pending: vec![Vec::new(); out_channels],
        })
    }

    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none() && self.in_channels == self.out_channels
    }

    /// Feed interleaved decoder samples; returns whatever interleaved output
    /// is ready. Resampled output lags the input by up to one chunk.
    pub fn process(&mut self, interleaved: &[f32]) -> PlaybackResult<Vec<f32>> {
        if self.is_passthrough() {
            return Ok(interleaved.to_vec());
        }

        let mapped = map_channels(interleaved, self.in_channels, self.out_channels);

        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(mapped);
        };

        for frame in mapped.chunks_exact(self.out_channels) {
            for (ch, sample) in frame.iter().enumerate() {
                self.pending[ch].push(*sample);
            }
        }

        let mut out = Vec::new();
        loop {
            let needed = resampler.input_frames_next();
            if self.pending[0].len() < needed {
                break;
            }
            let chunk: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|plane| plane.drain(..needed).collect())
                .collect();
            let resampled = resampler
                .process(&chunk, None)
                .map_err(|e| PlaybackError::decode(format!("resampling failed: {}", e)))?;
            interleave_into(&resampled, &mut out);
        }
        Ok(out)
    }

    /// Drain the partially filled chunk at end of stream, padding with silence.
    pub fn flush(&mut self) -> PlaybackResult<Vec<f32>> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(Vec::new());
        };
        if self.pending[0].is_empty() {
            return Ok(Vec::new());
        }

        let needed = resampler.input_frames_next();
        let chunk: Vec<Vec<f32>> = self
            .pending
            .iter_mut()
            .map(|plane| {
                let mut frames: Vec<f32> = plane.drain(..).collect();
                frames.resize(needed, 0.0);
                frames
            })
            .collect();
        let resampled = resampler
            .process(&chunk, None)
            .map_err(|e| PlaybackError::decode(format!("resampling failed: {}", e)))?;

        let mut out = Vec::new();
        interleave_into(&resampled, &mut out);
        Ok(out)
    }

    /// Forget buffered input, e.g. after a seek.
    pub fn reset(&mut self) {
        for plane in &mut self.pending {
            plane.clear();
        }
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
        }
    }
}

fn map_channels(interleaved: &[f32], from: usize, to: usize) -> Vec<f32> {
    if from == to {
        return interleaved.to_vec();
    }

    let frames = interleaved.len() / from;
    let mut out = Vec::with_capacity(frames * to);
    for frame in interleaved.chunks_exact(from) {
        if from == 1 {
            out.extend(std::iter::repeat(frame[0]).take(to));
        } else if to == 1 {
            out.push(frame.iter().sum::<f32>() / from as f32);
        } else {
            for ch in 0..to {
                out.push(frame.get(ch).copied().unwrap_or(0.0));
            }
        }
    }
    out
}

fn interleave_into(planes: &[Vec<f32>], out: &mut Vec<f32>) {
    let frames = planes.first().map_or(0, |p| p.len());
    out.reserve(frames * planes.len());
    for i in 0..frames {
        for plane in planes {
            out.push(plane[i]);
        }
    }
}
