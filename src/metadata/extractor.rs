// Track info for the player screen, read with lofty
use lofty::probe::Probe;
use lofty::prelude::{Accessor, TaggedFileExt};
use std::path::Path;
use tracing::debug;

/// Title and artist shown above the progress bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub title: String,
    pub artist: String,
}

impl TrackInfo {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
        }
    }

    /// Read title and artist from the file's tags, taking each missing field
    /// from `fallback`. An unreadable file yields `fallback` unchanged.
    pub fn read(file_path: &Path, fallback: &TrackInfo) -> TrackInfo {
        let tagged_file = match Probe::open(file_path).and_then(|p| p.guess_file_type().map_err(Into::into)) {
            Ok(probe) => match probe.read() {
                Ok(f) => f,
                Err(e) => {
                    debug!("No readable tags in {:?}: {}", file_path, e);
                    return fallback.clone();
                }
            },
            Err(e) => {
                debug!("Could not probe {:?}: {}", file_path, e);
                return fallback.clone();
            }
        };

        let tag = tagged_file.primary_tag().or(tagged_file.first_tag());

        let title = tag
            .and_then(|t| t.title().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| fallback.title.clone());
        let artist = tag
            .and_then(|t| t.artist().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| fallback.artist.clone());

        TrackInfo { title, artist }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fallback() -> TrackInfo {
        TrackInfo::new("Royalty (NCS)", "Maestro Chives and Neoni")
    }

    #[test]
    fn missing_file_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let info = TrackInfo::read(&dir.path().join("file.mp3"), &fallback());
        assert_eq!(info, fallback());
    }

    #[test]
    fn untagged_wav_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..800 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        assert_eq!(TrackInfo::read(&path, &fallback()), fallback());
    }
}
