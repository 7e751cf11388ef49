// Track metadata for the player screen

pub mod extractor;

pub use extractor::TrackInfo;
