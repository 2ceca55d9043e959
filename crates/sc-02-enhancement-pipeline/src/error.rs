//! Error types for the enhancement pipeline

use thiserror::Error;

/// A single filter failed. Recovered inside the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("image too small for {filter}: {width}x{height}")]
    ImageTooSmall {
        filter: String,
        width: u32,
        height: u32,
    },

    #[error("image too large for {filter}: {pixels} pixels (max {max})")]
    ImageTooLarge {
        filter: String,
        pixels: u64,
        max: u64,
    },

    #[error("filter panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Failed(String),
}

/// Decode/encode failures. These abort the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),
}

/// Registry construction errors. Fatal at start-up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("filter already registered: {0}")]
    DuplicateFilter(String),
}
