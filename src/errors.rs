use thiserror::Error;
use std::io;
use std::path::PathBuf;

/// Custom error types for glia_census
#[derive(Error, Debug)]
pub enum GliaCensusError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load configuration from {path}: {source}")]
    ConfigLoad {
        source: toml::de::Error,
        path: PathBuf,
    },

    #[error("Could not read manifest {path}: {source}")]
    Manifest {
        source: io::Error,
        path: PathBuf,
    },

    #[error("CSV output error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON output error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not open image directory {0}")]
    ImageDirectory(PathBuf),

    #[error("No layer files found in {0}")]
    NoLayers(PathBuf),

    #[error("Missing layer {layer} in {dir}")]
    MissingLayer {
        layer: usize,
        dir: PathBuf,
    },

    #[error("Found {0} z layers, at most 99 are supported")]
    TooManyLayers(usize),

    #[error("Layer {layer} is {actual:?}, expected {expected:?}")]
    LayerSizeMismatch {
        layer: usize,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Invalid channel type: {0}")]
    UnknownChannel(String),

    #[error("No low intensity band configured for the {0} channel")]
    UnsupportedBand(String),
}

/// Type alias for Result with our custom error type
pub type Result<T> = std::result::Result<T, GliaCensusError>;
