//! Error types for vit-core.

use std::path::PathBuf;

/// Result type alias using vit-core Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when configuring a model or adapting a checkpoint.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to read a config or checkpoint file.
    #[error("failed to read '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write a checkpoint file.
    #[error("failed to write '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse YAML.
    #[error("failed to parse YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    /// Unknown model preset name.
    #[error("unknown preset '{0}' (expected one of b16, b32, l16, l32, h14)")]
    UnknownPreset(String),

    /// Validation error.
    #[error("validation error: {0}")]
    Validation(String),

    /// Malformed safetensors payload.
    #[error("invalid checkpoint: {0}")]
    Checkpoint(#[from] safetensors::SafeTensorError),

    /// Tensor stored with a dtype that cannot be converted to f32.
    #[error("unsupported dtype {dtype} for tensor '{key}'")]
    UnsupportedDType { key: String, dtype: String },

    /// Array construction failed.
    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Positional embedding token count is not `grid_side^2 + 1`.
    #[error("malformed positional embedding grid: {num_tokens} tokens is not a square grid plus a class token")]
    MalformedGrid { num_tokens: usize },

    /// Encoder-layer key whose layer segment is not an integer.
    #[error("invalid layer index in key '{key}'")]
    InvalidLayerKey { key: String },

    /// Array shape incompatible with the target parameter.
    #[error("shape mismatch for '{key}': expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        key: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Key absent from the target parameter storage.
    #[error("unknown parameter '{0}'")]
    UnknownParam(String),
}
