//! Error types for the LeakGAN generator.

use thiserror::Error;

use crate::config::{Device, ValidationError};

/// LeakGAN errors
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: String,
        actual: String,
    },

    #[error("Array layout error: {0}")]
    Layout(#[from] ndarray::ShapeError),

    #[error("step_size {step_size} does not divide sequence length {seq_len}")]
    StepSize { step_size: usize, seq_len: usize },

    #[error("Device mismatch: expected {expected}, got {actual}")]
    DeviceMismatch { expected: Device, actual: Device },

    #[error("Device unavailable for the ndarray backend: {0}")]
    DeviceUnavailable(Device),

    #[error("Sampling failed at step {step}: {reason}")]
    Sampling { step: usize, reason: String },

    #[error("Token {token} outside vocabulary of size {vocab_size}")]
    TokenOutOfRange { token: u32, vocab_size: usize },

    #[error("Discriminator error: {0}")]
    Discriminator(String),
}

impl Error {
    /// Build a [`Error::ShapeMismatch`] from anything debug-printable
    pub(crate) fn shape(
        context: &'static str,
        expected: impl std::fmt::Debug,
        actual: impl std::fmt::Debug,
    ) -> Self {
        Self::ShapeMismatch {
            context,
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        }
    }
}

/// Result type for LeakGAN operations
pub type Result<T> = std::result::Result<T, Error>;
