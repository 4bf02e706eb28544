//! Validation error types

/// Validation error type
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid hidden size: {0} (must be > 0)")]
    InvalidHiddenSize(usize),

    #[error("Invalid embedding size: {0} (must be > 0)")]
    InvalidEmbeddingSize(usize),

    #[error("Invalid max sequence length: {0} (must be > 0)")]
    InvalidSeqLen(usize),

    #[error("Invalid batch size: {0} (must be > 0)")]
    InvalidBatchSize(usize),

    #[error("Invalid goal size: {0} (must be > 0)")]
    InvalidGoalSize(usize),

    #[error("Filter widths cannot be empty or sum to zero")]
    EmptyFilterNums,

    #[error("Invalid step size: {0} (must be > 0)")]
    InvalidStepSize(usize),

    #[error("step_size {step_size} must divide max_length - 1 = {seq_len}")]
    StepSizeMismatch { step_size: usize, seq_len: usize },

    #[error("Invalid temperature: {0} (must be finite and > 0.0)")]
    InvalidTemperature(f32),

    #[error("Invalid Monte-Carlo rollout count: {0} (must be >= 1)")]
    InvalidRolloutNum(usize),

    #[error("Invalid vocabulary size: {0} (must hold start, end and pad tokens)")]
    InvalidVocabSize(usize),

    #[error("Special token {name}={index} outside vocabulary of size {size}")]
    SpecialTokenOutOfRange {
        name: &'static str,
        index: u32,
        size: usize,
    },

    #[error("Special tokens must be distinct (start={start}, end={end}, pad={pad})")]
    SpecialTokensNotDistinct { start: u32, end: u32, pad: u32 },
}
