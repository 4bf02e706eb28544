//! Configuration validation logic

use super::error::ValidationError;
use crate::config::schema::LeakGanConfig;

/// Validate a generator configuration
///
/// Checks:
/// - Layer sizes are non-zero
/// - `step_size` divides the decoded length so goal windows stay in bounds
/// - Special token indices lie inside the vocabulary
pub fn validate_config(config: &LeakGanConfig) -> Result<(), ValidationError> {
    if config.hidden_size == 0 {
        return Err(ValidationError::InvalidHiddenSize(config.hidden_size));
    }
    if config.embedding_size == 0 {
        return Err(ValidationError::InvalidEmbeddingSize(config.embedding_size));
    }
    if config.max_seq_length == 0 {
        return Err(ValidationError::InvalidSeqLen(config.max_seq_length));
    }
    if config.batch_size == 0 {
        return Err(ValidationError::InvalidBatchSize(config.batch_size));
    }
    if config.goal_size == 0 {
        return Err(ValidationError::InvalidGoalSize(config.goal_size));
    }
    if config.goal_out_size() == 0 {
        return Err(ValidationError::EmptyFilterNums);
    }

    if config.step_size == 0 {
        return Err(ValidationError::InvalidStepSize(config.step_size));
    }
    let seq_len = config.seq_len();
    if seq_len % config.step_size != 0 {
        return Err(ValidationError::StepSizeMismatch {
            step_size: config.step_size,
            seq_len,
        });
    }

    if !config.temperature.is_finite() || config.temperature <= 0.0 {
        return Err(ValidationError::InvalidTemperature(config.temperature));
    }
    if config.monte_carlo_num == 0 {
        return Err(ValidationError::InvalidRolloutNum(config.monte_carlo_num));
    }

    validate_vocab(config)
}

fn validate_vocab(config: &LeakGanConfig) -> Result<(), ValidationError> {
    let vocab = &config.vocab;
    if vocab.size < 3 {
        return Err(ValidationError::InvalidVocabSize(vocab.size));
    }

    for (name, index) in [
        ("start_idx", vocab.start_idx),
        ("end_idx", vocab.end_idx),
        ("pad_idx", vocab.pad_idx),
    ] {
        if index as usize >= vocab.size {
            return Err(ValidationError::SpecialTokenOutOfRange {
                name,
                index,
                size: vocab.size,
            });
        }
    }

    if vocab.start_idx == vocab.end_idx
        || vocab.start_idx == vocab.pad_idx
        || vocab.end_idx == vocab.pad_idx
    {
        return Err(ValidationError::SpecialTokensNotDistinct {
            start: vocab.start_idx,
            end: vocab.end_idx,
            pad: vocab.pad_idx,
        });
    }

    Ok(())
}
