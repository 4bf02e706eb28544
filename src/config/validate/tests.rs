//! Unit tests for configuration validation

use super::error::ValidationError;
use super::validator::validate_config;
use crate::config::schema::*;

fn create_valid_config() -> LeakGanConfig {
    LeakGanConfig {
        hidden_size: 8,
        embedding_size: 8,
        max_seq_length: 7,
        filter_nums: vec![4, 4],
        goal_size: 4,
        step_size: 4,
        batch_size: 4,
        vocab: VocabSpec {
            size: 12,
            start_idx: 1,
            end_idx: 2,
            pad_idx: 0,
        },
        ..Default::default()
    }
}

#[test]
fn test_valid_config() {
    let config = create_valid_config();
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_default_config_is_valid() {
    assert!(validate_config(&LeakGanConfig::default()).is_ok());
}

#[test]
fn test_invalid_batch_size() {
    let mut config = create_valid_config();
    config.batch_size = 0;
    let err = validate_config(&config).unwrap_err();
    assert!(matches!(err, ValidationError::InvalidBatchSize(0)));
}

#[test]
fn test_step_size_must_divide_decoded_length() {
    let mut config = create_valid_config();
    // max_length - 1 = 7 + 2 - 1 = 8
    config.step_size = 3;
    let err = validate_config(&config).unwrap_err();
    assert!(matches!(
        err,
        ValidationError::StepSizeMismatch {
            step_size: 3,
            seq_len: 8
        }
    ));

    config.step_size = 2;
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_zero_step_size() {
    let mut config = create_valid_config();
    config.step_size = 0;
    let err = validate_config(&config).unwrap_err();
    assert!(matches!(err, ValidationError::InvalidStepSize(0)));
}

#[test]
fn test_empty_filter_nums() {
    let mut config = create_valid_config();
    config.filter_nums = vec![];
    let err = validate_config(&config).unwrap_err();
    assert!(matches!(err, ValidationError::EmptyFilterNums));

    config.filter_nums = vec![0, 0];
    let err = validate_config(&config).unwrap_err();
    assert!(matches!(err, ValidationError::EmptyFilterNums));
}

#[test]
fn test_invalid_temperature() {
    let mut config = create_valid_config();
    config.temperature = 0.0;
    assert!(matches!(
        validate_config(&config).unwrap_err(),
        ValidationError::InvalidTemperature(_)
    ));

    config.temperature = f32::NAN;
    assert!(matches!(
        validate_config(&config).unwrap_err(),
        ValidationError::InvalidTemperature(_)
    ));
}

#[test]
fn test_zero_rollouts() {
    let mut config = create_valid_config();
    config.monte_carlo_num = 0;
    let err = validate_config(&config).unwrap_err();
    assert!(matches!(err, ValidationError::InvalidRolloutNum(0)));
}

#[test]
fn test_special_token_out_of_range() {
    let mut config = create_valid_config();
    config.vocab.end_idx = 12;
    let err = validate_config(&config).unwrap_err();
    assert!(matches!(
        err,
        ValidationError::SpecialTokenOutOfRange {
            name: "end_idx",
            index: 12,
            size: 12
        }
    ));
}

#[test]
fn test_special_tokens_distinct() {
    let mut config = create_valid_config();
    config.vocab.pad_idx = config.vocab.end_idx;
    let err = validate_config(&config).unwrap_err();
    assert!(matches!(err, ValidationError::SpecialTokensNotDistinct { .. }));
}

#[test]
fn test_error_messages() {
    let err = ValidationError::StepSizeMismatch {
        step_size: 3,
        seq_len: 8,
    };
    assert!(err.to_string().contains("must divide"));
    let err = ValidationError::InvalidTemperature(-1.0);
    assert!(err.to_string().contains("temperature"));
}
