//! YAML schema for the LeakGAN generator configuration

use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution device for all tensor-like state of a generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Host memory
    #[default]
    Cpu,
    /// Accelerator memory
    Cuda {
        /// Accelerator index
        ordinal: usize,
    },
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda { ordinal } => write!(f, "cuda:{ordinal}"),
        }
    }
}

/// Vocabulary layout supplied by the corpus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabSpec {
    /// Number of token ids
    pub size: usize,
    /// Start-of-sequence token id
    pub start_idx: u32,
    /// End-of-sequence token id
    pub end_idx: u32,
    /// Padding token id
    pub pad_idx: u32,
}

impl Default for VocabSpec {
    fn default() -> Self {
        Self {
            size: 5000,
            start_idx: 1,
            end_idx: 2,
            pad_idx: 0,
        }
    }
}

/// Complete generator configuration
///
/// `max_seq_length` counts content tokens only; every sequence additionally
/// carries a start and an end token, so the decoded length is
/// `max_seq_length + 1` (start token excluded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeakGanConfig {
    /// Width of both LSTM hidden states
    pub hidden_size: usize,
    /// Width of the worker token embedding
    pub embedding_size: usize,
    /// Maximum content length of a sequence
    pub max_seq_length: usize,
    /// Rollouts per checkpoint in the Monte-Carlo reward estimator
    pub monte_carlo_num: usize,
    /// Discriminator filter widths; their sum is the feature and goal width
    pub filter_nums: Vec<usize>,
    /// Size of the latent goal subspace used by the worker
    pub goal_size: usize,
    /// Steps between real-goal refreshes
    pub step_size: usize,
    /// Sampling temperature (multiplies the logits)
    pub temperature: f32,
    /// Internal batch size, also the number of initial-goal slots
    pub batch_size: usize,
    /// Number of sequences produced by evaluation-time generation
    pub eval_generate_num: usize,
    /// Discriminator class whose probability is used as reward
    pub reward_class: usize,
    /// Execution device
    pub device: Device,
    /// Vocabulary layout
    pub vocab: VocabSpec,
}

impl Default for LeakGanConfig {
    fn default() -> Self {
        Self {
            hidden_size: 32,
            embedding_size: 32,
            max_seq_length: 19,
            monte_carlo_num: 4,
            filter_nums: vec![100, 200, 200, 200, 200, 100, 100, 100, 100, 100, 160, 160],
            goal_size: 16,
            step_size: 4,
            temperature: 1.5,
            batch_size: 64,
            eval_generate_num: 1000,
            reward_class: 1,
            device: Device::Cpu,
            vocab: VocabSpec::default(),
        }
    }
}

impl LeakGanConfig {
    /// Width of discriminator features and manager goals
    #[must_use]
    pub fn goal_out_size(&self) -> usize {
        self.filter_nums.iter().sum()
    }

    /// Padded sequence length including start and end tokens
    #[must_use]
    pub fn max_length(&self) -> usize {
        self.max_seq_length + 2
    }

    /// Number of decoding steps (sequence length without the start token)
    #[must_use]
    pub fn seq_len(&self) -> usize {
        self.max_length() - 1
    }

    /// Number of goal windows per sequence
    #[must_use]
    pub fn num_windows(&self) -> usize {
        if self.step_size == 0 {
            return 0;
        }
        self.seq_len() / self.step_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_derived_sizes() {
        let config = LeakGanConfig::default();
        assert_eq!(config.goal_out_size(), 1720);
        assert_eq!(config.max_length(), 21);
        assert_eq!(config.seq_len(), 20);
        assert_eq!(config.num_windows(), 5);
    }

    #[test]
    fn test_device_display() {
        assert_eq!(Device::Cpu.to_string(), "cpu");
        assert_eq!(Device::Cuda { ordinal: 2 }.to_string(), "cuda:2");
    }

    #[test]
    fn test_yaml_partial_uses_defaults() {
        let yaml = "hidden_size: 8\nstep_size: 2\ndevice: cpu\nvocab:\n  size: 10\n  start_idx: 1\n  end_idx: 2\n  pad_idx: 0\n";
        let config: LeakGanConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.hidden_size, 8);
        assert_eq!(config.step_size, 2);
        assert_eq!(config.vocab.size, 10);
        // Unspecified fields fall back to defaults
        assert_eq!(config.goal_size, 16);
    }

    #[test]
    fn test_yaml_cuda_device() {
        let yaml = "device: !cuda\n  ordinal: 1\n";
        let config: LeakGanConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.device, Device::Cuda { ordinal: 1 });
    }
}
