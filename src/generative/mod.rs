//! Generative models for adversarial text generation
//!
//! This module implements the generator half of LeakGAN where:
//! - Generator: a hierarchical manager/worker policy producing token sequences
//! - Discriminator: an external collaborator that leaks its intermediate
//!   features to the generator and scores completed sequences
//!
//! The generator is trained with a supervised next-token objective and with
//! policy gradients shaped by Monte-Carlo rollout rewards.

pub mod leak_gan;

pub use leak_gan::{
    CorpusBatch, DiscriminatorConfig, ExecutionContext, FeatureDiscriminator, LeakGanGenerator,
    LossPair, OutputForm, ParamGroup, PooledDiscriminator, StepLoopOptions, Trajectory,
};
