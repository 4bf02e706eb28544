//! LeakGAN generator core
//!
//! A hierarchical manager/worker text generator that conditions every
//! decoding step on features leaked from a discriminator, with Monte-Carlo
//! rollout rewards and the supervised and adversarial losses that train it.
//!
//! # Modules
//!
//! - [`config`]: YAML configuration, validation and CLI argument types
//! - [`generative`]: policies, step loop, reward estimation and losses
//! - [`cli`]: command handlers for the `entrenar-leakgan` binary

pub mod cli;
pub mod config;
pub mod error;
pub mod generative;

pub use config::{load_config, Device, LeakGanConfig};
pub use error::{Error, Result};
pub use generative::{FeatureDiscriminator, LeakGanGenerator};
