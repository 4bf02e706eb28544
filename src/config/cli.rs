//! CLI argument parsing
//!
//! # Usage
//!
//! ```bash
//! entrenar-leakgan validate leakgan.yaml
//! entrenar-leakgan info leakgan.yaml --format json
//! entrenar-leakgan sample leakgan.yaml --num 10 --seed 42
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// LeakGAN generator: hierarchical text generation with leaked discriminator features
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "entrenar-leakgan")]
#[command(author = "PAIML")]
#[command(version)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Validate a configuration file
    Validate(ValidateArgs),

    /// Display derived sizes and parameter counts for a configuration
    Info(InfoArgs),

    /// Sample sequences with a freshly initialised generator
    Sample(SampleArgs),
}

/// Arguments for the validate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,
}

/// Output format for the info command
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON object
    Json,
}

/// Arguments for the info command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct InfoArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Arguments for the sample command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct SampleArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Number of sequences to sample (defaults to eval_generate_num)
    #[arg(short, long)]
    pub num: Option<usize>,

    /// Random seed for parameters and sampling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Use training-mode temperature schedule
    #[arg(long)]
    pub train: bool,
}

/// Parse CLI arguments from an iterator
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}
