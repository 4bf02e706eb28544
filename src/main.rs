//! Entrenar LeakGAN CLI
//!
//! # Usage
//!
//! ```bash
//! # Validate config
//! entrenar-leakgan validate leakgan.yaml
//!
//! # Show derived sizes and parameter counts
//! entrenar-leakgan info leakgan.yaml --format json
//!
//! # Sample token ids with a freshly initialised generator
//! entrenar-leakgan sample leakgan.yaml --num 8 --seed 7
//! ```

use clap::Parser;
use entrenar_leakgan::cli::{init_tracing, run_command, Cli, LogLevel};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(LogLevel::from_flags(cli.verbose, cli.quiet));

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
