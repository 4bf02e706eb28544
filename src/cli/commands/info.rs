//! Info command implementation

use serde::Serialize;

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{load_config, InfoArgs, LeakGanConfig, OutputFormat};
use crate::generative::{LeakGanGenerator, ParamGroup};

/// Derived sizes of a configuration
#[derive(Debug, Serialize)]
pub struct ConfigInfo {
    pub config: LeakGanConfig,
    pub feature_width: usize,
    pub seq_len: usize,
    pub num_windows: usize,
    pub manager_parameters: usize,
    pub worker_parameters: usize,
}

impl ConfigInfo {
    pub fn from_config(config: LeakGanConfig) -> Result<Self, String> {
        let generator = LeakGanGenerator::with_seed(config.clone(), 0)
            .map_err(|e| format!("Generator error: {e}"))?;
        let count = |group: ParamGroup| -> usize {
            generator
                .parameters(group)
                .iter()
                .map(|p| p.values.len())
                .sum()
        };
        Ok(Self {
            feature_width: config.goal_out_size(),
            seq_len: config.seq_len(),
            num_windows: config.num_windows(),
            manager_parameters: count(ParamGroup::Manager),
            worker_parameters: count(ParamGroup::Worker),
            config,
        })
    }
}

pub fn run_info(args: InfoArgs, level: LogLevel) -> Result<(), String> {
    let config = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;
    let info = ConfigInfo::from_config(config)?;

    match args.format {
        OutputFormat::Text => {
            log(level, LogLevel::Normal, "Configuration Info:");
            println!();
            println!("Device: {}", info.config.device);
            println!("Vocabulary: {}", info.config.vocab.size);
            println!(
                "Feature/goal width: {} ({} filters)",
                info.feature_width,
                info.config.filter_nums.len()
            );
            println!(
                "Sequence length: {} ({} windows of {})",
                info.seq_len, info.num_windows, info.config.step_size
            );
            println!("Batch size: {}", info.config.batch_size);
            println!("Monte-Carlo rollouts: {}", info.config.monte_carlo_num);
            println!(
                "Parameters: manager {} / worker {}",
                info.manager_parameters, info.worker_parameters
            );
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&info)
                .map_err(|e| format!("JSON serialization error: {e}"))?;
            println!("{json}");
        }
    }

    Ok(())
}
