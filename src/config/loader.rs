//! YAML loading for generator configurations

use std::fs;
use std::path::Path;

use tracing::debug;

use super::schema::LeakGanConfig;
use super::validate::validate_config;
use crate::error::{Error, Result};

/// Parse a configuration from a YAML string and validate it
pub fn parse_config(yaml: &str) -> Result<LeakGanConfig> {
    let config: LeakGanConfig = serde_yaml::from_str(yaml)?;
    validate_config(&config)?;
    Ok(config)
}

/// Load and validate a configuration from a YAML file
///
/// # Example
///
/// ```no_run
/// use entrenar_leakgan::config::load_config;
///
/// let config = load_config("leakgan.yaml")?;
/// println!("goal width: {}", config.goal_out_size());
/// # Ok::<(), entrenar_leakgan::Error>(())
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<LeakGanConfig> {
    let path = path.as_ref();
    let yaml = fs::read_to_string(path).map_err(|e| {
        Error::ConfigError(format!(
            "Failed to read config file {}: {e}",
            path.display()
        ))
    })?;
    let config = parse_config(&yaml)?;
    debug!(
        path = %path.display(),
        seq_len = config.seq_len(),
        goal_out_size = config.goal_out_size(),
        "loaded generator config"
    );
    Ok(config)
}
