//! Validate command implementation

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{load_config, LeakGanConfig, ValidateArgs};

/// Format the derived sequence geometry as a string
pub fn format_geometry(config: &LeakGanConfig) -> String {
    format!(
        "  Sequence length: {} (max_length {})\n  Goal windows: {} x {} steps",
        config.seq_len(),
        config.max_length(),
        config.num_windows(),
        config.step_size
    )
}

pub fn run_validate(args: ValidateArgs, level: LogLevel) -> Result<(), String> {
    log(
        level,
        LogLevel::Normal,
        &format!("Validating config: {}", args.config.display()),
    );

    // load_config validates as part of loading
    let config = load_config(&args.config).map_err(|e| format!("Validation failed: {e}"))?;

    log(level, LogLevel::Normal, "Configuration is valid");
    log(level, LogLevel::Verbose, &format_geometry(&config));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_format_geometry() {
        let config = LeakGanConfig::default();
        let info = format_geometry(&config);
        assert!(info.contains("Sequence length: 20"));
        assert!(info.contains("5 x 4"));
    }

    #[test]
    fn test_run_validate_ok() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "step_size: 5").unwrap();
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
        };
        assert!(run_validate(args, LogLevel::Quiet).is_ok());
    }

    #[test]
    fn test_run_validate_rejects_bad_step() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "step_size: 3").unwrap();
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
        };
        let err = run_validate(args, LogLevel::Quiet).unwrap_err();
        assert!(err.contains("Validation failed"));
    }
}
