//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::Parser;
use logroll::{SinkConfig, SinkError};

/// Append standard input to a log file, rotating it by size.
#[derive(Parser, Debug, Clone)]
#[command(name = "logroll")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log file to write. Required unless the config file sets it.
    #[arg(short, long, env = "LOGROLL_PATH")]
    pub path: Option<PathBuf>,

    /// Rotate before the file reaches this size (e.g. 1048576, 512K, 10M).
    /// Zero disables rotation.
    #[arg(short = 's', long, env = "LOGROLL_MAX_SIZE", value_parser = parse_size)]
    pub max_size: Option<u64>,

    /// Number of backups to keep. Zero or less selects the default.
    #[arg(
        short,
        long,
        env = "LOGROLL_RETAIN",
        allow_negative_numbers = true,
        value_parser = parse_retain
    )]
    pub retain: Option<usize>,

    /// JSON sink configuration. Flags override its values.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Echo input to standard output.
    #[arg(long)]
    pub tee: bool,
}

fn parse_size(input: &str) -> Result<u64, String> {
    logroll::parse_byte_size(input).map_err(|e| e.to_string())
}

fn parse_retain(input: &str) -> Result<usize, String> {
    input
        .trim()
        .parse::<i64>()
        .map(logroll::retain_count_from)
        .map_err(|e| format!("invalid retain count {input:?}: {e}"))
}

impl Cli {
    /// Resolves the sink configuration from the config file and flags.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Configuration`] if the config file cannot be read
    /// or parsed, or if no log file path is given.
    pub fn sink_config(&self) -> logroll::Result<SinkConfig> {
        let mut config = match &self.config {
            Some(file) => {
                let json = std::fs::read_to_string(file).map_err(|e| {
                    SinkError::Configuration(format!("cannot read {}: {e}", file.display()))
                })?;
                SinkConfig::from_json(&json)?
            }
            None => SinkConfig::default(),
        };

        if let Some(path) = &self.path {
            config.path.clone_from(path);
        }
        if let Some(max_size) = self.max_size {
            config.max_size = max_size;
        }
        if let Some(retain) = self.retain {
            config.retain_count = retain;
        }

        config.validate()?;
        Ok(config)
    }
}
