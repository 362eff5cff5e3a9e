//! Configuration management
//!
//! Command line arguments (with environment overrides) are resolved into a
//! [`Config`]. The coordinator's difficulty is read separately from its
//! config file, see [`difficulty`].

use crate::error::{Error, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub mod difficulty;

pub use difficulty::{DifficultyFallback, DifficultySetting, load_difficulty};

/// Default directory holding the named pipes and the config file
pub const DEFAULT_PIPE_DIR: &str = "/mnt/mta";

/// Default config file name inside the pipe directory
pub const CONFIG_FILE_NAME: &str = "mtacoin.conf";

/// Default number of worker identifiers
pub const DEFAULT_POOL_SIZE: u32 = 4;

/// Largest accepted worker pool
pub const MAX_POOL_SIZE: u32 = 64;

/// Log output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line human readable output
    #[default]
    Plain,
    /// Multi-line human readable output
    Pretty,
    /// One JSON object per line
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Plain => write!(f, "plain"),
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Command line arguments
#[derive(Debug, Clone, Parser)]
#[command(
    name = "mtacoin",
    version = env!("CARGO_PKG_VERSION"),
    about = "Proof-of-work chain with one coordinator and preemptible miners"
)]
pub struct Args {
    /// Directory holding the named pipes
    #[arg(long, global = true, env = "MTACOIN_PIPE_DIR", default_value = DEFAULT_PIPE_DIR)]
    pub pipe_dir: PathBuf,

    /// Log level or filter directive
    #[arg(long, global = true, env = "MTACOIN_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Append log lines to this file instead of stderr
    #[arg(long, global = true, env = "MTACOIN_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Print the resolved configuration and exit
    #[arg(long, global = true)]
    pub print_config: bool,

    /// Process role
    #[command(subcommand)]
    pub command: Command,
}

/// Process roles
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the coordinator
    Server(ServerArgs),
    /// Run a miner
    Miner(MinerArgs),
}

/// Coordinator arguments
#[derive(Debug, Clone, clap::Args)]
pub struct ServerArgs {
    /// Difficulty config file (defaults to <pipe-dir>/mtacoin.conf)
    #[arg(long, env = "MTACOIN_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Miner arguments
#[derive(Debug, Clone, clap::Args)]
pub struct MinerArgs {
    /// Number of worker identifiers to choose from
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE)]
    pub pool_size: u32,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level or `EnvFilter` directive
    pub level: String,
    /// Output format
    pub format: LogFormat,
    /// Optional log file
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Plain,
            file: None,
        }
    }
}

/// Role-specific settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum RoleConfig {
    /// Coordinator settings
    Server {
        /// Difficulty config file
        config_file: PathBuf,
    },
    /// Miner settings
    Miner {
        /// Worker identifier pool size
        pool_size: u32,
    },
}

/// Resolved configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the named pipes
    pub pipe_dir: PathBuf,
    /// Logging settings
    pub logging: LoggingConfig,
    /// Role settings
    pub role: RoleConfig,
}

impl Config {
    /// Resolve arguments into a validated configuration
    pub fn from_args(args: &Args) -> Result<Self> {
        let role = match &args.command {
            Command::Server(server) => RoleConfig::Server {
                config_file: server
                    .config
                    .clone()
                    .unwrap_or_else(|| args.pipe_dir.join(CONFIG_FILE_NAME)),
            },
            Command::Miner(miner) => RoleConfig::Miner {
                pool_size: miner.pool_size,
            },
        };

        let config = Self {
            pipe_dir: args.pipe_dir.clone(),
            logging: LoggingConfig {
                level: args.log_level.clone(),
                format: args.log_format,
                file: args.log_file.clone(),
            },
            role,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.pipe_dir.as_os_str().is_empty() {
            return Err(Error::config("Pipe directory cannot be empty"));
        }
        if self.logging.level.trim().is_empty() {
            return Err(Error::config("Log level cannot be empty"));
        }
        if let RoleConfig::Miner { pool_size } = self.role {
            if !(1..=MAX_POOL_SIZE).contains(&pool_size) {
                return Err(Error::config(format!(
                    "Pool size must be between 1 and {}, got {}",
                    MAX_POOL_SIZE, pool_size
                )));
            }
        }
        Ok(())
    }

    /// Configuration as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_server_defaults() {
        let config = Config::from_args(&parse(&["mtacoin", "--pipe-dir", "/tmp/mta", "server"])).unwrap();

        assert_eq!(config.pipe_dir, PathBuf::from("/tmp/mta"));
        assert_eq!(
            config.role,
            RoleConfig::Server {
                config_file: PathBuf::from("/tmp/mta/mtacoin.conf")
            }
        );
        assert_eq!(config.logging.format, LogFormat::Plain);
    }

    #[test]
    fn test_server_explicit_config() {
        let args = parse(&["mtacoin", "server", "--config", "/etc/mta.conf"]);
        let config = Config::from_args(&args).unwrap();
        assert_eq!(
            config.role,
            RoleConfig::Server {
                config_file: PathBuf::from("/etc/mta.conf")
            }
        );
    }

    #[test]
    fn test_miner_pool_size() {
        let args = parse(&["mtacoin", "miner", "--pool-size", "8", "--log-format", "json"]);
        let config = Config::from_args(&args).unwrap();
        assert_eq!(config.role, RoleConfig::Miner { pool_size: 8 });
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_pool_size() {
        for size in ["0", "65"] {
            let args = parse(&["mtacoin", "miner", "--pool-size", size]);
            assert!(matches!(Config::from_args(&args), Err(Error::Config(_))));
        }
    }

    #[test]
    fn test_missing_subcommand() {
        assert!(Args::try_parse_from(["mtacoin"]).is_err());
    }

    #[test]
    fn test_config_json() {
        let config = Config {
            pipe_dir: PathBuf::from("/mnt/mta"),
            logging: LoggingConfig::default(),
            role: RoleConfig::Miner { pool_size: 4 },
        };
        let json = config.to_json().unwrap();
        assert!(json.contains("\"role\": \"miner\""));

        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
