//! Application configuration: loading, validation and early console output.
//!
//! One TOML file with three sections:
//!
//! ```toml
//! [logger]       # see logger::LoggerConfig
//! [realtime]     # see deface_realtime::Config
//! [dashboard]    # see dashboard::DashboardConfig
//! ```
//!
//! The file is looked up in `DEFACE_LIVE_CONFIG`, then
//! `/etc/deface-live/config.toml`. Without either the built-in defaults are
//! used, which point at a monitoring server on localhost.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use validator::Validate;

use self::{dashboard::DashboardConfig, logger::LoggerConfig};

pub mod dashboard;
pub mod logger;

pub const CONFIG_ENV: &str = "DEFACE_LIVE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/deface-live/config.toml";

/// Timestamp used by the `print_*` macros.
#[doc(hidden)]
pub fn console_timestamp() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

/// Timestamped line on stdout, for use before the tracing subscriber exists.
#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style($crate::config::console_timestamp()).dim(),
            console::style("INFO").green(),
            format_args!($($arg)*)
        )
    };
}

#[macro_export]
macro_rules! print_warn {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style($crate::config::console_timestamp()).dim(),
            console::style("WARN").yellow(),
            format_args!($($arg)*)
        )
    };
}

#[macro_export]
macro_rules! print_error {
    ($($arg:tt)*) => {
        eprintln!("{} {} {}",
            console::style($crate::config::console_timestamp()).dim(),
            console::style("ERROR").red(),
            format_args!($($arg)*)
        )
    };
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error while reading configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error while reading configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

#[derive(Serialize, Deserialize, Debug, Validate, Clone, Default)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub logger: LoggerConfig,

    /// Event client settings: endpoint, topics, retry and keep-alive.
    #[validate(nested)]
    pub realtime: deface_realtime::Config,

    #[validate(nested)]
    pub dashboard: DashboardConfig,
}

impl Config {
    /// Locates and loads the configuration file, or falls back to defaults.
    ///
    /// # Errors
    /// A file that exists but cannot be read, parsed or validated is an
    /// error; a missing file is not.
    pub fn new() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) => Self::load(&path),
            None => {
                print_warn!(
                    "No configuration file found (set {} or create {}), using defaults",
                    CONFIG_ENV,
                    DEFAULT_CONFIG_PATH
                );
                Ok(Config::default())
            }
        }
    }

    /// `DEFACE_LIVE_CONFIG` first, then the system-wide path if it exists.
    fn config_path() -> Option<PathBuf> {
        if let Ok(config_path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(config_path);
            print_info!("Using config from {}: {}", CONFIG_ENV, path.display());
            return Some(path);
        }

        let fallback = Path::new(DEFAULT_CONFIG_PATH);
        if fallback.exists() {
            print_info!("Using default config path: {}", fallback.display());
            return Some(fallback.to_path_buf());
        }
        None
    }

    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        print_info!("Loading configuration from: {}", path.display());
        let raw = fs::read_to_string(path)?;
        let config = Self::parse(&raw)?;
        print_info!("Successfully loaded config from: {}", path.display());
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }
}
