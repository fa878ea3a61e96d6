//! Logging configuration.
//!
//! ```toml
//! [logger]
//! level = "info"
//!
//! [logger.console]
//! enabled = true
//! format = "compact"   # compact | pretty | json
//!
//! [logger.journald]
//! enabled = false
//! identifier = "deface-live"
//! ```

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Console output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggerConfig {
    /// trace, debug, info, warn or error (case-insensitive).
    /// `RUST_LOG`, when set, takes precedence.
    #[validate(custom(function = "validate_log_level"))]
    pub level: String,

    #[validate(nested)]
    pub console: Option<ConsoleConfig>,

    /// systemd journal output (Linux only).
    #[validate(nested)]
    pub journald: Option<JournaldConfig>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig {
            level: "info".to_string(),
            console: Some(ConsoleConfig::default()),
            journald: Some(JournaldConfig::default()),
        }
    }
}

impl LoggerConfig {
    pub fn console_enabled(&self) -> bool {
        self.console.as_ref().is_some_and(|c| c.enabled)
    }

    pub fn journald_enabled(&self) -> bool {
        self.journald.as_ref().is_some_and(|j| j.enabled)
    }
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => {
            let mut err = ValidationError::new("invalid_log_level");
            err.message = Some(format!("Invalid log level: {level}").into());
            Err(err)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub format: LogFormat,
    /// Print the module path of each event.
    pub show_target: bool,
    pub show_thread_ids: bool,
    /// Log span close events (connection attempts carry a span).
    pub show_spans: bool,
    pub ansi_colors: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        ConsoleConfig {
            enabled: true,
            format: LogFormat::default(),
            show_target: false,
            show_thread_ids: false,
            show_spans: false,
            ansi_colors: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct JournaldConfig {
    pub enabled: bool,

    /// Syslog identifier of journal entries.
    #[validate(length(min = 1, message = "Journald identifier must not be empty"))]
    pub identifier: String,
}

impl Default for JournaldConfig {
    fn default() -> Self {
        JournaldConfig {
            enabled: false,
            identifier: "deface-live".to_string(),
        }
    }
}
