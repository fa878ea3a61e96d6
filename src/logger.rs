//! Logging initialisation.
//!
//! `LoggerManager` turns a validated [`LoggerConfig`] into a global `tracing`
//! subscriber with a console layer, a journald layer, or both. Each layer gets
//! its own `EnvFilter`: `RUST_LOG` when set, the configured level otherwise.

use std::io;

use thiserror::Error;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter, Layer, Registry,
};
use validator::{Validate, ValidationErrors};

use crate::{
    config::logger::{ConsoleConfig, LogFormat, LoggerConfig},
    print_info, print_warn,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Logger initialization error: {0}")]
    Initialization(String),

    #[error("Logger configuration validation error: {0}")]
    Validation(#[from] ValidationErrors),

    /// Opening the journald socket failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("No logging layers were configured or successfully initialized")]
    NoLayersConfigured,

    /// Journald was requested next to the console and could not be opened.
    #[error("Failed to initialize journald logger while console logging is enabled")]
    JournaldUnavailable,
}

pub struct LoggerManager {
    config: LoggerConfig,
}

impl LoggerManager {
    /// # Errors
    /// `LoggerError::Validation` if the configuration is invalid.
    pub fn new(config: LoggerConfig) -> Result<Self, LoggerError> {
        config.validate()?;
        Ok(LoggerManager { config })
    }

    /// Installs the global subscriber. Call once, before the event client
    /// starts.
    ///
    /// # Errors
    /// Fails when no layer could be built, when journald is unavailable while
    /// the console is also requested, or when a global subscriber is already
    /// installed.
    pub fn init(&self) -> Result<(), LoggerError> {
        let layers = self.layers()?;
        tracing_subscriber::registry()
            .with(layers)
            .try_init()
            .map_err(|e| LoggerError::Initialization(e.to_string()))
    }

    fn layers(&self) -> Result<Vec<BoxedLayer>, LoggerError> {
        let mut layers = Vec::new();

        if let Some(console) = self.config.console.as_ref().filter(|c| c.enabled) {
            layers.push(console_layer(console, self.filter()));
        }

        if let Some(journald) = self.config.journald.as_ref().filter(|j| j.enabled) {
            match journald_layer(&journald.identifier, self.filter()) {
                Ok(layer) => {
                    layers.push(layer);
                    print_info!(
                        "Journald logger initialized with identifier: {}",
                        journald.identifier
                    );
                }
                Err(e) => {
                    print_warn!("Failed to initialize journald logger: {}", e);
                    if self.config.console_enabled() {
                        return Err(LoggerError::JournaldUnavailable);
                    }
                }
            }
        }

        if layers.is_empty() {
            print_warn!("No logging layers were initialized, check the [logger] section");
            return Err(LoggerError::NoLayersConfigured);
        }
        Ok(layers)
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.config.level))
    }
}

fn console_layer(config: &ConsoleConfig, filter: EnvFilter) -> BoxedLayer {
    let span_events = if config.show_spans {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let base = fmt::layer()
        .with_target(config.show_target)
        .with_thread_ids(config.show_thread_ids)
        .with_span_events(span_events)
        .with_ansi(config.ansi_colors)
        .with_writer(io::stdout);

    match config.format {
        LogFormat::Json => base.json().with_filter(filter).boxed(),
        LogFormat::Pretty => base.pretty().with_filter(filter).boxed(),
        LogFormat::Compact => base.compact().with_filter(filter).boxed(),
    }
}

fn journald_layer(identifier: &str, filter: EnvFilter) -> Result<BoxedLayer, LoggerError> {
    let layer = tracing_journald::layer()?.with_syslog_identifier(identifier.to_string());
    Ok(layer.with_filter(filter).boxed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::logger::JournaldConfig;

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = LoggerConfig {
            level: "loud".into(),
            ..Default::default()
        };
        assert!(matches!(
            LoggerManager::new(config),
            Err(LoggerError::Validation(_))
        ));
    }

    #[test]
    fn test_console_layer_for_every_format() {
        for format in [LogFormat::Compact, LogFormat::Pretty, LogFormat::Json] {
            let config = LoggerConfig {
                console: Some(ConsoleConfig {
                    format,
                    ..Default::default()
                }),
                journald: None,
                ..Default::default()
            };
            let manager = LoggerManager::new(config).unwrap();
            assert_eq!(manager.layers().unwrap().len(), 1);
        }
    }

    #[test]
    fn test_no_outputs_is_an_error() {
        let config = LoggerConfig {
            console: Some(ConsoleConfig {
                enabled: false,
                ..Default::default()
            }),
            journald: Some(JournaldConfig::default()),
            ..Default::default()
        };
        let manager = LoggerManager::new(config).unwrap();
        assert!(matches!(
            manager.layers(),
            Err(LoggerError::NoLayersConfigured)
        ));
    }
}
