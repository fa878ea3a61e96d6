//! deface-live: headless real-time feed of the deface integrity monitor.
//!
//! Connects to the monitoring server's push endpoint through
//! [`deface_realtime`], keeps the live dashboard model (server stats, recent
//! activity, alerts) up to date and reports feed readiness.
//!
//! ## Modules
//!
//! * `config`: TOML configuration (`[logger]`, `[realtime]`, `[dashboard]`)
//!   with validation, plus `print_*` macros for output before logging starts.
//! * `core`: the [`core::dashboard::Dashboard`] model and
//!   [`core::readiness::Readiness`] tracking.
//! * `logger`: `tracing` subscriber setup (console and journald).

pub mod config;
pub mod core;
pub mod logger;
