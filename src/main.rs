use std::{process, sync::OnceLock, time::Duration};

use deface_live::{
    config::Config,
    core::{dashboard::Dashboard, readiness::Readiness},
    logger::LoggerManager,
    print_error,
};
use deface_realtime::RealtimeManager;
use tracing::{debug, error, info};

static CONFIG: OnceLock<Config> = OnceLock::new();

pub fn config() -> &'static Config {
    CONFIG.get_or_init(|| {
        Config::new().unwrap_or_else(|e| {
            print_error!("{}", e);
            process::exit(1);
        })
    })
}

/// Next summary slot; pending forever when summaries are disabled.
async fn summary_tick(interval: &mut Option<tokio::time::Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config();
    let logger_manager = LoggerManager::new(cfg.logger.clone()).unwrap_or_else(|e| {
        print_error!("Failed to setup Log Manager: {}", e);
        process::exit(1);
    });
    logger_manager.init().unwrap_or_else(|e| {
        print_error!("Failed to init Log Manager: {}", e);
        process::exit(1);
    });
    info!("Starting deface-live version {}...", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", cfg.logger.level);
    debug!("{:#?}", cfg.realtime);

    let client = RealtimeManager::from_config(cfg.realtime.clone())
        .unwrap_or_else(|e| {
            error!("Failed to create event client: {}", e);
            process::exit(1);
        })
        .build_and_start();

    let readiness = Readiness::default();
    readiness.start_listening(client.state_receiver());

    let dashboard = Dashboard::attach(&client, &cfg.dashboard);
    client.connect();

    let mut summary = (cfg.dashboard.summary_interval > 0).then(|| {
        let period = Duration::from_secs(cfg.dashboard.summary_interval);
        tokio::time::interval_at(tokio::time::Instant::now() + period, period)
    });

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, initiating graceful shutdown...");
                break;
            }
            _ = summary_tick(&mut summary) => {
                info!("[{}] {}", readiness.current_state().as_str(), dashboard.summary());
            }
        }
    }

    let last = dashboard.detach();
    debug!(
        "Final snapshot: {} updates, {} alerts",
        last.updates, last.alerts_received
    );
    client.disconnect();
    client.shutdown().await;

    info!("Shutdown complete");
    Ok(())
}
