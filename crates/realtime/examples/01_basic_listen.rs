use deface_realtime::{message_types, ConnectionState, RealtimeManager};
use serde::Deserialize;
use tokio::signal;
use tracing::{info, warn};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Stats {
    total_servers: u64,
    active_monitors: u64,
    alerts_today: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://localhost:8000/ws".to_string());
    let client = RealtimeManager::new(url)?.build_and_start();

    client.on_typed(message_types::STATS_UPDATE, |stats: Stats| {
        info!(
            "{} servers, {} monitors, {} alerts today",
            stats.total_servers, stats.active_monitors, stats.alerts_today
        );
        Ok(())
    });
    client.on(message_types::ALERT, |payload| {
        warn!("Alert: {}", payload);
        Ok(())
    });

    // Log every state transition.
    let mut state_rx = client.state_receiver();
    tokio::spawn(async move {
        while state_rx.changed().await.is_ok() {
            let state = state_rx.borrow_and_update().clone();
            if let ConnectionState::Reconnecting { attempt, .. } = state {
                warn!("Connection lost, retry {}", attempt);
            } else {
                info!("State: {}", state);
            }
        }
    });

    client.connect();

    signal::ctrl_c().await?;
    info!("Received shutdown signal");

    client.disconnect();
    client.shutdown().await;
    Ok(())
}
