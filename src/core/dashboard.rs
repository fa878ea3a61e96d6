//! Live dashboard model fed by the event client.
//!
//! The dashboard listens to three message types:
//!
//! | type              | effect                                        |
//! |-------------------|-----------------------------------------------|
//! | `stats_update`    | replaces the latest [`StatsUpdate`]           |
//! | `activity_update` | appended to a bounded ring of recent activity |
//! | `alert`           | increments the alert counter, keeps the last  |
//!
//! Consumers read a [`DashboardSnapshot`] at any time; listeners only hold
//! the snapshot lock long enough to apply one update.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard},
};

use deface_realtime::{message_types, EventClient, ListenerHandle};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::dashboard::DashboardConfig;

/// Aggregate counters pushed by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatsUpdate {
    pub total_servers: u64,
    pub active_monitors: u64,
    pub alerts_today: u64,
    pub restored_files: u64,
    /// Server-side ISO 8601 time of the sample.
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub stats: Option<StatsUpdate>,
    /// Oldest first.
    pub recent_activity: VecDeque<Value>,
    pub alerts_received: u64,
    pub last_alert: Option<Value>,
    /// Messages applied since the dashboard was attached.
    pub updates: u64,
}

impl DashboardSnapshot {
    fn push_activity(&mut self, entry: Value, capacity: usize) {
        while self.recent_activity.len() >= capacity {
            self.recent_activity.pop_front();
        }
        self.recent_activity.push_back(entry);
    }
}

/// Dashboard attached to one event client.
pub struct Dashboard {
    client: EventClient,
    snapshot: Arc<Mutex<DashboardSnapshot>>,
    handles: Vec<ListenerHandle>,
}

impl Dashboard {
    /// Registers the dashboard listeners on `client`.
    pub fn attach(client: &EventClient, config: &DashboardConfig) -> Self {
        let snapshot = Arc::new(Mutex::new(DashboardSnapshot::default()));
        let capacity = config.activity_capacity.max(1);

        let stats = {
            let snapshot = snapshot.clone();
            client.on_typed(message_types::STATS_UPDATE, move |stats: StatsUpdate| {
                debug!(
                    total_servers = stats.total_servers,
                    alerts_today = stats.alerts_today,
                    "Stats update"
                );
                let mut snapshot = lock(&snapshot);
                snapshot.stats = Some(stats);
                snapshot.updates += 1;
                Ok(())
            })
        };

        let activity = {
            let snapshot = snapshot.clone();
            client.on(message_types::ACTIVITY_UPDATE, move |entry: &Value| {
                debug!("Activity update");
                let mut snapshot = lock(&snapshot);
                snapshot.push_activity(entry.clone(), capacity);
                snapshot.updates += 1;
                Ok(())
            })
        };

        let alert = {
            let snapshot = snapshot.clone();
            client.on(message_types::ALERT, move |alert: &Value| {
                warn!("Alert received: {}", alert);
                let mut snapshot = lock(&snapshot);
                snapshot.alerts_received += 1;
                snapshot.last_alert = Some(alert.clone());
                snapshot.updates += 1;
                Ok(())
            })
        };

        info!(activity_capacity = capacity, "Dashboard attached");
        Self {
            client: client.clone(),
            snapshot,
            handles: vec![stats, activity, alert],
        }
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        lock(&self.snapshot).clone()
    }

    /// Cancels the dashboard's own registrations, leaving other listeners on
    /// the client in place.
    pub fn detach(mut self) -> DashboardSnapshot {
        for handle in self.handles.drain(..) {
            self.client.off(&handle);
        }
        info!("Dashboard detached");
        self.snapshot()
    }

    /// One-line summary for periodic logging.
    pub fn summary(&self) -> String {
        let snapshot = lock(&self.snapshot);
        match &snapshot.stats {
            Some(stats) => format!(
                "servers={} monitors={} alerts_today={} restored={} activity={} alerts_seen={}",
                stats.total_servers,
                stats.active_monitors,
                stats.alerts_today,
                stats.restored_files,
                snapshot.recent_activity.len(),
                snapshot.alerts_received
            ),
            None => format!(
                "no stats yet, activity={} alerts_seen={}",
                snapshot.recent_activity.len(),
                snapshot.alerts_received
            ),
        }
    }
}

// A panicking listener is isolated by the router; its partial update is
// still a valid snapshot.
fn lock(snapshot: &Mutex<DashboardSnapshot>) -> MutexGuard<'_, DashboardSnapshot> {
    snapshot.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use deface_realtime::{router::MessageRouter, Config, RealtimeManager};
    use serde_json::json;

    use super::*;

    fn client() -> (EventClient, MessageRouter) {
        let client = RealtimeManager::from_config(Config::default())
            .unwrap()
            .build_and_start();
        let router = MessageRouter::new(client.registry());
        (client, router)
    }

    fn config(capacity: usize) -> DashboardConfig {
        DashboardConfig {
            activity_capacity: capacity,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_stats_update_replaces_latest() {
        let (client, router) = client();
        let dashboard = Dashboard::attach(&client, &config(10));

        router.route(
            r#"{"type":"stats_update","data":{"totalServers":4,"activeMonitors":3,"alertsToday":1,"restoredFiles":7,"timestamp":"2024-05-01T10:00:00"}}"#,
        );
        router.route(r#"{"type":"stats_update","data":{"totalServers":5}}"#);

        let snapshot = dashboard.snapshot();
        assert_eq!(
            snapshot.stats,
            Some(StatsUpdate {
                total_servers: 5,
                ..Default::default()
            })
        );
        assert_eq!(snapshot.updates, 2);
    }

    #[tokio::test]
    async fn test_malformed_stats_are_ignored() {
        let (client, router) = client();
        let dashboard = Dashboard::attach(&client, &config(10));

        router.route(r#"{"type":"stats_update","data":{"totalServers":"many"}}"#);
        assert_eq!(dashboard.snapshot().stats, None);
        assert!(dashboard.summary().starts_with("no stats yet"));
    }

    #[tokio::test]
    async fn test_activity_ring_is_bounded() {
        let (client, router) = client();
        let dashboard = Dashboard::attach(&client, &config(2));

        for n in 0..3 {
            router.route(&json!({"type": "activity_update", "data": {"n": n}}).to_string());
        }

        let activity = dashboard.snapshot().recent_activity;
        assert_eq!(activity, VecDeque::from(vec![json!({"n": 1}), json!({"n": 2})]));
    }

    #[tokio::test]
    async fn test_alerts_are_counted() {
        let (client, router) = client();
        let dashboard = Dashboard::attach(&client, &config(2));

        router.route(r#"{"type":"alert","data":{"file":"/var/www/index.html"}}"#);
        router.route(r#"{"type":"alert","data":{"file":"/var/www/app.js"}}"#);

        let snapshot = dashboard.snapshot();
        assert_eq!(snapshot.alerts_received, 2);
        assert_eq!(snapshot.last_alert, Some(json!({"file": "/var/www/app.js"})));
        assert!(dashboard.summary().contains("alerts_seen=2"));
    }

    #[tokio::test]
    async fn test_detach_removes_only_dashboard_listeners() {
        let (client, router) = client();
        let other = client.on(message_types::STATS_UPDATE, |_| Ok(()));
        let dashboard = Dashboard::attach(&client, &config(2));
        assert_eq!(client.registry().total(), 4);

        let last = dashboard.detach();
        assert_eq!(client.registry().total(), 1);
        assert!(last.stats.is_none());

        router.route(r#"{"type":"alert","data":{}}"#);
        assert!(client.off(&other));
    }
}
