//! Dashboard feed settings.

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DashboardConfig {
    /// Number of recent `activity_update` payloads kept in memory.
    #[validate(range(
        min = 1,
        max = 10_000,
        message = "Activity capacity must be between 1 and 10000"
    ))]
    pub activity_capacity: usize,

    /// Seconds between two snapshot summaries in the log. `0` disables them.
    #[validate(range(max = 86_400, message = "Summary interval must not exceed one day"))]
    pub summary_interval: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            activity_capacity: 50,
            summary_interval: 60,
        }
    }
}
