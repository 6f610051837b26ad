//! Session behavior configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for presence behavior. One copy lives in the coordinator;
/// the gateway reads `sweep_interval` for its reaper timer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Cap on *active* (non-disconnected) members per session.
    /// Disconnected-but-unreaped members do not count against it.
    pub max_active_members: usize,

    /// How long a disconnected member may stay away before the reap
    /// sweep removes them.
    pub reconnect_grace: Duration,

    /// How often the reaper scans for expired members.
    pub sweep_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_active_members: 12,
            reconnect_grace: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(15),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_default() {
        let config = SessionConfig::default();
        assert_eq!(config.max_active_members, 12);
        assert_eq!(config.reconnect_grace, Duration::from_secs(60));
        assert_eq!(config.sweep_interval, Duration::from_secs(15));
    }
}
