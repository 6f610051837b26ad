//! Periodic eviction of members whose reconnect grace expired.

use std::sync::Arc;
use std::time::Duration;

use orbit_protocol::Codec;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::server::ServerState;

/// A background task that sweeps the coordinator on a fixed cadence and
/// fans the resulting member-left events out to the survivors.
///
/// A member can therefore linger up to one sweep interval past their
/// grace window; the window is a lower bound, not an exact deadline.
pub(crate) struct DisconnectReaper {
    handle: JoinHandle<()>,
}

impl DisconnectReaper {
    /// Spawns the reaper. It stops when `shutdown` flips to true or its
    /// sender side is dropped.
    pub(crate) fn spawn<C>(
        state: Arc<ServerState<C>>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> Self
    where
        C: Codec,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it so the first
            // sweep happens one interval after startup.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let mut gateway = state.lock_state().await;
                        let departures = gateway.coordinator.sweep_expired();
                        for departure in &departures {
                            gateway.registry.fan_out(
                                &departure.broadcast.recipients,
                                &departure.broadcast.event,
                            );
                        }
                        if !departures.is_empty() {
                            tracing::debug!(
                                count = departures.len(),
                                "sweep evicted expired members"
                            );
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::debug!("reaper shutting down");
                            break;
                        }
                    }
                }
            }
        });

        Self { handle }
    }
}

impl Drop for DisconnectReaper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
