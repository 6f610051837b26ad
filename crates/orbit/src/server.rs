//! `Gateway` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → session. One mutex
//! guards the coordinator and the connection registry as a unit, so
//! every state change and its broadcast enqueue happen atomically.

use std::sync::Arc;

use orbit_protocol::{Codec, JsonCodec};
use orbit_session::{SessionConfig, SessionCoordinator};
use orbit_transport::{Transport, WebSocketTransport};
use tokio::sync::{Mutex, watch};

use crate::OrbitError;
use crate::handler::handle_connection;
use crate::reaper::DisconnectReaper;
use crate::registry::ConnectionRegistry;

/// Everything behind the gateway's single lock.
pub(crate) struct GatewayState {
    pub(crate) coordinator: SessionCoordinator,
    pub(crate) registry: ConnectionRegistry,
}

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) state: Mutex<GatewayState>,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a gateway.
///
/// # Example
///
/// ```rust,no_run
/// use orbit::prelude::*;
///
/// # async fn run() -> Result<(), OrbitError> {
/// let gateway = Gateway::<JsonCodec>::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// gateway.run().await
/// # }
/// ```
pub struct GatewayBuilder {
    bind_addr: String,
    session_config: SessionConfig,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            session_config: SessionConfig::default(),
        }
    }

    /// Sets the address to bind the gateway to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Binds the listener and builds the gateway with the default
    /// `JsonCodec`.
    pub async fn build(self) -> Result<Gateway<JsonCodec>, OrbitError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            state: Mutex::new(GatewayState {
                coordinator: SessionCoordinator::new(self.session_config),
                registry: ConnectionRegistry::new(),
            }),
            codec: JsonCodec,
        });
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Gateway {
            transport,
            state,
            shutdown_tx,
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Asks a running gateway (and its reaper) to stop. Cheap to clone and
/// hand to a signal handler or a supervisor task.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// A running presence gateway.
///
/// Call [`run()`](Self::run) to start the reaper and accept connections;
/// grab a [`ShutdownHandle`] first to be able to stop it cleanly.
pub struct Gateway<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
    shutdown_tx: watch::Sender<bool>,
}

impl<C> Gateway<C>
where
    C: Codec + Clone,
{
    /// Creates a new builder.
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    /// Returns the local address the gateway is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns a handle that stops this gateway when triggered.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Runs the gateway: starts the disconnect reaper, then accepts
    /// connections (spawning a handler task per connection) until a
    /// [`ShutdownHandle`] fires.
    pub async fn run(mut self) -> Result<(), OrbitError> {
        let sweep_interval = {
            let state = self.state.lock_state().await;
            state.coordinator.config().sweep_interval
        };
        let _reaper = DisconnectReaper::spawn(
            Arc::clone(&self.state),
            sweep_interval,
            self.shutdown_tx.subscribe(),
        );
        let mut shutdown = self.shutdown_tx.subscribe();

        tracing::info!("Orbit gateway running");

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("gateway shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}

impl<C: Codec> ServerState<C> {
    pub(crate) async fn lock_state(
        &self,
    ) -> tokio::sync::MutexGuard<'_, GatewayState> {
        self.state.lock().await
    }
}
