//! # Orbit
//!
//! Realtime presence gateway for ephemeral location-sharing groups.
//!
//! One person creates a session and shares its 6-digit code; friends join
//! by code, and everyone sees everyone's position and signals live until
//! the night is over and the session evaporates. No accounts, no storage:
//! a session exists exactly as long as someone is in it.
//!
//! The layers, bottom to top:
//!
//! - [`orbit_transport`] — WebSocket connections.
//! - [`orbit_protocol`] — the JSON wire frames.
//! - [`orbit_session`] — the session store and coordinator.
//! - this crate — the gateway: per-connection handlers, the connection
//!   registry, broadcast fan-out, and the disconnect reaper.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use orbit::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), OrbitError> {
//!     let gateway = Gateway::<JsonCodec>::builder()
//!         .bind("0.0.0.0:8080")
//!         .build()
//!         .await?;
//!     gateway.run().await
//! }
//! ```

mod error;
mod handler;
mod reaper;
mod registry;
mod server;
pub mod validate;

pub use error::OrbitError;
pub use server::{Gateway, GatewayBuilder, ShutdownHandle};
pub use validate::ValidationError;

pub mod prelude {
    pub use crate::error::OrbitError;
    pub use crate::server::{Gateway, GatewayBuilder, ShutdownHandle};
    pub use orbit_protocol::{
        ClientEvent, ClientFrame, ClientRequest, Codec, JsonCodec, MemberId,
        MemberInfo, RequestEnvelope, RequestId, ServerEvent, ServerFrame,
        ServerReply, SessionCode, SessionEvent, Signal,
    };
    pub use orbit_session::SessionConfig;
}
