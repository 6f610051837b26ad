//! Session presence core for Orbit.
//!
//! This crate is the single place where group state lives and mutates:
//!
//! 1. **Data model** — [`Member`], [`Session`], and the append-only
//!    activity log.
//! 2. **Store** — [`SessionStore`]: sessions keyed by code plus the global
//!    member→session index, and code/id generation.
//! 3. **Coordinator** — [`SessionCoordinator`]: every create/join/rejoin/
//!    leave/update/signal mutation, each returning its direct result plus
//!    the broadcasts the gateway must fan out.
//!
//! # Concurrency note
//!
//! Nothing in this crate is thread-safe by itself — plain maps, no locks.
//! That is intentional: the coordinator is owned by the gateway behind a
//! single mutex, so every mutation (connection handlers and the reap
//! sweep alike) is serialized at one level and the core stays simple,
//! synchronous, CPU-only code.
//!
//! # Presence state machine (per member)
//!
//! ```text
//!   Active ──(connection lost)──→ Disconnected ──(grace elapsed)──→ Removed
//!     ↑                                │
//!     └───────────(rejoin)────────────┘
//! ```
//!
//! Explicit leave goes `Active → Removed` directly. `Removed` is terminal:
//! the id is never reused and rejoining with it fails with not-found.

mod config;
mod coordinator;
mod error;
mod member;
mod store;

pub use config::SessionConfig;
pub use coordinator::{
    Broadcast, Created, Departure, Joined, Rejoined, SessionCoordinator,
};
pub use error::SessionError;
pub use member::Member;
pub use store::{Session, SessionStore};
