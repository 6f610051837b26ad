//! A single member of a session.

use orbit_protocol::{MemberId, MemberInfo};
use orbit_transport::ConnectionId;
use tokio::time::Instant;

/// One person in a session: identity, display attributes, last known
/// position, and presence state.
#[derive(Debug, Clone)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub color: String,
    /// Last reported position. `(0.0, 0.0)` until the first location
    /// update arrives.
    pub lat: f64,
    pub lng: f64,
    /// Transport connection currently bound to this member. Stale while
    /// disconnected; rebound on rejoin.
    pub conn: ConnectionId,
    /// `Some(when)` while the member is in the reconnect grace window,
    /// `None` while connected.
    pub disconnected_at: Option<Instant>,
}

impl Member {
    pub fn new(id: MemberId, name: String, color: String, conn: ConnectionId) -> Self {
        Self {
            id,
            name,
            color,
            lat: 0.0,
            lng: 0.0,
            conn,
            disconnected_at: None,
        }
    }

    /// Whether this member currently has a live connection.
    pub fn is_active(&self) -> bool {
        self.disconnected_at.is_none()
    }

    /// Wire-facing projection of this member.
    pub fn info(&self) -> MemberInfo {
        MemberInfo {
            id: self.id,
            name: self.name.clone(),
            color: self.color.clone(),
            lat: self.lat,
            lng: self.lng,
        }
    }
}
