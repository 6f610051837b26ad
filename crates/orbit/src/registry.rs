//! Maps members to live connections and delivers outbound frames.
//!
//! Each connection handler owns a writer task fed by an unbounded
//! channel; the registry holds the sending half keyed by member id.
//! Enqueueing happens while the gateway state lock is held, which is
//! what keeps every peer seeing a session's events in the same order —
//! the actual network writes happen later, on the writer tasks.

use std::collections::HashMap;

use orbit_protocol::{MemberId, ServerEvent, ServerFrame};
use orbit_transport::ConnectionId;
use tokio::sync::mpsc::UnboundedSender;

/// A member's current connection and outbound channel.
struct Binding {
    conn: ConnectionId,
    tx: UnboundedSender<ServerFrame>,
}

#[derive(Default)]
pub(crate) struct ConnectionRegistry {
    members: HashMap<MemberId, Binding>,
    conns: HashMap<ConnectionId, MemberId>,
}

impl ConnectionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Binds a member to a connection, replacing any previous binding.
    /// On a rejoin takeover the old connection's entry stays in `conns`
    /// until its handler unbinds it, but it no longer owns the member.
    pub(crate) fn bind(
        &mut self,
        member: MemberId,
        conn: ConnectionId,
        tx: UnboundedSender<ServerFrame>,
    ) {
        if let Some(old) = self.members.insert(member, Binding { conn, tx }) {
            self.conns.remove(&old.conn);
        }
        self.conns.insert(conn, member);
    }

    /// Removes a connection's binding. Returns the member only if this
    /// connection was still the member's current one; a stale connection
    /// superseded by a rejoin takeover returns `None`.
    pub(crate) fn unbind(&mut self, conn: ConnectionId) -> Option<MemberId> {
        let member = self.conns.remove(&conn)?;
        match self.members.get(&member) {
            Some(binding) if binding.conn == conn => {
                self.members.remove(&member);
                Some(member)
            }
            _ => None,
        }
    }

    /// Drops a member's binding entirely (explicit leave).
    pub(crate) fn remove_member(&mut self, member: MemberId) {
        if let Some(binding) = self.members.remove(&member) {
            self.conns.remove(&binding.conn);
        }
    }

    /// Enqueues an event frame for each recipient that still has a live
    /// channel. A closed channel just means the handler is tearing down;
    /// the frame is dropped.
    pub(crate) fn fan_out(&self, recipients: &[MemberId], event: &ServerEvent) {
        for member in recipients {
            if let Some(binding) = self.members.get(member) {
                let _ = binding.tx.send(ServerFrame::Event(event.clone()));
            }
        }
    }

    #[cfg(test)]
    fn member_of(&self, conn: ConnectionId) -> Option<MemberId> {
        self.conns.get(&conn).copied()
    }
}
