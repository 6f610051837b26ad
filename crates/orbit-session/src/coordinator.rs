//! The single writer over session state.
//!
//! Every mutation of the store goes through [`SessionCoordinator`]. Each
//! operation returns its direct result plus a [`Broadcast`] describing
//! what the gateway must fan out to which peers; the coordinator itself
//! never touches the network.

use std::time::{SystemTime, UNIX_EPOCH};

use orbit_protocol::{
    MemberId, RejoinSnapshot, ServerEvent, SessionCode, SessionEvent,
    SessionEventKind, SessionSnapshot, Signal, SignalBroadcast,
};
use orbit_transport::ConnectionId;
use tokio::time::Instant;

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::member::Member;
use crate::store::{Session, SessionStore};

/// An event to deliver to a set of session peers. The recipients are
/// member ids; the gateway resolves them to live connections.
#[derive(Debug, Clone)]
pub struct Broadcast {
    pub recipients: Vec<MemberId>,
    pub event: ServerEvent,
}

/// Result of creating a session.
#[derive(Debug, Clone)]
pub struct Created {
    pub code: SessionCode,
    pub member_id: MemberId,
}

/// Result of joining a session: the joiner's snapshot plus the
/// member-joined broadcast for the peers already there.
#[derive(Debug)]
pub struct Joined {
    pub snapshot: SessionSnapshot,
    pub broadcast: Broadcast,
}

/// Result of rejoining within the grace window. No broadcast: peers
/// never saw the member leave, so there is nothing to announce.
#[derive(Debug)]
pub struct Rejoined {
    pub snapshot: RejoinSnapshot,
}

/// A member removed for good, by explicit leave or by the reap sweep.
#[derive(Debug)]
pub struct Departure {
    pub code: SessionCode,
    pub member_id: MemberId,
    pub member_name: String,
    /// True when this removal emptied the session and it was dropped.
    pub session_deleted: bool,
    pub broadcast: Broadcast,
}

/// Owns the [`SessionStore`] and applies every state transition.
#[derive(Debug, Default)]
pub struct SessionCoordinator {
    store: SessionStore,
    config: SessionConfig,
}

impl SessionCoordinator {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            store: SessionStore::new(),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Creates a fresh session with the caller as its first member.
    /// Infallible: the inputs are validated at the gateway and code
    /// generation always terminates.
    pub fn create_session(
        &mut self,
        name: &str,
        color: &str,
        conn: ConnectionId,
    ) -> Created {
        let code = self.store.generate_code();
        let member_id = self.store.generate_member_id();
        let member =
            Member::new(member_id, name.to_owned(), color.to_owned(), conn);

        let mut session = Session::new(code.clone());
        session.push_event(joined_event(&member));
        session.members.insert(member_id, member);
        self.store.insert(session);

        tracing::info!(%code, %member_id, name, "session created");
        Created { code, member_id }
    }

    /// Adds a member to an existing session. Fails if the code is
    /// unknown or the session already has the maximum number of active
    /// members; disconnected members inside the grace window do not
    /// count against the cap.
    pub fn join_session(
        &mut self,
        code: &SessionCode,
        name: &str,
        color: &str,
        conn: ConnectionId,
    ) -> Result<Joined, SessionError> {
        let session = self
            .store
            .session_mut(code)
            .ok_or_else(|| SessionError::SessionNotFound(code.clone()))?;
        if session.active_count() >= self.config.max_active_members {
            return Err(SessionError::SessionFull(code.clone()));
        }

        let member_id = self.store.generate_member_id();
        let member =
            Member::new(member_id, name.to_owned(), color.to_owned(), conn);

        // Re-borrow: generate_member_id needed the store immutably.
        let session = self
            .store
            .session_mut(code)
            .ok_or_else(|| SessionError::SessionNotFound(code.clone()))?;
        session.push_event(joined_event(&member));

        let event = ServerEvent::MemberJoined {
            id: member_id,
            name: member.name.clone(),
            color: member.color.clone(),
        };
        self.store.add_member(code, member);

        let session = self
            .store
            .session(code)
            .ok_or_else(|| SessionError::SessionNotFound(code.clone()))?;
        let snapshot = SessionSnapshot {
            member_id,
            members: session.member_infos(),
            events: session.events.clone(),
        };
        let recipients = peers_of(session, member_id);

        tracing::info!(%code, %member_id, name, "member joined");
        Ok(Joined {
            snapshot,
            broadcast: Broadcast { recipients, event },
        })
    }

    /// Restores a member who reconnected within the grace window. The
    /// member keeps their id, name, color, and last position, and the
    /// peers see no join event. Also accepts a rejoin for a member who
    /// is still marked active: that is a new connection taking over
    /// (say, a page reload racing the disconnect), and the newest
    /// connection wins.
    ///
    /// The active-member cap is not re-checked here. It gates joins
    /// only, so if a disconnected member's freed slot was refilled, the
    /// session briefly exceeds the cap when they return.
    pub fn rejoin_session(
        &mut self,
        code: &SessionCode,
        member_id: MemberId,
        conn: ConnectionId,
    ) -> Result<Rejoined, SessionError> {
        let session = self
            .store
            .session_mut(code)
            .ok_or_else(|| SessionError::SessionNotFound(code.clone()))?;
        let member = session.members.get_mut(&member_id).ok_or_else(|| {
            SessionError::MemberNotFound {
                code: code.clone(),
                member: member_id,
            }
        })?;

        member.disconnected_at = None;
        member.conn = conn;
        let name = member.name.clone();
        let color = member.color.clone();

        let snapshot = RejoinSnapshot {
            member_id,
            name,
            color,
            members: session.member_infos(),
            events: session.events.clone(),
        };

        tracing::info!(%code, %member_id, "member rejoined");
        Ok(Rejoined { snapshot })
    }

    /// Records a member's position and tells their active peers.
    /// Fire-and-forget: unknown members are dropped silently.
    pub fn update_location(
        &mut self,
        member_id: MemberId,
        lat: f64,
        lng: f64,
    ) -> Option<Broadcast> {
        let session = self.store.session_of_mut(member_id)?;
        let member = session.members.get_mut(&member_id)?;
        member.lat = lat;
        member.lng = lng;

        Some(Broadcast {
            recipients: peers_of(session, member_id),
            event: ServerEvent::LocationUpdate {
                id: member_id,
                lat,
                lng,
            },
        })
    }

    /// Appends a signal to the session log and tells the active peers.
    /// Fire-and-forget: unknown members are dropped silently.
    pub fn record_signal(
        &mut self,
        member_id: MemberId,
        signal: Signal,
    ) -> Option<Broadcast> {
        let session = self.store.session_of_mut(member_id)?;
        let member = session.members.get(&member_id)?;
        let (name, color) = (member.name.clone(), member.color.clone());

        session.push_event(SessionEvent {
            kind: SessionEventKind::Signal,
            member_id,
            member_name: name.clone(),
            member_color: color.clone(),
            signal: Some(signal.clone()),
            timestamp: unix_millis(),
        });

        tracing::debug!(%member_id, "signal recorded");
        Some(Broadcast {
            recipients: peers_of(session, member_id),
            event: ServerEvent::SignalReceived(SignalBroadcast {
                id: member_id,
                name,
                color,
                signal,
            }),
        })
    }

    /// Marks a member disconnected, starting their grace window. The
    /// member stays in the session and on peers' maps; peers get a
    /// member-disconnected event so they can grey the marker out.
    pub fn mark_disconnected(&mut self, member_id: MemberId) -> Option<Broadcast> {
        let session = self.store.session_of_mut(member_id)?;
        let member = session.members.get_mut(&member_id)?;
        member.disconnected_at = Some(Instant::now());

        tracing::info!(code = %session.code, %member_id, "member disconnected");
        Some(Broadcast {
            recipients: peers_of(session, member_id),
            event: ServerEvent::MemberDisconnected { id: member_id },
        })
    }

    /// Removes a member for good. Unknown members are a silent no-op,
    /// which also makes a second leave for the same member harmless.
    pub fn leave_session(&mut self, member_id: MemberId) -> Option<Departure> {
        let session = self.store.session_of_mut(member_id)?;
        let code = session.code.clone();
        let member = session.members.get(&member_id)?;
        let (name, color) = (member.name.clone(), member.color.clone());
        session.push_event(SessionEvent {
            kind: SessionEventKind::MemberLeft,
            member_id,
            member_name: name,
            member_color: color,
            signal: None,
            timestamp: unix_millis(),
        });

        let (removed, session_deleted) = self.store.remove_member(member_id)?;
        let recipients = if session_deleted {
            Vec::new()
        } else {
            self.store
                .session(&code)
                .map(|s| peers_of(s, member_id))
                .unwrap_or_default()
        };

        tracing::info!(%code, %member_id, "member left");
        Some(Departure {
            code,
            member_id,
            member_name: removed.name,
            session_deleted,
            broadcast: Broadcast {
                recipients,
                event: ServerEvent::MemberLeft { id: member_id },
            },
        })
    }

    /// Removes every member whose grace window has expired. Called on
    /// the reaper's cadence; each removal behaves exactly like a leave,
    /// including the member-left broadcast to the survivors.
    pub fn sweep_expired(&mut self) -> Vec<Departure> {
        let grace = self.config.reconnect_grace;
        let now = Instant::now();
        let expired: Vec<MemberId> = self
            .store
            .sessions()
            .flat_map(|s| s.members.values())
            .filter(|m| {
                m.disconnected_at
                    .is_some_and(|since| now.duration_since(since) >= grace)
            })
            .map(|m| m.id)
            .collect();

        let mut departures = Vec::with_capacity(expired.len());
        for member_id in expired {
            if let Some(departure) = self.leave_session(member_id) {
                tracing::info!(
                    code = %departure.code,
                    %member_id,
                    name = %departure.member_name,
                    "reaped expired member"
                );
                departures.push(departure);
            }
        }
        departures
    }

    /// Whether a session with this code currently exists.
    pub fn contains_session(&self, code: &SessionCode) -> bool {
        self.store.session(code).is_some()
    }

    pub fn session_count(&self) -> usize {
        self.store.session_count()
    }

    /// The session a member currently belongs to.
    pub fn session_of(&self, member_id: MemberId) -> Option<&Session> {
        self.store.session_of(member_id)
    }
}

/// Active members of a session other than `except`, in join order.
fn peers_of(session: &Session, except: MemberId) -> Vec<MemberId> {
    session
        .members
        .values()
        .filter(|m| m.is_active() && m.id != except)
        .map(|m| m.id)
        .collect()
}

fn joined_event(member: &Member) -> SessionEvent {
    SessionEvent {
        kind: SessionEventKind::MemberJoined,
        member_id: member.id,
        member_name: member.name.clone(),
        member_color: member.color.clone(),
        signal: None,
        timestamp: unix_millis(),
    }
}

/// Wall-clock milliseconds since the Unix epoch, for log timestamps.
fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
