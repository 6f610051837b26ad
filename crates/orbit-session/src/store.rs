//! Session storage: sessions keyed by code plus the global member index.

use std::collections::HashMap;

use indexmap::IndexMap;
use orbit_protocol::{
    MemberId, MemberInfo, SESSION_CODE_LEN, SessionCode, SessionEvent,
};
use rand::Rng;

use crate::member::Member;

/// Attempts at drawing a fresh 6-digit code before widening. With a
/// million-code space this only triggers when the store is saturated.
const MAX_CODE_ATTEMPTS: u32 = 64;

/// One ephemeral group: its members in join order and the append-only
/// activity log shown to late joiners.
#[derive(Debug)]
pub struct Session {
    pub code: SessionCode,
    /// Join order matters: snapshots list members in the order they
    /// arrived, so `IndexMap` rather than `HashMap`.
    pub members: IndexMap<MemberId, Member>,
    pub events: Vec<SessionEvent>,
}

impl Session {
    pub fn new(code: SessionCode) -> Self {
        Self {
            code,
            members: IndexMap::new(),
            events: Vec::new(),
        }
    }

    /// Number of members with a live connection.
    pub fn active_count(&self) -> usize {
        self.members.values().filter(|m| m.is_active()).count()
    }

    /// Snapshot of the active members, in join order.
    pub fn member_infos(&self) -> Vec<MemberInfo> {
        self.members
            .values()
            .filter(|m| m.is_active())
            .map(Member::info)
            .collect()
    }

    pub fn push_event(&mut self, event: SessionEvent) {
        self.events.push(event);
    }
}

/// In-memory home of every live session.
///
/// Keeps two maps in lockstep: code → session, and the reverse member →
/// code index so fire-and-forget operations can find a member's session
/// without the client repeating the code.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<SessionCode, Session>,
    member_index: HashMap<MemberId, SessionCode>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draws a session code not currently in use. Stays at 6 digits in
    /// the normal case; if the space is saturated, widens one digit per
    /// round until a free code turns up, so this always terminates.
    pub fn generate_code(&self) -> SessionCode {
        let mut rng = rand::rng();
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = SessionCode::from_generated(
                rng.random_range(100_000u32..1_000_000).to_string(),
            );
            if !self.sessions.contains_key(&code) {
                return code;
            }
        }
        let mut width = SESSION_CODE_LEN + 1;
        loop {
            let n = rng.random_range(0..10u64.pow(width as u32));
            let code = SessionCode::from_generated(format!("{n:0width$}"));
            if !self.sessions.contains_key(&code) {
                return code;
            }
            width += 1;
        }
    }

    /// Draws a member id not bound in the index.
    pub fn generate_member_id(&self) -> MemberId {
        let mut rng = rand::rng();
        loop {
            let id = MemberId(rng.random());
            if !self.member_index.contains_key(&id) {
                return id;
            }
        }
    }

    /// Inserts a session and indexes its members.
    pub fn insert(&mut self, session: Session) {
        for id in session.members.keys() {
            self.member_index.insert(*id, session.code.clone());
        }
        self.sessions.insert(session.code.clone(), session);
    }

    pub fn session(&self, code: &SessionCode) -> Option<&Session> {
        self.sessions.get(code)
    }

    pub fn session_mut(&mut self, code: &SessionCode) -> Option<&mut Session> {
        self.sessions.get_mut(code)
    }

    /// The code of the session a member belongs to, if any.
    pub fn code_of(&self, member: MemberId) -> Option<&SessionCode> {
        self.member_index.get(&member)
    }

    /// The session a member belongs to, via the reverse index.
    pub fn session_of(&self, member: MemberId) -> Option<&Session> {
        let code = self.member_index.get(&member)?;
        self.sessions.get(code)
    }

    pub fn session_of_mut(&mut self, member: MemberId) -> Option<&mut Session> {
        let code = self.member_index.get(&member)?.clone();
        self.sessions.get_mut(&code)
    }

    /// Adds a member to an existing session and indexes them. The caller
    /// checks capacity first.
    pub fn add_member(&mut self, code: &SessionCode, member: Member) {
        if let Some(session) = self.sessions.get_mut(code) {
            self.member_index.insert(member.id, code.clone());
            session.members.insert(member.id, member);
        }
    }

    /// Removes a member from their session and the index. The session
    /// itself is dropped only once its member map is truly empty, so a
    /// disconnected peer inside the grace window keeps it alive.
    ///
    /// Returns the removed member and whether the session was dropped.
    pub fn remove_member(&mut self, member: MemberId) -> Option<(Member, bool)> {
        let code = self.member_index.remove(&member)?;
        let session = self.sessions.get_mut(&code)?;
        // shift_remove keeps the join order of the survivors intact.
        let removed = session.members.shift_remove(&member)?;
        let empty = session.members.is_empty();
        if empty {
            self.sessions.remove(&code);
            tracing::info!(%code, "session deleted, last member removed");
        }
        Some((removed, empty))
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }
}
