//! Session errors.

use orbit_protocol::{MemberId, SessionCode};
use thiserror::Error;

/// Errors a coordinator operation can return to the caller.
///
/// Fire-and-forget paths (location updates, signals, disconnects) never
/// produce these; they drop unknown members silently instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    SessionNotFound(SessionCode),

    #[error("member {member} not found in session {code}")]
    MemberNotFound { code: SessionCode, member: MemberId },

    #[error("session {0} is full")]
    SessionFull(SessionCode),
}
