//! Core protocol types for Orbit's wire format.
//!
//! Everything that travels between a client and the gateway is defined
//! here: identity newtypes, the request/reply envelopes with their
//! correlation ids, fire-and-forget client events, and the broadcast
//! events fanned out to session peers.
//!
//! All tags on the wire are kebab-case (`"create-session"`,
//! `"member-joined"`) and multi-word payload fields are camelCase
//! (`"memberId"`), matching what the browser client expects.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use std::fmt;
use std::str::FromStr;

/// Fixed 12-color palette members pick their display color from.
///
/// Uniqueness within a session is a client-side courtesy (the picker hides
/// taken colors); the store never enforces it.
pub const MEMBER_PALETTE: [&str; 12] = [
    "#60A5FA", "#4ADE80", "#F472B6", "#A78BFA", "#FBBF24", "#22D3EE",
    "#FB7185", "#A3E635", "#FB923C", "#2DD4BF", "#818CF8", "#E879F9",
];

/// Upper bound on a custom signal's free-text message, in characters.
pub const MAX_SIGNAL_MESSAGE_LEN: usize = 100;

/// Number of digits in a session code.
pub const SESSION_CODE_LEN: usize = 6;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A member's identity: 64 random bits, rendered as a 16-char lowercase
/// hex string on the wire (`"3f9c0a1d5e7b2468"`).
///
/// Ids are issued once per member and never reused; after a member is
/// removed the id is dead for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for MemberId {
    type Err = MemberIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 16 {
            return Err(MemberIdParseError);
        }
        u64::from_str_radix(s, 16)
            .map(MemberId)
            .map_err(|_| MemberIdParseError)
    }
}

/// The string was not a 16-char lowercase hex member id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("member id must be a 16-character hex string")]
pub struct MemberIdParseError;

impl Serialize for MemberId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MemberId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// A session's join code: 6 ASCII digits, unique among sessions currently
/// alive in the store. Codes are reclaimed when their session is deleted.
///
/// The only way to build one from untrusted input is [`SessionCode::parse`];
/// codes produced by the store may be wider than 6 digits in the (rare)
/// collision-exhaustion fallback, so the type itself only requires ASCII
/// digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionCode(String);

impl SessionCode {
    /// Parses user-supplied input as a standard 6-digit code.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() == SESSION_CODE_LEN && s.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self(s.to_owned()))
        } else {
            None
        }
    }

    /// Wraps a code the store generated itself. Digits only, any width.
    pub fn from_generated(s: String) -> Self {
        debug_assert!(s.bytes().all(|b| b.is_ascii_digit()));
        Self(s)
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-call correlation id, chosen by the client. The gateway echoes it in
/// the matching reply so a client can pair an answer to its request without
/// assuming strict alternation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// A short status/intent broadcast: one of a closed preset set, or a
/// bounded free-text message.
///
/// Internally tagged with `type` so a preset serializes as
/// `{"type":"where"}` and a custom one as
/// `{"type":"custom","message":"meet at the door"}` — exactly the shape
/// the client renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Signal {
    Where,
    Coming,
    Bar,
    Help,
    Outside,
    Leaving,
    Custom { message: String },
}

impl Signal {
    /// The free-text message, for custom signals.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Custom { message } => Some(message),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Member and event-log projections
// ---------------------------------------------------------------------------

/// The client-visible view of a member: identity, display attributes, and
/// last-known position. Positions default to (0, 0) until the member's
/// first location update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberInfo {
    pub id: MemberId,
    pub name: String,
    pub color: String,
    pub lat: f64,
    pub lng: f64,
}

/// Discriminant for entries in a session's activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionEventKind {
    MemberJoined,
    MemberLeft,
    Signal,
}

/// One entry in a session's append-only activity log.
///
/// Joiners and rejoiners receive the full log so their activity drawer can
/// render history they were not connected for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
    #[serde(rename = "type")]
    pub kind: SessionEventKind,
    pub member_id: MemberId,
    pub member_name: String,
    pub member_color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<Signal>,
    /// Unix milliseconds.
    pub timestamp: u64,
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// A request that expects exactly one [`ServerReply`].
///
/// `code` and display attributes arrive as raw strings; the gateway
/// validates them before anything reaches the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ClientRequest {
    CreateSession {
        name: String,
        color: String,
    },
    JoinSession {
        code: String,
        name: String,
        color: String,
    },
    #[serde(rename_all = "camelCase")]
    RejoinSession {
        code: String,
        member_id: MemberId,
    },
}

/// A fire-and-forget inbound event. Never answered, never errored back —
/// an unknown or stale member id is silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    UpdateLocation { lat: f64, lng: f64 },
    SendSignal(Signal),
    LeaveSession,
}

/// A request paired with its correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub id: RequestId,
    #[serde(flatten)]
    pub request: ClientRequest,
}

/// Top-level client → server frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ClientFrame {
    Request(RequestEnvelope),
    Event(ClientEvent),
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Reply to a successful join: everything the client needs for its first
/// render, in member insertion order. The requester finds itself by id
/// match, not by array position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub member_id: MemberId,
    pub members: Vec<MemberInfo>,
    pub events: Vec<SessionEvent>,
}

/// Reply to a successful rejoin. Carries the member's own display
/// attributes back so a client that lost local state can resynchronize
/// completely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejoinSnapshot {
    pub member_id: MemberId,
    pub name: String,
    pub color: String,
    pub members: Vec<MemberInfo>,
    pub events: Vec<SessionEvent>,
}

/// The single reply to a [`ClientRequest`]. Errors here go only to the
/// requester, never to peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ServerReply {
    #[serde(rename_all = "camelCase")]
    SessionCreated {
        code: SessionCode,
        member_id: MemberId,
    },
    SessionJoined(SessionSnapshot),
    SessionRejoined(RejoinSnapshot),
    /// HTTP-flavored codes: 400 validation, 404 not found, 409 capacity.
    Error { code: u16, message: String },
}

/// Payload of a `signal-received` broadcast. The signal flattens into the
/// object, so a preset arrives as
/// `{"id":..,"name":..,"color":..,"type":"where"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalBroadcast {
    pub id: MemberId,
    pub name: String,
    pub color: String,
    #[serde(flatten)]
    pub signal: Signal,
}

/// An event fanned out to every connection in a session except (where
/// applicable) its originator. Delivery is fire-and-forget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    MemberJoined {
        id: MemberId,
        name: String,
        color: String,
    },
    MemberLeft {
        id: MemberId,
    },
    MemberDisconnected {
        id: MemberId,
    },
    LocationUpdate {
        id: MemberId,
        lat: f64,
        lng: f64,
    },
    SignalReceived(SignalBroadcast),
}

/// A reply paired with the correlation id of the request it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    pub id: RequestId,
    #[serde(flatten)]
    pub reply: ServerReply,
}

/// Top-level server → client frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ServerFrame {
    Reply(ReplyEnvelope),
    Event(ServerEvent),
}

// =========================================================================
// Tests
// =========================================================================
