//! Wire protocol for Orbit.
//!
//! Defines the language clients and the gateway speak:
//!
//! - **Types** ([`ClientFrame`], [`ServerFrame`], [`Signal`], identity
//!   newtypes) — the structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those structures
//!   become bytes and back.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer knows nothing about connections or sessions; it only
//! describes shapes. Requests carry a [`RequestId`] correlation id that the
//! matching reply echoes; broadcast events carry none (fire-and-forget).

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientEvent, ClientFrame, ClientRequest, MAX_SIGNAL_MESSAGE_LEN,
    MEMBER_PALETTE, MemberId, MemberIdParseError, MemberInfo, RejoinSnapshot,
    ReplyEnvelope, RequestEnvelope, RequestId, SESSION_CODE_LEN, ServerEvent,
    ServerFrame, ServerReply, SessionCode, SessionEvent, SessionEventKind,
    SessionSnapshot, Signal, SignalBroadcast,
};
