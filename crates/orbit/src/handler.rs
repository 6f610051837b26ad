//! Per-connection handler: frame decoding, request dispatch, teardown.
//!
//! Each accepted connection gets its own Tokio task running this handler,
//! plus a writer task draining the connection's outbound channel. The
//! flow is:
//!   1. Loop: receive frames → dispatch requests (answered) and events
//!      (fire-and-forget).
//!   2. On connection loss, mark the member disconnected and start their
//!      grace window; peers get a member-disconnected event.
//!
//! Replies and broadcasts both go through the outbound channel, enqueued
//! while the state lock is held, so each client sees them in the order
//! the coordinator produced them. Network I/O never happens under the
//! lock.

use std::sync::Arc;

use orbit_protocol::{
    ClientEvent, ClientFrame, ClientRequest, Codec, MemberId, ReplyEnvelope,
    RequestEnvelope, ServerFrame, ServerReply,
};
use orbit_session::SessionError;
use orbit_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::OrbitError;
use crate::server::ServerState;
use crate::validate;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), OrbitError>
where
    C: Codec + Clone,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    // Writer task: everything outbound for this client funnels through
    // one channel so ordering is fixed at enqueue time.
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();
    let writer_conn = conn.clone();
    let writer_codec = state.codec.clone();
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let bytes = match writer_codec.encode(&frame) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to encode frame");
                    continue;
                }
            };
            if writer_conn.send(&bytes).await.is_err() {
                break;
            }
        }
    });

    // The member this connection is bound to, once a request succeeds.
    let mut member: Option<MemberId> = None;

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(%conn_id, "connection closed");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        };

        let frame: ClientFrame = match state.codec.decode(&data) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode frame");
                continue;
            }
        };

        match frame {
            ClientFrame::Request(envelope) => {
                handle_request(envelope, conn_id, &tx, &state, &mut member)
                    .await;
            }
            ClientFrame::Event(event) => {
                handle_event(event, &state, &mut member).await;
            }
        }
    }

    // Teardown: if this connection still owns its member, start the
    // grace window. A rejoin takeover from another connection makes
    // unbind return None and we leave the member alone.
    if let Some(member_id) = member {
        let mut gateway = state.lock_state().await;
        if gateway.registry.unbind(conn_id) == Some(member_id) {
            if let Some(broadcast) =
                gateway.coordinator.mark_disconnected(member_id)
            {
                gateway
                    .registry
                    .fan_out(&broadcast.recipients, &broadcast.event);
            }
        }
    }

    // All senders are gone now; the writer drains what's queued and exits.
    drop(tx);
    let _ = writer.await;
    Ok(())
}

/// Dispatches a request and always enqueues exactly one reply carrying
/// the request's correlation id.
async fn handle_request<C>(
    envelope: RequestEnvelope,
    conn_id: ConnectionId,
    tx: &UnboundedSender<ServerFrame>,
    state: &Arc<ServerState<C>>,
    member: &mut Option<MemberId>,
) where
    C: Codec,
{
    let reply = if member.is_some() {
        // One session per connection; a client wanting a different
        // session opens a new connection.
        error_reply(400, "already in a session")
    } else {
        match envelope.request {
            ClientRequest::CreateSession { name, color } => {
                create_session(&name, &color, conn_id, tx, state, member).await
            }
            ClientRequest::JoinSession { code, name, color } => {
                join_session(&code, &name, &color, conn_id, tx, state, member)
                    .await
            }
            ClientRequest::RejoinSession { code, member_id } => {
                rejoin_session(&code, member_id, conn_id, tx, state, member)
                    .await
            }
        }
    };

    let _ = tx.send(ServerFrame::Reply(ReplyEnvelope {
        id: envelope.id,
        reply,
    }));
}

async fn create_session<C>(
    name: &str,
    color: &str,
    conn_id: ConnectionId,
    tx: &UnboundedSender<ServerFrame>,
    state: &Arc<ServerState<C>>,
    member: &mut Option<MemberId>,
) -> ServerReply
where
    C: Codec,
{
    let (name, color) =
        match (validate::member_name(name), validate::member_color(color)) {
            (Ok(name), Ok(color)) => (name, color),
            (Err(e), _) | (_, Err(e)) => return error_reply(400, &e.to_string()),
        };

    let mut gateway = state.lock_state().await;
    let created = gateway.coordinator.create_session(&name, &color, conn_id);
    gateway
        .registry
        .bind(created.member_id, conn_id, tx.clone());
    *member = Some(created.member_id);

    ServerReply::SessionCreated {
        code: created.code,
        member_id: created.member_id,
    }
}

async fn join_session<C>(
    code: &str,
    name: &str,
    color: &str,
    conn_id: ConnectionId,
    tx: &UnboundedSender<ServerFrame>,
    state: &Arc<ServerState<C>>,
    member: &mut Option<MemberId>,
) -> ServerReply
where
    C: Codec,
{
    let code = match validate::session_code(code) {
        Ok(code) => code,
        Err(e) => return error_reply(400, &e.to_string()),
    };
    let (name, color) =
        match (validate::member_name(name), validate::member_color(color)) {
            (Ok(name), Ok(color)) => (name, color),
            (Err(e), _) | (_, Err(e)) => return error_reply(400, &e.to_string()),
        };

    let mut gateway = state.lock_state().await;
    match gateway.coordinator.join_session(&code, &name, &color, conn_id) {
        Ok(joined) => {
            let member_id = joined.snapshot.member_id;
            gateway.registry.bind(member_id, conn_id, tx.clone());
            *member = Some(member_id);
            gateway.registry.fan_out(
                &joined.broadcast.recipients,
                &joined.broadcast.event,
            );
            ServerReply::SessionJoined(joined.snapshot)
        }
        Err(e) => session_error_reply(&e),
    }
}

async fn rejoin_session<C>(
    code: &str,
    member_id: MemberId,
    conn_id: ConnectionId,
    tx: &UnboundedSender<ServerFrame>,
    state: &Arc<ServerState<C>>,
    member: &mut Option<MemberId>,
) -> ServerReply
where
    C: Codec,
{
    let code = match validate::session_code(code) {
        Ok(code) => code,
        Err(e) => return error_reply(400, &e.to_string()),
    };

    let mut gateway = state.lock_state().await;
    match gateway.coordinator.rejoin_session(&code, member_id, conn_id) {
        Ok(rejoined) => {
            gateway.registry.bind(member_id, conn_id, tx.clone());
            *member = Some(member_id);
            ServerReply::SessionRejoined(rejoined.snapshot)
        }
        Err(e) => session_error_reply(&e),
    }
}

/// Dispatches a fire-and-forget event. Never answered: invalid or stale
/// events are dropped, at most with a debug log.
async fn handle_event<C>(
    event: ClientEvent,
    state: &Arc<ServerState<C>>,
    member: &mut Option<MemberId>,
) where
    C: Codec,
{
    let Some(member_id) = *member else {
        tracing::debug!("event from connection with no member, dropping");
        return;
    };

    match event {
        ClientEvent::UpdateLocation { lat, lng } => {
            if let Err(e) = validate::coordinates(lat, lng) {
                tracing::debug!(%member_id, error = %e, "dropping location");
                return;
            }
            let mut gateway = state.lock_state().await;
            if let Some(broadcast) =
                gateway.coordinator.update_location(member_id, lat, lng)
            {
                gateway
                    .registry
                    .fan_out(&broadcast.recipients, &broadcast.event);
            }
        }

        ClientEvent::SendSignal(signal) => {
            if let Err(e) = validate::signal(&signal) {
                tracing::debug!(%member_id, error = %e, "dropping signal");
                return;
            }
            let mut gateway = state.lock_state().await;
            if let Some(broadcast) =
                gateway.coordinator.record_signal(member_id, signal)
            {
                gateway
                    .registry
                    .fan_out(&broadcast.recipients, &broadcast.event);
            }
        }

        ClientEvent::LeaveSession => {
            let mut gateway = state.lock_state().await;
            if let Some(departure) = gateway.coordinator.leave_session(member_id)
            {
                gateway.registry.remove_member(member_id);
                gateway.registry.fan_out(
                    &departure.broadcast.recipients,
                    &departure.broadcast.event,
                );
            }
            *member = None;
        }
    }
}

fn error_reply(code: u16, message: &str) -> ServerReply {
    ServerReply::Error {
        code,
        message: message.to_string(),
    }
}

/// Maps coordinator errors to wire error codes: missing things are 404,
/// a full session is 409.
fn session_error_reply(error: &SessionError) -> ServerReply {
    let code = match error {
        SessionError::SessionNotFound(_) | SessionError::MemberNotFound { .. } => {
            404
        }
        SessionError::SessionFull(_) => 409,
    };
    error_reply(code, &error.to_string())
}
