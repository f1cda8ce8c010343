//! Per-connection handler: handshake, request routing, implicit leave.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   0. Finish the WebSocket upgrade within the handshake timeout
//!   1. Receive Handshake → validate version → send HandshakeAck
//!   2. Spawn the writer task draining the connection's outbox
//!   3. Loop: receive envelopes → answer requests with acks
//!   4. On close, leave every room the connection joined

use std::collections::HashMap;
use std::sync::Arc;

use quizcast_protocol::{
    Ack, ClientRequest, Codec, Envelope, ErrorKind, MemberId, Payload, ProtocolError,
    RequestHeader, RoomKey, SystemMessage,
};
use quizcast_room::{MemberSender, RoomError, RoomHandle};
use quizcast_transport::{
    Connection, ConnectionId, Incoming, TransportError, WebSocketConnection, WebSocketIncoming,
};
use tokio::sync::mpsc;

use crate::QuizcastError;
use crate::server::{PROTOCOL_VERSION, ServerState};

/// Rooms this connection has joined, with the member id it holds in each.
type Memberships = HashMap<RoomKey, MemberId>;

/// Upgrades an accepted socket and hands it to [`handle_connection`].
pub(crate) async fn serve<C: Codec>(
    incoming: WebSocketIncoming,
    state: Arc<ServerState<C>>,
) -> Result<(), QuizcastError> {
    let peer = incoming.peer_addr();
    let conn = match tokio::time::timeout(state.handshake_timeout, incoming.upgrade()).await {
        Ok(conn) => conn?,
        Err(_) => {
            tracing::debug!(%peer, "websocket upgrade timed out");
            return Err(TransportError::ConnectionClosed(format!(
                "upgrade from {peer} timed out"
            ))
            .into());
        }
    };
    handle_connection(conn, state).await
}

/// Handles a single connection from handshake to close.
async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), QuizcastError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    perform_handshake(&conn, &state).await?;
    tracing::info!(%conn_id, "client connected");

    let (outbox, rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_loop(Arc::clone(&conn), Arc::clone(&state), rx));

    let mut memberships = Memberships::new();
    read_loop(&conn, &state, &outbox, &mut memberships).await;

    if !memberships.is_empty() {
        tracing::debug!(%conn_id, rooms = memberships.len(), "leaving rooms on close");
        state.rooms.lock().await.leave_all(memberships.drain()).await;
    }

    // The rooms dropped their senders on leave, so the writer drains what
    // is left and stops.
    drop(outbox);
    let _ = writer.await;
    let _ = conn.close().await;
    tracing::info!(%conn_id, "client disconnected");
    Ok(())
}

/// Receive Handshake, validate it, send HandshakeAck.
async fn perform_handshake<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
) -> Result<(), QuizcastError> {
    let data = match tokio::time::timeout(state.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage("connection closed before handshake".into()).into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let envelope: Envelope = match state.codec.decode(&data) {
        Ok(envelope) => envelope,
        Err(e) => {
            send_direct(conn, state, error_message(400, format!("invalid envelope: {e}"))).await?;
            return Err(e.into());
        }
    };

    let version = match envelope.payload {
        Payload::System(SystemMessage::Handshake { version }) => version,
        _ => {
            send_direct(conn, state, error_message(400, "expected Handshake")).await?;
            return Err(ProtocolError::InvalidMessage("first message must be Handshake".into()).into());
        }
    };

    if version != PROTOCOL_VERSION {
        send_direct(
            conn,
            state,
            error_message(
                400,
                format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
            ),
        )
        .await?;
        return Err(ProtocolError::InvalidMessage("protocol version mismatch".into()).into());
    }

    send_direct(
        conn,
        state,
        Payload::System(SystemMessage::HandshakeAck {
            connection_id: conn.id().into_inner(),
            server_time: state.server_time(),
        }),
    )
    .await
}

/// Reads frames until the peer closes, goes idle, or disconnects.
async fn read_loop<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    outbox: &MemberSender,
    memberships: &mut Memberships,
) {
    let conn_id = conn.id();

    loop {
        let data = match tokio::time::timeout(state.idle_timeout, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::debug!(%conn_id, "connection closed by peer");
                return;
            }
            Ok(Err(e)) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                return;
            }
            Err(_) => {
                tracing::info!(%conn_id, "connection idle, closing");
                let _ = outbox.send(Payload::System(SystemMessage::Disconnect {
                    reason: "idle timeout".into(),
                }));
                return;
            }
        };

        let envelope: Envelope = match state.codec.decode(&data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode envelope");
                if outbox.send(decode_failure(state, &data, &e)).is_err() {
                    return;
                }
                continue;
            }
        };

        let reply = match envelope.payload {
            Payload::Request { id, request } => {
                let ack = handle_request(conn_id, state, outbox, memberships, request).await;
                Payload::Ack { id, ack }
            }
            Payload::System(SystemMessage::Heartbeat { client_time }) => {
                Payload::System(SystemMessage::HeartbeatAck {
                    client_time,
                    server_time: state.server_time(),
                })
            }
            Payload::System(SystemMessage::Disconnect { reason }) => {
                tracing::info!(%conn_id, %reason, "client requested disconnect");
                return;
            }
            Payload::System(_) => {
                tracing::debug!(%conn_id, "ignoring unexpected system message");
                continue;
            }
            Payload::Ack { .. } | Payload::Event { .. } => {
                error_message(400, "clients may only send requests and system messages")
            }
        };

        // The writer only stops once the socket is gone.
        if outbox.send(reply).is_err() {
            return;
        }
    }
}

/// Runs one request and turns the result into an ack.
async fn handle_request<C: Codec>(
    conn_id: ConnectionId,
    state: &ServerState<C>,
    outbox: &MemberSender,
    memberships: &mut Memberships,
    request: ClientRequest,
) -> Ack {
    let op = request.name();
    let room_key = request.room_key().clone();

    match dispatch(state, outbox, memberships, request).await {
        Ok(ack) => ack,
        Err(e) => {
            tracing::debug!(%conn_id, %room_key, op, error = %e, "request rejected");
            Ack::error(e.kind(), e.to_string())
        }
    }
}

async fn dispatch<C: Codec>(
    state: &ServerState<C>,
    outbox: &MemberSender,
    memberships: &mut Memberships,
    request: ClientRequest,
) -> Result<Ack, RoomError> {
    if request.room_key().is_blank() {
        return Err(RoomError::InvalidRequest("roomKey is required".into()));
    }

    match request {
        ClientRequest::Join { room_key, name } => {
            if memberships.contains_key(&room_key) {
                return Err(RoomError::InvalidRequest(format!(
                    "already joined room {room_key}"
                )));
            }
            let member_id = state
                .rooms
                .lock()
                .await
                .join(room_key.clone(), &name, outbox.clone())
                .await?;
            memberships.insert(room_key, member_id);
            Ok(Ack::joined(member_id))
        }
        ClientRequest::SetQuestion {
            room_key,
            question,
            answer,
        } => {
            let (room, member_id) = joined_room(state, memberships, &room_key).await?;
            room.set_question(member_id, question, answer).await?;
            Ok(Ack::ok())
        }
        ClientRequest::StartRound {
            room_key,
            duration_seconds,
        } => {
            let (room, member_id) = joined_room(state, memberships, &room_key).await?;
            // A missing duration is rejected by the room like a zero one.
            room.start_round(member_id, duration_seconds.unwrap_or(0)).await?;
            Ok(Ack::ok())
        }
        ClientRequest::SubmitGuess { room_key, guess } => {
            let (room, member_id) = joined_room(state, memberships, &room_key).await?;
            let outcome = room.submit_guess(member_id, guess).await?;
            Ok(Ack::guessed(outcome.correct, outcome.attempts_left))
        }
        ClientRequest::Leave { room_key } => {
            if let Some(member_id) = memberships.remove(&room_key) {
                state.rooms.lock().await.leave(&room_key, member_id).await;
            }
            Ok(Ack::ok())
        }
    }
}

/// The handle of a room this connection has joined. The manager lock is
/// released before the caller talks to the room.
async fn joined_room<C: Codec>(
    state: &ServerState<C>,
    memberships: &Memberships,
    room_key: &RoomKey,
) -> Result<(RoomHandle, MemberId), RoomError> {
    let member_id = memberships
        .get(room_key)
        .copied()
        .ok_or_else(|| RoomError::NotFound(room_key.clone()))?;
    let room = state.rooms.lock().await.handle(room_key)?;
    Ok((room, member_id))
}

/// Drains the outbox onto the socket, stamping sequence numbers.
async fn write_loop<C: Codec>(
    conn: Arc<WebSocketConnection>,
    state: Arc<ServerState<C>>,
    mut rx: mpsc::UnboundedReceiver<Payload>,
) {
    // seq 0 went out with the HandshakeAck.
    let mut seq: u64 = 1;

    while let Some(payload) = rx.recv().await {
        let envelope = Envelope {
            seq,
            timestamp: state.server_time(),
            payload,
        };
        seq += 1;

        let bytes = match state.codec.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(conn_id = %conn.id(), error = %e, "failed to encode envelope");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "send failed, stopping writer");
            break;
        }
    }
}

/// Sends a frame before the writer task exists (handshake phase).
async fn send_direct<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    payload: Payload,
) -> Result<(), QuizcastError> {
    let envelope = Envelope {
        seq: 0,
        timestamp: state.server_time(),
        payload,
    };
    let bytes = state.codec.encode(&envelope)?;
    conn.send(&bytes).await?;
    Ok(())
}

/// A request that names its id is acked as invalid; anything else gets a
/// protocol error.
fn decode_failure<C: Codec>(
    state: &ServerState<C>,
    data: &[u8],
    error: &ProtocolError,
) -> Payload {
    match state.codec.decode::<RequestHeader>(data) {
        Ok(header) => Payload::Ack {
            id: header.id(),
            ack: Ack::error(ErrorKind::InvalidRequest, format!("malformed request: {error}")),
        },
        Err(_) => error_message(400, format!("invalid envelope: {error}")),
    }
}

fn error_message(code: u16, message: impl Into<String>) -> Payload {
    Payload::System(SystemMessage::Error {
        code,
        message: message.into(),
    })
}
