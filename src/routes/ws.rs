//! WebSocket handler — board channel relay.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID and enters a `select!` loop:
//! - Incoming binary frames → decode + dispatch by event name
//! - Frames relayed from board peers → forward to client
//!
//! Handlers validate and return an `Outcome`; the dispatch layer owns all
//! outbound concerns (reply to sender, relay to peers). The relay never
//! interprets `pixel` / `image` / `active` payloads, it only stamps the
//! board scope and the sender's presence key and fans them out to everyone
//! else on the board.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `channel:connected` with `client_id`
//! 2. `channel:join {board_id, key, meta}` → reply `done {members}`
//! 3. Broadcast events → relayed to peers, sender gets nothing back
//! 4. Close → leave the board

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use canvas::grid::BoardId;
use frames::{EVENT_CONNECTED, EVENT_JOIN, EVENT_LEAVE, EVENT_TRACK, Frame, Status};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::frame::{ErrorCode, Reply};
use crate::services;
use crate::services::channel::ChannelError;
use crate::state::AppState;

/// Event of server-originated error frames that answer no request.
pub const EVENT_ERROR: &str = "channel:error";

// =============================================================================
// TYPES
// =============================================================================

/// Result returned by handler functions. Handlers never send frames.
enum Outcome {
    /// Send done+data to sender only.
    Reply(Value),
    /// Send empty done to sender only.
    Done,
    /// Relay a frame to all board peers EXCLUDING sender. No reply.
    BroadcastExcludeSender(Frame),
}

#[derive(Debug, thiserror::Error)]
enum WsError {
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    #[error("board_id required")]
    MissingBoardId,
    #[error("invalid frame: {0}")]
    Decode(String),
    #[error("text frames are not supported; send protobuf frames")]
    TextFrame,
}

impl ErrorCode for WsError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownEvent(_) => "E_UNKNOWN_EVENT",
            Self::MissingBoardId => "E_BAD_REQUEST",
            Self::Decode(_) | Self::TextFrame => "E_DECODE",
        }
    }
}

/// Per-socket state.
struct Connection {
    client_id: Uuid,
    board: Option<BoardId>,
    /// Presence key from the last join, the client id until then.
    key: String,
    tx: mpsc::Sender<Frame>,
}

impl Connection {
    fn new(client_id: Uuid, tx: mpsc::Sender<Frame>) -> Self {
        Self { client_id, board: None, key: client_id.to_string(), tx }
    }
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();

    // Per-connection queue for frames relayed from peers.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(state.config.channel_queue_capacity);

    let welcome = crate::frame::request(EVENT_CONNECTED, json!({ "client_id": client_id.to_string() }));
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }
    info!(%client_id, "ws: client connected");

    let mut conn = Connection::new(client_id, client_tx);

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                let replies = match msg {
                    Message::Binary(bytes) => process_inbound(&state, &mut conn, &bytes).await,
                    Message::Text(_) => vec![stray_error(&WsError::TextFrame)],
                    Message::Close(_) => break,
                    _ => Vec::new(),
                };
                for frame in replies {
                    let _ = send_frame(&mut socket, &frame).await;
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(board_id) = conn.board.take() {
        services::channel::part(&state, board_id, client_id).await;
    }
    info!(%client_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Decode and handle one inbound frame and return frames for the sender.
/// Kept apart from the socket so tests can drive dispatch directly.
async fn process_inbound(state: &AppState, conn: &mut Connection, bytes: &[u8]) -> Vec<Frame> {
    let req = match frames::decode_frame(bytes) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(client_id = %conn.client_id, error = %e, "ws: invalid inbound frame");
            return vec![stray_error(&WsError::Decode(e.to_string()))];
        }
    };

    let relayed = frames::is_broadcast_event(&req.event);
    if relayed {
        debug!(client_id = %conn.client_id, event = %req.event, "ws: recv frame");
    } else {
        info!(client_id = %conn.client_id, id = %req.id, event = %req.event, "ws: recv frame");
    }

    let result = if relayed {
        handle_broadcast(conn, &req)
    } else {
        match req.event.as_str() {
            EVENT_JOIN => handle_join(state, conn, &req).await,
            EVENT_TRACK => handle_track(state, conn, &req).await,
            EVENT_LEAVE => Ok(handle_leave(state, conn).await),
            other => Err(req.error_from(&WsError::UnknownEvent(other.to_owned()))),
        }
    };

    match result {
        Ok(Outcome::Reply(data)) => vec![req.done_with(data)],
        Ok(Outcome::Done) => vec![req.done()],
        Ok(Outcome::BroadcastExcludeSender(frame)) => {
            if let Some(board_id) = conn.board {
                services::channel::broadcast(state, board_id, &frame, Some(conn.client_id)).await;
            }
            vec![]
        }
        Err(err_frame) => vec![err_frame],
    }
}

// =============================================================================
// CHANNEL HANDLERS
// =============================================================================

async fn handle_join(state: &AppState, conn: &mut Connection, req: &Frame) -> Result<Outcome, Frame> {
    let Some(board_id) = req.board_id.or_else(|| req.number("board_id").and_then(whole_number)) else {
        return Err(req.error_from(&WsError::MissingBoardId));
    };
    let key = req
        .text("key")
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map_or_else(|| conn.client_id.to_string(), str::to_owned);
    let meta = req.data.get("meta").cloned().unwrap_or_else(|| json!({}));

    // Leave the current board first.
    if let Some(old) = conn.board.take() {
        services::channel::part(state, old, conn.client_id).await;
    }

    match services::channel::join(state, board_id, conn.client_id, &key, meta, conn.tx.clone()).await {
        Ok(members) => {
            conn.board = Some(board_id);
            conn.key = key;
            let peers: Vec<Value> = services::channel::members(state, board_id)
                .await
                .into_iter()
                .map(|(key, meta)| json!({ "key": key, "meta": meta }))
                .collect();
            Ok(Outcome::Reply(json!({
                "board_id": board_id,
                "client_id": conn.client_id.to_string(),
                "members": members,
                "peers": peers,
            })))
        }
        Err(e) => Err(req.error_from(&e)),
    }
}

async fn handle_track(state: &AppState, conn: &Connection, req: &Frame) -> Result<Outcome, Frame> {
    let Some(board_id) = conn.board else {
        return Err(req.error_from(&ChannelError::NotJoined));
    };
    let meta = req.data.get("meta").cloned().unwrap_or_else(|| json!({}));
    services::channel::track(state, board_id, conn.client_id, meta).await;
    Ok(Outcome::Done)
}

async fn handle_leave(state: &AppState, conn: &mut Connection) -> Outcome {
    if let Some(board_id) = conn.board.take() {
        services::channel::part(state, board_id, conn.client_id).await;
    }
    Outcome::Done
}

fn handle_broadcast(conn: &Connection, req: &Frame) -> Result<Outcome, Frame> {
    let Some(board_id) = conn.board else {
        return Err(req.error_from(&ChannelError::NotJoined));
    };
    let mut frame = req.clone();
    frame.parent_id = None;
    frame.status = Status::Request;
    frame.board_id = Some(board_id);
    frame.from = Some(conn.key.clone());
    Ok(Outcome::BroadcastExcludeSender(frame))
}

// =============================================================================
// HELPERS
// =============================================================================

#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn whole_number(value: f64) -> Option<BoardId> {
    (value.is_finite() && value.trunc() == value && value.abs() < 9.0e15).then_some(value as BoardId)
}

/// Error frame for input that could not be parsed into a request.
fn stray_error(err: &WsError) -> Frame {
    let mut frame = crate::frame::request(EVENT_ERROR, crate::frame::error_body(err));
    frame.status = Status::Error;
    frame
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    if frame.status == Status::Error {
        let code = frame.text(crate::frame::FRAME_CODE).unwrap_or("-");
        let message = frame.text(crate::frame::FRAME_MESSAGE).unwrap_or("-");
        warn!(id = %frame.id, event = %frame.event, code, message, "ws: send frame status=Error");
    } else if !frames::is_broadcast_event(&frame.event) {
        info!(id = %frame.id, event = %frame.event, status = ?frame.status, "ws: send frame");
    }
    socket
        .send(Message::Binary(frames::encode_frame(frame).into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
