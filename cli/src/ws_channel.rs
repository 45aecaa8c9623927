//! Realtime channel over the server's websocket relay.
//!
//! DESIGN
//! ======
//! One websocket per subscription. `subscribe` connects, waits for the
//! `channel:connected` welcome, joins the board and waits for the join
//! reply. After that a pump task owns the socket: it writes frames queued by
//! the [`WsLink`] and turns relayed `pixel` / `image` / `active` frames into
//! [`ChannelEvent`]s on the subscription's inbound queue.
//!
//! LIFECYCLE
//! =========
//! Releasing the subscription queues a `channel:leave` and closes the
//! inbound queue. The pump sends the leave, closes the socket and exits. A
//! socket that closes on its own ends the pump too, which the session sees
//! as `recv()` returning `None`.
//!
//! TRADE-OFFS
//! ==========
//! Both queues are bounded. A full outbound queue fails the send with
//! `QueueFull` and a full inbound queue drops the relayed event, which is
//! the same best-effort delivery the relay itself gives.

use std::time::Duration;

use async_trait::async_trait;
use canvas::channel::{ChannelError, DEFAULT_QUEUE_CAPACITY, RealtimeChannel, Subscription, SubscriptionLink};
use canvas::event::{ChannelEvent, request_frame};
use canvas::grid::BoardId;
use frames::{EVENT_CONNECTED, EVENT_JOIN, EVENT_LEAVE, EVENT_TRACK, Frame, Status};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// `http(s)://host` to `ws(s)://host/api/ws`.
///
/// # Errors
///
/// [`ChannelError::Transport`] for any other scheme.
pub fn ws_url(base_url: &str) -> Result<String, ChannelError> {
    let base = base_url.trim_end_matches('/');
    if let Some(rest) = base.strip_prefix("http://") {
        return Ok(format!("ws://{rest}/api/ws"));
    }
    if let Some(rest) = base.strip_prefix("https://") {
        return Ok(format!("wss://{rest}/api/ws"));
    }
    Err(ChannelError::Transport(format!("invalid base URL: {base_url}")))
}

#[derive(Debug, Clone)]
pub struct WsChannel {
    url: String,
    handshake_timeout: Duration,
    capacity: usize,
}

impl WsChannel {
    #[must_use]
    pub fn new(url: &str) -> Self {
        Self { url: url.to_owned(), handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT, capacity: DEFAULT_QUEUE_CAPACITY }
    }

    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    async fn recv_frame(&self, socket: &mut Socket) -> Result<Frame, ChannelError> {
        let wait = async {
            loop {
                match socket.next().await {
                    Some(Ok(Message::Binary(bytes))) => {
                        return frames::decode_frame(&bytes).map_err(|e| ChannelError::Transport(e.to_string()));
                    }
                    Some(Ok(Message::Close(_))) | None => return Err(ChannelError::Closed),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(ChannelError::Transport(e.to_string())),
                }
            }
        };
        tokio::time::timeout(self.handshake_timeout, wait)
            .await
            .map_err(|_| ChannelError::Transport("timed out waiting for websocket frame".into()))?
    }
}

async fn send_frame(socket: &mut Socket, frame: &Frame) -> Result<(), ChannelError> {
    socket
        .send(Message::Binary(frames::encode_frame(frame).into()))
        .await
        .map_err(|e| ChannelError::Transport(e.to_string()))
}

#[async_trait]
impl RealtimeChannel for WsChannel {
    async fn subscribe(&self, board_id: BoardId, key: &str, meta: Value) -> Result<Subscription, ChannelError> {
        let (mut socket, _) = tokio::time::timeout(self.handshake_timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| ChannelError::Transport("websocket connect timed out".into()))?
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        let welcome = self.recv_frame(&mut socket).await?;
        if welcome.event != EVENT_CONNECTED {
            return Err(ChannelError::Transport(format!("expected welcome, got {}", welcome.event)));
        }

        let mut join = request_frame(EVENT_JOIN, json!({ "key": key, "meta": meta }));
        join.board_id = Some(board_id);
        send_frame(&mut socket, &join).await?;
        let reply = loop {
            let frame = self.recv_frame(&mut socket).await?;
            if frame.parent_id.as_deref() == Some(join.id.as_str()) {
                break frame;
            }
        };
        if reply.status == Status::Error {
            let message = reply.text("message").unwrap_or("join refused").to_owned();
            return Err(ChannelError::Transport(message));
        }
        info!(%board_id, key, members = ?reply.number("members"), "joined board channel");

        let (outbound_tx, outbound_rx) = mpsc::channel(self.capacity);
        let (inbound_tx, inbound_rx) = mpsc::channel(self.capacity);
        tokio::spawn(pump(socket, board_id, outbound_rx, inbound_tx));

        let link = WsLink { board_id, key: key.to_owned(), outbound: outbound_tx };
        Ok(Subscription::new(board_id, key, Box::new(link), inbound_rx))
    }
}

// =============================================================================
// PUMP
// =============================================================================

async fn pump(
    mut socket: Socket,
    board_id: BoardId,
    mut outbound: mpsc::Receiver<Frame>,
    inbound: mpsc::Sender<ChannelEvent>,
) {
    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                let leaving = frame.event == EVENT_LEAVE;
                if let Err(e) = send_frame(&mut socket, &frame).await {
                    warn!(%board_id, event = %frame.event, error = %e, "websocket send failed");
                    break;
                }
                if leaving {
                    break;
                }
            }
            msg = socket.next() => match msg {
                Some(Ok(Message::Binary(bytes))) => {
                    if !deliver(board_id, &bytes, &inbound) {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(%board_id, error = %e, "websocket read failed");
                    break;
                }
            }
        }
    }
    if let Err(e) = socket.close(None).await {
        debug!(%board_id, error = %e, "websocket close failed");
    }
    debug!(%board_id, "websocket pump stopped");
}

/// Queue one relayed frame. Returns false once nobody is listening.
fn deliver(board_id: BoardId, bytes: &[u8], inbound: &mpsc::Sender<ChannelEvent>) -> bool {
    let frame = match frames::decode_frame(bytes) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(%board_id, error = %e, "dropping undecodable frame");
            return true;
        }
    };
    if frame.status == Status::Error {
        warn!(%board_id, event = %frame.event, message = ?frame.text("message"), "server error frame");
        return true;
    }
    let Some(event) = ChannelEvent::from_frame(&frame) else {
        return true;
    };
    match inbound.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(event)) => {
            debug!(%board_id, event = event.name(), "inbound queue full, dropping event");
            true
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

// =============================================================================
// LINK
// =============================================================================

struct WsLink {
    board_id: BoardId,
    key: String,
    outbound: mpsc::Sender<Frame>,
}

impl WsLink {
    fn enqueue(&self, mut frame: Frame) -> Result<(), ChannelError> {
        frame.board_id = Some(self.board_id);
        self.outbound.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => ChannelError::QueueFull,
            TrySendError::Closed(_) => ChannelError::Closed,
        })
    }
}

impl SubscriptionLink for WsLink {
    fn send(&self, event: &ChannelEvent) -> Result<(), ChannelError> {
        self.enqueue(event.to_frame(self.board_id, Some(&self.key)))
    }

    fn track(&self, meta: Value) -> Result<(), ChannelError> {
        self.enqueue(request_frame(EVENT_TRACK, json!({ "meta": meta })))
    }

    fn release(&self) {
        if let Err(e) = self.enqueue(request_frame(EVENT_LEAVE, json!({}))) {
            debug!(board_id = self.board_id, error = %e, "leave not sent");
        }
    }
}

#[cfg(test)]
#[path = "ws_channel_test.rs"]
mod tests;
