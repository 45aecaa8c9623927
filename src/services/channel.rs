//! Board channel service: join, track, part, and fan-out.
//!
//! DESIGN
//! ======
//! A socket joins at most one board at a time. Broadcasts go to every other
//! member of the board through its bounded outbound queue. Delivery is
//! best-effort: a member whose queue is full or closed loses that frame and
//! nobody else notices. There is no backlog for late joiners.
//!
//! ERROR HANDLING
//! ==============
//! Joining checks that the board exists. When the store cannot answer the
//! join still goes through, since relaying does not depend on persistence.

use canvas::grid::BoardId;
use canvas::store::StoreError;
use frames::Frame;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::state::{AppState, Member};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("board not found: {0}")]
    BoardNotFound(BoardId),
    #[error("join a board first")]
    NotJoined,
}

impl crate::frame::ErrorCode for ChannelError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::BoardNotFound(_) => "E_BOARD_NOT_FOUND",
            Self::NotJoined => "E_NOT_JOINED",
        }
    }
}

// =============================================================================
// MEMBERSHIP
// =============================================================================

/// Subscribe a connection to a board. Returns the member count after join.
///
/// # Errors
///
/// [`ChannelError::BoardNotFound`] when the store knows no such board.
pub async fn join(
    state: &AppState,
    board_id: BoardId,
    client_id: Uuid,
    key: &str,
    meta: Value,
    tx: mpsc::Sender<Frame>,
) -> Result<usize, ChannelError> {
    match state.store.load_board(board_id).await {
        Ok(_) => {}
        Err(StoreError::NotFound(_)) => return Err(ChannelError::BoardNotFound(board_id)),
        Err(e) => warn!(%board_id, error = %e, "board lookup failed; joining anyway"),
    }

    let mut channels = state.channels.write().await;
    let channel = channels.entry(board_id).or_default();
    channel
        .members
        .insert(client_id, Member { key: key.to_owned(), meta, tx });
    let members = channel.members.len();
    info!(%board_id, %client_id, key, members, "client joined board channel");
    Ok(members)
}

/// Replace a member's presence metadata. Returns false if not a member.
pub async fn track(state: &AppState, board_id: BoardId, client_id: Uuid, meta: Value) -> bool {
    let mut channels = state.channels.write().await;
    let Some(member) = channels
        .get_mut(&board_id)
        .and_then(|c| c.members.get_mut(&client_id))
    else {
        return false;
    };
    member.meta = meta;
    true
}

/// Remove a connection from a board. Empty boards are dropped from the map.
pub async fn part(state: &AppState, board_id: BoardId, client_id: Uuid) {
    let mut channels = state.channels.write().await;
    let Some(channel) = channels.get_mut(&board_id) else {
        return;
    };
    channel.members.remove(&client_id);
    let remaining = channel.members.len();
    info!(%board_id, %client_id, remaining, "client left board channel");
    if remaining == 0 {
        channels.remove(&board_id);
    }
}

/// Presence keys and metadata of a board's members, sorted by key.
pub async fn members(state: &AppState, board_id: BoardId) -> Vec<(String, Value)> {
    let channels = state.channels.read().await;
    let mut out: Vec<_> = channels
        .get(&board_id)
        .map(|c| {
            c.members
                .values()
                .map(|m| (m.key.clone(), m.meta.clone()))
                .collect()
        })
        .unwrap_or_default();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

// =============================================================================
// FAN-OUT
// =============================================================================

/// Send `frame` to every member of `board_id` except `exclude`. Returns how
/// many queues accepted it.
pub async fn broadcast(state: &AppState, board_id: BoardId, frame: &Frame, exclude: Option<Uuid>) -> usize {
    let channels = state.channels.read().await;
    let Some(channel) = channels.get(&board_id) else {
        return 0;
    };

    let mut delivered = 0;
    for (client_id, member) in &channel.members {
        if exclude == Some(*client_id) {
            continue;
        }
        // A full queue costs only this member the frame.
        match member.tx.try_send(frame.clone()) {
            Ok(()) => delivered += 1,
            Err(e) => debug!(%board_id, %client_id, error = %e, "dropped frame for member"),
        }
    }
    delivered
}

#[cfg(test)]
#[path = "channel_test.rs"]
mod tests;
