//! Realtime channel contract.
//!
//! A client joins one board scope and receives a [`Subscription`]. Through
//! it the client broadcasts `pixel` / `image` / `active` events to every
//! other member of the scope and receives theirs. Delivery is best-effort:
//! no acknowledgement, no replay for late joiners, and a sender never sees
//! its own broadcast. Send failures are logged and swallowed.
//!
//! Dropping a [`Subscription`] leaves the scope.
//!
//! [`LocalHub`] implements the contract in-process.

#[cfg(test)]
#[path = "channel_test.rs"]
mod channel_test;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::event::ChannelEvent;
use crate::grid::{BoardId, channel_name};

/// Per-subscriber inbound queue depth.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,
    #[error("subscriber queue full")]
    QueueFull,
    #[error("transport error: {0}")]
    Transport(String),
}

/// Something that can hand out board subscriptions.
#[async_trait]
pub trait RealtimeChannel: Send + Sync {
    /// Join `board_id` with a presence `key` and initial metadata.
    async fn subscribe(&self, board_id: BoardId, key: &str, meta: Value) -> Result<Subscription, ChannelError>;
}

/// Transport side of a subscription. Implementations must not block.
pub trait SubscriptionLink: Send + Sync {
    fn send(&self, event: &ChannelEvent) -> Result<(), ChannelError>;
    fn track(&self, meta: Value) -> Result<(), ChannelError>;
    /// Leave the scope. Called at most once.
    fn release(&self);
}

/// Membership of one board scope. Leaves the scope when dropped.
pub struct Subscription {
    board_id: BoardId,
    key: String,
    link: Box<dyn SubscriptionLink>,
    inbound: mpsc::Receiver<ChannelEvent>,
    released: bool,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("board_id", &self.board_id)
            .field("key", &self.key)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    /// Assemble a subscription from a transport link and its inbound queue.
    #[must_use]
    pub fn new(
        board_id: BoardId,
        key: &str,
        link: Box<dyn SubscriptionLink>,
        inbound: mpsc::Receiver<ChannelEvent>,
    ) -> Self {
        Self { board_id, key: key.to_owned(), link, inbound, released: false }
    }

    #[must_use]
    pub fn board_id(&self) -> BoardId {
        self.board_id
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn name(&self) -> String {
        channel_name(self.board_id)
    }

    /// Broadcast to the other members. Failures are logged, never returned.
    pub fn send(&self, event: &ChannelEvent) {
        if self.released {
            return;
        }
        if let Err(e) = self.link.send(event) {
            tracing::warn!(board_id = self.board_id, event = event.name(), error = %e, "channel send failed");
        }
    }

    /// Update the presence metadata associated with this connection.
    pub fn track(&self, meta: Value) {
        if self.released {
            return;
        }
        if let Err(e) = self.link.track(meta) {
            tracing::warn!(board_id = self.board_id, error = %e, "channel track failed");
        }
    }

    /// Wait for the next event. `None` once the transport is gone.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.inbound.recv().await
    }

    /// Next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<ChannelEvent> {
        match self.inbound.try_recv() {
            Ok(event) => Some(event),
            Err(_) => None,
        }
    }

    /// Leave the scope now instead of at drop.
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.link.release();
            self.inbound.close();
            tracing::debug!(board_id = self.board_id, key = %self.key, "left board channel");
        }
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

// =============================================================================
// IN-PROCESS HUB
// =============================================================================

struct Member {
    key: String,
    meta: Value,
    tx: mpsc::Sender<ChannelEvent>,
}

#[derive(Default)]
struct HubState {
    next_id: u64,
    boards: HashMap<BoardId, HashMap<u64, Member>>,
}

/// In-process channel: every subscription made through one hub (or its
/// clones) shares the same board scopes.
#[derive(Clone)]
pub struct LocalHub {
    state: Arc<Mutex<HubState>>,
    capacity: usize,
}

impl Default for LocalHub {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }
}

impl LocalHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hub whose subscribers queue at most `capacity` events each.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { state: Arc::default(), capacity: capacity.max(1) }
    }

    /// Number of live subscriptions on a board.
    #[must_use]
    pub fn member_count(&self, board_id: BoardId) -> usize {
        self.lock().boards.get(&board_id).map_or(0, HashMap::len)
    }

    /// Presence keys and metadata of the members of a board, sorted by key.
    #[must_use]
    pub fn members(&self, board_id: BoardId) -> Vec<(String, Value)> {
        let state = self.lock();
        let mut members: Vec<_> = state
            .boards
            .get(&board_id)
            .map(|m| m.values().map(|m| (m.key.clone(), m.meta.clone())).collect())
            .unwrap_or_default();
        members.sort_by(|a, b| a.0.cmp(&b.0));
        members
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RealtimeChannel for LocalHub {
    async fn subscribe(&self, board_id: BoardId, key: &str, meta: Value) -> Result<Subscription, ChannelError> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let member_id = {
            let mut state = self.lock();
            state.next_id += 1;
            let member_id = state.next_id;
            state
                .boards
                .entry(board_id)
                .or_default()
                .insert(member_id, Member { key: key.to_owned(), meta, tx });
            member_id
        };
        tracing::debug!(board_id, key, member_id, "joined local board channel");
        let link = LocalLink { hub: self.clone(), board_id, member_id };
        Ok(Subscription::new(board_id, key, Box::new(link), rx))
    }
}

struct LocalLink {
    hub: LocalHub,
    board_id: BoardId,
    member_id: u64,
}

impl SubscriptionLink for LocalLink {
    fn send(&self, event: &ChannelEvent) -> Result<(), ChannelError> {
        let state = self.hub.lock();
        let Some(members) = state.boards.get(&self.board_id) else {
            return Err(ChannelError::Closed);
        };
        if !members.contains_key(&self.member_id) {
            return Err(ChannelError::Closed);
        }
        for (id, member) in members {
            if *id == self.member_id {
                continue;
            }
            // A full or closed peer queue only costs that peer this event.
            if let Err(e) = member.tx.try_send(event.clone()) {
                tracing::debug!(board_id = self.board_id, peer = %member.key, error = %e, "dropped event for peer");
            }
        }
        Ok(())
    }

    fn track(&self, meta: Value) -> Result<(), ChannelError> {
        let mut state = self.hub.lock();
        let member = state
            .boards
            .get_mut(&self.board_id)
            .and_then(|m| m.get_mut(&self.member_id))
            .ok_or(ChannelError::Closed)?;
        member.meta = meta;
        Ok(())
    }

    fn release(&self) {
        let mut state = self.hub.lock();
        if let Some(members) = state.boards.get_mut(&self.board_id) {
            members.remove(&self.member_id);
            if members.is_empty() {
                state.boards.remove(&self.board_id);
            }
        }
    }
}
