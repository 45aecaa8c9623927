//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the board store, the tile store, and the live channel registry. The
//! registry maps each board to the sockets currently subscribed to it; the
//! board row itself is never locked, every write goes straight to the store.

use std::collections::HashMap;
use std::sync::Arc;

use canvas::grid::BoardId;
use canvas::store::{BoardStore, TileStore};
use frames::Frame;
use serde_json::Value;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::config::ServerConfig;

// =============================================================================
// BOARD CHANNEL
// =============================================================================

/// One socket subscribed to a board.
pub struct Member {
    /// Presence key the client joined with. Unverified.
    pub key: String,
    pub meta: Value,
    /// Outbound queue of the member's socket task.
    pub tx: mpsc::Sender<Frame>,
}

/// Live subscribers of one board, keyed by connection id.
#[derive(Default)]
pub struct BoardChannel {
    pub members: HashMap<Uuid, Member>,
}

// =============================================================================
// APP STATE
// =============================================================================

/// Clone is required by Axum; every field is shared.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BoardStore>,
    pub tiles: Arc<dyn TileStore>,
    pub channels: Arc<RwLock<HashMap<BoardId, BoardChannel>>>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn BoardStore>, tiles: Arc<dyn TileStore>, config: ServerConfig) -> Self {
        Self { store, tiles, channels: Arc::new(RwLock::new(HashMap::new())), config: Arc::new(config) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use canvas::store::MemoryStore;

    /// App state over a fresh in-memory store with boards 1 and 2 seeded.
    pub async fn test_app_state() -> (AppState, MemoryStore) {
        let store = MemoryStore::with_tile_base_url("http://test");
        for (board_id, size) in crate::config::SEED_BOARDS {
            store.create_board(board_id, size).await;
        }
        let state = AppState::new(Arc::new(store.clone()), Arc::new(store.clone()), ServerConfig::default());
        (state, store)
    }

    /// Register a fake socket on a board and return its id and inbound queue.
    pub async fn seed_member(state: &AppState, board_id: BoardId, key: &str) -> (Uuid, mpsc::Receiver<Frame>) {
        let client_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(16);
        let mut channels = state.channels.write().await;
        channels
            .entry(board_id)
            .or_default()
            .members
            .insert(client_id, Member { key: key.to_owned(), meta: Value::Null, tx });
        (client_id, rx)
    }
}
