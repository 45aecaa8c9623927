//! One client's live view of a board.
//!
//! DESIGN
//! ======
//! A [`Session`] composes the reconciler, the cooldown gate, the presence
//! list and the ticker for a single identity, and drives them against a
//! [`BoardStore`], a [`RealtimeChannel`] and optional tile and launch
//! collaborators. All methods take `&mut self`: one session is one logical
//! event loop.
//!
//! A placement runs admission, applies optimistically, broadcasts, records
//! presence, persists the full snapshot, writes the per-pixel record, arms
//! the cooldown and finally fires the launch notification. Network failures
//! after admission never undo the local placement; they surface through
//! [`SessionStatus`].
//!
//! TRADE-OFFS
//! ==========
//! Snapshot writes are whole-board overwrites. Under the default
//! [`PersistPolicy::LastWriteWins`] two clients placing concurrently can
//! erase each other's cell from the stored row even though both saw both
//! placements live. [`PersistPolicy::Versioned`] closes that gap with one
//! rebase-and-retry per placement.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::admission::{Admission, CoolingDown};
use crate::channel::{RealtimeChannel, Subscription};
use crate::consts::{ACTIVITY_WINDOW, DEFAULT_COOLDOWN, DEFAULT_PALETTE, PRESENCE_TICK, SWATCH_SIZE, TILE_SIZE};
use crate::event::{ActiveEvent, ChannelEvent, ImageEvent, PixelEvent};
use crate::grid::{BoardId, Grid};
use crate::identity::Identity;
use crate::launch::{LaunchNotifier, LaunchRequest};
use crate::presence::{ActivityRecord, Presence};
use crate::reconciler::{Reconciler, Snapshot};
use crate::store::{BoardStore, PixelImage, PixelOwner, StoreError, TileStore};
use crate::ticker::Ticker;
use crate::tile::{self, TileError};

/// How snapshot writes treat concurrent writers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PersistPolicy {
    /// Unconditional overwrite.
    #[default]
    LastWriteWins,
    /// Write against the last known version; on conflict rebase the placed
    /// cell onto the stored row and retry once.
    Versioned,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cooldown: Duration,
    pub activity_window: Duration,
    pub tick_interval: Duration,
    pub persist_policy: PersistPolicy,
    pub palette: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_COOLDOWN,
            activity_window: ACTIVITY_WINDOW,
            tick_interval: PRESENCE_TICK,
            persist_policy: PersistPolicy::default(),
            palette: DEFAULT_PALETTE.iter().map(|c| (*c).to_owned()).collect(),
        }
    }
}

/// Where the board on screen came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardSource {
    /// Loaded from or last written to the store.
    Server,
    /// Local-only: the store was unreachable or the last write failed.
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub connected: bool,
    pub board_source: BoardSource,
    pub last_persist_error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PlaceError {
    #[error(transparent)]
    CoolingDown(#[from] CoolingDown),
    #[error("cell ({x}, {y}) is off the board")]
    OutOfBounds { x: i64, y: i64 },
    #[error("color index {0} is not in the palette")]
    UnknownColor(u16),
    #[error("no tile store configured")]
    NoTileStore,
    #[error(transparent)]
    Tile(#[from] TileError),
    #[error("tile upload failed: {0}")]
    Upload(StoreError),
}

/// A placement that was admitted and applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub idx: usize,
    pub event: ChannelEvent,
}

pub struct Session {
    identity: Identity,
    config: SessionConfig,
    store: Arc<dyn BoardStore>,
    channel: Arc<dyn RealtimeChannel>,
    tiles: Option<Arc<dyn TileStore>>,
    launcher: Option<Arc<dyn LaunchNotifier>>,
    reconciler: Reconciler,
    admission: Admission,
    presence: Presence,
    ticker: Ticker,
    subscription: Option<Subscription>,
    status: SessionStatus,
}

impl Session {
    #[must_use]
    pub fn new(
        identity: Identity,
        store: Arc<dyn BoardStore>,
        channel: Arc<dyn RealtimeChannel>,
        config: SessionConfig,
    ) -> Self {
        Self {
            reconciler: Reconciler::new(0, 0),
            admission: Admission::new(config.cooldown),
            presence: Presence::new(config.activity_window),
            ticker: Ticker::default(),
            identity,
            config,
            store,
            channel,
            tiles: None,
            launcher: None,
            subscription: None,
            status: SessionStatus { connected: false, board_source: BoardSource::Local, last_persist_error: None },
        }
    }

    #[must_use]
    pub fn with_tiles(mut self, tiles: Arc<dyn TileStore>) -> Self {
        self.tiles = Some(tiles);
        self
    }

    #[must_use]
    pub fn with_launcher(mut self, launcher: Arc<dyn LaunchNotifier>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    // --- Lifecycle ---

    /// Switch to `board_id` at `size`: drop the old subscription and state,
    /// subscribe, load the stored snapshot, gap-fill owners, then apply any
    /// events that arrived while loading.
    ///
    /// Never fails. A store failure leaves an empty local board; a channel
    /// failure leaves the session disconnected.
    pub async fn open(&mut self, board_id: BoardId, size: u32, now: Instant) {
        self.close();
        self.reconciler.reset(board_id, size);
        self.presence.clear();
        self.status = SessionStatus { connected: false, board_source: BoardSource::Local, last_persist_error: None };

        let key = self.identity.presence_key();
        match self.channel.subscribe(board_id, &key, self.identity.presence_meta()).await {
            Ok(subscription) => {
                self.subscription = Some(subscription);
                self.status.connected = true;
            }
            Err(e) => tracing::warn!(board_id, error = %e, "subscribe failed, continuing local-only"),
        }

        let grid = Grid::new(size);
        match self.store.load_board(board_id).await {
            Ok(row) => {
                let has_cells = Snapshot::row_has_cells(&row, grid);
                match self.reconciler.apply_snapshot(Snapshot::from_row(&row, grid)) {
                    Ok(()) if has_cells => self.status.board_source = BoardSource::Server,
                    Ok(()) => tracing::info!(board_id, "stored board has no usable cells"),
                    Err(e) => tracing::warn!(board_id, error = %e, "snapshot rejected"),
                }
            }
            Err(e) => tracing::warn!(board_id, error = %e, "board load failed, using empty board"),
        }

        match self.store.list_pixel_owners(board_id).await {
            Ok(records) => {
                let filled = self.reconciler.fill_missing_owners(&records);
                tracing::debug!(board_id, filled, "filled owners from pixel records");
            }
            Err(e) => tracing::debug!(board_id, error = %e, "pixel owner load failed"),
        }

        let applied = self.pump(now);
        tracing::info!(
            board_id,
            size,
            applied,
            source = ?self.status.board_source,
            connected = self.status.connected,
            "opened board"
        );
    }

    /// Leave the current board channel.
    pub fn close(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.release();
        }
        self.status.connected = false;
    }

    /// Replace the identity and re-announce presence metadata.
    pub fn set_identity(&mut self, identity: Identity) {
        self.identity = identity;
        if let Some(subscription) = &self.subscription {
            subscription.track(self.identity.presence_meta());
        }
    }

    // --- Placement ---

    /// Place palette color `color_index` at `(x, y)`.
    ///
    /// # Errors
    ///
    /// [`PlaceError::CoolingDown`], [`PlaceError::OutOfBounds`] and
    /// [`PlaceError::UnknownColor`] reject the placement with no state
    /// change. Persistence failures are reported through [`Session::status`].
    pub async fn place_color(&mut self, x: i64, y: i64, color_index: u16, now: Instant) -> Result<Placement, PlaceError> {
        self.admission.check_at(now)?;
        let idx = self.reconciler.grid().index(x, y).ok_or(PlaceError::OutOfBounds { x, y })?;
        let Some(color) = self.config.palette.get(usize::from(color_index)).cloned() else {
            return Err(PlaceError::UnknownColor(color_index));
        };

        let owner = self.owner_name();
        let sender = Some(self.identity.presence_key());
        let event = ChannelEvent::Pixel(PixelEvent { x, y, color_index, owner: owner.clone(), sender });
        self.commit(idx, &event, now).await;

        let record = PixelOwner {
            board_id: self.reconciler.board_id(),
            idx: cell_index(idx),
            owner: owner.clone(),
            color_idx: color_index,
        };
        if let Err(e) = self.store.upsert_pixel_owner(&record).await {
            tracing::debug!(board_id = record.board_id, idx, error = %e, "pixel owner write failed");
        }

        self.admission.start_at(now);

        match tile::render_swatch(&color, SWATCH_SIZE) {
            Ok(png) => self.notify_launch(x, y, owner.as_deref(), &png),
            Err(e) => tracing::warn!(%color, error = %e, "swatch render failed, skipping launch"),
        }
        Ok(Placement { idx, event })
    }

    /// Resample `image_bytes` into a tile, upload it and place it at `(x, y)`.
    ///
    /// # Errors
    ///
    /// Admission and bounds errors as for [`Session::place_color`], plus
    /// tile decode and upload failures. All of them leave the board as is.
    pub async fn place_image(&mut self, x: i64, y: i64, image_bytes: &[u8], now: Instant) -> Result<Placement, PlaceError> {
        self.admission.check_at(now)?;
        let idx = self.reconciler.grid().index(x, y).ok_or(PlaceError::OutOfBounds { x, y })?;
        let tiles = self.tiles.clone().ok_or(PlaceError::NoTileStore)?;
        let png = tile::resample_tile(image_bytes, TILE_SIZE)?;
        let board_id = self.reconciler.board_id();
        let url = tiles
            .put_tile(board_id, cell_index(idx), png.clone())
            .await
            .map_err(PlaceError::Upload)?;

        let owner = self.owner_name();
        let sender = Some(self.identity.presence_key());
        let event = ChannelEvent::Image(ImageEvent { x, y, url: url.clone(), owner: owner.clone(), sender });
        self.commit(idx, &event, now).await;

        let record = PixelImage { board_id, idx: cell_index(idx), path: url, owner: owner.clone() };
        if let Err(e) = self.store.upsert_pixel_image(&record).await {
            tracing::debug!(board_id, idx, error = %e, "pixel image write failed");
        }

        self.admission.start_at(now);
        self.notify_launch(x, y, owner.as_deref(), &png);
        Ok(Placement { idx, event })
    }

    /// Apply, broadcast, mark active and persist an admitted placement.
    async fn commit(&mut self, idx: usize, event: &ChannelEvent, now: Instant) {
        self.reconciler.apply_local_placement(event);
        self.ticker.observe(event);

        let active = ActiveEvent { key: self.identity.presence_key(), meta: self.identity.presence_meta() };
        if let Some(subscription) = &self.subscription {
            subscription.send(event);
            subscription.send(&ChannelEvent::Active(active.clone()));
        }
        self.presence.observe_at(&active.key, active.meta, now);

        self.persist(idx).await;
    }

    async fn persist(&mut self, idx: usize) {
        let board_id = self.reconciler.board_id();
        let row = self.reconciler.encode_snapshot();
        let result = match self.config.persist_policy {
            PersistPolicy::LastWriteWins => self.store.upsert_board(&row, None).await,
            PersistPolicy::Versioned => match self.store.upsert_board(&row, Some(row.version)).await {
                Err(StoreError::Conflict { expected, actual }) => {
                    tracing::info!(board_id, expected, actual, "snapshot write lost a race, rebasing");
                    self.rebase_and_write(idx).await
                }
                other => other,
            },
        };
        match result {
            Ok(version) => {
                self.reconciler.set_version(version);
                self.status.board_source = BoardSource::Server;
                self.status.last_persist_error = None;
            }
            Err(e) => {
                tracing::warn!(board_id, error = %e, "snapshot write failed");
                self.status.board_source = BoardSource::Local;
                self.status.last_persist_error = Some(e.to_string());
            }
        }
    }

    /// Merge the stored row around `idx`, write it, and take the merge as
    /// local state so the next versioned write carries the winner's cells.
    async fn rebase_and_write(&mut self, idx: usize) -> Result<i64, StoreError> {
        let board_id = self.reconciler.board_id();
        let stored = self.store.load_board(board_id).await?;
        let snapshot = Snapshot::from_row(&stored, self.reconciler.grid());
        let merged = self.reconciler.rebase(&snapshot, idx);
        let row = self.reconciler.snapshot_row(&merged);
        let version = self.store.upsert_board(&row, Some(stored.version)).await?;
        self.reconciler.adopt_rebase(merged, version);
        Ok(version)
    }

    fn notify_launch(&self, x: i64, y: i64, owner: Option<&str>, png: &[u8]) {
        let Some(launcher) = self.launcher.clone() else {
            return;
        };
        let request = LaunchRequest::for_placement(self.reconciler.board_id(), x, y, owner, STANDARD.encode(png));
        tokio::spawn(async move {
            launcher.notify(request).await;
        });
    }

    fn owner_name(&self) -> Option<String> {
        let name = self.identity.display_name.trim();
        (!name.is_empty()).then(|| name.to_owned())
    }

    // --- Remote events ---

    /// Apply one event received from the channel. Returns the touched cell
    /// index for placements that landed on the board.
    pub fn handle_event(&mut self, event: &ChannelEvent, now: Instant) -> Option<usize> {
        match event {
            ChannelEvent::Active(active) => {
                self.presence.observe_at(&active.key, active.meta.clone(), now);
                None
            }
            ChannelEvent::Pixel(_) | ChannelEvent::Image(_) => {
                let idx = self.reconciler.apply_remote_event(event);
                self.observe_placer(event, now);
                if idx.is_some() {
                    self.ticker.observe(event);
                }
                idx
            }
        }
    }

    /// Refresh the placer's presence entry. Keyed by sender so it lines up
    /// with the `active` event that follows; the owner name stands in only
    /// when the transport did not say who sent it.
    fn observe_placer(&mut self, event: &ChannelEvent, now: Instant) {
        let Some(key) = event.sender().or_else(|| event.owner()) else {
            return;
        };
        let meta = match self.presence.get(key) {
            Some(record) => record.meta.clone(),
            None => event
                .owner()
                .map_or_else(|| serde_json::json!({}), |owner| serde_json::json!({ "name": owner })),
        };
        self.presence.observe_at(key, meta, now);
    }

    /// Apply every event already queued on the subscription. Returns how
    /// many were processed.
    pub fn pump(&mut self, now: Instant) -> usize {
        let mut processed = 0;
        while let Some(event) = self.subscription.as_mut().and_then(Subscription::try_recv) {
            self.handle_event(&event, now);
            processed += 1;
        }
        processed
    }

    /// Wait for the next channel event. Returns `None` and marks the session
    /// disconnected once the transport is gone.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        let event = match self.subscription.as_mut() {
            Some(subscription) => subscription.recv().await,
            None => None,
        };
        if event.is_none() && self.status.connected {
            tracing::warn!(board_id = self.reconciler.board_id(), "channel closed");
            self.status.connected = false;
        }
        event
    }

    /// Periodic presence prune. Returns the current active players.
    pub fn tick(&mut self, now: Instant) -> Vec<ActivityRecord> {
        self.presence.prune_at(now);
        self.presence.players().into_iter().cloned().collect()
    }

    // --- Queries ---

    #[must_use]
    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    #[must_use]
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    #[must_use]
    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    #[must_use]
    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Carry the cooldown of a placement made `elapsed` ago outside this
    /// session.
    pub fn resume_cooldown(&mut self, elapsed: Duration, now: Instant) {
        self.admission.resume_at(elapsed, now);
    }

    #[must_use]
    pub fn cooldown_remaining(&self, now: Instant) -> Duration {
        self.admission.remaining_at(now)
    }
}

/// Grid indices always fit the `u32` used by per-pixel records.
#[allow(clippy::cast_possible_truncation)]
fn cell_index(idx: usize) -> u32 {
    idx as u32
}
