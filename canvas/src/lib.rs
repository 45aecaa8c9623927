//! Client core for the collaborative pixel board.
//!
//! This crate holds everything a client needs to take part in a shared board
//! without any rendering: the grid and its snapshot encoding, the reconciler
//! that merges local and remote placements, the cooldown gate, the presence
//! list, and the [`session::Session`] that drives them against a board store
//! and a realtime channel. Transports live outside the crate behind the
//! traits in [`store`], [`channel`] and [`launch`].
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`session`] | One client's view of a board: placement and event pump |
//! | [`reconciler`] | In-memory cells, owners and images; last processed write wins |
//! | [`admission`] | Placement cooldown gate |
//! | [`presence`] | Recently active identities |
//! | [`channel`] | Realtime channel contract, subscriptions and the in-process hub |
//! | [`store`] | Board and tile store contracts plus an in-memory store |
//! | [`event`] | `pixel` / `image` / `active` events and their frame mapping |
//! | [`codec`] | Snapshot blob and sparse map encoding |
//! | [`grid`] | Board geometry and the cell index mapping |
//! | [`hit`] | Screen point to cell mapping |
//! | [`tile`] | Image tile resampling and swatch rendering |
//! | [`identity`] | Local identity profile |
//! | [`ticker`] | Recent placement feed |
//! | [`launch`] | Token-launch notification payload |
//! | [`consts`] | Shared constants (cooldown, windows, palette, sizes) |

pub mod admission;
pub mod channel;
pub mod codec;
pub mod consts;
pub mod event;
pub mod grid;
pub mod hit;
pub mod identity;
pub mod launch;
pub mod presence;
pub mod reconciler;
pub mod session;
pub mod store;
pub mod ticker;
pub mod tile;
