//! Server configuration, read once from the environment at startup.
//!
//! Every knob has a default so the server runs with no environment at all:
//! without `DATABASE_URL` it keeps boards in memory and seeds the same two
//! boards the migrations create.

use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_TILE_DIR: &str = "data/tiles";
pub const DEFAULT_CHANNEL_QUEUE_CAPACITY: usize = 256;
/// Upload cap for one tile. Tiles are 32x32 PNGs, so this is generous.
pub const DEFAULT_MAX_TILE_BYTES: usize = 256 * 1024;

/// Boards created at startup when running without a database.
pub const SEED_BOARDS: [(i64, u32); 2] = [(1, 32), (2, 32)];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// `None` runs the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub tile_dir: PathBuf,
    /// Prefix of tile URLs handed back to clients.
    pub public_base_url: String,
    pub channel_queue_capacity: usize,
    pub max_tile_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            tile_dir: PathBuf::from(DEFAULT_TILE_DIR),
            public_base_url: format!("http://127.0.0.1:{DEFAULT_PORT}"),
            channel_queue_capacity: DEFAULT_CHANNEL_QUEUE_CAPACITY,
            max_tile_bytes: DEFAULT_MAX_TILE_BYTES,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let port = env_parse("PORT", DEFAULT_PORT);
        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| format!("http://127.0.0.1:{port}"));
        Self {
            port,
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            tile_dir: std::env::var("TILE_DIR").map_or_else(|_| PathBuf::from(DEFAULT_TILE_DIR), PathBuf::from),
            public_base_url: public_base_url.trim_end_matches('/').to_owned(),
            channel_queue_capacity: env_parse("CHANNEL_QUEUE_CAPACITY", DEFAULT_CHANNEL_QUEUE_CAPACITY).max(1),
            max_tile_bytes: env_parse("MAX_TILE_BYTES", DEFAULT_MAX_TILE_BYTES),
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
