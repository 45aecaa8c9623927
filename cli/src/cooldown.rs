//! Placement cooldown carried across CLI invocations.
//!
//! Each `place` runs in a fresh process with a fresh session, so the time
//! of the last successful placement is kept in a small JSON file next to
//! the profile's identity file. A missing or unreadable stamp means no
//! cooldown is pending.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
struct Stamp {
    placed_at_ms: u64,
}

#[derive(Debug, Clone)]
pub struct CooldownStamp {
    path: PathBuf,
}

impl CooldownStamp {
    /// `identity-default.json` keeps its stamp in `identity-default.cooldown.json`.
    #[must_use]
    pub fn beside(identity_path: &Path) -> Self {
        Self { path: identity_path.with_extension("cooldown.json") }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Time since the recorded placement, measured at `now`. A stamp from
    /// the future reads as zero elapsed.
    #[must_use]
    pub fn elapsed_at(&self, now: SystemTime) -> Option<Duration> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "cooldown stamp unreadable");
                return None;
            }
        };
        let stamp: Stamp = match serde_json::from_str(&text) {
            Ok(stamp) => stamp,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "cooldown stamp malformed");
                return None;
            }
        };
        let placed_at = UNIX_EPOCH + Duration::from_millis(stamp.placed_at_ms);
        Some(now.duration_since(placed_at).unwrap_or(Duration::ZERO))
    }

    /// Record a placement made at `at`.
    ///
    /// # Errors
    ///
    /// I/O failures writing the stamp.
    pub fn record(&self, at: SystemTime) -> std::io::Result<()> {
        let millis = at.duration_since(UNIX_EPOCH).map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let text = serde_json::to_string(&Stamp { placed_at_ms: millis }).map_err(std::io::Error::other)?;
        fs::write(&self.path, text)
    }
}

#[cfg(test)]
#[path = "cooldown_test.rs"]
mod tests;
