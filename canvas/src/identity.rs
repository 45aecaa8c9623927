//! Local identity profile.
//!
//! An identity is created once per client profile and kept in a small JSON
//! file. Nothing verifies it: peers accept whatever owner name a placement
//! carries.

#[cfg(test)]
#[path = "identity_test.rs"]
mod identity_test;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::consts::{DEFAULT_PALETTE, DISPLAY_NAME_MAX, DISPLAY_NAME_MIN};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub display_name: String,
    pub color: String,
}

impl Identity {
    /// Fresh identity with a random palette color and a placeholder name.
    #[must_use]
    pub fn generate() -> Self {
        let id = Uuid::new_v4();
        let simple = id.simple().to_string();
        // Skip index 0, the background color.
        let color = DEFAULT_PALETTE[rand::rng().random_range(1..DEFAULT_PALETTE.len())];
        Self { id, display_name: format!("anon-{}", &simple[..4]), color: color.to_owned() }
    }

    /// Presence key for the channel.
    #[must_use]
    pub fn presence_key(&self) -> String {
        self.id.to_string()
    }

    /// Presence metadata shared with peers.
    #[must_use]
    pub fn presence_meta(&self) -> Value {
        json!({ "name": self.display_name, "color": self.color })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("display name must be {min}..={max} characters, got {len}")]
    InvalidName { len: usize, min: usize, max: usize },
    #[error("identity file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("identity encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Trim and length-check a display name.
///
/// # Errors
///
/// [`IdentityError::InvalidName`] outside `2..=40` characters.
pub fn validate_display_name(name: &str) -> Result<String, IdentityError> {
    let trimmed = name.trim();
    let len = trimmed.chars().count();
    if !(DISPLAY_NAME_MIN..=DISPLAY_NAME_MAX).contains(&len) {
        return Err(IdentityError::InvalidName { len, min: DISPLAY_NAME_MIN, max: DISPLAY_NAME_MAX });
    }
    Ok(trimmed.to_owned())
}

/// Identity file for one profile scope.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    path: PathBuf,
}

impl IdentityStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `{dir}/identity-{scope}.json`. Scopes keep profiles apart.
    #[must_use]
    pub fn scoped(dir: &Path, scope: &str) -> Self {
        Self::new(dir.join(format!("identity-{scope}.json")))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored identity, creating and saving one if the file is
    /// missing or unreadable.
    ///
    /// # Errors
    ///
    /// Only when a new identity cannot be written.
    pub fn load_or_create(&self) -> Result<Identity, IdentityError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => match serde_json::from_str::<Identity>(&text) {
                Ok(identity) => return Ok(identity),
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "identity file unreadable, replacing");
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let identity = Identity::generate();
        self.save(&identity)?;
        tracing::info!(path = %self.path.display(), id = %identity.id, "created identity");
        Ok(identity)
    }

    /// Validate and persist a new display name.
    ///
    /// # Errors
    ///
    /// [`IdentityError::InvalidName`] leaves the stored identity untouched.
    pub fn set_display_name(&self, name: &str) -> Result<Identity, IdentityError> {
        let name = validate_display_name(name)?;
        let mut identity = self.load_or_create()?;
        identity.display_name = name;
        self.save(&identity)?;
        Ok(identity)
    }

    /// Write the identity file, creating parent directories.
    ///
    /// # Errors
    ///
    /// I/O and encoding failures.
    pub fn save(&self, identity: &Identity) -> Result<(), IdentityError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let text = serde_json::to_string_pretty(identity)?;
        fs::write(&self.path, text)?;
        Ok(())
    }
}
