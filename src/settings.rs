//! Settings Provider: sink routing table, always-cc list and sink toggles.
//!
//! The pipeline never writes settings. Every run takes a fresh
//! [`SettingsSnapshot`] so an administrator flipping a toggle is picked up by
//! the next upload without a restart.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed settings file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Settings lock poisoned")]
    LockPoisoned,
}

/// Category label → notification address, plus addresses copied on every message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingTable {
    #[serde(default)]
    pub recipients: BTreeMap<String, String>,
    #[serde(default)]
    pub always_cc: Vec<String>,
}

impl RoutingTable {
    /// Recipient for a category. Unknown categories have no fallback.
    pub fn recipient_for(&self, category: &str) -> Option<&str> {
        self.recipients.get(category).map(String::as_str)
    }
}

/// Sink toggles read once at the start of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleState {
    #[serde(default = "enabled")]
    pub notifications_enabled: bool,
    #[serde(default = "enabled")]
    pub automation_enabled: bool,
}

fn enabled() -> bool {
    true
}

impl Default for ToggleState {
    fn default() -> Self {
        Self {
            notifications_enabled: true,
            automation_enabled: true,
        }
    }
}

/// Everything the pipeline needs from persisted configuration for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    #[serde(default)]
    pub routing: RoutingTable,
    #[serde(default)]
    pub toggles: ToggleState,
}

/// Read-only access to persisted settings.
pub trait SettingsProvider: Send + Sync {
    fn load_settings(&self) -> Result<SettingsSnapshot, SettingsError>;
}

/// Settings backed by a JSON file, re-read on every call.
///
/// A missing file is not an error: it yields an empty routing table with both
/// sinks enabled, which makes every category unroutable until configured.
pub struct JsonFileSettings {
    path: PathBuf,
}

impl JsonFileSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsProvider for JsonFileSettings {
    fn load_settings(&self) -> Result<SettingsSnapshot, SettingsError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No settings file, using defaults");
                return Ok(SettingsSnapshot::default());
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_str(&raw).map_err(|source| SettingsError::Malformed {
            path: self.path.clone(),
            source,
        })
    }
}

/// In-memory settings, mutable from the outside (tests, embedding hosts).
#[derive(Default)]
pub struct InMemorySettings {
    inner: RwLock<SettingsSnapshot>,
}

impl InMemorySettings {
    pub fn new(snapshot: SettingsSnapshot) -> Self {
        Self {
            inner: RwLock::new(snapshot),
        }
    }

    pub fn set_toggles(&self, toggles: ToggleState) -> Result<(), SettingsError> {
        let mut guard = self.inner.write().map_err(|_| SettingsError::LockPoisoned)?;
        guard.toggles = toggles;
        Ok(())
    }
}

impl SettingsProvider for InMemorySettings {
    fn load_settings(&self) -> Result<SettingsSnapshot, SettingsError> {
        self.inner
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| SettingsError::LockPoisoned)
    }
}
