//! Bundled fallback snapshot
//!
//! A static, versioned snapshot of registry entities shipped with the
//! binary, keyed identically to the upstream. Served only when both the
//! cache and the upstream miss; never mutated at runtime.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::error::{RegistryError, Result};

const BUNDLED_SNAPSHOT: &str = include_str!("../../data/fallback_snapshot.json");

#[derive(Debug, Clone, Deserialize)]
pub struct FallbackSnapshot {
    version: String,
    generated_at: String,
    entries: BTreeMap<String, Value>,
}

impl FallbackSnapshot {
    /// Load the snapshot bundled into the binary
    pub fn bundled() -> Result<Self> {
        let snapshot = Self::parse(BUNDLED_SNAPSHOT, "bundled")?;
        info!(
            version = %snapshot.version,
            entries = snapshot.entries.len(),
            "📦 Loaded bundled fallback snapshot"
        );
        Ok(snapshot)
    }

    /// Load a snapshot from a filesystem override
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RegistryError::FallbackError(format!("reading '{}': {e}", path.display()))
        })?;
        let snapshot = Self::parse(&contents, &path.display().to_string())?;
        info!(
            version = %snapshot.version,
            entries = snapshot.entries.len(),
            path = %path.display(),
            "📦 Loaded fallback snapshot override"
        );
        Ok(snapshot)
    }

    /// Build a snapshot from in-memory entries (test fixtures)
    pub fn from_entries(version: &str, entries: BTreeMap<String, Value>) -> Self {
        Self {
            version: version.to_string(),
            generated_at: String::new(),
            entries,
        }
    }

    fn parse(contents: &str, origin: &str) -> Result<Self> {
        let snapshot: FallbackSnapshot = serde_json::from_str(contents)
            .map_err(|e| RegistryError::FallbackError(format!("parsing {origin} snapshot: {e}")))?;
        if snapshot.version.is_empty() {
            return Err(RegistryError::FallbackError(format!(
                "{origin} snapshot has no version"
            )));
        }
        Ok(snapshot)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn generated_at(&self) -> &str {
        &self.generated_at
    }

    /// Keys in deterministic order; the first is the default canary
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn first_key(&self) -> Option<&str> {
        self.entries.keys().next().map(String::as_str)
    }
}
