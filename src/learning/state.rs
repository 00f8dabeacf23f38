//! State persistence - the engine's view of the external key-value store
//!
//! The backing store is an external collaborator; the engine only needs an
//! atomic get/set of opaque JSON values. Two small implementations ship with
//! the crate: JSON files in a directory (used by the CLI) and an in-memory map.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

use super::pattern::Pattern;
use super::proposal::Proposal;
use crate::classifier::AutonomousAction;

pub const PATTERNS_KEY: &str = "patterns";
pub const PROPOSALS_KEY: &str = "proposals";
pub const OUTCOME_KEY: &str = "outcome";

/// Atomic get/set of opaque state records
#[cfg_attr(test, mockall::automock)]
pub trait StateStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>>;
    fn save(&self, key: &str, value: &serde_json::Value) -> Result<()>;
}

/// Everything the engine persists between restarts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub patterns: Vec<Pattern>,
    pub proposals: Vec<Proposal>,
    /// Autonomous action still waiting for the operator's next message
    #[serde(default)]
    pub pending_outcome: Option<AutonomousAction>,
}

impl EngineSnapshot {
    pub fn load_from(store: &dyn StateStore) -> Result<Self> {
        let patterns = match store.load(PATTERNS_KEY)? {
            Some(value) => serde_json::from_value(value).context("Failed to decode stored patterns")?,
            None => Vec::new(),
        };
        let proposals = match store.load(PROPOSALS_KEY)? {
            Some(value) => serde_json::from_value(value).context("Failed to decode stored proposals")?,
            None => Vec::new(),
        };
        let pending_outcome = match store.load(OUTCOME_KEY)? {
            Some(value) => serde_json::from_value(value).context("Failed to decode pending outcome")?,
            None => None,
        };
        Ok(Self { patterns, proposals, pending_outcome })
    }

    pub fn save_to(&self, store: &dyn StateStore) -> Result<()> {
        store.save(PATTERNS_KEY, &serde_json::to_value(&self.patterns)?)?;
        store.save(PROPOSALS_KEY, &serde_json::to_value(&self.proposals)?)?;
        store.save(OUTCOME_KEY, &serde_json::to_value(&self.pending_outcome)?)?;
        debug!("Saved {} patterns and {} proposals", self.patterns.len(), self.proposals.len());
        Ok(())
    }
}

/// One JSON file per key under a base directory
pub struct JsonFileStore {
    base_dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store at the default data location
    pub fn new() -> Result<Self> {
        Self::with_dir(crate::config::data_dir()?.join("state"))
    }

    /// Create with a custom base directory
    pub fn with_dir(base_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&base_dir)
            .with_context(|| format!("Failed to create state directory {}", base_dir.display()))?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            anyhow::bail!("Invalid state key: {:?}", key);
        }
        Ok(self.base_dir.join(format!("{}.json", key)))
    }
}

impl StateStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(value))
    }

    fn save(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let path = self.path_for(key)?;
        // Write-then-rename keeps readers from seeing a half-written file
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(value)?;
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }
}

/// Process-local store, useful for hosts that persist elsewhere and for tests
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let values = self.values.lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        Ok(values.get(key).cloned())
    }

    fn save(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let mut values = self.values.lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        values.insert(key.to_string(), value.clone());
        Ok(())
    }
}
