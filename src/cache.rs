//! On-disk inventory cache with a time-to-live.
//!
//! The cache never fails a build: a miss of any kind means "ask the
//! directory", and a failed write is only worth a warning.
use crate::inventory::Inventory;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;

/// File name used under the user cache directory.
pub const CACHE_FILE_NAME: &str = "lia.json";

#[derive(Debug, Error)]
pub enum CacheMiss {
    #[error("no cached inventory at {0}")]
    Missing(PathBuf),
    #[error("cached inventory at {0} expired")]
    Expired(PathBuf),
    #[error("cached inventory at {path} unreadable: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

#[derive(Clone, Debug)]
pub struct InventoryCache {
    path: PathBuf,
    ttl: Duration,
}

impl InventoryCache {
    pub fn new(path: PathBuf, ttl: Duration) -> Self {
        Self { path, ttl }
    }

    /// `$XDG_CACHE_HOME/lia.json`, or `~/.cache/lia.json`.
    pub fn at_default_location(ttl: Duration) -> Option<Self> {
        dirs::cache_dir().map(|dir| Self::new(dir.join(CACHE_FILE_NAME), ttl))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Inventory, CacheMiss> {
        tracing::info!("Loading cached data from {}", self.path.display());
        let metadata =
            fs::metadata(&self.path).map_err(|_| CacheMiss::Missing(self.path.clone()))?;
        let modified = metadata
            .modified()
            .map_err(|_| CacheMiss::Missing(self.path.clone()))?;
        // mtime in the future counts as fresh
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default();
        if age >= self.ttl {
            return Err(CacheMiss::Expired(self.path.clone()));
        }

        let corrupt = |reason: String| CacheMiss::Corrupt {
            path: self.path.clone(),
            reason,
        };
        let bytes = fs::read(&self.path).map_err(|err| corrupt(err.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|err| corrupt(err.to_string()))
    }

    pub fn store(&self, inventory: &Inventory) -> Result<()> {
        tracing::info!("Caching data to {}", self.path.display());
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create cache dir {}", parent.display()))?;
        }
        let text = serde_json::to_string(inventory).context("serialize inventory")?;
        fs::write(&self.path, text)
            .with_context(|| format!("write cache {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{CacheMiss, InventoryCache};
    use crate::inventory::{GroupData, Inventory};
    use std::time::Duration;

    fn inventory() -> Inventory {
        let mut inventory = Inventory::default();
        inventory.groups.insert(
            "web".to_string(),
            GroupData {
                hosts: vec!["h1".to_string()],
                ..GroupData::default()
            },
        );
        inventory
    }

    #[test]
    fn stored_inventory_loads_back() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let cache = InventoryCache::new(
            dir.path().join("nested/lia.json"),
            Duration::from_secs(60),
        );
        cache.store(&inventory()).expect("store cache");
        assert_eq!(cache.load().expect("fresh cache"), inventory());
    }

    #[test]
    fn missing_file_is_a_miss() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let cache = InventoryCache::new(dir.path().join("lia.json"), Duration::from_secs(60));
        assert!(matches!(cache.load(), Err(CacheMiss::Missing(_))));
    }

    #[test]
    fn zero_ttl_always_expires() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let cache = InventoryCache::new(dir.path().join("lia.json"), Duration::ZERO);
        cache.store(&inventory()).expect("store cache");
        assert!(matches!(cache.load(), Err(CacheMiss::Expired(_))));
    }

    #[test]
    fn garbage_is_a_miss() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let cache = InventoryCache::new(dir.path().join("lia.json"), Duration::from_secs(60));
        std::fs::write(cache.path(), "not json").expect("write garbage");
        assert!(matches!(cache.load(), Err(CacheMiss::Corrupt { .. })));
    }
}
