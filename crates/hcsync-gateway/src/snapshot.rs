//! On-disk snapshots of the in-memory store
//!
//! Keeps `.hcsync/store.json` (plus a one-deep backup) so repeated CLI runs
//! reconcile against the same system of record. Writers take an advisory
//! `lock.json` first.

use crate::error::{GatewayError, Result};
use crate::memory::{MemoryStore, StoreTables};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

const SNAPSHOT_VERSION: u32 = 1;
const STATE_DIR: &str = ".hcsync";
const STATE_FILE: &str = "store.json";
const STATE_BACKUP: &str = "store.json.backup";
const LOCK_FILE: &str = "lock.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u32,

    pub updated_at: DateTime<Utc>,

    /// Last id handed out by the store
    pub next_id: u64,

    pub tables: StoreTables,
}

impl Default for StoreSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            updated_at: Utc::now(),
            next_id: 0,
            tables: StoreTables::default(),
        }
    }
}

impl StoreSnapshot {
    pub async fn capture(store: &MemoryStore) -> Self {
        let (tables, next_id) = store.export().await;
        Self {
            version: SNAPSHOT_VERSION,
            updated_at: Utc::now(),
            next_id,
            tables,
        }
    }

    pub async fn into_store(self) -> MemoryStore {
        MemoryStore::import(self.tables, self.next_id).await
    }
}

pub struct StateManager {
    root: PathBuf,
}

impl StateManager {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_dir().join(STATE_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir().join(STATE_BACKUP)
    }

    fn lock_path(&self) -> PathBuf {
        self.state_dir().join(LOCK_FILE)
    }

    async fn ensure_state_dir(&self) -> Result<()> {
        let dir = self.state_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }
        Ok(())
    }

    /// Load the snapshot, or an empty one if none was saved yet
    pub async fn load(&self) -> Result<StoreSnapshot> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("Snapshot not found, starting from an empty store");
            return Ok(StoreSnapshot::default());
        }

        let content = fs::read_to_string(&path).await?;
        let snapshot: StoreSnapshot = serde_json::from_str(&content)?;

        if snapshot.version > SNAPSHOT_VERSION {
            return Err(GatewayError::State(format!(
                "Snapshot version {} is newer than supported version {}",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }

        tracing::debug!(count = snapshot.tables.row_count(), "Loaded snapshot");
        Ok(snapshot)
    }

    pub async fn save(&self, snapshot: &StoreSnapshot) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let backup = self.backup_path();

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
            tracing::debug!("Created snapshot backup");
        }

        let content = serde_json::to_string_pretty(snapshot)?;
        fs::write(&path, content).await?;

        tracing::debug!(count = snapshot.tables.row_count(), "Saved snapshot");
        Ok(())
    }

    pub async fn load_store(&self) -> Result<MemoryStore> {
        Ok(self.load().await?.into_store().await)
    }

    pub async fn save_store(&self, store: &MemoryStore) -> Result<()> {
        self.save(&StoreSnapshot::capture(store).await).await
    }

    /// Take the advisory lock. A lock older than one hour is considered stale
    /// and replaced.
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        self.ensure_state_dir().await?;

        let lock_path = self.lock_path();

        if lock_path.exists() {
            let content = fs::read_to_string(&lock_path).await?;
            let lock_info: LockInfo = serde_json::from_str(&content)?;

            let age = Utc::now().signed_duration_since(lock_info.acquired_at);
            if age.num_hours() < 1 {
                return Err(GatewayError::Lock(format!(
                    "Store is locked by {} since {}",
                    lock_info.holder, lock_info.acquired_at
                )));
            }

            tracing::warn!("Removing stale lock from {}", lock_info.holder);
        }

        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            acquired_at: Utc::now(),
        };

        let content = serde_json::to_string_pretty(&lock_info)?;
        fs::write(&lock_path, content).await?;

        tracing::debug!("Acquired store lock");
        Ok(StateLock {
            lock_path,
            released: false,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    acquired_at: DateTime<Utc>,
}

/// Releases the store lock when dropped
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released store lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Expression;
    use crate::store::{StoreGateway, list_all};
    use hcsync_core::Vendor;
    use hcsync_core::model::Eip;
    use tempfile::tempdir;

    fn eip(cloud_id: &str, ip: &str) -> Eip {
        Eip {
            id: String::new(),
            vendor: Vendor::Aws,
            account_id: "acc".into(),
            cloud_id: cloud_id.into(),
            name: None,
            region: "us-east-1".into(),
            public_ip: ip.into(),
            private_ip: None,
            status: "in-use".into(),
            bandwidth: None,
            internet_charge_type: None,
            bk_biz_id: -1,
        }
    }

    #[tokio::test]
    async fn test_snapshot_save_load() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let store = MemoryStore::new();
        store
            .eips()
            .batch_create(vec![eip("eipalloc-1", "1.1.1.1")])
            .await
            .unwrap();
        manager.save_store(&store).await.unwrap();

        let loaded = manager.load_store().await.unwrap();
        let rows = list_all(loaded.eips(), &Expression::new(), 500).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].public_ip, "1.1.1.1");
    }

    #[tokio::test]
    async fn test_empty_snapshot() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let snapshot = manager.load().await.unwrap();
        assert_eq!(snapshot.tables.row_count(), 0);
    }

    #[tokio::test]
    async fn test_second_save_rotates_backup() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        manager.save(&StoreSnapshot::default()).await.unwrap();
        manager.save(&StoreSnapshot::default()).await.unwrap();

        assert!(temp_dir.path().join(".hcsync/store.json.backup").exists());
    }

    #[tokio::test]
    async fn test_newer_version_rejected() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let snapshot = StoreSnapshot {
            version: SNAPSHOT_VERSION + 1,
            ..Default::default()
        };
        manager.save(&snapshot).await.unwrap();

        let err = manager.load().await.unwrap_err();
        assert!(matches!(err, GatewayError::State(_)));
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_until_released() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let lock = manager.acquire_lock().await.unwrap();
        assert!(matches!(
            manager.acquire_lock().await,
            Err(GatewayError::Lock(_))
        ));

        lock.release().await.unwrap();
        let again = manager.acquire_lock().await.unwrap();
        drop(again);
        assert!(!temp_dir.path().join(".hcsync/lock.json").exists());
    }
}
