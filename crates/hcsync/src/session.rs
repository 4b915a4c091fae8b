use crate::{GlobalArgs, ScopeArgs};
use anyhow::{Context, bail};
use colored::Colorize;
use hcsync_core::Kit;
use hcsync_gateway::{CloudGateway, FixtureCloud, MemoryStore, StateLock, StateManager};
use hcsync_sync::SyncClient;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// One CLI invocation: the fixture cloud, the snapshot-backed store and the
/// store lock held until [`Session::close`].
pub struct Session {
    pub client: SyncClient,
    pub kit: Kit,
    store: Arc<MemoryStore>,
    state: StateManager,
    lock: StateLock,
    timeout: Duration,
}

impl Session {
    pub async fn open(global: &GlobalArgs, scope: &ScopeArgs) -> anyhow::Result<Self> {
        let Some(cloud_path) = global.cloud.as_deref() else {
            bail!("--cloud <FILE> is required (or set HCSYNC_CLOUD)");
        };

        let (config, origin) = hcsync_config::load_config().context("Failed to load config")?;
        if let Some(path) = &origin {
            tracing::debug!(path = %path.display(), "Using config file");
        }

        let cloud = FixtureCloud::from_file(cloud_path)
            .await
            .with_context(|| format!("Failed to read cloud inventory {}", cloud_path.display()))?;
        let vendor = cloud.vendor();
        if let Some(expected) = scope.vendor.filter(|v| *v != vendor) {
            bail!(
                "Cloud inventory {} belongs to {}, not {}",
                cloud_path.display(),
                vendor,
                expected
            );
        }

        if scope.account != cloud.account_id() {
            bail!(
                "Cloud inventory {} belongs to account {}, not {}",
                cloud_path.display(),
                cloud.account_id(),
                scope.account
            );
        }

        let state = StateManager::new(&global.state_dir);
        let lock = state.acquire_lock().await?;
        let store = Arc::new(state.load_store().await?);

        let client = SyncClient::new(
            cloud.account_id().to_string(),
            Arc::new(cloud),
            store.clone(),
            config.limits(),
        );
        let kit = Kit::new();
        tracing::info!(rid = %kit.rid, vendor = %vendor, account_id = %client.account_id, "Session opened");

        Ok(Self {
            client,
            kit,
            store,
            state,
            lock,
            timeout: config.sync_timeout(),
        })
    }

    /// Run `fut` under the configured sync timeout
    pub async fn bounded<T>(
        &self,
        fut: impl Future<Output = hcsync_sync::Result<T>>,
    ) -> anyhow::Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => bail!("Sync timed out after {}s", self.timeout.as_secs()),
        }
    }

    /// Persist the store, whatever the sync outcome, and release the lock
    pub async fn close(self) -> anyhow::Result<()> {
        self.state
            .save_store(&self.store)
            .await
            .context("Failed to save store snapshot")?;
        println!(
            "{} {}",
            "Store saved to".dimmed(),
            self.state.state_path().display().to_string().cyan()
        );
        self.lock.release().await?;
        Ok(())
    }
}
