//! hcsync configuration
//!
//! Limits and timeouts for sync invocations, read from a YAML file. A missing
//! file is not an error; every field has a default.

pub mod error;

pub use error::*;

use hcsync_core::SyncLimits;
use hcsync_core::limits::{
    BATCH_OPERATION_MAX_LIMIT, CLOUD_RESOURCE_SYNC_MAX_LIMIT, DEFAULT_PAGE_LIMIT, LB_DESCRIBE_MAX,
    LISTENER_SYNC_CONCURRENCY, SYNC_CONCURRENCY_DEFAULT_MAX_LIMIT,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "HCSYNC_CONFIG_PATH";
const CONFIG_CANDIDATES: [&str; 2] = ["hcsync.local.yaml", "hcsync.yaml"];
const PROJECT_DIR: &str = ".hcsync";
const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub batch_operation_max_limit: usize,
    pub cloud_resource_sync_max_limit: usize,
    pub lb_describe_max: usize,
    pub sync_concurrency: usize,
    pub listener_sync_concurrency: usize,
    pub default_page_limit: usize,
    pub sync_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_operation_max_limit: BATCH_OPERATION_MAX_LIMIT,
            cloud_resource_sync_max_limit: CLOUD_RESOURCE_SYNC_MAX_LIMIT,
            lb_describe_max: LB_DESCRIBE_MAX,
            sync_concurrency: SYNC_CONCURRENCY_DEFAULT_MAX_LIMIT,
            listener_sync_concurrency: LISTENER_SYNC_CONCURRENCY,
            default_page_limit: DEFAULT_PAGE_LIMIT,
            sync_timeout_secs: DEFAULT_SYNC_TIMEOUT_SECS,
        }
    }
}

impl SyncConfig {
    pub fn from_yaml_str(content: &str, origin: &Path) -> Result<Self> {
        let config: SyncConfig =
            serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
                path: origin.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        // An empty file parses as YAML null
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Self::from_yaml_str(&content, path)
    }

    pub fn limits(&self) -> SyncLimits {
        SyncLimits {
            batch_operation_max_limit: self.batch_operation_max_limit,
            cloud_resource_sync_max_limit: self.cloud_resource_sync_max_limit,
            lb_describe_max: self.lb_describe_max,
            sync_concurrency: self.sync_concurrency,
            listener_sync_concurrency: self.listener_sync_concurrency,
            default_page_limit: self.default_page_limit,
        }
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        self.limits().validate()?;
        if self.sync_timeout_secs == 0 {
            return Err(hcsync_core::CoreError::InvalidLimit {
                name: "sync_timeout_secs",
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// hcsync's global config directory, created on first use
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("hcsync");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Locate the config file.
///
/// Search order:
/// 1. `HCSYNC_CONFIG_PATH`
/// 2. current directory: hcsync.local.yaml, hcsync.yaml
/// 3. `./.hcsync/`, same names
/// 4. `<config_dir>/hcsync/hcsync.yaml`
pub fn find_config_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        tracing::warn!(path = %path.display(), "{} points to a missing file", CONFIG_PATH_ENV);
    }

    let current_dir = std::env::current_dir()?;

    for filename in &CONFIG_CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    let project_dir = current_dir.join(PROJECT_DIR);
    if project_dir.is_dir() {
        for filename in &CONFIG_CANDIDATES {
            let path = project_dir.join(filename);
            if path.exists() {
                return Ok(Some(path));
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("hcsync").join("hcsync.yaml");
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}

/// Load the effective config and the file it came from, if any
pub fn load_config() -> Result<(SyncConfig, Option<PathBuf>)> {
    match find_config_file()? {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Loading config");
            let config = SyncConfig::from_file(&path)?;
            Ok((config, Some(path)))
        }
        None => {
            tracing::debug!("No config file found, using defaults");
            Ok((SyncConfig::default(), None))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.batch_operation_max_limit, 100);
        assert_eq!(config.lb_describe_max, 20);
        assert_eq!(config.listener_sync_concurrency, 5);
        assert_eq!(config.sync_timeout(), Duration::from_secs(600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config =
            SyncConfig::from_yaml_str("sync_concurrency: 4\n", Path::new("inline")).unwrap();
        assert_eq!(config.sync_concurrency, 4);
        assert_eq!(config.default_page_limit, 500);
    }

    #[test]
    fn test_zero_limit_rejected() {
        let err = SyncConfig::from_yaml_str("lb_describe_max: 0\n", Path::new("inline"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = SyncConfig::from_yaml_str("sync_timeout_secs: 0\n", Path::new("inline"))
            .unwrap_err();
        assert!(err.to_string().contains("sync_timeout_secs"));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = SyncConfig::from_yaml_str("sync_concurrency: [", Path::new("broken.yaml"))
            .unwrap_err();
        assert!(err.to_string().contains("broken.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_config_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("hcsync.yaml"), "sync_concurrency: 3\n").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = temp_env::with_var_unset(CONFIG_PATH_ENV, find_config_file);
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().unwrap().ends_with("hcsync.yaml"));
    }

    #[test]
    #[serial]
    fn test_local_file_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("hcsync.yaml"), "").unwrap();
        fs::write(temp_dir.path().join("hcsync.local.yaml"), "").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = temp_env::with_var_unset(CONFIG_PATH_ENV, find_config_file);
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().unwrap().ends_with("hcsync.local.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_config_in_project_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        let project_dir = temp_dir.path().join(".hcsync");
        fs::create_dir(&project_dir).unwrap();
        fs::write(project_dir.join("hcsync.yaml"), "").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = temp_env::with_var_unset(CONFIG_PATH_ENV, find_config_file);
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().unwrap().ends_with(".hcsync/hcsync.yaml"));
    }

    #[test]
    #[serial]
    fn test_env_var_takes_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(&config_path, "sync_concurrency: 7\n").unwrap();

        let (config, origin) =
            temp_env::with_var(CONFIG_PATH_ENV, Some(config_path.as_os_str()), load_config)
                .unwrap();

        assert_eq!(origin, Some(config_path));
        assert_eq!(config.sync_concurrency, 7);
    }

    #[test]
    #[serial]
    fn test_empty_file_gives_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("empty.yaml");
        fs::write(&config_path, "\n").unwrap();

        let config = SyncConfig::from_file(&config_path).unwrap();
        assert_eq!(config, SyncConfig::default());
    }
}
