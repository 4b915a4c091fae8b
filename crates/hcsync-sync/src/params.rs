//! Sync scope parameters

use crate::error::{Result, SyncError};
use hcsync_core::SyncLimits;

/// Scope of one sync invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncBaseParams {
    pub account_id: String,
    pub region: String,
    /// Restrict the sync to these resources; empty means the whole region
    pub cloud_ids: Vec<String>,
}

impl SyncBaseParams {
    pub fn new(account_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            region: region.into(),
            cloud_ids: Vec::new(),
        }
    }

    pub fn with_cloud_ids<I, S>(mut self, cloud_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cloud_ids = cloud_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self, limits: &SyncLimits) -> Result<()> {
        if self.account_id.is_empty() {
            return Err(SyncError::InvalidInput("account_id is required".to_string()));
        }
        if self.region.is_empty() {
            return Err(SyncError::InvalidInput("region is required".to_string()));
        }
        if self.cloud_ids.len() > limits.cloud_resource_sync_max_limit {
            return Err(SyncError::InvalidInput(format!(
                "cloud_ids should <= {}, got {}",
                limits.cloud_resource_sync_max_limit,
                self.cloud_ids.len()
            )));
        }
        if self.cloud_ids.iter().any(String::is_empty) {
            return Err(SyncError::InvalidInput("cloud_ids must not contain empty ids".to_string()));
        }
        Ok(())
    }

    /// Validation for entry points that only make sense for explicit ids
    pub fn validate_targeted(&self, limits: &SyncLimits) -> Result<()> {
        self.validate(limits)?;
        if self.cloud_ids.is_empty() {
            return Err(SyncError::InvalidInput("cloud_ids is required".to_string()));
        }
        Ok(())
    }

    pub fn scope(&self) -> String {
        format!("{}/{}", self.account_id, self.region)
    }

    /// Same account and region, narrowed to `cloud_ids`
    pub fn narrowed(&self, cloud_ids: Vec<String>) -> Self {
        Self {
            account_id: self.account_id.clone(),
            region: self.region.clone(),
            cloud_ids,
        }
    }
}

/// Outcome of a sync invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncResult {
    /// Local ids of rows created by the invocation
    pub created_ids: Vec<String>,
}

impl SyncResult {
    pub fn merge(&mut self, other: SyncResult) {
        self.created_ids.extend(other.created_ids);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_account_and_region() {
        let limits = SyncLimits::default();
        assert!(SyncBaseParams::new("", "ap-guangzhou").validate(&limits).is_err());
        assert!(SyncBaseParams::new("acc", "").validate(&limits).is_err());
        assert!(SyncBaseParams::new("acc", "ap-guangzhou").validate(&limits).is_ok());
    }

    #[test]
    fn test_validate_cloud_id_limit() {
        let limits = SyncLimits::default();
        let ids: Vec<String> = (0..101).map(|i| format!("vpc-{i}")).collect();
        let params = SyncBaseParams::new("acc", "ap-guangzhou").with_cloud_ids(ids);
        let err = params.validate(&limits).unwrap_err();
        assert!(matches!(err, SyncError::InvalidInput(_)));
    }

    #[test]
    fn test_validate_targeted_requires_ids() {
        let limits = SyncLimits::default();
        let params = SyncBaseParams::new("acc", "ap-guangzhou");
        assert!(params.validate_targeted(&limits).is_err());
        assert!(params.with_cloud_ids(["vpc-1"]).validate_targeted(&limits).is_ok());
    }
}
