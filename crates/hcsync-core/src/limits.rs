//! Sync limits

use crate::error::{CoreError, Result};

/// Maximum number of rows in one store batch operation
pub const BATCH_OPERATION_MAX_LIMIT: usize = 100;
/// Maximum number of cloud ids a targeted sync may name
pub const CLOUD_RESOURCE_SYNC_MAX_LIMIT: usize = 100;
/// Per-call id cap for load balancer listener describes
pub const LB_DESCRIBE_MAX: usize = 20;
pub const SYNC_CONCURRENCY_DEFAULT_MAX_LIMIT: usize = 10;
pub const LISTENER_SYNC_CONCURRENCY: usize = 5;
/// Store page size, also the largest page the store serves
pub const DEFAULT_PAGE_LIMIT: usize = 500;

/// Business id given to rows that are not assigned to a business yet
pub const UNASSIGNED_BIZ_ID: i64 = -1;

/// Limits applied by every orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncLimits {
    pub batch_operation_max_limit: usize,
    pub cloud_resource_sync_max_limit: usize,
    pub lb_describe_max: usize,
    pub sync_concurrency: usize,
    pub listener_sync_concurrency: usize,
    pub default_page_limit: usize,
}

impl Default for SyncLimits {
    fn default() -> Self {
        Self {
            batch_operation_max_limit: BATCH_OPERATION_MAX_LIMIT,
            cloud_resource_sync_max_limit: CLOUD_RESOURCE_SYNC_MAX_LIMIT,
            lb_describe_max: LB_DESCRIBE_MAX,
            sync_concurrency: SYNC_CONCURRENCY_DEFAULT_MAX_LIMIT,
            listener_sync_concurrency: LISTENER_SYNC_CONCURRENCY,
            default_page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl SyncLimits {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("batch_operation_max_limit", self.batch_operation_max_limit),
            (
                "cloud_resource_sync_max_limit",
                self.cloud_resource_sync_max_limit,
            ),
            ("lb_describe_max", self.lb_describe_max),
            ("sync_concurrency", self.sync_concurrency),
            ("listener_sync_concurrency", self.listener_sync_concurrency),
            ("default_page_limit", self.default_page_limit),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(CoreError::InvalidLimit {
                    name,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if self.batch_operation_max_limit > BATCH_OPERATION_MAX_LIMIT {
            return Err(CoreError::InvalidLimit {
                name: "batch_operation_max_limit",
                reason: format!("must not exceed {}", BATCH_OPERATION_MAX_LIMIT),
            });
        }
        if self.default_page_limit > DEFAULT_PAGE_LIMIT {
            return Err(CoreError::InvalidLimit {
                name: "default_page_limit",
                reason: format!("must not exceed {}", DEFAULT_PAGE_LIMIT),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits_are_valid() {
        assert!(SyncLimits::default().validate().is_ok());
    }

    #[test]
    fn test_zero_limit_rejected() {
        let limits = SyncLimits {
            sync_concurrency: 0,
            ..Default::default()
        };
        let err = limits.validate().unwrap_err();
        assert!(err.to_string().contains("sync_concurrency"));
    }

    #[test]
    fn test_batch_limit_above_store_cap_rejected() {
        let limits = SyncLimits {
            batch_operation_max_limit: 101,
            ..Default::default()
        };
        assert!(limits.validate().is_err());
    }
}
