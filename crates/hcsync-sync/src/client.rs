//! Sync client

use crate::error::{Result, SyncError};
use crate::params::SyncBaseParams;
use hcsync_core::{SyncLimits, Vendor};
use hcsync_gateway::{CloudGateway, StoreGateway};
use std::sync::Arc;

/// Entry point for every sync of one vendor account. Gateways are injected
/// once and shared by all orchestrators.
#[derive(Clone)]
pub struct SyncClient {
    pub vendor: Vendor,
    pub account_id: String,
    pub cloud: Arc<dyn CloudGateway>,
    pub store: Arc<dyn StoreGateway>,
    pub limits: SyncLimits,
}

impl SyncClient {
    pub fn new(
        account_id: impl Into<String>,
        cloud: Arc<dyn CloudGateway>,
        store: Arc<dyn StoreGateway>,
        limits: SyncLimits,
    ) -> Self {
        Self {
            vendor: cloud.vendor(),
            account_id: account_id.into(),
            cloud,
            store,
            limits,
        }
    }

    pub fn cloud(&self) -> &dyn CloudGateway {
        self.cloud.as_ref()
    }

    pub fn store(&self) -> &dyn StoreGateway {
        self.store.as_ref()
    }

    /// Validate `params` against this client's account and limits
    pub(crate) fn check_params(&self, params: &SyncBaseParams) -> Result<()> {
        params.validate(&self.limits)?;
        if params.account_id != self.account_id {
            return Err(SyncError::InvalidInput(format!(
                "account {} is not served by this client ({})",
                params.account_id, self.account_id
            )));
        }
        Ok(())
    }

    /// Reject a vendor extension that does not belong to this client's vendor
    pub(crate) fn check_extension(
        &self,
        kind: hcsync_core::ResourceKind,
        cloud_id: &str,
        extension_vendor: Option<Vendor>,
    ) -> Result<()> {
        match extension_vendor {
            Some(vendor) if vendor != self.vendor => Err(SyncError::InvalidInput(format!(
                "{kind} {cloud_id} carries a {vendor} extension, expected {}",
                self.vendor
            ))),
            _ => Ok(()),
        }
    }
}
