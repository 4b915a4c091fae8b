//! Instances together with the resources they are attached to

use super::manager::CvmRelManager;
use crate::client::SyncClient;
use crate::error::{Result, SyncError};
use crate::orchestrator::into_chunks;
use crate::params::{SyncBaseParams, SyncResult};
use crate::resources::SyncDiskOption;
use crate::resources::cvm::CvmSyncer;
use hcsync_core::model::CvmRelKind;
use hcsync_core::{Kit, ResourceKind, Vendor};

/// Relation kinds `vendor` can report for instances
pub fn supported_rel_kinds(vendor: Vendor) -> &'static [CvmRelKind] {
    match vendor {
        Vendor::TCloud | Vendor::Aws | Vendor::HuaWei | Vendor::Azure => &CvmRelKind::ALL,
        Vendor::Gcp => &[CvmRelKind::Disk, CvmRelKind::Eip],
    }
}

/// Reject relation kinds `vendor` cannot sync
pub fn validate_sync_rel(vendor: Vendor, kinds: &[CvmRelKind]) -> Result<()> {
    let supported = supported_rel_kinds(vendor);
    match kinds.iter().find(|k| !supported.contains(k)) {
        Some(kind) => Err(SyncError::UnsupportedRelation {
            vendor,
            kind: kind.resource_kind(),
        }),
        None => Ok(()),
    }
}

/// Which relations to sync alongside the instances
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CvmRelOption {
    pub kinds: Vec<CvmRelKind>,
}

impl CvmRelOption {
    /// Every relation `vendor` supports
    pub fn for_vendor(vendor: Vendor) -> Self {
        Self {
            kinds: supported_rel_kinds(vendor).to_vec(),
        }
    }
}

impl SyncClient {
    /// Sync instances of the scope after the resources they depend on, then
    /// their relation rows
    pub async fn sync_cvm_with_rel_res(
        &self,
        kit: &Kit,
        params: &SyncBaseParams,
        option: &CvmRelOption,
    ) -> Result<SyncResult> {
        self.check_params(params)?;
        validate_sync_rel(self.vendor, &option.kinds)?;

        let cloud = CvmSyncer { client: self, params }
            .list(&params.cloud_ids)
            .await?;
        if cloud.is_empty() {
            return self.sync_cvm(kit, params).await;
        }

        let manager = CvmRelManager::build(self, &params.region, cloud).await?;
        tracing::info!(
            rid = %kit.rid,
            vendor = %self.vendor,
            account_id = %self.account_id,
            region = %params.region,
            count = manager.cvm_cloud_ids().len(),
            "Syncing cvm related resources"
        );

        let disk_option = SyncDiskOption {
            boot_disk_ids: manager.boot_disk_ids(),
        };
        self.sync_related(kit, params, ResourceKind::Vpc, manager.vpc_ids(), &disk_option)
            .await?;
        for subnet_ids in manager.subnet_ids_by_vpc().into_values() {
            self.sync_related(kit, params, ResourceKind::Subnet, subnet_ids, &disk_option)
                .await?;
        }
        for kind in [CvmRelKind::SecurityGroup, CvmRelKind::Disk, CvmRelKind::Eip] {
            if option.kinds.contains(&kind) {
                let ids = manager.related_ids(kind);
                self.sync_related(kit, params, kind.resource_kind(), ids, &disk_option)
                    .await?;
            }
        }

        let result = self.sync_cvm(kit, params).await?;
        for kind in &option.kinds {
            manager.sync_rel(kit, self, *kind).await?;
        }
        Ok(result)
    }

    /// Sync exactly `cloud_ids` of one related kind, in chunks the scope
    /// validation accepts
    async fn sync_related(
        &self,
        kit: &Kit,
        params: &SyncBaseParams,
        kind: ResourceKind,
        cloud_ids: Vec<String>,
        disk_option: &SyncDiskOption,
    ) -> Result<()> {
        for chunk in into_chunks(cloud_ids, self.limits.cloud_resource_sync_max_limit) {
            let scoped = params.narrowed(chunk);
            match kind {
                ResourceKind::Vpc => self.sync_vpc(kit, &scoped).await?,
                ResourceKind::Subnet => self.sync_subnet(kit, &scoped).await?,
                ResourceKind::SecurityGroup => self.sync_security_group(kit, &scoped).await?,
                ResourceKind::Disk => self.sync_disk(kit, &scoped, disk_option).await?,
                ResourceKind::Eip => self.sync_eip(kit, &scoped).await?,
                other => {
                    return Err(SyncError::InvalidInput(format!(
                        "{other} is not a cvm related resource"
                    )));
                }
            };
        }
        Ok(())
    }
}
