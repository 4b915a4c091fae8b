//! Disk sync

use crate::client::SyncClient;
use crate::error::{Result, StoreOp, SyncError};
use crate::orchestrator::{
    ResourceSyncer, list_cloud, region_filter, remove_deleted_from_cloud, sync_resource,
    with_cloud_ids,
};
use crate::params::{SyncBaseParams, SyncResult};
use async_trait::async_trait;
use hcsync_core::limits::UNASSIGNED_BIZ_ID;
use hcsync_core::model::{CloudDisk, Disk};
use hcsync_core::{Kit, ResourceKind};
use hcsync_gateway::{Expression, Table};
use std::collections::HashSet;

/// Options of a disk sync
#[derive(Debug, Clone, Default)]
pub struct SyncDiskOption {
    /// Cloud ids of disks known to be instance system disks
    pub boot_disk_ids: HashSet<String>,
}

pub(crate) struct DiskSyncer<'a> {
    pub client: &'a SyncClient,
    pub params: &'a SyncBaseParams,
    pub option: &'a SyncDiskOption,
}

impl DiskSyncer<'_> {
    async fn list(&self, cloud_ids: &[String]) -> Result<Vec<CloudDisk>> {
        list_cloud(
            self.client,
            Self::KIND,
            &self.params.region,
            cloud_ids,
            |c, opt| Box::pin(async move { c.list_disks(&opt).await }),
        )
        .await
    }

    fn is_system_disk(&self, cloud_id: &str) -> bool {
        self.option.boot_disk_ids.contains(cloud_id)
    }

    fn build(&self, cloud: CloudDisk) -> Disk {
        Disk {
            id: String::new(),
            vendor: self.client.vendor,
            account_id: self.client.account_id.clone(),
            is_system_disk: self.is_system_disk(&cloud.cloud_id),
            cloud_id: cloud.cloud_id,
            name: cloud.name,
            region: self.params.region.clone(),
            zone: cloud.zone,
            disk_size_gb: cloud.disk_size_gb,
            disk_type: cloud.disk_type,
            status: cloud.status,
            encrypted: cloud.encrypted,
            bk_biz_id: UNASSIGNED_BIZ_ID,
            memo: cloud.memo,
        }
    }
}

#[async_trait]
impl ResourceSyncer for DiskSyncer<'_> {
    type Cloud = CloudDisk;
    type Local = Disk;

    const KIND: ResourceKind = ResourceKind::Disk;

    fn client(&self) -> &SyncClient {
        self.client
    }

    fn scope(&self) -> String {
        self.params.scope()
    }

    fn table(&self) -> &dyn Table<Disk> {
        self.client.store().disks()
    }

    fn store_filter(&self) -> Expression {
        with_cloud_ids(
            region_filter(self.client, &self.params.region),
            &self.params.cloud_ids,
        )
    }

    async fn list_from_cloud(&self, _kit: &Kit) -> Result<Vec<CloudDisk>> {
        self.list(&self.params.cloud_ids).await
    }

    async fn list_cloud_by_ids(&self, _kit: &Kit, cloud_ids: &[String]) -> Result<Vec<CloudDisk>> {
        self.list(cloud_ids).await
    }

    fn is_changed(&self, cloud: &CloudDisk, stored: &Disk) -> bool {
        // A disk only ever becomes a system disk; an option without boot ids
        // never demotes one.
        let promoted = self.is_system_disk(&cloud.cloud_id) && !stored.is_system_disk;
        promoted
            || cloud.name != stored.name
            || cloud.zone != stored.zone
            || cloud.disk_size_gb != stored.disk_size_gb
            || cloud.disk_type != stored.disk_type
            || cloud.status != stored.status
            || cloud.encrypted != stored.encrypted
            || cloud.memo != stored.memo
    }

    async fn create(&self, _kit: &Kit, items: Vec<CloudDisk>) -> Result<Vec<String>> {
        let rows = items.into_iter().map(|c| self.build(c)).collect();
        self.table()
            .batch_create(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Create))
    }

    async fn update(&self, _kit: &Kit, items: Vec<(Disk, CloudDisk)>) -> Result<()> {
        let rows = items
            .into_iter()
            .map(|(stored, cloud)| {
                let row = self.build(cloud);
                Disk {
                    id: stored.id,
                    bk_biz_id: stored.bk_biz_id,
                    is_system_disk: row.is_system_disk || stored.is_system_disk,
                    ..row
                }
            })
            .collect();
        self.table()
            .batch_update(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Update))
    }
}

impl SyncClient {
    pub async fn sync_disk(
        &self,
        kit: &Kit,
        params: &SyncBaseParams,
        option: &SyncDiskOption,
    ) -> Result<SyncResult> {
        self.check_params(params)?;
        sync_resource(
            kit,
            &DiskSyncer {
                client: self,
                params,
                option,
            },
        )
        .await
    }

    pub async fn remove_disk_deleted_from_cloud(
        &self,
        kit: &Kit,
        account_id: &str,
        region: &str,
    ) -> Result<()> {
        let params = SyncBaseParams::new(account_id, region);
        self.check_params(&params)?;
        let option = SyncDiskOption::default();
        remove_deleted_from_cloud(
            kit,
            &DiskSyncer {
                client: self,
                params: &params,
                option: &option,
            },
        )
        .await
    }
}
