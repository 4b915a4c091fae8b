//! VPC sync

use crate::client::SyncClient;
use crate::error::{Result, StoreOp, SyncError};
use crate::orchestrator::{
    ResourceSyncer, list_cloud, region_filter, remove_deleted_from_cloud, sync_resource,
    with_cloud_ids,
};
use crate::params::{SyncBaseParams, SyncResult};
use async_trait::async_trait;
use hcsync_core::limits::UNASSIGNED_BIZ_ID;
use hcsync_core::model::{CloudVpc, Vpc};
use hcsync_core::{Kit, ResourceKind};
use hcsync_gateway::{Expression, Table};
use std::collections::HashSet;

/// Management-network id of a VPC that is not mapped to one
pub(crate) const UNBOUND_BK_CLOUD_ID: i64 = -1;

pub(crate) struct VpcSyncer<'a> {
    pub client: &'a SyncClient,
    pub params: &'a SyncBaseParams,
}

impl VpcSyncer<'_> {
    fn build(&self, cloud: CloudVpc) -> Vpc {
        Vpc {
            id: String::new(),
            vendor: self.client.vendor,
            account_id: self.client.account_id.clone(),
            cloud_id: cloud.cloud_id,
            name: cloud.name,
            region: self.params.region.clone(),
            memo: cloud.memo,
            cidrs: cloud.cidrs,
            bk_biz_id: UNASSIGNED_BIZ_ID,
            bk_cloud_id: UNBOUND_BK_CLOUD_ID,
            extension: cloud.extension,
        }
    }

    async fn list(&self, cloud_ids: &[String]) -> Result<Vec<CloudVpc>> {
        list_cloud(
            self.client,
            Self::KIND,
            &self.params.region,
            cloud_ids,
            |c, opt| Box::pin(async move { c.list_vpcs(&opt).await }),
        )
        .await
    }
}

pub(crate) fn is_vpc_changed(cloud: &CloudVpc, stored: &Vpc) -> bool {
    if cloud.name != stored.name || cloud.memo != stored.memo {
        return true;
    }
    let cloud_cidrs: HashSet<_> = cloud.cidrs.iter().collect();
    let stored_cidrs: HashSet<_> = stored.cidrs.iter().collect();
    if cloud_cidrs != stored_cidrs {
        return true;
    }
    cloud.extension != stored.extension
}

#[async_trait]
impl ResourceSyncer for VpcSyncer<'_> {
    type Cloud = CloudVpc;
    type Local = Vpc;

    const KIND: ResourceKind = ResourceKind::Vpc;

    fn client(&self) -> &SyncClient {
        self.client
    }

    fn scope(&self) -> String {
        self.params.scope()
    }

    fn table(&self) -> &dyn Table<Vpc> {
        self.client.store().vpcs()
    }

    fn store_filter(&self) -> Expression {
        with_cloud_ids(
            region_filter(self.client, &self.params.region),
            &self.params.cloud_ids,
        )
    }

    async fn list_from_cloud(&self, _kit: &Kit) -> Result<Vec<CloudVpc>> {
        self.list(&self.params.cloud_ids).await
    }

    async fn list_cloud_by_ids(&self, _kit: &Kit, cloud_ids: &[String]) -> Result<Vec<CloudVpc>> {
        self.list(cloud_ids).await
    }

    fn is_changed(&self, cloud: &CloudVpc, stored: &Vpc) -> bool {
        is_vpc_changed(cloud, stored)
    }

    async fn create(&self, _kit: &Kit, items: Vec<CloudVpc>) -> Result<Vec<String>> {
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let ext_vendor = item.extension.as_ref().map(|e| e.vendor());
            self.client.check_extension(Self::KIND, &item.cloud_id, ext_vendor)?;
            rows.push(self.build(item));
        }
        self.table()
            .batch_create(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Create))
    }

    async fn update(&self, _kit: &Kit, items: Vec<(Vpc, CloudVpc)>) -> Result<()> {
        let mut rows = Vec::with_capacity(items.len());
        for (stored, cloud) in items {
            let ext_vendor = cloud.extension.as_ref().map(|e| e.vendor());
            self.client.check_extension(Self::KIND, &cloud.cloud_id, ext_vendor)?;
            rows.push(Vpc {
                id: stored.id,
                bk_biz_id: stored.bk_biz_id,
                bk_cloud_id: stored.bk_cloud_id,
                ..self.build(cloud)
            });
        }
        self.table()
            .batch_update(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Update))
    }
}

impl SyncClient {
    /// Sync VPCs of a region (or the listed ones) into the store
    pub async fn sync_vpc(&self, kit: &Kit, params: &SyncBaseParams) -> Result<SyncResult> {
        self.check_params(params)?;
        sync_resource(kit, &VpcSyncer { client: self, params }).await
    }

    pub async fn remove_vpc_deleted_from_cloud(
        &self,
        kit: &Kit,
        account_id: &str,
        region: &str,
    ) -> Result<()> {
        let params = SyncBaseParams::new(account_id, region);
        self.check_params(&params)?;
        remove_deleted_from_cloud(kit, &VpcSyncer { client: self, params: &params }).await
    }
}
