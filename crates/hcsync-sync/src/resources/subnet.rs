//! Subnet sync

use crate::client::SyncClient;
use crate::error::{Result, StoreOp, SyncError};
use crate::orchestrator::{
    ResourceSyncer, list_cloud, map_by_cloud_id, region_filter, remove_deleted_from_cloud,
    sync_resource, with_cloud_ids,
};
use crate::params::{SyncBaseParams, SyncResult};
use async_trait::async_trait;
use hcsync_core::limits::UNASSIGNED_BIZ_ID;
use hcsync_core::model::{CloudSubnet, Subnet, Vpc};
use hcsync_core::{Kit, ResourceKind};
use hcsync_gateway::{Expression, Table};
use std::collections::HashMap;

pub(crate) struct SubnetSyncer<'a> {
    pub client: &'a SyncClient,
    pub params: &'a SyncBaseParams,
}

impl SubnetSyncer<'_> {
    async fn list(&self, cloud_ids: &[String]) -> Result<Vec<CloudSubnet>> {
        list_cloud(
            self.client,
            Self::KIND,
            &self.params.region,
            cloud_ids,
            |c, opt| Box::pin(async move { c.list_subnets(&opt).await }),
        )
        .await
    }

    /// Local VPCs of the subnets, keyed by VPC cloud id
    async fn vpc_map(&self, items: &[CloudSubnet]) -> Result<HashMap<String, Vpc>> {
        let cloud_vpc_ids: Vec<String> = items.iter().map(|s| s.cloud_vpc_id.clone()).collect();
        map_by_cloud_id(
            self.client,
            self.client.store().vpcs(),
            ResourceKind::Vpc,
            &region_filter(self.client, &self.params.region),
            &cloud_vpc_ids,
        )
        .await
    }

    fn build(&self, cloud: CloudSubnet, vpcs: &HashMap<String, Vpc>) -> Result<Subnet> {
        let ext_vendor = cloud.extension.as_ref().map(|e| e.vendor());
        self.client.check_extension(Self::KIND, &cloud.cloud_id, ext_vendor)?;
        let vpc = vpcs
            .get(&cloud.cloud_vpc_id)
            .ok_or_else(|| SyncError::dependency(ResourceKind::Vpc, &cloud.cloud_vpc_id, &cloud.cloud_id))?;
        Ok(Subnet {
            id: String::new(),
            vendor: self.client.vendor,
            account_id: self.client.account_id.clone(),
            cloud_id: cloud.cloud_id,
            vpc_id: vpc.id.clone(),
            cloud_vpc_id: cloud.cloud_vpc_id,
            name: cloud.name,
            region: self.params.region.clone(),
            zone: cloud.zone,
            ipv4_cidr: cloud.ipv4_cidr,
            ipv6_cidr: cloud.ipv6_cidr,
            memo: cloud.memo,
            bk_biz_id: UNASSIGNED_BIZ_ID,
            extension: cloud.extension,
        })
    }
}

#[async_trait]
impl ResourceSyncer for SubnetSyncer<'_> {
    type Cloud = CloudSubnet;
    type Local = Subnet;

    const KIND: ResourceKind = ResourceKind::Subnet;

    fn client(&self) -> &SyncClient {
        self.client
    }

    fn scope(&self) -> String {
        self.params.scope()
    }

    fn table(&self) -> &dyn Table<Subnet> {
        self.client.store().subnets()
    }

    fn store_filter(&self) -> Expression {
        with_cloud_ids(
            region_filter(self.client, &self.params.region),
            &self.params.cloud_ids,
        )
    }

    async fn list_from_cloud(&self, _kit: &Kit) -> Result<Vec<CloudSubnet>> {
        self.list(&self.params.cloud_ids).await
    }

    async fn list_cloud_by_ids(&self, _kit: &Kit, cloud_ids: &[String]) -> Result<Vec<CloudSubnet>> {
        self.list(cloud_ids).await
    }

    fn is_changed(&self, cloud: &CloudSubnet, stored: &Subnet) -> bool {
        cloud.name != stored.name
            || cloud.cloud_vpc_id != stored.cloud_vpc_id
            || cloud.zone != stored.zone
            || cloud.ipv4_cidr != stored.ipv4_cidr
            || cloud.ipv6_cidr != stored.ipv6_cidr
            || cloud.memo != stored.memo
            || cloud.extension != stored.extension
    }

    async fn create(&self, _kit: &Kit, items: Vec<CloudSubnet>) -> Result<Vec<String>> {
        let vpcs = self.vpc_map(&items).await?;
        let rows = items
            .into_iter()
            .map(|c| self.build(c, &vpcs))
            .collect::<Result<Vec<_>>>()?;
        self.table()
            .batch_create(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Create))
    }

    async fn update(&self, _kit: &Kit, items: Vec<(Subnet, CloudSubnet)>) -> Result<()> {
        let clouds: Vec<CloudSubnet> = items.iter().map(|(_, c)| c.clone()).collect();
        let vpcs = self.vpc_map(&clouds).await?;
        let mut rows = Vec::with_capacity(items.len());
        for (stored, cloud) in items {
            rows.push(Subnet {
                id: stored.id,
                bk_biz_id: stored.bk_biz_id,
                ..self.build(cloud, &vpcs)?
            });
        }
        self.table()
            .batch_update(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Update))
    }
}

impl SyncClient {
    /// Sync subnets. Their VPCs must already be in the store.
    pub async fn sync_subnet(&self, kit: &Kit, params: &SyncBaseParams) -> Result<SyncResult> {
        self.check_params(params)?;
        sync_resource(kit, &SubnetSyncer { client: self, params }).await
    }

    pub async fn remove_subnet_deleted_from_cloud(
        &self,
        kit: &Kit,
        account_id: &str,
        region: &str,
    ) -> Result<()> {
        let params = SyncBaseParams::new(account_id, region);
        self.check_params(&params)?;
        remove_deleted_from_cloud(kit, &SubnetSyncer { client: self, params: &params }).await
    }
}
