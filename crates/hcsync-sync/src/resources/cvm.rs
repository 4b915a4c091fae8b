//! CVM sync

use crate::client::SyncClient;
use crate::error::{Result, StoreOp, SyncError};
use crate::orchestrator::{
    ResourceSyncer, list_cloud, map_by_cloud_id, region_filter, remove_deleted_from_cloud,
    sync_resource, with_cloud_ids,
};
use crate::params::{SyncBaseParams, SyncResult};
use crate::resources::vpc::UNBOUND_BK_CLOUD_ID;
use async_trait::async_trait;
use hcsync_core::limits::UNASSIGNED_BIZ_ID;
use hcsync_core::model::{CloudCvm, Cvm, CvmRelKind, Image, Subnet, Vpc};
use hcsync_core::{Kit, ResourceKind};
use hcsync_gateway::{Expression, Table, list_all};
use std::collections::HashMap;

/// Local rows a CVM payload points at
struct Dependencies {
    vpcs: HashMap<String, Vpc>,
    subnets: HashMap<String, Subnet>,
    images: HashMap<String, Image>,
}

pub(crate) struct CvmSyncer<'a> {
    pub client: &'a SyncClient,
    pub params: &'a SyncBaseParams,
}

impl CvmSyncer<'_> {
    pub(crate) async fn list(&self, cloud_ids: &[String]) -> Result<Vec<CloudCvm>> {
        list_cloud(
            self.client,
            Self::KIND,
            &self.params.region,
            cloud_ids,
            |c, opt| Box::pin(async move { c.list_cvms(&opt).await }),
        )
        .await
    }

    async fn dependencies(&self, items: &[&CloudCvm]) -> Result<Dependencies> {
        let store = self.client.store();
        let base = region_filter(self.client, &self.params.region);

        let vpc_ids: Vec<String> = items.iter().flat_map(|c| c.cloud_vpc_ids.clone()).collect();
        let subnet_ids: Vec<String> = items
            .iter()
            .flat_map(|c| c.cloud_subnet_ids.clone())
            .collect();
        let image_ids: Vec<String> = items.iter().filter_map(|c| c.cloud_image_id.clone()).collect();

        Ok(Dependencies {
            vpcs: map_by_cloud_id(self.client, store.vpcs(), ResourceKind::Vpc, &base, &vpc_ids)
                .await?,
            subnets: map_by_cloud_id(
                self.client,
                store.subnets(),
                ResourceKind::Subnet,
                &base,
                &subnet_ids,
            )
            .await?,
            images: map_by_cloud_id(
                self.client,
                store.images(),
                ResourceKind::Image,
                &base,
                &image_ids,
            )
            .await?,
        })
    }

    fn build(&self, cloud: CloudCvm, deps: &Dependencies) -> Result<Cvm> {
        let ext_vendor = cloud.extension.as_ref().map(|e| e.vendor());
        self.client.check_extension(Self::KIND, &cloud.cloud_id, ext_vendor)?;

        let mut vpc_ids = Vec::with_capacity(cloud.cloud_vpc_ids.len());
        let mut bk_cloud_id = None;
        for cloud_vpc_id in &cloud.cloud_vpc_ids {
            let vpc = deps
                .vpcs
                .get(cloud_vpc_id)
                .ok_or_else(|| SyncError::dependency(ResourceKind::Vpc, cloud_vpc_id, &cloud.cloud_id))?;
            bk_cloud_id.get_or_insert(vpc.bk_cloud_id);
            vpc_ids.push(vpc.id.clone());
        }

        let subnet_ids = cloud
            .cloud_subnet_ids
            .iter()
            .map(|cloud_subnet_id| {
                deps.subnets
                    .get(cloud_subnet_id)
                    .map(|s| s.id.clone())
                    .ok_or_else(|| {
                        SyncError::dependency(ResourceKind::Subnet, cloud_subnet_id, &cloud.cloud_id)
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let image_id = cloud
            .cloud_image_id
            .as_ref()
            .and_then(|id| deps.images.get(id))
            .map(|image| image.id.clone());

        Ok(Cvm {
            id: String::new(),
            vendor: self.client.vendor,
            account_id: self.client.account_id.clone(),
            cloud_id: cloud.cloud_id,
            name: cloud.name,
            region: self.params.region.clone(),
            zone: cloud.zone,
            bk_biz_id: UNASSIGNED_BIZ_ID,
            bk_cloud_id: bk_cloud_id.unwrap_or(UNBOUND_BK_CLOUD_ID),
            vpc_ids,
            cloud_vpc_ids: cloud.cloud_vpc_ids,
            subnet_ids,
            cloud_subnet_ids: cloud.cloud_subnet_ids,
            image_id,
            cloud_image_id: cloud.cloud_image_id,
            private_ipv4_addresses: cloud.private_ipv4_addresses,
            public_ipv4_addresses: cloud.public_ipv4_addresses,
            private_ipv6_addresses: cloud.private_ipv6_addresses,
            public_ipv6_addresses: cloud.public_ipv6_addresses,
            status: cloud.status,
            machine_type: cloud.machine_type,
            os_name: cloud.os_name,
            cloud_created_time: cloud.cloud_created_time,
            cloud_launched_time: cloud.cloud_launched_time,
            cloud_expired_time: cloud.cloud_expired_time,
            memo: None,
            extension: cloud.extension,
        })
    }
}

pub(crate) fn is_cvm_changed(cloud: &CloudCvm, stored: &Cvm) -> bool {
    cloud.name != stored.name
        || cloud.zone != stored.zone
        || cloud.cloud_vpc_ids != stored.cloud_vpc_ids
        || cloud.cloud_subnet_ids != stored.cloud_subnet_ids
        || cloud.cloud_image_id != stored.cloud_image_id
        || cloud.private_ipv4_addresses != stored.private_ipv4_addresses
        || cloud.public_ipv4_addresses != stored.public_ipv4_addresses
        || cloud.private_ipv6_addresses != stored.private_ipv6_addresses
        || cloud.public_ipv6_addresses != stored.public_ipv6_addresses
        || cloud.status != stored.status
        || cloud.machine_type != stored.machine_type
        || cloud.os_name != stored.os_name
        || cloud.cloud_created_time != stored.cloud_created_time
        || cloud.cloud_launched_time != stored.cloud_launched_time
        || cloud.cloud_expired_time != stored.cloud_expired_time
        || cloud.extension != stored.extension
}

#[async_trait]
impl ResourceSyncer for CvmSyncer<'_> {
    type Cloud = CloudCvm;
    type Local = Cvm;

    const KIND: ResourceKind = ResourceKind::Cvm;

    fn client(&self) -> &SyncClient {
        self.client
    }

    fn scope(&self) -> String {
        self.params.scope()
    }

    fn table(&self) -> &dyn Table<Cvm> {
        self.client.store().cvms()
    }

    fn store_filter(&self) -> Expression {
        with_cloud_ids(
            region_filter(self.client, &self.params.region),
            &self.params.cloud_ids,
        )
    }

    async fn list_from_cloud(&self, _kit: &Kit) -> Result<Vec<CloudCvm>> {
        self.list(&self.params.cloud_ids).await
    }

    async fn list_cloud_by_ids(&self, _kit: &Kit, cloud_ids: &[String]) -> Result<Vec<CloudCvm>> {
        self.list(cloud_ids).await
    }

    fn is_changed(&self, cloud: &CloudCvm, stored: &Cvm) -> bool {
        is_cvm_changed(cloud, stored)
    }

    async fn create(&self, _kit: &Kit, items: Vec<CloudCvm>) -> Result<Vec<String>> {
        let deps = self.dependencies(&items.iter().collect::<Vec<_>>()).await?;
        let rows = items
            .into_iter()
            .map(|c| self.build(c, &deps))
            .collect::<Result<Vec<_>>>()?;
        self.table()
            .batch_create(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Create))
    }

    async fn update(&self, _kit: &Kit, items: Vec<(Cvm, CloudCvm)>) -> Result<()> {
        let deps = self
            .dependencies(&items.iter().map(|(_, c)| c).collect::<Vec<_>>())
            .await?;
        let mut rows = Vec::with_capacity(items.len());
        for (stored, cloud) in items {
            rows.push(Cvm {
                id: stored.id,
                bk_biz_id: stored.bk_biz_id,
                memo: stored.memo,
                ..self.build(cloud, &deps)?
            });
        }
        self.table()
            .batch_update(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Update))
    }

    /// Instances go together with their relation rows
    async fn delete(&self, _kit: &Kit, keys: Vec<String>) -> Result<()> {
        let filter = region_filter(self.client, &self.params.region).is_in("cloud_id", &keys);
        let ids: Vec<String> = list_all(self.table(), &filter, self.client.limits.default_page_limit)
            .await
            .map_err(SyncError::store_list(Self::KIND, &self.scope()))?
            .into_iter()
            .map(|cvm| cvm.id)
            .collect();

        if !ids.is_empty() {
            for kind in CvmRelKind::ALL {
                self.client
                    .store()
                    .cvm_rels(kind)
                    .batch_delete(&Expression::new().is_in("cvm_id", &ids))
                    .await
                    .map_err(SyncError::store_write(kind.resource_kind(), StoreOp::Delete))?;
            }
        }
        self.table()
            .batch_delete(&filter)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Delete))
    }
}

impl SyncClient {
    /// Sync instances. VPCs and subnets they sit in must already be synced;
    /// images are linked when present.
    pub async fn sync_cvm(&self, kit: &Kit, params: &SyncBaseParams) -> Result<SyncResult> {
        self.check_params(params)?;
        sync_resource(kit, &CvmSyncer { client: self, params }).await
    }

    pub async fn remove_cvm_deleted_from_cloud(
        &self,
        kit: &Kit,
        account_id: &str,
        region: &str,
    ) -> Result<()> {
        let params = SyncBaseParams::new(account_id, region);
        self.check_params(&params)?;
        remove_deleted_from_cloud(kit, &CvmSyncer { client: self, params: &params }).await
    }
}
