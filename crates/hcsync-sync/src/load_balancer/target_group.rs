//! Provider-side target group sync
//!
//! Only groups of type `cloud` mirror a cloud listing. Local and implicit
//! groups are left alone here.

use super::target::{BackendSource, TargetSyncer};
use crate::client::SyncClient;
use crate::concurrency::run_bounded;
use crate::error::{Result, StoreOp, SyncError};
use crate::orchestrator::{
    ResourceSyncer, list_cloud, map_by_cloud_id, region_filter, remove_deleted_from_cloud,
    sync_resource, with_cloud_ids,
};
use crate::params::{SyncBaseParams, SyncResult};
use async_trait::async_trait;
use hcsync_core::limits::UNASSIGNED_BIZ_ID;
use hcsync_core::model::{CloudTargetGroup, TargetGroup, TargetGroupType, Vpc};
use hcsync_core::{Kit, ResourceKind};
use hcsync_gateway::{Expression, Table, list_all};
use std::collections::HashMap;

pub(crate) struct TargetGroupSyncer<'a> {
    pub client: &'a SyncClient,
    pub params: &'a SyncBaseParams,
}

impl TargetGroupSyncer<'_> {
    async fn list(&self, cloud_ids: &[String]) -> Result<Vec<CloudTargetGroup>> {
        list_cloud(
            self.client,
            Self::KIND,
            &self.params.region,
            cloud_ids,
            |c, opt| Box::pin(async move { c.list_target_groups(&opt).await }),
        )
        .await
    }

    async fn vpc_map(&self, items: &[&CloudTargetGroup]) -> Result<HashMap<String, Vpc>> {
        let cloud_vpc_ids: Vec<String> = items.iter().map(|tg| tg.cloud_vpc_id.clone()).collect();
        map_by_cloud_id(
            self.client,
            self.client.store().vpcs(),
            ResourceKind::Vpc,
            &region_filter(self.client, &self.params.region),
            &cloud_vpc_ids,
        )
        .await
    }

    fn build(&self, cloud: &CloudTargetGroup, vpcs: &HashMap<String, Vpc>) -> Result<TargetGroup> {
        let vpc = vpcs
            .get(&cloud.cloud_vpc_id)
            .ok_or_else(|| SyncError::dependency(ResourceKind::Vpc, &cloud.cloud_vpc_id, &cloud.cloud_id))?;
        Ok(TargetGroup {
            id: String::new(),
            vendor: self.client.vendor,
            account_id: self.client.account_id.clone(),
            cloud_id: cloud.cloud_id.clone(),
            name: cloud.name.clone(),
            region: self.params.region.clone(),
            bk_biz_id: UNASSIGNED_BIZ_ID,
            protocol: cloud.protocol,
            port: cloud.port,
            vpc_id: vpc.id.clone(),
            cloud_vpc_id: cloud.cloud_vpc_id.clone(),
            target_group_type: TargetGroupType::Cloud,
            weight: None,
            health_check: None,
            memo: None,
        })
    }
}

pub(crate) fn is_target_group_changed(cloud: &CloudTargetGroup, stored: &TargetGroup) -> bool {
    cloud.name != stored.name
        || cloud.cloud_vpc_id != stored.cloud_vpc_id
        || cloud.port != stored.port
        || cloud.protocol != stored.protocol
}

#[async_trait]
impl ResourceSyncer for TargetGroupSyncer<'_> {
    type Cloud = CloudTargetGroup;
    type Local = TargetGroup;

    const KIND: ResourceKind = ResourceKind::TargetGroup;

    fn client(&self) -> &SyncClient {
        self.client
    }

    fn scope(&self) -> String {
        self.params.scope()
    }

    fn table(&self) -> &dyn Table<TargetGroup> {
        self.client.store().target_groups()
    }

    fn store_filter(&self) -> Expression {
        with_cloud_ids(
            region_filter(self.client, &self.params.region)
                .equal("target_group_type", TargetGroupType::Cloud.as_str()),
            &self.params.cloud_ids,
        )
    }

    async fn list_from_cloud(&self, _kit: &Kit) -> Result<Vec<CloudTargetGroup>> {
        self.list(&self.params.cloud_ids).await
    }

    async fn list_cloud_by_ids(&self, _kit: &Kit, cloud_ids: &[String]) -> Result<Vec<CloudTargetGroup>> {
        self.list(cloud_ids).await
    }

    fn is_changed(&self, cloud: &CloudTargetGroup, stored: &TargetGroup) -> bool {
        is_target_group_changed(cloud, stored)
    }

    async fn create(&self, _kit: &Kit, items: Vec<CloudTargetGroup>) -> Result<Vec<String>> {
        let vpcs = self.vpc_map(&items.iter().collect::<Vec<_>>()).await?;
        let rows = items
            .iter()
            .map(|c| self.build(c, &vpcs))
            .collect::<Result<Vec<_>>>()?;
        self.table()
            .batch_create(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Create))
    }

    async fn update(&self, _kit: &Kit, items: Vec<(TargetGroup, CloudTargetGroup)>) -> Result<()> {
        let vpcs = self
            .vpc_map(&items.iter().map(|(_, c)| c).collect::<Vec<_>>())
            .await?;
        let mut rows = Vec::with_capacity(items.len());
        for (stored, cloud) in items {
            rows.push(TargetGroup {
                id: stored.id,
                bk_biz_id: stored.bk_biz_id,
                weight: stored.weight,
                health_check: stored.health_check,
                memo: stored.memo,
                ..self.build(&cloud, &vpcs)?
            });
        }
        self.table()
            .batch_update(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Update))
    }

    /// Target groups go together with their targets and rule bindings
    async fn delete(&self, _kit: &Kit, keys: Vec<String>) -> Result<()> {
        let store = self.client.store();
        let filter = self.store_filter().is_in("cloud_id", &keys);
        let ids: Vec<String> = list_all(self.table(), &filter, self.client.limits.default_page_limit)
            .await
            .map_err(SyncError::store_list(Self::KIND, &self.scope()))?
            .into_iter()
            .map(|tg| tg.id)
            .collect();
        if ids.is_empty() {
            return Ok(());
        }

        store
            .targets()
            .batch_delete(&Expression::new().is_in("target_group_id", &ids))
            .await
            .map_err(SyncError::store_write(ResourceKind::Target, StoreOp::Delete))?;
        store
            .target_group_rule_rels()
            .batch_delete(&Expression::new().is_in("target_group_id", &ids))
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Delete))?;
        self.table()
            .batch_delete(&Expression::new().is_in("id", &ids))
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Delete))
    }
}

impl SyncClient {
    /// Sync provider-side target groups, then the targets of each group
    pub async fn sync_target_group(&self, kit: &Kit, params: &SyncBaseParams) -> Result<SyncResult> {
        self.check_params(params)?;
        let syncer = TargetGroupSyncer { client: self, params };
        let result = sync_resource(kit, &syncer).await?;

        let cloud = syncer.list(&params.cloud_ids).await?;
        let local: HashMap<String, TargetGroup> = syncer
            .list_from_store(kit)
            .await?
            .into_iter()
            .map(|tg| (tg.cloud_id.clone(), tg))
            .collect();

        let mut units = Vec::with_capacity(cloud.len());
        for cloud_tg in &cloud {
            let tg = local.get(&cloud_tg.cloud_id).ok_or_else(|| {
                SyncError::dependency(ResourceKind::TargetGroup, &cloud_tg.cloud_id, params.scope())
            })?;
            units.push((cloud_tg, tg));
        }

        run_bounded(units, self.limits.sync_concurrency, |(cloud_tg, tg)| async move {
            let kit = kit.sub_kit();
            let syncer = TargetSyncer {
                client: self,
                target_group: tg,
                backends: &cloud_tg.backends,
                source: BackendSource::TargetGroup {
                    region: &params.region,
                    cloud_target_group_id: &cloud_tg.cloud_id,
                },
            };
            sync_resource(&kit, &syncer).await?;
            Ok::<(), SyncError>(())
        })
        .await?;
        Ok(result)
    }

    pub async fn remove_target_group_deleted_from_cloud(
        &self,
        kit: &Kit,
        account_id: &str,
        region: &str,
    ) -> Result<()> {
        let params = SyncBaseParams::new(account_id, region);
        self.check_params(&params)?;
        remove_deleted_from_cloud(kit, &TargetGroupSyncer { client: self, params: &params }).await
    }
}
