//! EIP sync

use crate::client::SyncClient;
use crate::error::{Result, StoreOp, SyncError};
use crate::orchestrator::{
    ResourceSyncer, list_cloud, region_filter, remove_deleted_from_cloud, sync_resource,
    with_cloud_ids,
};
use crate::params::{SyncBaseParams, SyncResult};
use async_trait::async_trait;
use hcsync_core::limits::UNASSIGNED_BIZ_ID;
use hcsync_core::model::{CloudEip, Eip};
use hcsync_core::{Kit, ResourceKind};
use hcsync_gateway::{Expression, Table};

pub(crate) struct EipSyncer<'a> {
    pub client: &'a SyncClient,
    pub params: &'a SyncBaseParams,
}

impl EipSyncer<'_> {
    async fn list(&self, cloud_ids: &[String]) -> Result<Vec<CloudEip>> {
        list_cloud(
            self.client,
            Self::KIND,
            &self.params.region,
            cloud_ids,
            |c, opt| Box::pin(async move { c.list_eips(&opt).await }),
        )
        .await
    }

    fn build(&self, cloud: CloudEip) -> Eip {
        Eip {
            id: String::new(),
            vendor: self.client.vendor,
            account_id: self.client.account_id.clone(),
            cloud_id: cloud.cloud_id,
            name: cloud.name,
            region: self.params.region.clone(),
            public_ip: cloud.public_ip,
            private_ip: cloud.private_ip,
            status: cloud.status,
            bandwidth: cloud.bandwidth,
            internet_charge_type: cloud.internet_charge_type,
            bk_biz_id: UNASSIGNED_BIZ_ID,
        }
    }
}

#[async_trait]
impl ResourceSyncer for EipSyncer<'_> {
    type Cloud = CloudEip;
    type Local = Eip;

    const KIND: ResourceKind = ResourceKind::Eip;

    fn client(&self) -> &SyncClient {
        self.client
    }

    fn scope(&self) -> String {
        self.params.scope()
    }

    fn table(&self) -> &dyn Table<Eip> {
        self.client.store().eips()
    }

    fn store_filter(&self) -> Expression {
        with_cloud_ids(
            region_filter(self.client, &self.params.region),
            &self.params.cloud_ids,
        )
    }

    async fn list_from_cloud(&self, _kit: &Kit) -> Result<Vec<CloudEip>> {
        self.list(&self.params.cloud_ids).await
    }

    async fn list_cloud_by_ids(&self, _kit: &Kit, cloud_ids: &[String]) -> Result<Vec<CloudEip>> {
        self.list(cloud_ids).await
    }

    fn is_changed(&self, cloud: &CloudEip, stored: &Eip) -> bool {
        cloud.name != stored.name
            || cloud.public_ip != stored.public_ip
            || cloud.private_ip != stored.private_ip
            || cloud.status != stored.status
            || cloud.bandwidth != stored.bandwidth
            || cloud.internet_charge_type != stored.internet_charge_type
    }

    async fn create(&self, _kit: &Kit, items: Vec<CloudEip>) -> Result<Vec<String>> {
        let rows = items.into_iter().map(|c| self.build(c)).collect();
        self.table()
            .batch_create(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Create))
    }

    async fn update(&self, _kit: &Kit, items: Vec<(Eip, CloudEip)>) -> Result<()> {
        let rows = items
            .into_iter()
            .map(|(stored, cloud)| Eip {
                id: stored.id,
                bk_biz_id: stored.bk_biz_id,
                ..self.build(cloud)
            })
            .collect();
        self.table()
            .batch_update(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Update))
    }
}

impl SyncClient {
    pub async fn sync_eip(&self, kit: &Kit, params: &SyncBaseParams) -> Result<SyncResult> {
        self.check_params(params)?;
        sync_resource(kit, &EipSyncer { client: self, params }).await
    }

    pub async fn remove_eip_deleted_from_cloud(
        &self,
        kit: &Kit,
        account_id: &str,
        region: &str,
    ) -> Result<()> {
        let params = SyncBaseParams::new(account_id, region);
        self.check_params(&params)?;
        remove_deleted_from_cloud(kit, &EipSyncer { client: self, params: &params }).await
    }
}
