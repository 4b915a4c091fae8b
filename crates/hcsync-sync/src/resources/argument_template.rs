//! Argument template sync

use crate::client::SyncClient;
use crate::error::{Result, StoreOp, SyncError};
use crate::orchestrator::{
    ResourceSyncer, list_cloud, region_filter, remove_deleted_from_cloud, sync_resource,
    with_cloud_ids,
};
use crate::params::{SyncBaseParams, SyncResult};
use async_trait::async_trait;
use hcsync_core::limits::UNASSIGNED_BIZ_ID;
use hcsync_core::model::{ArgumentTemplate, CloudArgumentTemplate};
use hcsync_core::{Kit, ResourceKind};
use hcsync_gateway::{Expression, Table};

pub(crate) struct ArgumentTemplateSyncer<'a> {
    pub client: &'a SyncClient,
    pub params: &'a SyncBaseParams,
}

impl ArgumentTemplateSyncer<'_> {
    async fn list(&self, cloud_ids: &[String]) -> Result<Vec<CloudArgumentTemplate>> {
        list_cloud(
            self.client,
            Self::KIND,
            &self.params.region,
            cloud_ids,
            |c, opt| Box::pin(async move { c.list_argument_templates(&opt).await }),
        )
        .await
    }

    fn build(&self, cloud: CloudArgumentTemplate) -> ArgumentTemplate {
        ArgumentTemplate {
            id: String::new(),
            vendor: self.client.vendor,
            account_id: self.client.account_id.clone(),
            cloud_id: cloud.cloud_id,
            name: cloud.name,
            region: self.params.region.clone(),
            bk_biz_id: UNASSIGNED_BIZ_ID,
            template_type: cloud.template_type,
            templates: cloud.templates,
            group_templates: cloud.group_templates,
            memo: cloud.memo,
        }
    }
}

#[async_trait]
impl ResourceSyncer for ArgumentTemplateSyncer<'_> {
    type Cloud = CloudArgumentTemplate;
    type Local = ArgumentTemplate;

    const KIND: ResourceKind = ResourceKind::ArgumentTemplate;

    fn client(&self) -> &SyncClient {
        self.client
    }

    fn scope(&self) -> String {
        self.params.scope()
    }

    fn table(&self) -> &dyn Table<ArgumentTemplate> {
        self.client.store().argument_templates()
    }

    fn store_filter(&self) -> Expression {
        with_cloud_ids(
            region_filter(self.client, &self.params.region),
            &self.params.cloud_ids,
        )
    }

    async fn list_from_cloud(&self, _kit: &Kit) -> Result<Vec<CloudArgumentTemplate>> {
        self.list(&self.params.cloud_ids).await
    }

    async fn list_cloud_by_ids(
        &self,
        _kit: &Kit,
        cloud_ids: &[String],
    ) -> Result<Vec<CloudArgumentTemplate>> {
        self.list(cloud_ids).await
    }

    fn is_changed(&self, cloud: &CloudArgumentTemplate, stored: &ArgumentTemplate) -> bool {
        cloud.name != stored.name
            || cloud.template_type != stored.template_type
            || cloud.templates != stored.templates
            || cloud.group_templates != stored.group_templates
            || cloud.memo != stored.memo
    }

    async fn create(&self, _kit: &Kit, items: Vec<CloudArgumentTemplate>) -> Result<Vec<String>> {
        let rows = items.into_iter().map(|c| self.build(c)).collect();
        self.table()
            .batch_create(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Create))
    }

    async fn update(
        &self,
        _kit: &Kit,
        items: Vec<(ArgumentTemplate, CloudArgumentTemplate)>,
    ) -> Result<()> {
        let rows = items
            .into_iter()
            .map(|(stored, cloud)| ArgumentTemplate {
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
    pub async fn sync_argument_template(
        &self,
        kit: &Kit,
        params: &SyncBaseParams,
    ) -> Result<SyncResult> {
        self.check_params(params)?;
        sync_resource(kit, &ArgumentTemplateSyncer { client: self, params }).await
    }

    pub async fn remove_argument_template_deleted_from_cloud(
        &self,
        kit: &Kit,
        account_id: &str,
        region: &str,
    ) -> Result<()> {
        let params = SyncBaseParams::new(account_id, region);
        self.check_params(&params)?;
        remove_deleted_from_cloud(
            kit,
            &ArgumentTemplateSyncer {
                client: self,
                params: &params,
            },
        )
        .await
    }
}
