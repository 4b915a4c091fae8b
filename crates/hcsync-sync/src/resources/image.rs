//! Image sync

use crate::client::SyncClient;
use crate::error::{Result, StoreOp, SyncError};
use crate::orchestrator::{
    ResourceSyncer, list_cloud, region_filter, remove_deleted_from_cloud, sync_resource,
    with_cloud_ids,
};
use crate::params::{SyncBaseParams, SyncResult};
use async_trait::async_trait;
use hcsync_core::model::{CloudImage, Image};
use hcsync_core::{Kit, ResourceKind};
use hcsync_gateway::{Expression, Table};

pub(crate) struct ImageSyncer<'a> {
    pub client: &'a SyncClient,
    pub params: &'a SyncBaseParams,
}

impl ImageSyncer<'_> {
    async fn list(&self, cloud_ids: &[String]) -> Result<Vec<CloudImage>> {
        list_cloud(
            self.client,
            Self::KIND,
            &self.params.region,
            cloud_ids,
            |c, opt| Box::pin(async move { c.list_images(&opt).await }),
        )
        .await
    }

    fn build(&self, cloud: CloudImage) -> Image {
        Image {
            id: String::new(),
            vendor: self.client.vendor,
            account_id: self.client.account_id.clone(),
            cloud_id: cloud.cloud_id,
            name: cloud.name,
            region: self.params.region.clone(),
            architecture: cloud.architecture,
            platform: cloud.platform,
            state: cloud.state,
            image_type: cloud.image_type,
            os_type: cloud.os_type,
            image_size_gb: cloud.image_size_gb,
        }
    }
}

#[async_trait]
impl ResourceSyncer for ImageSyncer<'_> {
    type Cloud = CloudImage;
    type Local = Image;

    const KIND: ResourceKind = ResourceKind::Image;

    fn client(&self) -> &SyncClient {
        self.client
    }

    fn scope(&self) -> String {
        self.params.scope()
    }

    fn table(&self) -> &dyn Table<Image> {
        self.client.store().images()
    }

    fn store_filter(&self) -> Expression {
        with_cloud_ids(
            region_filter(self.client, &self.params.region),
            &self.params.cloud_ids,
        )
    }

    async fn list_from_cloud(&self, _kit: &Kit) -> Result<Vec<CloudImage>> {
        self.list(&self.params.cloud_ids).await
    }

    async fn list_cloud_by_ids(&self, _kit: &Kit, cloud_ids: &[String]) -> Result<Vec<CloudImage>> {
        self.list(cloud_ids).await
    }

    fn is_changed(&self, cloud: &CloudImage, stored: &Image) -> bool {
        cloud.name != stored.name
            || cloud.architecture != stored.architecture
            || cloud.platform != stored.platform
            || cloud.state != stored.state
            || cloud.image_type != stored.image_type
            || cloud.os_type != stored.os_type
            || cloud.image_size_gb != stored.image_size_gb
    }

    async fn create(&self, _kit: &Kit, items: Vec<CloudImage>) -> Result<Vec<String>> {
        let rows = items.into_iter().map(|c| self.build(c)).collect();
        self.table()
            .batch_create(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Create))
    }

    async fn update(&self, _kit: &Kit, items: Vec<(Image, CloudImage)>) -> Result<()> {
        let rows = items
            .into_iter()
            .map(|(stored, cloud)| Image {
                id: stored.id,
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
    pub async fn sync_image(&self, kit: &Kit, params: &SyncBaseParams) -> Result<SyncResult> {
        self.check_params(params)?;
        sync_resource(kit, &ImageSyncer { client: self, params }).await
    }

    pub async fn remove_image_deleted_from_cloud(
        &self,
        kit: &Kit,
        account_id: &str,
        region: &str,
    ) -> Result<()> {
        let params = SyncBaseParams::new(account_id, region);
        self.check_params(&params)?;
        remove_deleted_from_cloud(kit, &ImageSyncer { client: self, params: &params }).await
    }
}
