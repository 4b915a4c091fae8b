//! Sub-account and region sync
//!
//! Both are account scoped: the scope has no region and the provider lists
//! them in one call.

use crate::client::SyncClient;
use crate::error::{Result, StoreOp, SyncError};
use crate::orchestrator::{ResourceSyncer, sync_resource, with_cloud_ids};
use crate::params::SyncResult;
use async_trait::async_trait;
use hcsync_core::model::{CloudRegion, CloudSubAccount, Region, SubAccount};
use hcsync_core::{Kit, ResourceKind};
use hcsync_gateway::{Expression, Table};
use std::collections::HashSet;

fn account_filter(client: &SyncClient) -> Expression {
    Expression::new()
        .equal("vendor", client.vendor)
        .equal("account_id", &client.account_id)
}

fn keep_ids<T: hcsync_core::CloudResource>(items: Vec<T>, cloud_ids: &[String]) -> Vec<T> {
    if cloud_ids.is_empty() {
        return items;
    }
    let wanted: HashSet<&str> = cloud_ids.iter().map(String::as_str).collect();
    items
        .into_iter()
        .filter(|i| wanted.contains(i.cloud_id()))
        .collect()
}

pub(crate) struct SubAccountSyncer<'a> {
    pub client: &'a SyncClient,
    pub cloud_ids: &'a [String],
}

impl SubAccountSyncer<'_> {
    fn build(&self, cloud: CloudSubAccount) -> SubAccount {
        SubAccount {
            id: String::new(),
            vendor: self.client.vendor,
            account_id: self.client.account_id.clone(),
            cloud_id: cloud.cloud_id,
            name: cloud.name,
            account_type: cloud.account_type,
            memo: cloud.memo,
        }
    }

    async fn list(&self, cloud_ids: &[String]) -> Result<Vec<CloudSubAccount>> {
        let all = self
            .client
            .cloud()
            .list_sub_accounts()
            .await
            .map_err(SyncError::cloud_list(Self::KIND, &self.client.account_id))?;
        Ok(keep_ids(all, cloud_ids))
    }
}

#[async_trait]
impl ResourceSyncer for SubAccountSyncer<'_> {
    type Cloud = CloudSubAccount;
    type Local = SubAccount;

    const KIND: ResourceKind = ResourceKind::SubAccount;

    fn client(&self) -> &SyncClient {
        self.client
    }

    fn scope(&self) -> String {
        self.client.account_id.clone()
    }

    fn table(&self) -> &dyn Table<SubAccount> {
        self.client.store().sub_accounts()
    }

    fn store_filter(&self) -> Expression {
        with_cloud_ids(account_filter(self.client), self.cloud_ids)
    }

    async fn list_from_cloud(&self, _kit: &Kit) -> Result<Vec<CloudSubAccount>> {
        self.list(self.cloud_ids).await
    }

    async fn list_cloud_by_ids(&self, _kit: &Kit, cloud_ids: &[String]) -> Result<Vec<CloudSubAccount>> {
        self.list(cloud_ids).await
    }

    fn is_changed(&self, cloud: &CloudSubAccount, stored: &SubAccount) -> bool {
        cloud.name != stored.name
            || cloud.account_type != stored.account_type
            || cloud.memo != stored.memo
    }

    async fn create(&self, _kit: &Kit, items: Vec<CloudSubAccount>) -> Result<Vec<String>> {
        let rows = items.into_iter().map(|c| self.build(c)).collect();
        self.table()
            .batch_create(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Create))
    }

    async fn update(&self, _kit: &Kit, items: Vec<(SubAccount, CloudSubAccount)>) -> Result<()> {
        let rows = items
            .into_iter()
            .map(|(stored, cloud)| SubAccount {
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

pub(crate) struct RegionSyncer<'a> {
    pub client: &'a SyncClient,
}

impl RegionSyncer<'_> {
    fn build(&self, cloud: CloudRegion) -> Region {
        Region {
            id: String::new(),
            vendor: self.client.vendor,
            account_id: self.client.account_id.clone(),
            cloud_id: cloud.cloud_id,
            name: cloud.name,
            status: cloud.status,
        }
    }

    async fn list(&self, cloud_ids: &[String]) -> Result<Vec<CloudRegion>> {
        let all = self
            .client
            .cloud()
            .list_regions()
            .await
            .map_err(SyncError::cloud_list(Self::KIND, &self.client.account_id))?;
        Ok(keep_ids(all, cloud_ids))
    }
}

#[async_trait]
impl ResourceSyncer for RegionSyncer<'_> {
    type Cloud = CloudRegion;
    type Local = Region;

    const KIND: ResourceKind = ResourceKind::Region;

    fn client(&self) -> &SyncClient {
        self.client
    }

    fn scope(&self) -> String {
        self.client.account_id.clone()
    }

    fn table(&self) -> &dyn Table<Region> {
        self.client.store().regions()
    }

    fn store_filter(&self) -> Expression {
        account_filter(self.client)
    }

    async fn list_from_cloud(&self, _kit: &Kit) -> Result<Vec<CloudRegion>> {
        self.list(&[]).await
    }

    async fn list_cloud_by_ids(&self, _kit: &Kit, cloud_ids: &[String]) -> Result<Vec<CloudRegion>> {
        self.list(cloud_ids).await
    }

    fn is_changed(&self, cloud: &CloudRegion, stored: &Region) -> bool {
        cloud.name != stored.name || cloud.status != stored.status
    }

    async fn create(&self, _kit: &Kit, items: Vec<CloudRegion>) -> Result<Vec<String>> {
        let rows = items.into_iter().map(|c| self.build(c)).collect();
        self.table()
            .batch_create(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Create))
    }

    async fn update(&self, _kit: &Kit, items: Vec<(Region, CloudRegion)>) -> Result<()> {
        let rows = items
            .into_iter()
            .map(|(stored, cloud)| Region {
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
    /// Sync the sub-accounts of the client's account, optionally narrowed to
    /// `cloud_ids`
    pub async fn sync_sub_account(&self, kit: &Kit, cloud_ids: &[String]) -> Result<SyncResult> {
        if cloud_ids.len() > self.limits.cloud_resource_sync_max_limit {
            return Err(SyncError::InvalidInput(format!(
                "cloud_ids should <= {}, got {}",
                self.limits.cloud_resource_sync_max_limit,
                cloud_ids.len()
            )));
        }
        sync_resource(kit, &SubAccountSyncer { client: self, cloud_ids }).await
    }

    /// Sync the regions the account can see
    pub async fn sync_region(&self, kit: &Kit) -> Result<SyncResult> {
        sync_resource(kit, &RegionSyncer { client: self }).await
    }
}
