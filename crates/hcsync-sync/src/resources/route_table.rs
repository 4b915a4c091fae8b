//! Route table and route sync

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
use hcsync_core::model::{CloudRoute, CloudRouteTable, Route, RouteTable, Vpc};
use hcsync_core::{Kit, ResourceKind};
use hcsync_gateway::{Expression, Table, list_all};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

pub(crate) struct RouteTableSyncer<'a> {
    pub client: &'a SyncClient,
    pub params: &'a SyncBaseParams,
}

impl RouteTableSyncer<'_> {
    async fn list(&self, cloud_ids: &[String]) -> Result<Vec<CloudRouteTable>> {
        list_cloud(
            self.client,
            Self::KIND,
            &self.params.region,
            cloud_ids,
            |c, opt| Box::pin(async move { c.list_route_tables(&opt).await }),
        )
        .await
    }

    async fn vpc_map(&self, items: &[&CloudRouteTable]) -> Result<HashMap<String, Vpc>> {
        let cloud_vpc_ids: Vec<String> = items.iter().map(|t| t.cloud_vpc_id.clone()).collect();
        map_by_cloud_id(
            self.client,
            self.client.store().vpcs(),
            ResourceKind::Vpc,
            &region_filter(self.client, &self.params.region),
            &cloud_vpc_ids,
        )
        .await
    }

    fn build(&self, cloud: CloudRouteTable, vpcs: &HashMap<String, Vpc>) -> Result<RouteTable> {
        let vpc = vpcs
            .get(&cloud.cloud_vpc_id)
            .ok_or_else(|| SyncError::dependency(ResourceKind::Vpc, &cloud.cloud_vpc_id, &cloud.cloud_id))?;
        Ok(RouteTable {
            id: String::new(),
            vendor: self.client.vendor,
            account_id: self.client.account_id.clone(),
            cloud_id: cloud.cloud_id,
            vpc_id: vpc.id.clone(),
            cloud_vpc_id: cloud.cloud_vpc_id,
            name: cloud.name,
            region: self.params.region.clone(),
            main: cloud.main,
            memo: cloud.memo,
            bk_biz_id: UNASSIGNED_BIZ_ID,
        })
    }
}

#[async_trait]
impl ResourceSyncer for RouteTableSyncer<'_> {
    type Cloud = CloudRouteTable;
    type Local = RouteTable;

    const KIND: ResourceKind = ResourceKind::RouteTable;

    fn client(&self) -> &SyncClient {
        self.client
    }

    fn scope(&self) -> String {
        self.params.scope()
    }

    fn table(&self) -> &dyn Table<RouteTable> {
        self.client.store().route_tables()
    }

    fn store_filter(&self) -> Expression {
        with_cloud_ids(
            region_filter(self.client, &self.params.region),
            &self.params.cloud_ids,
        )
    }

    async fn list_from_cloud(&self, _kit: &Kit) -> Result<Vec<CloudRouteTable>> {
        self.list(&self.params.cloud_ids).await
    }

    async fn list_cloud_by_ids(&self, _kit: &Kit, cloud_ids: &[String]) -> Result<Vec<CloudRouteTable>> {
        self.list(cloud_ids).await
    }

    fn is_changed(&self, cloud: &CloudRouteTable, stored: &RouteTable) -> bool {
        cloud.name != stored.name
            || cloud.cloud_vpc_id != stored.cloud_vpc_id
            || cloud.main != stored.main
            || cloud.memo != stored.memo
    }

    async fn create(&self, _kit: &Kit, items: Vec<CloudRouteTable>) -> Result<Vec<String>> {
        let vpcs = self.vpc_map(&items.iter().collect::<Vec<_>>()).await?;
        let rows = items
            .into_iter()
            .map(|c| self.build(c, &vpcs))
            .collect::<Result<Vec<_>>>()?;
        self.table()
            .batch_create(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Create))
    }

    async fn update(&self, _kit: &Kit, items: Vec<(RouteTable, CloudRouteTable)>) -> Result<()> {
        let vpcs = self
            .vpc_map(&items.iter().map(|(_, c)| c).collect::<Vec<_>>())
            .await?;
        let mut rows = Vec::with_capacity(items.len());
        for (stored, cloud) in items {
            rows.push(RouteTable {
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

    /// Tables go together with their routes
    async fn delete(&self, _kit: &Kit, keys: Vec<String>) -> Result<()> {
        let filter = region_filter(self.client, &self.params.region).is_in("cloud_id", &keys);
        let ids: Vec<String> = list_all(self.table(), &filter, self.client.limits.default_page_limit)
            .await
            .map_err(SyncError::store_list(Self::KIND, &self.scope()))?
            .into_iter()
            .map(|t| t.id)
            .collect();
        if !ids.is_empty() {
            self.client
                .store()
                .routes()
                .batch_delete(&Expression::new().is_in("route_table_id", &ids))
                .await
                .map_err(SyncError::store_write(ResourceKind::Route, StoreOp::Delete))?;
        }
        self.table()
            .batch_delete(&filter)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Delete))
    }
}

/// Routes of one stored route table
pub(crate) struct RouteSyncer<'a> {
    pub client: &'a SyncClient,
    pub table: &'a RouteTable,
}

impl RouteSyncer<'_> {
    async fn list(&self) -> Result<Vec<CloudRoute>> {
        self.client
            .cloud()
            .list_routes(&self.table.region, &self.table.cloud_id)
            .await
            .map_err(SyncError::cloud_list(Self::KIND, &self.scope()))
    }

    fn build(&self, cloud: CloudRoute) -> Route {
        Route {
            id: String::new(),
            vendor: self.client.vendor,
            account_id: self.client.account_id.clone(),
            region: self.table.region.clone(),
            cloud_id: cloud.cloud_id,
            route_table_id: self.table.id.clone(),
            cloud_route_table_id: self.table.cloud_id.clone(),
            destination_cidr_block: cloud.destination_cidr_block,
            gateway_type: cloud.gateway_type,
            cloud_gateway_id: cloud.cloud_gateway_id,
            enabled: cloud.enabled,
            memo: cloud.memo,
        }
    }
}

#[async_trait]
impl ResourceSyncer for RouteSyncer<'_> {
    type Cloud = CloudRoute;
    type Local = Route;

    const KIND: ResourceKind = ResourceKind::Route;

    fn client(&self) -> &SyncClient {
        self.client
    }

    fn scope(&self) -> String {
        format!(
            "{}/{}/{}",
            self.client.account_id, self.table.region, self.table.cloud_id
        )
    }

    fn table(&self) -> &dyn Table<Route> {
        self.client.store().routes()
    }

    fn store_filter(&self) -> Expression {
        Expression::new().equal("route_table_id", &self.table.id)
    }

    async fn list_from_cloud(&self, _kit: &Kit) -> Result<Vec<CloudRoute>> {
        self.list().await
    }

    async fn list_cloud_by_ids(&self, _kit: &Kit, cloud_ids: &[String]) -> Result<Vec<CloudRoute>> {
        let wanted: HashSet<&str> = cloud_ids.iter().map(String::as_str).collect();
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|r| wanted.contains(r.cloud_id.as_str()))
            .collect())
    }

    fn is_changed(&self, cloud: &CloudRoute, stored: &Route) -> bool {
        cloud.destination_cidr_block != stored.destination_cidr_block
            || cloud.gateway_type != stored.gateway_type
            || cloud.cloud_gateway_id != stored.cloud_gateway_id
            || cloud.enabled != stored.enabled
            || cloud.memo != stored.memo
    }

    async fn create(&self, _kit: &Kit, items: Vec<CloudRoute>) -> Result<Vec<String>> {
        let rows = items.into_iter().map(|c| self.build(c)).collect();
        self.table()
            .batch_create(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Create))
    }

    async fn update(&self, _kit: &Kit, items: Vec<(Route, CloudRoute)>) -> Result<()> {
        let rows = items
            .into_iter()
            .map(|(stored, cloud)| Route {
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
    /// Sync route tables. Their VPCs must already be synced.
    pub async fn sync_route_table(&self, kit: &Kit, params: &SyncBaseParams) -> Result<SyncResult> {
        self.check_params(params)?;
        sync_resource(kit, &RouteTableSyncer { client: self, params }).await
    }

    /// Sync the routes of every route table the cloud reports in scope, one
    /// table per unit with bounded concurrency
    pub async fn sync_route(&self, kit: &Kit, params: &SyncBaseParams) -> Result<SyncResult> {
        self.check_params(params)?;
        let tables = RouteTableSyncer { client: self, params };
        let cloud_tables = tables.list_from_cloud(kit).await?;
        let cloud_ids: Vec<String> = cloud_tables.into_iter().map(|t| t.cloud_id).collect();
        let local = map_by_cloud_id(
            self,
            self.store().route_tables(),
            ResourceKind::RouteTable,
            &region_filter(self, &params.region),
            &cloud_ids,
        )
        .await?;

        let mut units = Vec::with_capacity(cloud_ids.len());
        for cloud_id in &cloud_ids {
            let table = local.get(cloud_id).ok_or_else(|| {
                SyncError::dependency(ResourceKind::RouteTable, cloud_id, params.scope())
            })?;
            units.push(table);
        }

        let result = Mutex::new(SyncResult::default());
        run_bounded(units, self.limits.sync_concurrency, |table| {
            let result = &result;
            async move {
                let kit = kit.sub_kit();
                let synced = sync_resource(&kit, &RouteSyncer { client: self, table }).await?;
                result.lock().await.merge(synced);
                Ok::<(), SyncError>(())
            }
        })
        .await?;
        Ok(result.into_inner())
    }

    pub async fn remove_route_table_deleted_from_cloud(
        &self,
        kit: &Kit,
        account_id: &str,
        region: &str,
    ) -> Result<()> {
        let params = SyncBaseParams::new(account_id, region);
        self.check_params(&params)?;
        remove_deleted_from_cloud(kit, &RouteTableSyncer { client: self, params: &params }).await
    }

    /// Sweep the routes of every stored route table in the region
    pub async fn remove_route_deleted_from_cloud(
        &self,
        kit: &Kit,
        account_id: &str,
        region: &str,
    ) -> Result<()> {
        let params = SyncBaseParams::new(account_id, region);
        self.check_params(&params)?;
        let tables = list_all(
            self.store().route_tables(),
            &region_filter(self, region),
            self.limits.default_page_limit,
        )
        .await
        .map_err(SyncError::store_list(ResourceKind::RouteTable, &params.scope()))?;
        for table in &tables {
            remove_deleted_from_cloud(kit, &RouteSyncer { client: self, table }).await?;
        }
        Ok(())
    }
}
