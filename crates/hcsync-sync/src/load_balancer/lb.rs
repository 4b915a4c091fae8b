//! Load balancer sync

use crate::client::SyncClient;
use crate::error::{Result, StoreOp, SyncError};
use crate::orchestrator::{
    ResourceSyncer, into_chunks, list_cloud, map_by_cloud_id, region_filter, with_cloud_ids,
};
use crate::params::SyncBaseParams;
use async_trait::async_trait;
use hcsync_core::limits::UNASSIGNED_BIZ_ID;
use hcsync_core::model::{CloudLoadBalancer, LoadBalancer, LoadBalancerType, Subnet, Vpc};
use hcsync_core::{Kit, ResourceKind};
use hcsync_gateway::{Expression, Table, list_all};
use std::collections::HashMap;

pub(crate) struct LoadBalancerSyncer<'a> {
    pub client: &'a SyncClient,
    pub params: &'a SyncBaseParams,
}

impl LoadBalancerSyncer<'_> {
    pub(crate) async fn list(&self, cloud_ids: &[String]) -> Result<Vec<CloudLoadBalancer>> {
        list_cloud(
            self.client,
            Self::KIND,
            &self.params.region,
            cloud_ids,
            |c, opt| Box::pin(async move { c.list_load_balancers(&opt).await }),
        )
        .await
    }

    /// Stored load balancers of the scope
    pub(crate) async fn list_local(&self) -> Result<Vec<LoadBalancer>> {
        list_all(
            self.table(),
            &self.store_filter(),
            self.client.limits.default_page_limit,
        )
        .await
        .map_err(SyncError::store_list(Self::KIND, &self.scope()))
    }

    async fn related(
        &self,
        items: &[&CloudLoadBalancer],
    ) -> Result<(HashMap<String, Vpc>, HashMap<String, Subnet>)> {
        let base = region_filter(self.client, &self.params.region);
        let vpc_ids: Vec<String> = items.iter().map(|lb| lb.cloud_vpc_id.clone()).collect();
        let subnet_ids: Vec<String> = items
            .iter()
            .filter_map(|lb| lb.cloud_subnet_id.clone())
            .collect();
        let vpcs = map_by_cloud_id(
            self.client,
            self.client.store().vpcs(),
            ResourceKind::Vpc,
            &base,
            &vpc_ids,
        )
        .await?;
        let subnets = map_by_cloud_id(
            self.client,
            self.client.store().subnets(),
            ResourceKind::Subnet,
            &base,
            &subnet_ids,
        )
        .await?;
        Ok((vpcs, subnets))
    }

    fn build(
        &self,
        cloud: CloudLoadBalancer,
        vpcs: &HashMap<String, Vpc>,
        subnets: &HashMap<String, Subnet>,
    ) -> Result<LoadBalancer> {
        let ext_vendor = cloud.extension.as_ref().map(|e| e.vendor());
        self.client.check_extension(Self::KIND, &cloud.cloud_id, ext_vendor)?;

        let vpc = vpcs
            .get(&cloud.cloud_vpc_id)
            .ok_or_else(|| SyncError::dependency(ResourceKind::Vpc, &cloud.cloud_vpc_id, &cloud.cloud_id))?;
        let subnet_id = cloud
            .cloud_subnet_id
            .as_ref()
            .and_then(|id| subnets.get(id))
            .map(|s| s.id.clone());

        let (private_ipv4_addresses, public_ipv4_addresses) = match cloud.lb_type {
            LoadBalancerType::Open => (Vec::new(), cloud.vips),
            LoadBalancerType::Internal => (cloud.vips, Vec::new()),
        };

        Ok(LoadBalancer {
            id: String::new(),
            vendor: self.client.vendor,
            account_id: self.client.account_id.clone(),
            cloud_id: cloud.cloud_id,
            name: cloud.name,
            region: self.params.region.clone(),
            bk_biz_id: UNASSIGNED_BIZ_ID,
            lb_type: cloud.lb_type,
            vpc_id: vpc.id.clone(),
            cloud_vpc_id: cloud.cloud_vpc_id,
            subnet_id,
            cloud_subnet_id: cloud.cloud_subnet_id,
            private_ipv4_addresses,
            public_ipv4_addresses,
            public_ipv6_addresses: cloud.ipv6_address.into_iter().collect(),
            zones: cloud.zones,
            domain: cloud.domain,
            status: cloud.status,
            ip_version: cloud.ip_version,
            delete_protect: cloud.delete_protect,
            cloud_created_time: cloud.cloud_created_time,
            cloud_status_time: cloud.cloud_status_time,
            cloud_expired_time: cloud.cloud_expired_time,
            memo: None,
            extension: cloud.extension,
        })
    }
}

fn same_set(a: &[String], b: &[String]) -> bool {
    let mut a: Vec<&String> = a.iter().collect();
    let mut b: Vec<&String> = b.iter().collect();
    a.sort();
    b.sort();
    a == b
}

pub(crate) fn is_lb_changed(cloud: &CloudLoadBalancer, stored: &LoadBalancer) -> bool {
    let addresses: Vec<String> = stored
        .private_ipv4_addresses
        .iter()
        .chain(stored.public_ipv4_addresses.iter())
        .cloned()
        .collect();
    let ipv6: Vec<String> = cloud.ipv6_address.iter().cloned().collect();

    cloud.name != stored.name
        || cloud.lb_type != stored.lb_type
        || cloud.cloud_vpc_id != stored.cloud_vpc_id
        || cloud.cloud_subnet_id != stored.cloud_subnet_id
        || !same_set(&cloud.vips, &addresses)
        || !same_set(&ipv6, &stored.public_ipv6_addresses)
        || !same_set(&cloud.zones, &stored.zones)
        || cloud.domain != stored.domain
        || cloud.status != stored.status
        || cloud.ip_version != stored.ip_version
        || cloud.delete_protect != stored.delete_protect
        || cloud.cloud_created_time != stored.cloud_created_time
        || cloud.cloud_status_time != stored.cloud_status_time
        || cloud.cloud_expired_time != stored.cloud_expired_time
        || cloud.extension != stored.extension
}

#[async_trait]
impl ResourceSyncer for LoadBalancerSyncer<'_> {
    type Cloud = CloudLoadBalancer;
    type Local = LoadBalancer;

    const KIND: ResourceKind = ResourceKind::LoadBalancer;

    fn client(&self) -> &SyncClient {
        self.client
    }

    fn scope(&self) -> String {
        self.params.scope()
    }

    fn table(&self) -> &dyn Table<LoadBalancer> {
        self.client.store().load_balancers()
    }

    fn store_filter(&self) -> Expression {
        with_cloud_ids(
            region_filter(self.client, &self.params.region),
            &self.params.cloud_ids,
        )
    }

    async fn list_from_cloud(&self, _kit: &Kit) -> Result<Vec<CloudLoadBalancer>> {
        self.list(&self.params.cloud_ids).await
    }

    async fn list_cloud_by_ids(
        &self,
        _kit: &Kit,
        cloud_ids: &[String],
    ) -> Result<Vec<CloudLoadBalancer>> {
        self.list(cloud_ids).await
    }

    fn is_changed(&self, cloud: &CloudLoadBalancer, stored: &LoadBalancer) -> bool {
        is_lb_changed(cloud, stored)
    }

    async fn create(&self, _kit: &Kit, items: Vec<CloudLoadBalancer>) -> Result<Vec<String>> {
        let (vpcs, subnets) = self.related(&items.iter().collect::<Vec<_>>()).await?;
        let rows = items
            .into_iter()
            .map(|c| self.build(c, &vpcs, &subnets))
            .collect::<Result<Vec<_>>>()?;
        self.table()
            .batch_create(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Create))
    }

    async fn update(&self, _kit: &Kit, items: Vec<(LoadBalancer, CloudLoadBalancer)>) -> Result<()> {
        let (vpcs, subnets) = self
            .related(&items.iter().map(|(_, c)| c).collect::<Vec<_>>())
            .await?;
        let mut rows = Vec::with_capacity(items.len());
        for (stored, cloud) in items {
            rows.push(LoadBalancer {
                id: stored.id,
                bk_biz_id: stored.bk_biz_id,
                memo: stored.memo,
                ..self.build(cloud, &vpcs, &subnets)?
            });
        }
        self.table()
            .batch_update(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Update))
    }

    /// Load balancers go together with their listeners (and everything the
    /// listeners own) and their security group bindings
    async fn delete(&self, _kit: &Kit, keys: Vec<String>) -> Result<()> {
        let store = self.client.store();
        let limits = &self.client.limits;
        let filter = region_filter(self.client, &self.params.region).is_in("cloud_id", &keys);
        let ids: Vec<String> = list_all(self.table(), &filter, limits.default_page_limit)
            .await
            .map_err(SyncError::store_list(Self::KIND, &self.scope()))?
            .into_iter()
            .map(|lb| lb.id)
            .collect();

        if !ids.is_empty() {
            let listener_ids: Vec<String> = list_all(
                store.listeners(),
                &Expression::new().is_in("lb_id", &ids),
                limits.default_page_limit,
            )
            .await
            .map_err(SyncError::store_list(ResourceKind::Listener, &self.scope()))?
            .into_iter()
            .map(|l| l.id)
            .collect();
            for chunk in into_chunks(listener_ids, limits.batch_operation_max_limit) {
                store
                    .delete_listeners_cascade(&chunk)
                    .await
                    .map_err(SyncError::store_write(ResourceKind::Listener, StoreOp::Delete))?;
            }

            store
                .sg_common_rels()
                .batch_delete(
                    &Expression::new()
                        .equal("res_type", ResourceKind::LoadBalancer)
                        .is_in("res_id", &ids),
                )
                .await
                .map_err(SyncError::store_write(ResourceKind::SecurityGroup, StoreOp::Delete))?;
        }

        self.table()
            .batch_delete(&filter)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Delete))
    }
}
