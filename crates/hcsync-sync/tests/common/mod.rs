#![allow(dead_code)]

use hcsync_core::model::{
    Cidr, CloudBackend, CloudCvm, CloudDisk, CloudEip, CloudListener, CloudLoadBalancer,
    CloudSecurityGroup, CloudSubnet, CloudUrlRule, CloudVpc, Protocol,
};
use hcsync_core::{Kit, SyncLimits, Vendor};
use hcsync_gateway::{
    CloudGateway, CloudInventory, Expression, FixtureCloud, MemoryStore, Record, RegionInventory,
    StoreGateway, Table, list_all,
};
use hcsync_sync::{SyncBaseParams, SyncClient};
use std::sync::Arc;

pub const ACCOUNT: &str = "acc-1";
pub const REGION: &str = "ap-guangzhou";

pub struct Harness {
    pub cloud: Arc<FixtureCloud>,
    pub store: Arc<MemoryStore>,
    pub client: SyncClient,
    pub kit: Kit,
}

impl Harness {
    pub fn new(region: RegionInventory) -> Self {
        Self::with_vendor(Vendor::TCloud, region)
    }

    pub fn with_vendor(vendor: Vendor, region: RegionInventory) -> Self {
        let mut inventory = CloudInventory::new(vendor, ACCOUNT);
        *inventory.region_mut(REGION) = region;
        let cloud = Arc::new(FixtureCloud::new(inventory));
        let store = Arc::new(MemoryStore::new());
        let cloud_gateway: Arc<dyn CloudGateway> = cloud.clone();
        let store_gateway: Arc<dyn StoreGateway> = store.clone();
        let client = SyncClient::new(ACCOUNT, cloud_gateway, store_gateway, SyncLimits::default());
        Self {
            cloud,
            store,
            client,
            kit: Kit::with_rid("test"),
        }
    }

    pub fn params(&self) -> SyncBaseParams {
        SyncBaseParams::new(ACCOUNT, REGION)
    }

    /// Mutate the region inventory
    pub async fn cloud_update(&self, f: impl FnOnce(&mut RegionInventory)) {
        self.cloud.update(|inv| f(inv.region_mut(REGION))).await;
    }
}

/// Every row of `table`
pub async fn rows<R: Record>(table: &dyn Table<R>) -> Vec<R> {
    list_all(table, &Expression::new(), 500).await.unwrap()
}

pub async fn rows_where<R: Record>(table: &dyn Table<R>, filter: Expression) -> Vec<R> {
    list_all(table, &filter, 500).await.unwrap()
}

pub fn vpc(cloud_id: &str, name: &str) -> CloudVpc {
    CloudVpc {
        cloud_id: cloud_id.into(),
        name: name.into(),
        region: REGION.into(),
        cidrs: vec![Cidr {
            cidr: "10.0.0.0/16".into(),
            ..Default::default()
        }],
        ..Default::default()
    }
}

pub fn subnet(cloud_id: &str, cloud_vpc_id: &str) -> CloudSubnet {
    CloudSubnet {
        cloud_id: cloud_id.into(),
        cloud_vpc_id: cloud_vpc_id.into(),
        name: cloud_id.into(),
        region: REGION.into(),
        zone: format!("{REGION}-3"),
        ipv4_cidr: vec!["10.0.1.0/24".into()],
        ..Default::default()
    }
}

pub fn security_group(cloud_id: &str) -> CloudSecurityGroup {
    CloudSecurityGroup {
        cloud_id: cloud_id.into(),
        name: cloud_id.into(),
        region: REGION.into(),
        ..Default::default()
    }
}

pub fn disk(cloud_id: &str) -> CloudDisk {
    CloudDisk {
        cloud_id: cloud_id.into(),
        name: cloud_id.into(),
        region: REGION.into(),
        disk_size_gb: 50,
        ..Default::default()
    }
}

pub fn eip(cloud_id: &str, public_ip: &str) -> CloudEip {
    CloudEip {
        cloud_id: cloud_id.into(),
        region: REGION.into(),
        public_ip: public_ip.into(),
        ..Default::default()
    }
}

pub fn cvm(cloud_id: &str) -> CloudCvm {
    CloudCvm {
        cloud_id: cloud_id.into(),
        name: cloud_id.into(),
        region: REGION.into(),
        cloud_vpc_ids: vec!["vpc-1".into()],
        cloud_subnet_ids: vec!["subnet-1".into()],
        ..Default::default()
    }
}

pub fn load_balancer(cloud_id: &str, security_groups: &[&str]) -> CloudLoadBalancer {
    CloudLoadBalancer {
        cloud_id: cloud_id.into(),
        name: cloud_id.into(),
        region: REGION.into(),
        cloud_vpc_id: "vpc-1".into(),
        vips: vec!["1.1.1.1".into()],
        cloud_security_group_ids: security_groups.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

pub fn backend(instance: &str, port: i64) -> CloudBackend {
    CloudBackend {
        cloud_id: instance.into(),
        inst_type: "CVM".into(),
        port,
        weight: Some(10),
        private_ip_addresses: vec![format!("10.0.1.{port}")],
        ..Default::default()
    }
}

pub fn http_listener(cloud_id: &str, cloud_lb_id: &str, rules: Vec<CloudUrlRule>) -> CloudListener {
    CloudListener {
        cloud_id: cloud_id.into(),
        cloud_lb_id: cloud_lb_id.into(),
        name: cloud_id.into(),
        protocol: Protocol::Http,
        port: 80,
        rules,
        ..Default::default()
    }
}

pub fn tcp_listener(cloud_id: &str, cloud_lb_id: &str, backends: Vec<CloudBackend>) -> CloudListener {
    CloudListener {
        cloud_id: cloud_id.into(),
        cloud_lb_id: cloud_lb_id.into(),
        name: cloud_id.into(),
        protocol: Protocol::Tcp,
        port: 3306,
        scheduler: "WRR".into(),
        backends,
        ..Default::default()
    }
}

pub fn url_rule(cloud_id: &str, url: &str, backends: Vec<CloudBackend>) -> CloudUrlRule {
    CloudUrlRule {
        cloud_id: cloud_id.into(),
        domain: "www.example.com".into(),
        url: url.into(),
        scheduler: "WRR".into(),
        backends,
        ..Default::default()
    }
}
