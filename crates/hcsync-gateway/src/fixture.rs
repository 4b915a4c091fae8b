//! Fixture-backed cloud gateway
//!
//! Serves a JSON inventory of one vendor account. Used by the CLI to replay a
//! captured inventory and by tests, which can also inject listing failures
//! and resources that only show up when asked for by id.

use crate::cloud::{CloudGateway, ListOption};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use hcsync_core::model::{
    CloudArgumentTemplate, CloudCvm, CloudDisk, CloudEip, CloudImage, CloudListener,
    CloudLoadBalancer, CloudRegion, CloudRoute, CloudRouteTable, CloudSecurityGroup,
    CloudSecurityGroupRule, CloudSubAccount, CloudSubnet, CloudTargetGroup, CloudVpc,
};
use hcsync_core::{CloudResource, ResourceKind, Vendor};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tokio::sync::Mutex;

/// Resources of one region
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionInventory {
    pub vpcs: Vec<CloudVpc>,
    pub subnets: Vec<CloudSubnet>,
    pub security_groups: Vec<CloudSecurityGroup>,
    /// Keyed by security group cloud id
    pub security_group_rules: BTreeMap<String, Vec<CloudSecurityGroupRule>>,
    pub argument_templates: Vec<CloudArgumentTemplate>,
    pub images: Vec<CloudImage>,
    pub disks: Vec<CloudDisk>,
    pub eips: Vec<CloudEip>,
    pub cvms: Vec<CloudCvm>,
    pub route_tables: Vec<CloudRouteTable>,
    /// Keyed by route table cloud id
    pub routes: BTreeMap<String, Vec<CloudRoute>>,
    pub load_balancers: Vec<CloudLoadBalancer>,
    pub listeners: Vec<CloudListener>,
    pub target_groups: Vec<CloudTargetGroup>,
}

/// Inventory of one vendor account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudInventory {
    pub vendor: Vendor,
    pub account_id: String,
    #[serde(default)]
    pub sub_accounts: Vec<CloudSubAccount>,
    #[serde(default)]
    pub regions: Vec<CloudRegion>,
    /// Keyed by region
    #[serde(default)]
    pub resources: BTreeMap<String, RegionInventory>,
}

impl CloudInventory {
    pub fn new(vendor: Vendor, account_id: impl Into<String>) -> Self {
        Self {
            vendor,
            account_id: account_id.into(),
            sub_accounts: Vec::new(),
            regions: Vec::new(),
            resources: BTreeMap::new(),
        }
    }

    pub fn region_mut(&mut self, region: &str) -> &mut RegionInventory {
        self.resources.entry(region.to_string()).or_default()
    }
}

#[derive(Debug, Default)]
struct FixtureState {
    /// Visible only to lookups by cloud id
    survivors: BTreeMap<String, RegionInventory>,
    failing: HashSet<ResourceKind>,
    calls: HashMap<ResourceKind, usize>,
}

pub struct FixtureCloud {
    vendor: Vendor,
    account_id: String,
    inventory: Mutex<CloudInventory>,
    state: Mutex<FixtureState>,
}

impl FixtureCloud {
    pub fn new(inventory: CloudInventory) -> Self {
        Self {
            vendor: inventory.vendor,
            account_id: inventory.account_id.clone(),
            inventory: Mutex::new(inventory),
            state: Mutex::new(FixtureState::default()),
        }
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let inventory: CloudInventory = serde_json::from_str(&content)?;
        tracing::debug!(
            vendor = %inventory.vendor,
            account_id = %inventory.account_id,
            regions = inventory.resources.len(),
            "Loaded cloud fixture"
        );
        Ok(Self::new(inventory))
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Mutate the inventory, e.g. to simulate a resource disappearing
    pub async fn update(&self, f: impl FnOnce(&mut CloudInventory)) {
        let mut inventory = self.inventory.lock().await;
        f(&mut inventory);
    }

    /// Resources that a full listing omits but a lookup by id still returns
    pub async fn inject_recheck_survivors(&self, region: &str, survivors: RegionInventory) {
        let mut state = self.state.lock().await;
        state.survivors.insert(region.to_string(), survivors);
    }

    /// Make every later list call for `kind` fail
    pub async fn fail_listing(&self, kind: ResourceKind) {
        self.state.lock().await.failing.insert(kind);
    }

    pub async fn call_count(&self, kind: ResourceKind) -> usize {
        self.state
            .lock()
            .await
            .calls
            .get(&kind)
            .copied()
            .unwrap_or_default()
    }

    async fn record_call(&self, kind: ResourceKind) -> Result<()> {
        let mut state = self.state.lock().await;
        *state.calls.entry(kind).or_default() += 1;
        if state.failing.contains(&kind) {
            return Err(GatewayError::Unavailable(format!("list {kind} failed")));
        }
        Ok(())
    }

    async fn select<T, F>(&self, kind: ResourceKind, opt: &ListOption, pick: F) -> Result<Vec<T>>
    where
        T: CloudResource + Clone,
        F: Fn(&RegionInventory) -> Vec<T>,
    {
        self.record_call(kind).await?;
        let limit = self.max_ids_per_call(kind);

        let inventory = self.inventory.lock().await;
        let items: Vec<T> = inventory
            .resources
            .get(&opt.region)
            .map(&pick)
            .unwrap_or_default();

        if opt.cloud_ids.is_empty() {
            let page = match opt.page {
                Some(page) if page.limit > limit => {
                    return Err(GatewayError::InvalidInput(format!(
                        "{kind} page limit {} exceeds {limit}",
                        page.limit
                    )));
                }
                Some(page) => items.iter().skip(page.offset).take(page.limit).cloned().collect(),
                None => items,
            };
            return Ok(page);
        }

        if opt.cloud_ids.len() > limit {
            return Err(GatewayError::InvalidInput(format!(
                "{kind} lookup by {} ids exceeds {limit}",
                opt.cloud_ids.len()
            )));
        }
        let wanted: HashSet<&str> = opt.cloud_ids.iter().map(String::as_str).collect();
        let mut found: Vec<T> = items
            .iter()
            .filter(|i| wanted.contains(i.cloud_id()))
            .cloned()
            .collect();

        let state = self.state.lock().await;
        if let Some(survivors) = state.survivors.get(&opt.region) {
            let seen: HashSet<String> = found.iter().map(|i| i.cloud_id().to_string()).collect();
            found.extend(
                pick(survivors)
                    .into_iter()
                    .filter(|i| wanted.contains(i.cloud_id()) && !seen.contains(i.cloud_id())),
            );
        }
        Ok(found)
    }
}

#[async_trait]
impl CloudGateway for FixtureCloud {
    fn vendor(&self) -> Vendor {
        self.vendor
    }

    async fn list_sub_accounts(&self) -> Result<Vec<CloudSubAccount>> {
        self.record_call(ResourceKind::SubAccount).await?;
        Ok(self.inventory.lock().await.sub_accounts.clone())
    }

    async fn list_regions(&self) -> Result<Vec<CloudRegion>> {
        self.record_call(ResourceKind::Region).await?;
        Ok(self.inventory.lock().await.regions.clone())
    }

    async fn list_vpcs(&self, opt: &ListOption) -> Result<Vec<CloudVpc>> {
        self.select(ResourceKind::Vpc, opt, |inv| inv.vpcs.clone()).await
    }

    async fn list_subnets(&self, opt: &ListOption) -> Result<Vec<CloudSubnet>> {
        self.select(ResourceKind::Subnet, opt, |inv| inv.subnets.clone()).await
    }

    async fn list_security_groups(&self, opt: &ListOption) -> Result<Vec<CloudSecurityGroup>> {
        self.select(ResourceKind::SecurityGroup, opt, |inv| inv.security_groups.clone())
            .await
    }

    async fn list_security_group_rules(
        &self,
        region: &str,
        cloud_security_group_id: &str,
    ) -> Result<Vec<CloudSecurityGroupRule>> {
        self.record_call(ResourceKind::SecurityGroupRule).await?;
        let inventory = self.inventory.lock().await;
        Ok(inventory
            .resources
            .get(region)
            .and_then(|inv| inv.security_group_rules.get(cloud_security_group_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_argument_templates(&self, opt: &ListOption) -> Result<Vec<CloudArgumentTemplate>> {
        self.select(ResourceKind::ArgumentTemplate, opt, |inv| {
            inv.argument_templates.clone()
        })
        .await
    }

    async fn list_images(&self, opt: &ListOption) -> Result<Vec<CloudImage>> {
        self.select(ResourceKind::Image, opt, |inv| inv.images.clone()).await
    }

    async fn list_disks(&self, opt: &ListOption) -> Result<Vec<CloudDisk>> {
        self.select(ResourceKind::Disk, opt, |inv| inv.disks.clone()).await
    }

    async fn list_eips(&self, opt: &ListOption) -> Result<Vec<CloudEip>> {
        self.select(ResourceKind::Eip, opt, |inv| inv.eips.clone()).await
    }

    async fn list_eips_by_public_ip(&self, region: &str, public_ips: &[String]) -> Result<Vec<CloudEip>> {
        self.record_call(ResourceKind::Eip).await?;
        let limit = self.max_ids_per_call(ResourceKind::Eip);
        if public_ips.len() > limit {
            return Err(GatewayError::InvalidInput(format!(
                "eip lookup by {} public ips exceeds {limit}",
                public_ips.len()
            )));
        }
        let wanted: HashSet<&str> = public_ips.iter().map(String::as_str).collect();
        let inventory = self.inventory.lock().await;
        Ok(inventory
            .resources
            .get(region)
            .map(|inv| {
                inv.eips
                    .iter()
                    .filter(|e| wanted.contains(e.public_ip.as_str()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_cvms(&self, opt: &ListOption) -> Result<Vec<CloudCvm>> {
        self.select(ResourceKind::Cvm, opt, |inv| inv.cvms.clone()).await
    }

    async fn list_route_tables(&self, opt: &ListOption) -> Result<Vec<CloudRouteTable>> {
        self.select(ResourceKind::RouteTable, opt, |inv| inv.route_tables.clone())
            .await
    }

    async fn list_routes(&self, region: &str, cloud_route_table_id: &str) -> Result<Vec<CloudRoute>> {
        self.record_call(ResourceKind::Route).await?;
        let inventory = self.inventory.lock().await;
        Ok(inventory
            .resources
            .get(region)
            .and_then(|inv| inv.routes.get(cloud_route_table_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_load_balancers(&self, opt: &ListOption) -> Result<Vec<CloudLoadBalancer>> {
        self.select(ResourceKind::LoadBalancer, opt, |inv| inv.load_balancers.clone())
            .await
    }

    async fn list_listeners(&self, opt: &ListOption, cloud_lb_id: &str) -> Result<Vec<CloudListener>> {
        self.select(ResourceKind::Listener, opt, |inv| {
            inv.listeners
                .iter()
                .filter(|l| l.cloud_lb_id == cloud_lb_id)
                .cloned()
                .collect()
        })
        .await
    }

    async fn list_target_groups(&self, opt: &ListOption) -> Result<Vec<CloudTargetGroup>> {
        self.select(ResourceKind::TargetGroup, opt, |inv| inv.target_groups.clone())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory() -> CloudInventory {
        let mut inv = CloudInventory::new(Vendor::TCloud, "acc");
        let region = inv.region_mut("ap-guangzhou");
        for i in 0..5 {
            region.vpcs.push(CloudVpc {
                cloud_id: format!("vpc-{i}"),
                name: format!("vpc {i}"),
                region: "ap-guangzhou".into(),
                ..Default::default()
            });
        }
        inv
    }

    #[tokio::test]
    async fn test_list_by_ids_and_pages() {
        let cloud = FixtureCloud::new(inventory());

        let by_id = cloud
            .list_vpcs(
                &ListOption::region("ap-guangzhou")
                    .with_cloud_ids(vec!["vpc-1".into(), "vpc-9".into()]),
            )
            .await
            .unwrap();
        assert_eq!(by_id.len(), 1);

        let page = cloud
            .list_vpcs(&ListOption::region("ap-guangzhou").with_page(3, 100))
            .await
            .unwrap();
        assert_eq!(page.len(), 2);

        let other_region = cloud
            .list_vpcs(&ListOption::region("ap-shanghai"))
            .await
            .unwrap();
        assert!(other_region.is_empty());
    }

    #[tokio::test]
    async fn test_id_limit_enforced() {
        let cloud = FixtureCloud::new(inventory());
        let ids: Vec<String> = (0..101).map(|i| format!("vpc-{i}")).collect();
        let err = cloud
            .list_vpcs(&ListOption::region("ap-guangzhou").with_cloud_ids(ids))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_survivors_only_visible_by_id() {
        let cloud = FixtureCloud::new(CloudInventory::new(Vendor::TCloud, "acc"));
        let survivors = RegionInventory {
            vpcs: vec![CloudVpc {
                cloud_id: "vpc-ghost".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        cloud.inject_recheck_survivors("ap-guangzhou", survivors).await;

        let all = cloud
            .list_vpcs(&ListOption::region("ap-guangzhou"))
            .await
            .unwrap();
        assert!(all.is_empty());

        let by_id = cloud
            .list_vpcs(&ListOption::region("ap-guangzhou").with_cloud_ids(vec!["vpc-ghost".into()]))
            .await
            .unwrap();
        assert_eq!(by_id.len(), 1);
        assert_eq!(cloud.call_count(ResourceKind::Vpc).await, 2);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let cloud = FixtureCloud::new(inventory());
        cloud.fail_listing(ResourceKind::Vpc).await;
        let err = cloud
            .list_vpcs(&ListOption::region("ap-guangzhou"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Unavailable(_)));
    }
}
