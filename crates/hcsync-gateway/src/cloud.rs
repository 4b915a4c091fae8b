//! Cloud gateway
//!
//! Read-only view of one vendor account. Every list call is scoped to a
//! region and can be narrowed to an explicit set of cloud ids; providers cap
//! the size of that set per call, see [`CloudGateway::max_ids_per_call`].

use crate::error::Result;
use async_trait::async_trait;
use hcsync_core::limits::{CLOUD_RESOURCE_SYNC_MAX_LIMIT, LB_DESCRIBE_MAX};
use hcsync_core::model::{
    CloudArgumentTemplate, CloudCvm, CloudDisk, CloudEip, CloudImage, CloudListener,
    CloudLoadBalancer, CloudRegion, CloudRoute, CloudRouteTable, CloudSecurityGroup,
    CloudSecurityGroupRule, CloudSubAccount, CloudSubnet, CloudTargetGroup, CloudVpc,
};
use hcsync_core::{ResourceKind, Vendor};

/// Offset paging for unfiltered listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloudPage {
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOption {
    pub region: String,
    /// When non-empty only these resources are returned and `page` is ignored
    pub cloud_ids: Vec<String>,
    pub page: Option<CloudPage>,
}

impl ListOption {
    pub fn region(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ..Default::default()
        }
    }

    pub fn with_cloud_ids(mut self, cloud_ids: Vec<String>) -> Self {
        self.cloud_ids = cloud_ids;
        self
    }

    pub fn with_page(mut self, offset: usize, limit: usize) -> Self {
        self.page = Some(CloudPage { offset, limit });
        self
    }
}

#[async_trait]
pub trait CloudGateway: Send + Sync {
    fn vendor(&self) -> Vendor;

    /// Largest cloud-id set (or page) a single list call accepts for `kind`
    fn max_ids_per_call(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::Listener => LB_DESCRIBE_MAX,
            _ => CLOUD_RESOURCE_SYNC_MAX_LIMIT,
        }
    }

    async fn list_sub_accounts(&self) -> Result<Vec<CloudSubAccount>>;

    async fn list_regions(&self) -> Result<Vec<CloudRegion>>;

    async fn list_vpcs(&self, opt: &ListOption) -> Result<Vec<CloudVpc>>;

    async fn list_subnets(&self, opt: &ListOption) -> Result<Vec<CloudSubnet>>;

    async fn list_security_groups(&self, opt: &ListOption) -> Result<Vec<CloudSecurityGroup>>;

    /// All policies of one security group
    async fn list_security_group_rules(
        &self,
        region: &str,
        cloud_security_group_id: &str,
    ) -> Result<Vec<CloudSecurityGroupRule>>;

    async fn list_argument_templates(&self, opt: &ListOption) -> Result<Vec<CloudArgumentTemplate>>;

    async fn list_images(&self, opt: &ListOption) -> Result<Vec<CloudImage>>;

    async fn list_disks(&self, opt: &ListOption) -> Result<Vec<CloudDisk>>;

    async fn list_eips(&self, opt: &ListOption) -> Result<Vec<CloudEip>>;

    /// EIPs holding any of `public_ips`
    async fn list_eips_by_public_ip(&self, region: &str, public_ips: &[String]) -> Result<Vec<CloudEip>>;

    async fn list_cvms(&self, opt: &ListOption) -> Result<Vec<CloudCvm>>;

    async fn list_route_tables(&self, opt: &ListOption) -> Result<Vec<CloudRouteTable>>;

    /// All routes of one route table
    async fn list_routes(&self, region: &str, cloud_route_table_id: &str) -> Result<Vec<CloudRoute>>;

    async fn list_load_balancers(&self, opt: &ListOption) -> Result<Vec<CloudLoadBalancer>>;

    /// Listeners of one load balancer, with their rules and bound backends
    async fn list_listeners(&self, opt: &ListOption, cloud_lb_id: &str) -> Result<Vec<CloudListener>>;

    /// Provider-side target groups with their backends
    async fn list_target_groups(&self, opt: &ListOption) -> Result<Vec<CloudTargetGroup>>;
}
