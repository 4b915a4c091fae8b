//! Resource model
//!
//! Every resource type has a cloud-side shape (`Cloud*`, what a provider
//! listing returns) and a store-side shape (the persisted row). Store rows
//! carry the local `id` assigned by the store; a row submitted for creation
//! has an empty `id`.

pub mod account;
pub mod compute;
pub mod load_balancer;
pub mod network;
pub mod relation;
pub mod security_group;

pub use account::{CloudRegion, CloudSubAccount, Region, SubAccount};
pub use compute::{
    CloudCvm, CloudDisk, CloudEip, CloudImage, Cvm, CvmExtension, Disk, Eip, Image,
};
pub use load_balancer::{
    Certificate, CloudBackend, CloudListener, CloudLoadBalancer, CloudTargetGroup, CloudUrlRule,
    HealthCheck, Listener, LoadBalancer, LoadBalancerExtension, LoadBalancerType, Protocol, Rule,
    RuleType, SnatIp, Target, TargetGroup, TargetGroupType,
};
pub use network::{
    Cidr, CloudRoute, CloudRouteTable, CloudSubnet, CloudVpc, IpVersion, Route, RouteTable,
    Subnet, SubnetExtension, Vpc, VpcExtension,
};
pub use relation::{CvmRelKind, CvmRelation, SgCommonRel, TargetGroupRuleRel};
pub use security_group::{
    ArgumentTemplate, CloudArgumentTemplate, CloudSecurityGroup, CloudSecurityGroupRule,
    RuleDirection, SecurityGroup, SecurityGroupExtension, SecurityGroupRule, TemplateEntry,
    TemplateType,
};

use std::collections::BTreeMap;

/// Free-form key/value tags
pub type Tags = BTreeMap<String, String>;
