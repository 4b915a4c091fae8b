use crate::vendor::{ResourceKind, Vendor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource types a CVM can be associated with through a relation table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CvmRelKind {
    SecurityGroup,
    Disk,
    Eip,
}

impl CvmRelKind {
    pub const ALL: [CvmRelKind; 3] = [CvmRelKind::SecurityGroup, CvmRelKind::Disk, CvmRelKind::Eip];

    pub fn resource_kind(&self) -> ResourceKind {
        match self {
            CvmRelKind::SecurityGroup => ResourceKind::SecurityGroup,
            CvmRelKind::Disk => ResourceKind::Disk,
            CvmRelKind::Eip => ResourceKind::Eip,
        }
    }
}

impl fmt::Display for CvmRelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.resource_kind().fmt(f)
    }
}

/// One CVM bound to one associated resource, both by local id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CvmRelation {
    #[serde(default)]
    pub id: String,
    pub vendor: Vendor,
    pub cvm_id: String,
    pub res_id: String,
}

/// Priority-ordered binding of a resource (e.g. a load balancer) to a
/// security group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SgCommonRel {
    #[serde(default)]
    pub id: String,
    pub vendor: Vendor,
    pub res_id: String,
    pub res_type: ResourceKind,
    pub security_group_id: String,
    pub priority: i64,
}

/// Binding of a listener rule to the target group that serves it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroupRuleRel {
    #[serde(default)]
    pub id: String,
    pub vendor: Vendor,
    pub target_group_id: String,
    #[serde(default)]
    pub cloud_target_group_id: String,
    pub lb_id: String,
    pub cloud_lb_id: String,
    pub lbl_id: String,
    pub cloud_lbl_id: String,
    pub listener_rule_id: String,
    pub cloud_listener_rule_id: String,
    pub listener_rule_type: super::RuleType,
    #[serde(default)]
    pub binding_status: String,
}
