use super::Tags;
use crate::vendor::Vendor;
use crate::{impl_cloud_resource, impl_store_resource};
use serde::{Deserialize, Serialize};

/// Vendor specific security group attributes. Gcp models firewalls
/// differently and has no variant here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "vendor", rename_all = "lowercase")]
pub enum SecurityGroupExtension {
    TCloud {
        #[serde(default)]
        cloud_project_id: Option<String>,
    },
    Aws {
        cloud_vpc_id: String,
        cloud_owner_id: String,
    },
    HuaWei {
        #[serde(default)]
        cloud_project_id: String,
        #[serde(default)]
        cloud_enterprise_project_id: String,
    },
    Azure {
        resource_group_name: String,
        #[serde(default)]
        etag: Option<String>,
        #[serde(default)]
        flush_connection: Option<bool>,
    },
}

impl SecurityGroupExtension {
    pub fn vendor(&self) -> Vendor {
        match self {
            SecurityGroupExtension::TCloud { .. } => Vendor::TCloud,
            SecurityGroupExtension::Aws { .. } => Vendor::Aws,
            SecurityGroupExtension::HuaWei { .. } => Vendor::HuaWei,
            SecurityGroupExtension::Azure { .. } => Vendor::Azure,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudSecurityGroup {
    pub cloud_id: String,
    pub name: String,
    pub region: String,
    pub memo: Option<String>,
    pub tags: Tags,
    pub cloud_created_time: String,
    pub cloud_update_time: String,
    pub extension: Option<SecurityGroupExtension>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroup {
    #[serde(default)]
    pub id: String,
    pub vendor: Vendor,
    pub account_id: String,
    pub cloud_id: String,
    pub name: String,
    pub region: String,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub tags: Tags,
    pub bk_biz_id: i64,
    #[serde(default)]
    pub cloud_created_time: String,
    #[serde(default)]
    pub cloud_update_time: String,
    #[serde(default)]
    pub extension: Option<SecurityGroupExtension>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleDirection {
    #[default]
    Ingress,
    Egress,
}

/// A security group policy. Its cloud id is the provider policy id; providers
/// that only expose a positional index report `<direction>-<index>` instead.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudSecurityGroupRule {
    pub cloud_id: String,
    pub direction: RuleDirection,
    pub cloud_policy_index: i64,
    pub protocol: Option<String>,
    pub port: Option<String>,
    pub ipv4_cidr: Option<String>,
    pub ipv6_cidr: Option<String>,
    pub cloud_target_security_group_id: Option<String>,
    /// Referenced address template (argument template) cloud id
    pub cloud_address_id: Option<String>,
    pub cloud_address_group_id: Option<String>,
    pub cloud_service_id: Option<String>,
    pub cloud_service_group_id: Option<String>,
    pub action: String,
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroupRule {
    #[serde(default)]
    pub id: String,
    pub vendor: Vendor,
    pub account_id: String,
    pub region: String,
    pub cloud_id: String,
    pub security_group_id: String,
    pub cloud_security_group_id: String,
    pub direction: RuleDirection,
    pub cloud_policy_index: i64,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default)]
    pub ipv4_cidr: Option<String>,
    #[serde(default)]
    pub ipv6_cidr: Option<String>,
    #[serde(default)]
    pub cloud_target_security_group_id: Option<String>,
    #[serde(default)]
    pub address_id: Option<String>,
    #[serde(default)]
    pub cloud_address_id: Option<String>,
    #[serde(default)]
    pub address_group_id: Option<String>,
    #[serde(default)]
    pub cloud_address_group_id: Option<String>,
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub cloud_service_id: Option<String>,
    #[serde(default)]
    pub service_group_id: Option<String>,
    #[serde(default)]
    pub cloud_service_group_id: Option<String>,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub memo: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    #[default]
    Address,
    AddressGroup,
    Service,
    ServiceGroup,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateEntry {
    pub address: String,
    pub description: String,
}

/// Reusable address/service template referenced by security group rules
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudArgumentTemplate {
    pub cloud_id: String,
    pub name: String,
    pub region: String,
    pub template_type: TemplateType,
    pub templates: Vec<TemplateEntry>,
    /// Member template cloud ids for the group types
    pub group_templates: Vec<String>,
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentTemplate {
    #[serde(default)]
    pub id: String,
    pub vendor: Vendor,
    pub account_id: String,
    pub cloud_id: String,
    pub name: String,
    pub region: String,
    pub bk_biz_id: i64,
    pub template_type: TemplateType,
    #[serde(default)]
    pub templates: Vec<TemplateEntry>,
    #[serde(default)]
    pub group_templates: Vec<String>,
    #[serde(default)]
    pub memo: Option<String>,
}

impl_cloud_resource!(CloudSecurityGroup, CloudSecurityGroupRule, CloudArgumentTemplate);
impl_store_resource!(SecurityGroup, SecurityGroupRule, ArgumentTemplate);
