//! Vendors and resource kinds

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cloud vendor a resource belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    TCloud,
    Aws,
    HuaWei,
    Azure,
    Gcp,
}

impl Vendor {
    pub const ALL: [Vendor; 5] = [
        Vendor::TCloud,
        Vendor::Aws,
        Vendor::HuaWei,
        Vendor::Azure,
        Vendor::Gcp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::TCloud => "tcloud",
            Vendor::Aws => "aws",
            Vendor::HuaWei => "huawei",
            Vendor::Azure => "azure",
            Vendor::Gcp => "gcp",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vendor {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Vendor::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::UnknownVendor(s.to_string()))
    }
}

/// Resource type handled by a sync orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    SubAccount,
    Region,
    Vpc,
    Subnet,
    SecurityGroup,
    SecurityGroupRule,
    ArgumentTemplate,
    Image,
    Disk,
    Eip,
    Cvm,
    RouteTable,
    Route,
    LoadBalancer,
    Listener,
    Rule,
    TargetGroup,
    Target,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 18] = [
        ResourceKind::SubAccount,
        ResourceKind::Region,
        ResourceKind::Vpc,
        ResourceKind::Subnet,
        ResourceKind::SecurityGroup,
        ResourceKind::SecurityGroupRule,
        ResourceKind::ArgumentTemplate,
        ResourceKind::Image,
        ResourceKind::Disk,
        ResourceKind::Eip,
        ResourceKind::Cvm,
        ResourceKind::RouteTable,
        ResourceKind::Route,
        ResourceKind::LoadBalancer,
        ResourceKind::Listener,
        ResourceKind::Rule,
        ResourceKind::TargetGroup,
        ResourceKind::Target,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::SubAccount => "sub_account",
            ResourceKind::Region => "region",
            ResourceKind::Vpc => "vpc",
            ResourceKind::Subnet => "subnet",
            ResourceKind::SecurityGroup => "security_group",
            ResourceKind::SecurityGroupRule => "security_group_rule",
            ResourceKind::ArgumentTemplate => "argument_template",
            ResourceKind::Image => "image",
            ResourceKind::Disk => "disk",
            ResourceKind::Eip => "eip",
            ResourceKind::Cvm => "cvm",
            ResourceKind::RouteTable => "route_table",
            ResourceKind::Route => "route",
            ResourceKind::LoadBalancer => "load_balancer",
            ResourceKind::Listener => "listener",
            ResourceKind::Rule => "rule",
            ResourceKind::TargetGroup => "target_group",
            ResourceKind::Target => "target",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.replace('-', "_");
        ResourceKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| CoreError::UnknownResourceKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_parse() {
        assert_eq!("tcloud".parse::<Vendor>().unwrap(), Vendor::TCloud);
        assert_eq!("HuaWei".parse::<Vendor>().unwrap(), Vendor::HuaWei);
        assert!("openstack".parse::<Vendor>().is_err());
    }

    #[test]
    fn test_vendor_serde_lowercase() {
        let json = serde_json::to_string(&Vendor::HuaWei).unwrap();
        assert_eq!(json, "\"huawei\"");
    }

    #[test]
    fn test_resource_kind_parse_accepts_dashes() {
        assert_eq!(
            "security-group".parse::<ResourceKind>().unwrap(),
            ResourceKind::SecurityGroup
        );
        assert_eq!(
            "load_balancer".parse::<ResourceKind>().unwrap(),
            ResourceKind::LoadBalancer
        );
    }

    #[test]
    fn test_resource_kind_display_roundtrip() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.to_string().parse::<ResourceKind>().unwrap(), kind);
        }
    }
}
