use crate::vendor::Vendor;
use crate::{impl_cloud_resource, impl_store_resource};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    #[default]
    Ipv4,
    Ipv6,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Cidr {
    pub ip_version: IpVersion,
    pub cidr: String,
    /// Provider specific category, e.g. assigned/associated
    pub category: String,
}

/// Vendor specific VPC attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "vendor", rename_all = "lowercase")]
pub enum VpcExtension {
    TCloud {
        is_default: bool,
        enable_multicast: bool,
        #[serde(default)]
        dns_server_set: Vec<String>,
        #[serde(default)]
        domain_name: String,
    },
    Aws {
        state: String,
        instance_tenancy: String,
        is_default: bool,
    },
    HuaWei {
        status: String,
        #[serde(default)]
        enterprise_project_id: String,
    },
    Azure {
        resource_group_name: String,
        #[serde(default)]
        dns_servers: Vec<String>,
    },
    Gcp {
        self_link: String,
        auto_create_subnetworks: bool,
        routing_mode: String,
        #[serde(default)]
        mtu: i64,
    },
}

impl VpcExtension {
    pub fn vendor(&self) -> Vendor {
        match self {
            VpcExtension::TCloud { .. } => Vendor::TCloud,
            VpcExtension::Aws { .. } => Vendor::Aws,
            VpcExtension::HuaWei { .. } => Vendor::HuaWei,
            VpcExtension::Azure { .. } => Vendor::Azure,
            VpcExtension::Gcp { .. } => Vendor::Gcp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudVpc {
    pub cloud_id: String,
    pub name: String,
    pub region: String,
    pub memo: Option<String>,
    pub cidrs: Vec<Cidr>,
    pub extension: Option<VpcExtension>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vpc {
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
    pub cidrs: Vec<Cidr>,
    pub bk_biz_id: i64,
    /// Management-network id the VPC is mapped to; -1 when unmapped
    pub bk_cloud_id: i64,
    #[serde(default)]
    pub extension: Option<VpcExtension>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "vendor", rename_all = "lowercase")]
pub enum SubnetExtension {
    TCloud {
        is_default: bool,
        #[serde(default)]
        network_acl_id: String,
    },
    Aws {
        state: String,
        available_ip_address_count: i64,
        map_public_ip_on_launch: bool,
    },
    HuaWei {
        status: String,
        dhcp_enable: bool,
        gateway_ip: String,
    },
    Azure {
        resource_group_name: String,
        #[serde(default)]
        cloud_security_group_id: String,
    },
    Gcp {
        self_link: String,
        private_ip_google_access: bool,
    },
}

impl SubnetExtension {
    pub fn vendor(&self) -> Vendor {
        match self {
            SubnetExtension::TCloud { .. } => Vendor::TCloud,
            SubnetExtension::Aws { .. } => Vendor::Aws,
            SubnetExtension::HuaWei { .. } => Vendor::HuaWei,
            SubnetExtension::Azure { .. } => Vendor::Azure,
            SubnetExtension::Gcp { .. } => Vendor::Gcp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudSubnet {
    pub cloud_id: String,
    pub cloud_vpc_id: String,
    pub name: String,
    pub region: String,
    pub zone: String,
    pub ipv4_cidr: Vec<String>,
    pub ipv6_cidr: Vec<String>,
    pub memo: Option<String>,
    pub extension: Option<SubnetExtension>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subnet {
    #[serde(default)]
    pub id: String,
    pub vendor: Vendor,
    pub account_id: String,
    pub cloud_id: String,
    pub vpc_id: String,
    pub cloud_vpc_id: String,
    pub name: String,
    pub region: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub ipv4_cidr: Vec<String>,
    #[serde(default)]
    pub ipv6_cidr: Vec<String>,
    #[serde(default)]
    pub memo: Option<String>,
    pub bk_biz_id: i64,
    #[serde(default)]
    pub extension: Option<SubnetExtension>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudRouteTable {
    pub cloud_id: String,
    pub cloud_vpc_id: String,
    pub name: String,
    pub region: String,
    pub main: bool,
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteTable {
    #[serde(default)]
    pub id: String,
    pub vendor: Vendor,
    pub account_id: String,
    pub cloud_id: String,
    pub vpc_id: String,
    pub cloud_vpc_id: String,
    pub name: String,
    pub region: String,
    #[serde(default)]
    pub main: bool,
    #[serde(default)]
    pub memo: Option<String>,
    pub bk_biz_id: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudRoute {
    pub cloud_id: String,
    pub cloud_route_table_id: String,
    pub destination_cidr_block: String,
    pub gateway_type: String,
    pub cloud_gateway_id: String,
    pub enabled: bool,
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(default)]
    pub id: String,
    pub vendor: Vendor,
    pub account_id: String,
    pub region: String,
    pub cloud_id: String,
    pub route_table_id: String,
    pub cloud_route_table_id: String,
    pub destination_cidr_block: String,
    #[serde(default)]
    pub gateway_type: String,
    #[serde(default)]
    pub cloud_gateway_id: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub memo: Option<String>,
}

impl_cloud_resource!(CloudVpc, CloudSubnet, CloudRouteTable, CloudRoute);
impl_store_resource!(Vpc, Subnet, RouteTable, Route);
