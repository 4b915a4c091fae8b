use crate::vendor::Vendor;
use crate::{impl_cloud_resource, impl_store_resource};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudImage {
    pub cloud_id: String,
    pub name: String,
    pub region: String,
    pub architecture: String,
    pub platform: String,
    pub state: String,
    pub image_type: String,
    pub os_type: String,
    pub image_size_gb: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    #[serde(default)]
    pub id: String,
    pub vendor: Vendor,
    pub account_id: String,
    pub cloud_id: String,
    pub name: String,
    pub region: String,
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub image_type: String,
    #[serde(default)]
    pub os_type: String,
    #[serde(default)]
    pub image_size_gb: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudDisk {
    pub cloud_id: String,
    pub name: String,
    pub region: String,
    pub zone: String,
    pub disk_size_gb: u64,
    pub disk_type: String,
    pub status: String,
    pub encrypted: bool,
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disk {
    #[serde(default)]
    pub id: String,
    pub vendor: Vendor,
    pub account_id: String,
    pub cloud_id: String,
    pub name: String,
    pub region: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub disk_size_gb: u64,
    #[serde(default)]
    pub disk_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default)]
    pub is_system_disk: bool,
    pub bk_biz_id: i64,
    #[serde(default)]
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudEip {
    pub cloud_id: String,
    pub name: Option<String>,
    pub region: String,
    pub public_ip: String,
    pub private_ip: Option<String>,
    pub status: String,
    pub bandwidth: Option<i64>,
    pub internet_charge_type: Option<String>,
    pub cloud_instance_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Eip {
    #[serde(default)]
    pub id: String,
    pub vendor: Vendor,
    pub account_id: String,
    pub cloud_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub region: String,
    pub public_ip: String,
    #[serde(default)]
    pub private_ip: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub bandwidth: Option<i64>,
    #[serde(default)]
    pub internet_charge_type: Option<String>,
    pub bk_biz_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "vendor", rename_all = "lowercase")]
pub enum CvmExtension {
    TCloud {
        instance_charge_type: String,
        cpu: i64,
        memory: i64,
        #[serde(default)]
        internet_max_bandwidth_out: Option<i64>,
    },
    Aws {
        cpu_core_count: i64,
        threads_per_core: i64,
        #[serde(default)]
        platform: String,
    },
    HuaWei {
        flavor_id: String,
        #[serde(default)]
        enterprise_project_id: String,
    },
    Azure {
        resource_group_name: String,
        vm_size: String,
    },
    Gcp {
        self_link: String,
        deletion_protection: bool,
    },
}

impl CvmExtension {
    pub fn vendor(&self) -> Vendor {
        match self {
            CvmExtension::TCloud { .. } => Vendor::TCloud,
            CvmExtension::Aws { .. } => Vendor::Aws,
            CvmExtension::HuaWei { .. } => Vendor::HuaWei,
            CvmExtension::Azure { .. } => Vendor::Azure,
            CvmExtension::Gcp { .. } => Vendor::Gcp,
        }
    }
}

/// A compute instance as listed by a provider, with the cloud ids of every
/// resource it is attached to
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudCvm {
    pub cloud_id: String,
    pub name: String,
    pub region: String,
    pub zone: String,
    pub cloud_vpc_ids: Vec<String>,
    pub cloud_subnet_ids: Vec<String>,
    pub cloud_image_id: Option<String>,
    pub cloud_security_group_ids: Vec<String>,
    pub cloud_system_disk_id: Option<String>,
    pub cloud_data_disk_ids: Vec<String>,
    pub private_ipv4_addresses: Vec<String>,
    pub public_ipv4_addresses: Vec<String>,
    pub private_ipv6_addresses: Vec<String>,
    pub public_ipv6_addresses: Vec<String>,
    pub status: String,
    pub machine_type: String,
    pub os_name: String,
    pub cloud_created_time: String,
    pub cloud_launched_time: String,
    pub cloud_expired_time: String,
    pub extension: Option<CvmExtension>,
}

impl CloudCvm {
    /// Cloud ids of every disk attached to the instance, system disk first
    pub fn cloud_disk_ids(&self) -> Vec<String> {
        self.cloud_system_disk_id
            .iter()
            .chain(self.cloud_data_disk_ids.iter())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cvm {
    #[serde(default)]
    pub id: String,
    pub vendor: Vendor,
    pub account_id: String,
    pub cloud_id: String,
    pub name: String,
    pub region: String,
    #[serde(default)]
    pub zone: String,
    pub bk_biz_id: i64,
    pub bk_cloud_id: i64,
    #[serde(default)]
    pub vpc_ids: Vec<String>,
    #[serde(default)]
    pub cloud_vpc_ids: Vec<String>,
    #[serde(default)]
    pub subnet_ids: Vec<String>,
    #[serde(default)]
    pub cloud_subnet_ids: Vec<String>,
    #[serde(default)]
    pub image_id: Option<String>,
    #[serde(default)]
    pub cloud_image_id: Option<String>,
    #[serde(default)]
    pub private_ipv4_addresses: Vec<String>,
    #[serde(default)]
    pub public_ipv4_addresses: Vec<String>,
    #[serde(default)]
    pub private_ipv6_addresses: Vec<String>,
    #[serde(default)]
    pub public_ipv6_addresses: Vec<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub machine_type: String,
    #[serde(default)]
    pub os_name: String,
    #[serde(default)]
    pub cloud_created_time: String,
    #[serde(default)]
    pub cloud_launched_time: String,
    #[serde(default)]
    pub cloud_expired_time: String,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub extension: Option<CvmExtension>,
}

impl_cloud_resource!(CloudImage, CloudDisk, CloudEip, CloudCvm);
impl_store_resource!(Image, Disk, Eip, Cvm);
