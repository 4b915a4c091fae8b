use crate::vendor::Vendor;
use crate::{impl_cloud_resource, impl_store_resource};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudSubAccount {
    pub cloud_id: String,
    pub name: String,
    pub account_type: String,
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAccount {
    #[serde(default)]
    pub id: String,
    pub vendor: Vendor,
    pub account_id: String,
    pub cloud_id: String,
    pub name: String,
    #[serde(default)]
    pub account_type: String,
    #[serde(default)]
    pub memo: Option<String>,
}

/// Region as reported by a provider; its cloud id is the region code
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudRegion {
    pub cloud_id: String,
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    #[serde(default)]
    pub id: String,
    pub vendor: Vendor,
    pub account_id: String,
    pub cloud_id: String,
    pub name: String,
    #[serde(default)]
    pub status: String,
}

impl_cloud_resource!(CloudSubAccount, CloudRegion);
impl_store_resource!(SubAccount, Region);
