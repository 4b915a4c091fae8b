use crate::vendor::Vendor;
use crate::{impl_cloud_resource, impl_store_resource};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadBalancerType {
    #[default]
    Open,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SnatIp {
    pub cloud_subnet_id: String,
    pub ip: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "vendor", rename_all = "lowercase")]
pub enum LoadBalancerExtension {
    TCloud {
        #[serde(default)]
        sla_type: String,
        #[serde(default)]
        vip_isp: String,
        #[serde(default)]
        internet_charge_type: String,
        #[serde(default)]
        internet_max_bandwidth_out: i64,
        #[serde(default)]
        snat: bool,
        #[serde(default)]
        snat_pro: bool,
        #[serde(default)]
        snat_ips: Vec<SnatIp>,
        #[serde(default)]
        egress: String,
    },
    Aws {
        scheme: String,
        #[serde(default)]
        dns_name: String,
    },
    HuaWei {
        #[serde(default)]
        provisioning_status: String,
        #[serde(default)]
        operating_status: String,
    },
}

impl LoadBalancerExtension {
    pub fn vendor(&self) -> Vendor {
        match self {
            LoadBalancerExtension::TCloud { .. } => Vendor::TCloud,
            LoadBalancerExtension::Aws { .. } => Vendor::Aws,
            LoadBalancerExtension::HuaWei { .. } => Vendor::HuaWei,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudLoadBalancer {
    pub cloud_id: String,
    pub name: String,
    pub region: String,
    pub lb_type: LoadBalancerType,
    pub cloud_vpc_id: String,
    pub cloud_subnet_id: Option<String>,
    pub vips: Vec<String>,
    pub ipv6_address: Option<String>,
    pub zones: Vec<String>,
    pub domain: String,
    pub status: String,
    pub ip_version: String,
    /// Bound security groups in priority order
    pub cloud_security_group_ids: Vec<String>,
    pub delete_protect: bool,
    pub cloud_created_time: String,
    pub cloud_status_time: String,
    pub cloud_expired_time: String,
    pub extension: Option<LoadBalancerExtension>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancer {
    #[serde(default)]
    pub id: String,
    pub vendor: Vendor,
    pub account_id: String,
    pub cloud_id: String,
    pub name: String,
    pub region: String,
    pub bk_biz_id: i64,
    pub lb_type: LoadBalancerType,
    #[serde(default)]
    pub vpc_id: String,
    pub cloud_vpc_id: String,
    #[serde(default)]
    pub subnet_id: Option<String>,
    #[serde(default)]
    pub cloud_subnet_id: Option<String>,
    #[serde(default)]
    pub private_ipv4_addresses: Vec<String>,
    #[serde(default)]
    pub public_ipv4_addresses: Vec<String>,
    #[serde(default)]
    pub public_ipv6_addresses: Vec<String>,
    #[serde(default)]
    pub zones: Vec<String>,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub ip_version: String,
    #[serde(default)]
    pub delete_protect: bool,
    #[serde(default)]
    pub cloud_created_time: String,
    #[serde(default)]
    pub cloud_status_time: String,
    #[serde(default)]
    pub cloud_expired_time: String,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub extension: Option<LoadBalancerExtension>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    TcpSsl,
    Quic,
    Http,
    Https,
}

impl Protocol {
    pub fn is_layer7(&self) -> bool {
        matches!(self, Protocol::Http | Protocol::Https)
    }

    pub fn rule_type(&self) -> RuleType {
        if self.is_layer7() {
            RuleType::Layer7
        } else {
            RuleType::Layer4
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::TcpSsl => "TCP_SSL",
            Protocol::Quic => "QUIC",
            Protocol::Http => "HTTP",
            Protocol::Https => "HTTPS",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    #[default]
    Layer4,
    Layer7,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Certificate {
    pub ssl_mode: Option<String>,
    pub ca_cloud_id: Option<String>,
    pub cert_cloud_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheck {
    pub health_switch: Option<i64>,
    pub timeout: Option<i64>,
    pub interval_time: Option<i64>,
    pub health_num: Option<i64>,
    pub unhealth_num: Option<i64>,
    pub http_code: Option<i64>,
    pub http_check_path: Option<String>,
    pub http_check_domain: Option<String>,
    pub http_check_method: Option<String>,
    pub check_port: Option<i64>,
    pub check_type: Option<String>,
}

impl HealthCheck {
    /// Compare two health checks. Layer-7 rules cannot set a check port, so
    /// it is only compared for layer-4.
    pub fn differs(cloud: Option<&HealthCheck>, stored: Option<&HealthCheck>, layer7: bool) -> bool {
        match (cloud, stored) {
            (None, None) => false,
            (Some(c), Some(s)) => {
                let port_changed = !layer7 && c.check_port != s.check_port;
                let mut c = c.clone();
                c.check_port = s.check_port;
                port_changed || c != *s
            }
            _ => true,
        }
    }
}

/// A backend bound to a listener or rule. Its cloud id is the instance id;
/// the same instance may be registered on several ports.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudBackend {
    pub cloud_id: String,
    pub inst_type: String,
    pub port: i64,
    pub weight: Option<i64>,
    pub private_ip_addresses: Vec<String>,
    pub public_ip_addresses: Vec<String>,
    pub inst_name: String,
    pub zone: String,
}

impl CloudBackend {
    /// Identity of the backend within its target group: `<instance>-<port>`
    pub fn target_key(&self) -> String {
        format!("{}-{}", self.cloud_id, self.port)
    }
}

/// Layer-7 forwarding rule (location) of a listener
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudUrlRule {
    pub cloud_id: String,
    pub domain: String,
    pub url: String,
    pub scheduler: String,
    pub session_type: String,
    pub session_expire: i64,
    pub health_check: Option<HealthCheck>,
    pub certificate: Option<Certificate>,
    pub default_server: bool,
    pub backends: Vec<CloudBackend>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudListener {
    pub cloud_id: String,
    pub cloud_lb_id: String,
    pub name: String,
    pub protocol: Protocol,
    pub port: i64,
    pub end_port: Option<i64>,
    pub scheduler: String,
    pub session_type: String,
    pub session_expire: i64,
    pub sni_switch: bool,
    pub certificate: Option<Certificate>,
    pub health_check: Option<HealthCheck>,
    /// Layer-7 rules
    pub rules: Vec<CloudUrlRule>,
    /// Layer-4 backends
    pub backends: Vec<CloudBackend>,
}

impl CloudListener {
    /// Default domain of an HTTP(S) listener, taken from its default-server rule
    pub fn default_domain(&self) -> String {
        self.rules
            .iter()
            .find(|r| r.default_server)
            .map(|r| r.domain.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listener {
    #[serde(default)]
    pub id: String,
    pub vendor: Vendor,
    pub account_id: String,
    pub region: String,
    pub cloud_id: String,
    pub name: String,
    pub bk_biz_id: i64,
    pub lb_id: String,
    pub cloud_lb_id: String,
    pub protocol: Protocol,
    pub port: i64,
    #[serde(default)]
    pub end_port: Option<i64>,
    #[serde(default)]
    pub default_domain: String,
    #[serde(default)]
    pub sni_switch: bool,
    #[serde(default)]
    pub certificate: Option<Certificate>,
    #[serde(default)]
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub id: String,
    pub vendor: Vendor,
    pub account_id: String,
    pub region: String,
    pub cloud_id: String,
    #[serde(default)]
    pub name: String,
    pub rule_type: RuleType,
    pub lb_id: String,
    pub cloud_lb_id: String,
    pub lbl_id: String,
    pub cloud_lbl_id: String,
    #[serde(default)]
    pub target_group_id: String,
    #[serde(default)]
    pub cloud_target_group_id: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub scheduler: String,
    #[serde(default)]
    pub session_type: String,
    #[serde(default)]
    pub session_expire: i64,
    #[serde(default)]
    pub health_check: Option<HealthCheck>,
    #[serde(default)]
    pub certificate: Option<Certificate>,
    #[serde(default)]
    pub memo: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetGroupType {
    /// Created and owned locally
    #[default]
    Local,
    /// Mirrors a provider-side target group
    Cloud,
    /// Materialized for backends bound directly to a listener or rule
    CloudImplicit,
}

impl TargetGroupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetGroupType::Local => "local",
            TargetGroupType::Cloud => "cloud",
            TargetGroupType::CloudImplicit => "cloud-implicit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudTargetGroup {
    pub cloud_id: String,
    pub name: String,
    pub region: String,
    pub cloud_vpc_id: String,
    pub port: i64,
    pub protocol: Option<Protocol>,
    pub backends: Vec<CloudBackend>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetGroup {
    #[serde(default)]
    pub id: String,
    pub vendor: Vendor,
    pub account_id: String,
    /// Empty for target groups that have no provider-side counterpart
    #[serde(default)]
    pub cloud_id: String,
    pub name: String,
    pub region: String,
    pub bk_biz_id: i64,
    #[serde(default)]
    pub protocol: Option<Protocol>,
    #[serde(default)]
    pub port: i64,
    #[serde(default)]
    pub vpc_id: String,
    #[serde(default)]
    pub cloud_vpc_id: String,
    pub target_group_type: TargetGroupType,
    #[serde(default)]
    pub weight: Option<i64>,
    #[serde(default)]
    pub health_check: Option<HealthCheck>,
    #[serde(default)]
    pub memo: Option<String>,
}

/// Backend row of a target group. Its cloud id is
/// [`CloudBackend::target_key`]; the instance id is kept in `cloud_inst_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    #[serde(default)]
    pub id: String,
    pub vendor: Vendor,
    pub account_id: String,
    pub region: String,
    pub target_group_id: String,
    #[serde(default)]
    pub cloud_target_group_id: String,
    pub cloud_id: String,
    #[serde(default)]
    pub cloud_inst_id: String,
    #[serde(default)]
    pub inst_type: String,
    pub port: i64,
    #[serde(default)]
    pub weight: Option<i64>,
    #[serde(default)]
    pub private_ip_addresses: Vec<String>,
    #[serde(default)]
    pub public_ip_addresses: Vec<String>,
    #[serde(default)]
    pub inst_name: String,
    #[serde(default)]
    pub zone: String,
}

impl_cloud_resource!(
    CloudLoadBalancer,
    CloudListener,
    CloudUrlRule,
    CloudTargetGroup
);
impl_store_resource!(LoadBalancer, Listener, Rule, TargetGroup, Target);
