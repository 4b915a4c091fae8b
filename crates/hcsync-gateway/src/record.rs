//! Row access for the generic store tables

use hcsync_core::model::{
    ArgumentTemplate, Cvm, CvmRelation, Disk, Eip, Image, Listener, LoadBalancer, Region, Route,
    RouteTable, Rule, RuleType, SecurityGroup, SecurityGroupRule, SgCommonRel, SubAccount, Subnet,
    Target, TargetGroup, TargetGroupRuleRel, TargetGroupType, Vpc,
};
use hcsync_core::{ResourceKind, Vendor};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::borrow::Cow;

/// A row type that can live in a store table
pub trait Record: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Table name, used in errors and logs
    const TABLE: &'static str;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    /// Value of a filterable field rendered as a string
    fn field(&self, name: &str) -> Option<Cow<'_, str>>;

    /// Key that must be unique within the table, if any
    fn unique_key(&self) -> Option<String>;
}

/// Rendering of a field value for filter comparison
pub trait FieldValue {
    fn as_field(&self) -> Option<Cow<'_, str>>;
}

impl FieldValue for String {
    fn as_field(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self.as_str()))
    }
}

impl FieldValue for Option<String> {
    fn as_field(&self) -> Option<Cow<'_, str>> {
        self.as_deref().map(Cow::Borrowed)
    }
}

impl FieldValue for i64 {
    fn as_field(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Owned(self.to_string()))
    }
}

impl FieldValue for Vendor {
    fn as_field(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self.as_str()))
    }
}

impl FieldValue for ResourceKind {
    fn as_field(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self.as_str()))
    }
}

impl FieldValue for TargetGroupType {
    fn as_field(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self.as_str()))
    }
}

impl FieldValue for RuleType {
    fn as_field(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(match self {
            RuleType::Layer4 => "layer4",
            RuleType::Layer7 => "layer7",
        }))
    }
}

macro_rules! record {
    (
        $ty:ty, $table:literal,
        unique: |$r:ident| $unique:expr,
        fields: [$($field:ident),* $(,)?]
    ) => {
        impl Record for $ty {
            const TABLE: &'static str = $table;

            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }

            fn field(&self, name: &str) -> Option<Cow<'_, str>> {
                match name {
                    "id" => self.id.as_field(),
                    $(stringify!($field) => self.$field.as_field(),)*
                    _ => None,
                }
            }

            fn unique_key(&self) -> Option<String> {
                let $r = self;
                $unique
            }
        }
    };
}

/// Cloud ids are unique per (account, region); rows without one are exempt
fn scoped_cloud_key(account_id: &str, region: &str, cloud_id: &str) -> Option<String> {
    if cloud_id.is_empty() {
        None
    } else {
        Some(format!("{account_id}/{region}/{cloud_id}"))
    }
}

record!(SubAccount, "sub_account",
    unique: |r| Some(format!("{}/{}", r.account_id, r.cloud_id)),
    fields: [cloud_id, vendor, account_id, name]);

record!(Region, "region",
    unique: |r| Some(format!("{}/{}/{}", r.vendor, r.account_id, r.cloud_id)),
    fields: [cloud_id, vendor, account_id, name, status]);

record!(Vpc, "vpc",
    unique: |r| scoped_cloud_key(&r.account_id, &r.region, &r.cloud_id),
    fields: [cloud_id, vendor, account_id, region, name, bk_biz_id]);

record!(Subnet, "subnet",
    unique: |r| scoped_cloud_key(&r.account_id, &r.region, &r.cloud_id),
    fields: [cloud_id, vendor, account_id, region, vpc_id, cloud_vpc_id, name]);

record!(SecurityGroup, "security_group",
    unique: |r| scoped_cloud_key(&r.account_id, &r.region, &r.cloud_id),
    fields: [cloud_id, vendor, account_id, region, name]);

record!(SecurityGroupRule, "security_group_rule",
    unique: |r| Some(format!("{}/{}", r.security_group_id, r.cloud_id)),
    fields: [cloud_id, vendor, account_id, region, security_group_id, cloud_security_group_id]);

record!(ArgumentTemplate, "argument_template",
    unique: |r| scoped_cloud_key(&r.account_id, &r.region, &r.cloud_id),
    fields: [cloud_id, vendor, account_id, region, name]);

record!(Image, "image",
    unique: |r| scoped_cloud_key(&r.account_id, &r.region, &r.cloud_id),
    fields: [cloud_id, vendor, account_id, region, name]);

record!(Disk, "disk",
    unique: |r| scoped_cloud_key(&r.account_id, &r.region, &r.cloud_id),
    fields: [cloud_id, vendor, account_id, region, zone, name]);

record!(Eip, "eip",
    unique: |r| scoped_cloud_key(&r.account_id, &r.region, &r.cloud_id),
    fields: [cloud_id, vendor, account_id, region, public_ip]);

record!(Cvm, "cvm",
    unique: |r| scoped_cloud_key(&r.account_id, &r.region, &r.cloud_id),
    fields: [cloud_id, vendor, account_id, region, zone, name]);

record!(RouteTable, "route_table",
    unique: |r| scoped_cloud_key(&r.account_id, &r.region, &r.cloud_id),
    fields: [cloud_id, vendor, account_id, region, vpc_id, cloud_vpc_id]);

record!(Route, "route",
    unique: |r| Some(format!("{}/{}", r.route_table_id, r.cloud_id)),
    fields: [cloud_id, vendor, account_id, region, route_table_id, cloud_route_table_id]);

record!(LoadBalancer, "load_balancer",
    unique: |r| scoped_cloud_key(&r.account_id, &r.region, &r.cloud_id),
    fields: [cloud_id, vendor, account_id, region, name, vpc_id]);

record!(Listener, "listener",
    unique: |r| scoped_cloud_key(&r.account_id, &r.region, &r.cloud_id),
    fields: [cloud_id, vendor, account_id, region, lb_id, cloud_lb_id]);

record!(Rule, "listener_rule",
    unique: |r| Some(format!("{}/{}", r.lbl_id, r.cloud_id)),
    fields: [cloud_id, vendor, account_id, region, rule_type, lb_id, cloud_lb_id, lbl_id,
        cloud_lbl_id, target_group_id]);

record!(TargetGroup, "target_group",
    unique: |r| scoped_cloud_key(&r.account_id, &r.region, &r.cloud_id),
    fields: [cloud_id, vendor, account_id, region, name, target_group_type, vpc_id]);

record!(Target, "target",
    unique: |r| Some(format!("{}/{}", r.target_group_id, r.cloud_id)),
    fields: [cloud_id, vendor, account_id, region, target_group_id, cloud_target_group_id,
        cloud_inst_id]);

record!(CvmRelation, "cvm_relation",
    unique: |r| Some(format!("{}/{}", r.cvm_id, r.res_id)),
    fields: [vendor, cvm_id, res_id]);

record!(SgCommonRel, "security_group_common_rel",
    unique: |r| Some(format!("{}/{}/{}", r.res_type, r.res_id, r.security_group_id)),
    fields: [vendor, res_id, res_type, security_group_id, priority]);

record!(TargetGroupRuleRel, "target_group_listener_rule_rel",
    unique: |r| Some(r.listener_rule_id.clone()),
    fields: [vendor, target_group_id, cloud_target_group_id, lb_id, lbl_id, listener_rule_id,
        cloud_listener_rule_id, listener_rule_type]);

#[cfg(test)]
mod tests {
    use super::*;

    fn vpc(cloud_id: &str) -> Vpc {
        Vpc {
            id: "00000001".into(),
            vendor: Vendor::TCloud,
            account_id: "acc".into(),
            cloud_id: cloud_id.into(),
            name: "main".into(),
            region: "ap-guangzhou".into(),
            memo: None,
            cidrs: Vec::new(),
            bk_biz_id: -1,
            bk_cloud_id: -1,
            extension: None,
        }
    }

    #[test]
    fn test_field_lookup() {
        let v = vpc("vpc-1");
        assert_eq!(v.field("cloud_id").as_deref(), Some("vpc-1"));
        assert_eq!(v.field("vendor").as_deref(), Some("tcloud"));
        assert_eq!(v.field("bk_biz_id").as_deref(), Some("-1"));
        assert_eq!(v.field("id").as_deref(), Some("00000001"));
        assert!(v.field("unknown").is_none());
    }

    #[test]
    fn test_unique_key_is_scoped() {
        assert_eq!(
            vpc("vpc-1").unique_key().as_deref(),
            Some("acc/ap-guangzhou/vpc-1")
        );
        assert!(vpc("").unique_key().is_none());
    }
}
