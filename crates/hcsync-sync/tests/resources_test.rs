mod common;

use common::*;
use hcsync_core::model::{
    CloudArgumentTemplate, CloudRegion, CloudRoute, CloudRouteTable, CloudSecurityGroupRule,
    CloudSubAccount, RuleDirection,
};
use hcsync_core::{ResourceKind, Vendor};
use hcsync_gateway::{CloudInventory, Expression, RegionInventory, StoreGateway};
use hcsync_sync::{SyncDiskOption, SyncError};
use std::collections::{BTreeMap, HashSet};

fn sg_rule(cloud_id: &str, index: i64, address: Option<&str>) -> CloudSecurityGroupRule {
    CloudSecurityGroupRule {
        cloud_id: cloud_id.into(),
        direction: RuleDirection::Ingress,
        cloud_policy_index: index,
        protocol: Some("tcp".into()),
        port: Some("22".into()),
        cloud_address_id: address.map(Into::into),
        action: "ACCEPT".into(),
        ..Default::default()
    }
}

fn template(cloud_id: &str) -> CloudArgumentTemplate {
    CloudArgumentTemplate {
        cloud_id: cloud_id.into(),
        name: cloud_id.into(),
        region: REGION.into(),
        ..Default::default()
    }
}

fn route_table(cloud_id: &str, cloud_vpc_id: &str) -> CloudRouteTable {
    CloudRouteTable {
        cloud_id: cloud_id.into(),
        cloud_vpc_id: cloud_vpc_id.into(),
        name: cloud_id.into(),
        region: REGION.into(),
        ..Default::default()
    }
}

fn route(cloud_id: &str, table: &str, cidr: &str) -> CloudRoute {
    CloudRoute {
        cloud_id: cloud_id.into(),
        cloud_route_table_id: table.into(),
        destination_cidr_block: cidr.into(),
        gateway_type: "NAT".into(),
        enabled: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_security_group_rules_resolve_templates() {
    let h = Harness::new(RegionInventory {
        argument_templates: vec![template("ipm-1")],
        security_groups: vec![security_group("sg-1"), security_group("sg-2")],
        security_group_rules: BTreeMap::from([
            (
                "sg-1".to_string(),
                vec![
                    sg_rule("sgr-1", 0, Some("ipm-1")),
                    sg_rule("sgr-2", 1, Some("ipm-unknown")),
                ],
            ),
            ("sg-2".to_string(), vec![sg_rule("sgr-3", 0, None)]),
        ]),
        ..Default::default()
    });

    h.client.sync_argument_template(&h.kit, &h.params()).await.unwrap();
    h.client.sync_security_group(&h.kit, &h.params()).await.unwrap();

    let templates = rows(h.store.argument_templates()).await;
    let groups = rows(h.store.security_groups()).await;
    let rules = rows(h.store.security_group_rules()).await;
    assert_eq!(groups.len(), 2);
    assert_eq!(rules.len(), 3);

    let by_cloud = |id: &str| rules.iter().find(|r| r.cloud_id == id).unwrap().clone();
    assert_eq!(by_cloud("sgr-1").address_id, Some(templates[0].id.clone()));
    // Unknown templates are kept as cloud ids only
    assert_eq!(by_cloud("sgr-2").address_id, None);
    assert_eq!(by_cloud("sgr-2").cloud_address_id.as_deref(), Some("ipm-unknown"));

    let sg2 = groups.iter().find(|g| g.cloud_id == "sg-2").unwrap();
    assert_eq!(by_cloud("sgr-3").security_group_id, sg2.id);
}

#[tokio::test]
async fn test_security_group_rule_changes() {
    let h = Harness::new(RegionInventory {
        security_groups: vec![security_group("sg-1")],
        security_group_rules: BTreeMap::from([(
            "sg-1".to_string(),
            vec![sg_rule("sgr-1", 0, None), sg_rule("sgr-2", 1, None)],
        )]),
        ..Default::default()
    });
    h.client.sync_security_group(&h.kit, &h.params()).await.unwrap();
    let before = rows(h.store.security_group_rules()).await;

    h.cloud_update(|r| {
        let rules = r.security_group_rules.get_mut("sg-1").unwrap();
        rules.retain(|rule| rule.cloud_id != "sgr-2");
        rules[0].port = Some("443".into());
    })
    .await;
    h.client
        .sync_security_group_rule(&h.kit, &h.params(), "sg-1")
        .await
        .unwrap();

    let after = rows(h.store.security_group_rules()).await;
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].id, before[0].id);
    assert_eq!(after[0].port.as_deref(), Some("443"));
}

#[tokio::test]
async fn test_rule_sync_requires_stored_group() {
    let h = Harness::new(RegionInventory::default());

    let err = h
        .client
        .sync_security_group_rule(&h.kit, &h.params(), "sg-missing")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SyncError::DependencyNotFound { kind: ResourceKind::SecurityGroup, .. }
    ));
}

#[tokio::test]
async fn test_deleted_security_group_takes_its_rules() {
    let h = Harness::new(RegionInventory {
        security_groups: vec![security_group("sg-1"), security_group("sg-2")],
        security_group_rules: BTreeMap::from([
            ("sg-1".to_string(), vec![sg_rule("sgr-1", 0, None)]),
            ("sg-2".to_string(), vec![sg_rule("sgr-2", 0, None)]),
        ]),
        ..Default::default()
    });
    h.client.sync_security_group(&h.kit, &h.params()).await.unwrap();

    h.cloud_update(|r| {
        r.security_groups.retain(|g| g.cloud_id != "sg-2");
        r.security_group_rules.remove("sg-2");
    })
    .await;
    h.client.sync_security_group(&h.kit, &h.params()).await.unwrap();

    let rules = rows(h.store.security_group_rules()).await;
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].cloud_id, "sgr-1");
}

#[tokio::test]
async fn test_routes_follow_their_tables() {
    let h = Harness::new(RegionInventory {
        vpcs: vec![vpc("vpc-1", "main")],
        route_tables: vec![route_table("rtb-1", "vpc-1"), route_table("rtb-2", "vpc-1")],
        routes: BTreeMap::from([
            (
                "rtb-1".to_string(),
                vec![route("r-1", "rtb-1", "0.0.0.0/0"), route("r-2", "rtb-1", "10.1.0.0/16")],
            ),
            ("rtb-2".to_string(), vec![route("r-3", "rtb-2", "0.0.0.0/0")]),
        ]),
        ..Default::default()
    });

    h.client.sync_vpc(&h.kit, &h.params()).await.unwrap();
    h.client.sync_route_table(&h.kit, &h.params()).await.unwrap();
    let result = h.client.sync_route(&h.kit, &h.params()).await.unwrap();
    assert_eq!(result.created_ids.len(), 3);

    let tables = rows(h.store.route_tables()).await;
    let rtb1 = tables.iter().find(|t| t.cloud_id == "rtb-1").unwrap();
    let routes = rows_where(
        h.store.routes(),
        Expression::new().equal("route_table_id", &rtb1.id),
    )
    .await;
    assert_eq!(routes.len(), 2);

    h.cloud_update(|r| {
        r.routes.get_mut("rtb-1").unwrap().retain(|x| x.cloud_id != "r-2");
    })
    .await;
    h.client.sync_route(&h.kit, &h.params()).await.unwrap();
    assert_eq!(rows(h.store.routes()).await.len(), 2);
}

#[tokio::test]
async fn test_route_sync_needs_stored_table() {
    let h = Harness::new(RegionInventory {
        vpcs: vec![vpc("vpc-1", "main")],
        route_tables: vec![route_table("rtb-1", "vpc-1")],
        ..Default::default()
    });

    let err = h.client.sync_route(&h.kit, &h.params()).await.unwrap_err();

    assert!(matches!(
        err,
        SyncError::DependencyNotFound { kind: ResourceKind::RouteTable, .. }
    ));
}

#[tokio::test]
async fn test_route_table_needs_vpc() {
    let h = Harness::new(RegionInventory {
        route_tables: vec![route_table("rtb-1", "vpc-1")],
        ..Default::default()
    });

    let err = h.client.sync_route_table(&h.kit, &h.params()).await.unwrap_err();

    assert!(matches!(err, SyncError::DependencyNotFound { kind: ResourceKind::Vpc, .. }));
}

#[tokio::test]
async fn test_system_disk_flag_is_only_promoted() {
    let h = Harness::new(RegionInventory {
        disks: vec![disk("disk-sys"), disk("disk-data")],
        ..Default::default()
    });

    h.client
        .sync_disk(&h.kit, &h.params(), &SyncDiskOption::default())
        .await
        .unwrap();
    assert!(rows(h.store.disks()).await.iter().all(|d| !d.is_system_disk));

    let option = SyncDiskOption {
        boot_disk_ids: HashSet::from(["disk-sys".to_string()]),
    };
    h.client.sync_disk(&h.kit, &h.params(), &option).await.unwrap();

    // A later sync without the hint keeps the flag
    h.client
        .sync_disk(&h.kit, &h.params(), &SyncDiskOption::default())
        .await
        .unwrap();
    let disks = rows(h.store.disks()).await;
    let system: Vec<&str> = disks
        .iter()
        .filter(|d| d.is_system_disk)
        .map(|d| d.cloud_id.as_str())
        .collect();
    assert_eq!(system, vec!["disk-sys"]);
}

#[tokio::test]
async fn test_eip_and_image_sweep() {
    let h = Harness::new(RegionInventory {
        eips: vec![eip("eip-1", "203.0.113.1"), eip("eip-2", "203.0.113.2")],
        ..Default::default()
    });
    h.client.sync_eip(&h.kit, &h.params()).await.unwrap();
    h.client.sync_image(&h.kit, &h.params()).await.unwrap();
    assert!(rows(h.store.images()).await.is_empty());

    h.cloud_update(|r| r.eips.retain(|e| e.cloud_id == "eip-1")).await;
    h.client
        .remove_eip_deleted_from_cloud(&h.kit, ACCOUNT, REGION)
        .await
        .unwrap();

    let eips = rows(h.store.eips()).await;
    assert_eq!(eips.len(), 1);
    assert_eq!(eips[0].cloud_id, "eip-1");
}

#[tokio::test]
async fn test_sub_accounts_and_regions() {
    let h = Harness::new(RegionInventory::default());
    h.cloud
        .update(|inv: &mut CloudInventory| {
            inv.sub_accounts = vec![
                CloudSubAccount {
                    cloud_id: "sub-1".into(),
                    name: "ops".into(),
                    ..Default::default()
                },
                CloudSubAccount {
                    cloud_id: "sub-2".into(),
                    name: "dev".into(),
                    ..Default::default()
                },
            ];
            inv.regions = vec![CloudRegion {
                cloud_id: REGION.into(),
                name: "Guangzhou".into(),
                status: "AVAILABLE".into(),
            }];
        })
        .await;

    h.client.sync_sub_account(&h.kit, &[]).await.unwrap();
    h.client.sync_region(&h.kit).await.unwrap();
    assert_eq!(rows(h.store.sub_accounts()).await.len(), 2);
    assert_eq!(rows(h.store.regions()).await.len(), 1);

    // A targeted sync only touches the named sub-account
    h.cloud
        .update(|inv: &mut CloudInventory| {
            inv.sub_accounts.retain(|s| s.cloud_id == "sub-2");
            inv.sub_accounts[0].name = "dev-renamed".into();
        })
        .await;
    h.client
        .sync_sub_account(&h.kit, &["sub-2".to_string()])
        .await
        .unwrap();

    let subs = rows(h.store.sub_accounts()).await;
    assert_eq!(subs.len(), 2);
    assert!(subs.iter().any(|s| s.name == "dev-renamed"));
}

#[tokio::test]
async fn test_extension_of_another_vendor_is_rejected() {
    let mut group = security_group("sg-1");
    group.extension = Some(hcsync_core::model::SecurityGroupExtension::Aws {
        cloud_vpc_id: "vpc-1".into(),
        cloud_owner_id: "owner".into(),
    });
    let h = Harness::with_vendor(
        Vendor::TCloud,
        RegionInventory {
            security_groups: vec![group],
            ..Default::default()
        },
    );

    let err = h
        .client
        .sync_security_group(&h.kit, &h.params())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::InvalidInput(_)));
    assert!(rows(h.store.security_groups()).await.is_empty());
}
