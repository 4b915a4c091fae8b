mod common;

use common::{
    Harness, backend, http_listener, load_balancer, rows, rows_where, security_group, tcp_listener,
    url_rule, vpc,
};
use hcsync_core::model::{
    CloudBackend, CloudTargetGroup, Protocol, RuleType, SgCommonRel, Target, TargetGroupRuleRel,
    TargetGroupType,
};
use hcsync_core::{ResourceKind, Vendor};
use hcsync_gateway::{Expression, RegionInventory, StoreGateway};
use hcsync_sync::SyncError;
use std::collections::HashMap;

fn inventory() -> RegionInventory {
    RegionInventory {
        vpcs: vec![vpc("vpc-1", "main")],
        security_groups: ["sg-1", "sg-2", "sg-3", "sg-4"]
            .into_iter()
            .map(security_group)
            .collect(),
        load_balancers: vec![load_balancer("lb-1", &["sg-1", "sg-4"])],
        ..Default::default()
    }
}

async fn prepare(region: RegionInventory) -> Harness {
    let h = Harness::new(region);
    h.client.sync_vpc(&h.kit, &h.params()).await.unwrap();
    h.client.sync_security_group(&h.kit, &h.params()).await.unwrap();
    h
}

fn cloud_target_group(cloud_id: &str, backends: Vec<CloudBackend>) -> CloudTargetGroup {
    CloudTargetGroup {
        cloud_id: cloud_id.into(),
        name: cloud_id.into(),
        region: common::REGION.into(),
        cloud_vpc_id: "vpc-1".into(),
        port: 80,
        protocol: Some(Protocol::Tcp),
        backends,
    }
}

/// (instance, port) pairs of the stored targets, sorted
fn instance_ports(targets: &[Target]) -> Vec<(String, i64)> {
    let mut pairs: Vec<(String, i64)> = targets
        .iter()
        .map(|t| (t.cloud_inst_id.clone(), t.port))
        .collect();
    pairs.sort();
    pairs
}

/// Security group cloud ids bound to `lb_cloud_id`, in priority order
async fn bound_groups(h: &Harness, lb_cloud_id: &str) -> Vec<(String, i64)> {
    let lb = rows(h.store.load_balancers())
        .await
        .into_iter()
        .find(|lb| lb.cloud_id == lb_cloud_id)
        .unwrap();
    let groups: HashMap<String, String> = rows(h.store.security_groups())
        .await
        .into_iter()
        .map(|sg| (sg.id, sg.cloud_id))
        .collect();
    let mut rels: Vec<SgCommonRel> =
        rows_where(h.store.sg_common_rels(), Expression::new().equal("res_id", &lb.id)).await;
    rels.sort_by_key(|r| r.priority);
    rels.into_iter()
        .map(|r| (groups[&r.security_group_id].clone(), r.priority))
        .collect()
}

#[tokio::test]
async fn test_security_group_order_rewrites_tail() {
    let h = prepare(inventory()).await;
    h.client
        .sync_load_balancer_with_rel(&h.kit, &h.params())
        .await
        .unwrap();
    assert_eq!(
        bound_groups(&h, "lb-1").await,
        vec![("sg-1".to_string(), 1), ("sg-4".to_string(), 2)]
    );

    h.cloud_update(|inv| {
        inv.load_balancers[0].cloud_security_group_ids =
            vec!["sg-1".into(), "sg-2".into(), "sg-3".into()];
    })
    .await;
    h.client
        .sync_load_balancer_with_rel(&h.kit, &h.params())
        .await
        .unwrap();
    assert_eq!(
        bound_groups(&h, "lb-1").await,
        vec![
            ("sg-1".to_string(), 1),
            ("sg-2".to_string(), 2),
            ("sg-3".to_string(), 3)
        ]
    );
}

#[tokio::test]
async fn test_unknown_security_group_is_a_dependency_error() {
    let mut region = inventory();
    region.load_balancers[0].cloud_security_group_ids = vec!["sg-9".into()];
    let h = prepare(region).await;

    let err = h
        .client
        .sync_load_balancer_with_rel(&h.kit, &h.params())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::DependencyNotFound { kind: ResourceKind::SecurityGroup, .. }
    ));
}

#[tokio::test]
async fn test_layer7_backends_get_implicit_target_group() {
    let mut region = inventory();
    region.listeners = vec![http_listener(
        "lbl-1",
        "lb-1",
        vec![url_rule("loc-1", "/", vec![backend("ins-1", 8080), backend("ins-2", 8081)])],
    )];
    let h = prepare(region).await;
    h.client
        .sync_load_balancer_with_rel(&h.kit, &h.params())
        .await
        .unwrap();

    let rules = rows(h.store.rules()).await;
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].rule_type, RuleType::Layer7);

    let groups = rows(h.store.target_groups()).await;
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].target_group_type, TargetGroupType::CloudImplicit);
    assert_eq!(groups[0].name, "auto-loc-1");
    assert_eq!(groups[0].memo.as_deref(), Some("auto created for rule loc-1"));
    assert_eq!(rules[0].target_group_id, groups[0].id);

    let rels = rows(h.store.target_group_rule_rels()).await;
    assert_eq!(rels.len(), 1);
    assert_eq!(rels[0].listener_rule_id, rules[0].id);
    assert_eq!(rels[0].target_group_id, groups[0].id);

    let targets = rows(h.store.targets()).await;
    assert_eq!(targets.len(), 2);
    assert!(targets.iter().all(|t| t.target_group_id == groups[0].id));
}

#[tokio::test]
async fn test_layer4_listener_and_companion_rule() {
    let mut region = inventory();
    region.listeners = vec![tcp_listener("lbl-4", "lb-1", vec![backend("ins-1", 3306)])];
    let h = prepare(region).await;
    h.client
        .sync_load_balancer_with_rel(&h.kit, &h.params())
        .await
        .unwrap();

    let listeners = rows(h.store.listeners()).await;
    let rules = rows(h.store.rules()).await;
    assert_eq!(listeners.len(), 1);
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].cloud_id, "lbl-4");
    assert_eq!(rules[0].lbl_id, listeners[0].id);
    assert_eq!(rules[0].rule_type, RuleType::Layer4);
    assert_eq!(rules[0].scheduler, "WRR");

    let groups = rows(h.store.target_groups()).await;
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].memo.as_deref(), Some("auto created for listener lbl-4"));
    assert_eq!(rows(h.store.targets()).await.len(), 1);
}

#[tokio::test]
async fn test_pipeline_rerun_and_backend_changes() {
    let mut region = inventory();
    region.listeners = vec![http_listener(
        "lbl-1",
        "lb-1",
        vec![url_rule("loc-1", "/", vec![backend("ins-1", 8080), backend("ins-2", 8081)])],
    )];
    let h = prepare(region).await;
    h.client
        .sync_load_balancer_with_rel(&h.kit, &h.params())
        .await
        .unwrap();
    let group_id = rows(h.store.target_groups()).await[0].id.clone();

    let rerun = h
        .client
        .sync_load_balancer_with_rel(&h.kit, &h.params())
        .await
        .unwrap();
    assert!(rerun.created_ids.is_empty());
    assert_eq!(rows(h.store.target_groups()).await.len(), 1);
    assert_eq!(rows(h.store.targets()).await.len(), 2);

    h.cloud_update(|inv| {
        let backends = &mut inv.listeners[0].rules[0].backends;
        backends.retain(|b| b.cloud_id == "ins-1");
        backends[0].weight = Some(50);
        backends.push(backend("ins-3", 8082));
    })
    .await;
    h.client
        .sync_load_balancer_with_rel(&h.kit, &h.params())
        .await
        .unwrap();

    let targets = rows(h.store.targets()).await;
    assert_eq!(
        instance_ports(&targets),
        vec![("ins-1".to_string(), 8080), ("ins-3".to_string(), 8082)]
    );
    assert!(targets.iter().all(|t| t.target_group_id == group_id));
    let ins1 = targets.iter().find(|t| t.cloud_id == "ins-1-8080").unwrap();
    assert_eq!(ins1.weight, Some(50));
}

#[tokio::test]
async fn test_same_instance_on_two_ports_in_implicit_group() {
    let mut region = inventory();
    region.listeners = vec![http_listener(
        "lbl-1",
        "lb-1",
        vec![url_rule("loc-1", "/", vec![backend("ins-1", 8080), backend("ins-1", 8081)])],
    )];
    let h = prepare(region).await;
    h.client
        .sync_load_balancer_with_rel(&h.kit, &h.params())
        .await
        .unwrap();

    let groups = rows(h.store.target_groups()).await;
    assert_eq!(groups.len(), 1);
    let targets = rows(h.store.targets()).await;
    assert_eq!(
        instance_ports(&targets),
        vec![("ins-1".to_string(), 8080), ("ins-1".to_string(), 8081)]
    );
    assert!(targets.iter().all(|t| t.target_group_id == groups[0].id));
}

#[tokio::test]
async fn test_second_port_of_instance_added_to_existing_group() {
    let mut region = inventory();
    region.listeners = vec![http_listener(
        "lbl-1",
        "lb-1",
        vec![url_rule("loc-1", "/", vec![backend("ins-1", 8080)])],
    )];
    let h = prepare(region).await;
    h.client
        .sync_load_balancer_with_rel(&h.kit, &h.params())
        .await
        .unwrap();

    h.cloud_update(|inv| {
        inv.listeners[0].rules[0].backends.push(backend("ins-1", 8081));
    })
    .await;
    h.client
        .sync_load_balancer_with_rel(&h.kit, &h.params())
        .await
        .unwrap();

    let targets = rows(h.store.targets()).await;
    assert_eq!(
        instance_ports(&targets),
        vec![("ins-1".to_string(), 8080), ("ins-1".to_string(), 8081)]
    );

    // Dropping one port keeps the other
    h.cloud_update(|inv| {
        inv.listeners[0].rules[0].backends.retain(|b| b.port == 8081);
    })
    .await;
    h.client
        .sync_load_balancer_with_rel(&h.kit, &h.params())
        .await
        .unwrap();
    assert_eq!(
        instance_ports(&rows(h.store.targets()).await),
        vec![("ins-1".to_string(), 8081)]
    );
}

#[tokio::test]
async fn test_cloud_target_group_lifecycle() {
    let mut region = inventory();
    region.target_groups = vec![
        cloud_target_group("lbtg-1", vec![backend("ins-1", 80), backend("ins-2", 80)]),
        cloud_target_group("lbtg-2", vec![backend("ins-3", 80)]),
    ];
    let h = prepare(region).await;

    let result = h.client.sync_target_group(&h.kit, &h.params()).await.unwrap();
    assert_eq!(result.created_ids.len(), 2);
    let groups = rows(h.store.target_groups()).await;
    assert!(groups.iter().all(|g| g.target_group_type == TargetGroupType::Cloud));
    assert_eq!(rows(h.store.targets()).await.len(), 3);
    let tg1 = groups.iter().find(|g| g.cloud_id == "lbtg-1").unwrap().clone();

    h.cloud_update(|inv| {
        let tg = &mut inv.target_groups[0];
        tg.name = "web".into();
        tg.backends.retain(|b| b.cloud_id == "ins-1");
        tg.backends[0].weight = Some(30);
        tg.backends.push(backend("ins-1", 81));
    })
    .await;
    h.client.sync_target_group(&h.kit, &h.params()).await.unwrap();

    let groups = rows(h.store.target_groups()).await;
    let renamed = groups.iter().find(|g| g.cloud_id == "lbtg-1").unwrap();
    assert_eq!(renamed.id, tg1.id);
    assert_eq!(renamed.name, "web");
    let targets = rows_where(
        h.store.targets(),
        Expression::new().equal("target_group_id", &tg1.id),
    )
    .await;
    assert_eq!(
        instance_ports(&targets),
        vec![("ins-1".to_string(), 80), ("ins-1".to_string(), 81)]
    );
    let weighted = targets.iter().find(|t| t.port == 80).unwrap();
    assert_eq!(weighted.weight, Some(30));

    h.cloud_update(|inv| inv.target_groups.retain(|tg| tg.cloud_id == "lbtg-1")).await;
    h.client.sync_target_group(&h.kit, &h.params()).await.unwrap();

    let groups = rows(h.store.target_groups()).await;
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].cloud_id, "lbtg-1");
    let targets = rows(h.store.targets()).await;
    assert_eq!(targets.len(), 2);
    assert!(targets.iter().all(|t| t.target_group_id == tg1.id));
}

#[tokio::test]
async fn test_target_group_still_in_cloud_is_not_deleted() {
    let mut region = inventory();
    region.target_groups = vec![
        cloud_target_group("lbtg-1", vec![backend("ins-1", 80)]),
        cloud_target_group("lbtg-2", vec![backend("ins-2", 80)]),
    ];
    let h = prepare(region).await;
    h.client.sync_target_group(&h.kit, &h.params()).await.unwrap();

    h.cloud_update(|inv| inv.target_groups.retain(|tg| tg.cloud_id == "lbtg-1")).await;
    h.cloud
        .inject_recheck_survivors(
            common::REGION,
            RegionInventory {
                target_groups: vec![cloud_target_group("lbtg-2", vec![backend("ins-2", 80)])],
                ..Default::default()
            },
        )
        .await;

    let err = h
        .client
        .sync_target_group(&h.kit, &h.params())
        .await
        .unwrap_err();
    match err {
        SyncError::ConsistencyViolation { kind, cloud_ids } => {
            assert_eq!(kind, ResourceKind::TargetGroup);
            assert_eq!(cloud_ids, vec!["lbtg-2"]);
        }
        other => panic!("unexpected error: {other}"),
    }

    // A lookup by id still finds it, so the sweep keeps it too
    h.client
        .remove_target_group_deleted_from_cloud(&h.kit, common::ACCOUNT, common::REGION)
        .await
        .unwrap();
    assert_eq!(rows(h.store.target_groups()).await.len(), 2);
    assert_eq!(rows(h.store.targets()).await.len(), 2);

    h.cloud
        .inject_recheck_survivors(common::REGION, RegionInventory::default())
        .await;
    h.client
        .remove_target_group_deleted_from_cloud(&h.kit, common::ACCOUNT, common::REGION)
        .await
        .unwrap();

    let groups = rows(h.store.target_groups()).await;
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].cloud_id, "lbtg-1");
    let targets = rows(h.store.targets()).await;
    assert_eq!(instance_ports(&targets), vec![("ins-1".to_string(), 80)]);
}

#[tokio::test]
async fn test_listener_sync_leaves_cloud_target_group_alone() {
    let mut region = inventory();
    region.target_groups = vec![cloud_target_group("lbtg-1", vec![backend("ins-1", 80)])];
    region.listeners = vec![http_listener("lbl-1", "lb-1", vec![url_rule("loc-1", "/", vec![])])];
    let h = prepare(region).await;
    h.client.sync_target_group(&h.kit, &h.params()).await.unwrap();
    h.client
        .sync_load_balancer_with_rel(&h.kit, &h.params())
        .await
        .unwrap();

    let tg = rows(h.store.target_groups()).await.remove(0);
    let lb = rows(h.store.load_balancers()).await.remove(0);
    let listener = rows(h.store.listeners()).await.remove(0);
    let rule = rows(h.store.rules()).await.remove(0);
    h.store
        .target_group_rule_rels()
        .batch_create(vec![TargetGroupRuleRel {
            id: String::new(),
            vendor: Vendor::TCloud,
            target_group_id: tg.id.clone(),
            cloud_target_group_id: tg.cloud_id.clone(),
            lb_id: lb.id,
            cloud_lb_id: lb.cloud_id,
            lbl_id: listener.id,
            cloud_lbl_id: listener.cloud_id,
            listener_rule_id: rule.id,
            cloud_listener_rule_id: rule.cloud_id,
            listener_rule_type: RuleType::Layer7,
            binding_status: "success".into(),
        }])
        .await
        .unwrap();

    h.cloud_update(|inv| {
        inv.listeners[0].rules[0].backends = vec![backend("ins-9", 9000)];
    })
    .await;
    h.client
        .sync_load_balancer_with_rel(&h.kit, &h.params())
        .await
        .unwrap();

    // No implicit group, and the provider-side group keeps its own backends
    let groups = rows(h.store.target_groups()).await;
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].target_group_type, TargetGroupType::Cloud);
    let targets = rows(h.store.targets()).await;
    assert_eq!(instance_ports(&targets), vec![("ins-1".to_string(), 80)]);
}

#[tokio::test]
async fn test_removed_rule_and_listener_cascade() {
    let mut region = inventory();
    region.listeners = vec![
        http_listener(
            "lbl-1",
            "lb-1",
            vec![
                url_rule("loc-1", "/", vec![backend("ins-1", 8080)]),
                url_rule("loc-2", "/api", vec![backend("ins-2", 8081)]),
            ],
        ),
        tcp_listener("lbl-4", "lb-1", vec![]),
    ];
    let h = prepare(region).await;
    h.client
        .sync_load_balancer_with_rel(&h.kit, &h.params())
        .await
        .unwrap();
    assert_eq!(rows(h.store.listeners()).await.len(), 2);
    assert_eq!(rows(h.store.rules()).await.len(), 3);
    assert_eq!(rows(h.store.target_group_rule_rels()).await.len(), 2);

    h.cloud_update(|inv| {
        inv.listeners[0].rules.retain(|r| r.cloud_id == "loc-1");
        inv.listeners.retain(|l| l.cloud_id == "lbl-1");
    })
    .await;
    h.client
        .sync_load_balancer_with_rel(&h.kit, &h.params())
        .await
        .unwrap();

    let listeners = rows(h.store.listeners()).await;
    assert_eq!(listeners.len(), 1);
    assert_eq!(listeners[0].cloud_id, "lbl-1");
    let rules = rows(h.store.rules()).await;
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].cloud_id, "loc-1");
    let rels = rows(h.store.target_group_rule_rels()).await;
    assert_eq!(rels.len(), 1);
    assert_eq!(rels[0].cloud_listener_rule_id, "loc-1");
}

#[tokio::test]
async fn test_deleted_load_balancer_cascades() {
    let mut region = inventory();
    region.listeners = vec![http_listener(
        "lbl-1",
        "lb-1",
        vec![url_rule("loc-1", "/", vec![backend("ins-1", 8080)])],
    )];
    let h = prepare(region).await;
    h.client
        .sync_load_balancer_with_rel(&h.kit, &h.params())
        .await
        .unwrap();

    h.cloud_update(|inv| {
        inv.load_balancers.clear();
        inv.listeners.clear();
    })
    .await;
    h.client
        .sync_load_balancer_with_rel(&h.kit, &h.params())
        .await
        .unwrap();

    assert!(rows(h.store.load_balancers()).await.is_empty());
    assert!(rows(h.store.listeners()).await.is_empty());
    assert!(rows(h.store.rules()).await.is_empty());
    assert!(rows(h.store.target_group_rule_rels()).await.is_empty());
    assert!(rows(h.store.sg_common_rels()).await.is_empty());
}

#[tokio::test]
async fn test_listener_failure_fails_the_pipeline() {
    let mut region = inventory();
    region.load_balancers = (1..=3)
        .map(|i| load_balancer(&format!("lb-{i}"), &["sg-1"]))
        .collect();
    let h = prepare(region).await;
    h.cloud.fail_listing(ResourceKind::Listener).await;

    let err = h
        .client
        .sync_load_balancer_with_rel(&h.kit, &h.params())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::CloudList { kind: ResourceKind::Listener, .. }));
    // Earlier stages stay committed
    assert_eq!(rows(h.store.load_balancers()).await.len(), 3);
}

#[tokio::test]
async fn test_listener_sweep() {
    let mut region = inventory();
    region.listeners = vec![
        tcp_listener("lbl-1", "lb-1", vec![]),
        tcp_listener("lbl-2", "lb-1", vec![]),
    ];
    let h = prepare(region).await;
    h.client
        .sync_load_balancer_with_rel(&h.kit, &h.params())
        .await
        .unwrap();

    h.cloud_update(|inv| inv.listeners.retain(|l| l.cloud_id == "lbl-1")).await;
    h.client
        .remove_listener_deleted_from_cloud(&h.kit, common::ACCOUNT, common::REGION, "lb-1")
        .await
        .unwrap();

    let listeners = rows(h.store.listeners()).await;
    assert_eq!(listeners.len(), 1);
    assert_eq!(listeners[0].cloud_id, "lbl-1");
    assert_eq!(rows(h.store.rules()).await.len(), 1);
}

#[tokio::test]
async fn test_narrowed_sync_keeps_other_bindings_and_drops_orphans() {
    let mut region = inventory();
    region.load_balancers = vec![
        load_balancer("lb-1", &["sg-1"]),
        load_balancer("lb-2", &["sg-2", "sg-3"]),
    ];
    let h = prepare(region).await;
    h.client
        .sync_load_balancer_with_rel(&h.kit, &h.params())
        .await
        .unwrap();

    let sg = rows(h.store.security_groups()).await.remove(0);
    h.store
        .sg_common_rels()
        .batch_create(vec![SgCommonRel {
            id: String::new(),
            vendor: Vendor::TCloud,
            res_id: "lb-gone".into(),
            res_type: ResourceKind::LoadBalancer,
            security_group_id: sg.id,
            priority: 1,
        }])
        .await
        .unwrap();

    let narrowed = h.params().with_cloud_ids(["lb-1"]);
    h.client
        .sync_load_balancer_with_rel(&h.kit, &narrowed)
        .await
        .unwrap();

    assert_eq!(bound_groups(&h, "lb-1").await, vec![("sg-1".to_string(), 1)]);
    assert_eq!(
        bound_groups(&h, "lb-2").await,
        vec![("sg-2".to_string(), 1), ("sg-3".to_string(), 2)]
    );
    let orphans = rows_where(
        h.store.sg_common_rels(),
        Expression::new().equal("res_id", "lb-gone"),
    )
    .await;
    assert!(orphans.is_empty());
}
