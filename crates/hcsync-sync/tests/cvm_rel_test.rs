mod common;

use common::{Harness, cvm, disk, eip, rows, security_group, subnet, vpc};
use hcsync_core::model::{CvmRelKind, CvmRelation};
use hcsync_core::{ResourceKind, Vendor};
use hcsync_gateway::{RegionInventory, StoreGateway};
use hcsync_sync::{CvmRelOption, SyncError};
use std::collections::HashMap;

fn inventory() -> RegionInventory {
    let mut instance = cvm("ins-1");
    instance.cloud_security_group_ids = vec!["sg-1".into()];
    instance.cloud_system_disk_id = Some("disk-sys".into());
    instance.cloud_data_disk_ids = vec!["disk-data".into()];
    instance.public_ipv4_addresses = vec!["1.1.1.1".into(), "9.9.9.9".into()];

    RegionInventory {
        vpcs: vec![vpc("vpc-1", "main")],
        subnets: vec![subnet("subnet-1", "vpc-1")],
        security_groups: vec![security_group("sg-1"), security_group("sg-2")],
        disks: vec![disk("disk-sys"), disk("disk-data"), disk("disk-idle")],
        eips: vec![eip("eip-1", "1.1.1.1")],
        cvms: vec![instance],
        ..Default::default()
    }
}

/// Cloud ids of the resources bound to each instance, per relation kind
async fn relations(h: &Harness, kind: CvmRelKind) -> Vec<String> {
    let store = h.store.as_ref();
    let cloud_ids: HashMap<String, String> = match kind {
        CvmRelKind::SecurityGroup => rows(store.security_groups())
            .await
            .into_iter()
            .map(|r| (r.id, r.cloud_id))
            .collect(),
        CvmRelKind::Disk => rows(store.disks())
            .await
            .into_iter()
            .map(|r| (r.id, r.cloud_id))
            .collect(),
        CvmRelKind::Eip => rows(store.eips())
            .await
            .into_iter()
            .map(|r| (r.id, r.cloud_id))
            .collect(),
    };
    let rels: Vec<CvmRelation> = rows(store.cvm_rels(kind)).await;
    let mut bound: Vec<String> = rels
        .into_iter()
        .map(|r| cloud_ids[&r.res_id].clone())
        .collect();
    bound.sort();
    bound
}

#[tokio::test]
async fn test_related_resources_synced_before_instances() {
    let h = Harness::new(inventory());
    let option = CvmRelOption::for_vendor(Vendor::TCloud);
    h.client
        .sync_cvm_with_rel_res(&h.kit, &h.params(), &option)
        .await
        .unwrap();

    assert_eq!(rows(h.store.vpcs()).await.len(), 1);
    assert_eq!(rows(h.store.subnets()).await.len(), 1);
    // Only what the instance uses is synced
    let groups = rows(h.store.security_groups()).await;
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].cloud_id, "sg-1");
    let disks = rows(h.store.disks()).await;
    assert_eq!(disks.len(), 2);
    let boot = disks.iter().find(|d| d.cloud_id == "disk-sys").unwrap();
    assert!(boot.is_system_disk);

    let cvms = rows(h.store.cvms()).await;
    assert_eq!(cvms.len(), 1);

    assert_eq!(relations(&h, CvmRelKind::SecurityGroup).await, vec!["sg-1"]);
    assert_eq!(relations(&h, CvmRelKind::Disk).await, vec!["disk-data", "disk-sys"]);
    assert_eq!(relations(&h, CvmRelKind::Eip).await, vec!["eip-1"]);
}

#[tokio::test]
async fn test_detached_resource_relation_removed() {
    let h = Harness::new(inventory());
    let option = CvmRelOption::for_vendor(Vendor::TCloud);
    h.client
        .sync_cvm_with_rel_res(&h.kit, &h.params(), &option)
        .await
        .unwrap();

    h.cloud_update(|inv| {
        inv.cvms[0].cloud_data_disk_ids.clear();
        inv.cvms[0].cloud_security_group_ids = vec!["sg-2".into()];
    })
    .await;
    h.client
        .sync_cvm_with_rel_res(&h.kit, &h.params(), &option)
        .await
        .unwrap();

    assert_eq!(relations(&h, CvmRelKind::Disk).await, vec!["disk-sys"]);
    assert_eq!(relations(&h, CvmRelKind::SecurityGroup).await, vec!["sg-2"]);
}

#[tokio::test]
async fn test_instances_gone_from_cloud() {
    let h = Harness::new(inventory());
    let option = CvmRelOption::for_vendor(Vendor::TCloud);
    h.client
        .sync_cvm_with_rel_res(&h.kit, &h.params(), &option)
        .await
        .unwrap();

    h.cloud_update(|inv| inv.cvms.clear()).await;
    h.client
        .sync_cvm_with_rel_res(&h.kit, &h.params(), &option)
        .await
        .unwrap();

    assert!(rows(h.store.cvms()).await.is_empty());
    for kind in CvmRelKind::ALL {
        assert!(rows(h.store.cvm_rels(kind)).await.is_empty());
    }
}

#[tokio::test]
async fn test_gcp_rejects_security_group_relation() {
    let h = Harness::with_vendor(Vendor::Gcp, inventory());
    let option = CvmRelOption {
        kinds: CvmRelKind::ALL.to_vec(),
    };
    let err = h
        .client
        .sync_cvm_with_rel_res(&h.kit, &h.params(), &option)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::UnsupportedRelation {
            vendor: Vendor::Gcp,
            kind: ResourceKind::SecurityGroup
        }
    ));
    assert!(rows(h.store.cvms()).await.is_empty());

    h.client
        .sync_cvm_with_rel_res(&h.kit, &h.params(), &CvmRelOption::for_vendor(Vendor::Gcp))
        .await
        .unwrap();
    assert!(rows(h.store.security_groups()).await.is_empty());
    assert_eq!(relations(&h, CvmRelKind::Disk).await.len(), 2);
}

#[tokio::test]
async fn test_missing_vpc_fails_instance_sync() {
    let h = Harness::new(inventory());
    h.cloud_update(|inv| inv.cvms[0].cloud_vpc_ids = vec!["vpc-gone".into()]).await;

    let err = h
        .client
        .sync_cvm(&h.kit, &h.params())
        .await
        .unwrap_err();
    match err {
        SyncError::DependencyNotFound { kind, cloud_id, owner } => {
            assert_eq!(kind, ResourceKind::Vpc);
            assert_eq!(cloud_id, "vpc-gone");
            assert_eq!(owner, "ins-1");
        }
        other => panic!("unexpected error: {other}"),
    }
}
