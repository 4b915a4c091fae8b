//! Load balancer to security group bindings
//!
//! The cloud reports the bound groups of a load balancer in priority order.
//! The stored binding rows carry a dense 1-based priority and are rewritten
//! from the first position where they diverge from the cloud order.

use crate::client::SyncClient;
use crate::error::{Result, StoreOp, SyncError};
use crate::orchestrator::{into_chunks, map_by_cloud_id, region_filter};
use hcsync_core::model::{CloudLoadBalancer, LoadBalancer, SgCommonRel};
use hcsync_core::{Kit, OrderedRelation, ResourceKind, plan_ordered_relation};
use hcsync_gateway::{Expression, list_all};
use std::collections::{HashMap, HashSet};

const REL_KIND: ResourceKind = ResourceKind::SecurityGroup;

fn rel_filter(client: &SyncClient) -> Expression {
    Expression::new()
        .equal("vendor", client.vendor)
        .equal("res_type", ResourceKind::LoadBalancer)
}

/// Reconcile the security group bindings of `local` load balancers with the
/// order reported in `cloud`
pub(crate) async fn sync_lb_sg_rel(
    kit: &Kit,
    client: &SyncClient,
    region: &str,
    cloud: &[CloudLoadBalancer],
    local: &[LoadBalancer],
) -> Result<()> {
    let owner_ids: HashSet<&str> = local.iter().map(|lb| lb.id.as_str()).collect();
    remove_orphans(kit, client, &owner_ids).await?;

    let by_cloud_id: HashMap<&str, &LoadBalancer> =
        local.iter().map(|lb| (lb.cloud_id.as_str(), lb)).collect();
    let sg_cloud_ids: Vec<String> = cloud
        .iter()
        .flat_map(|lb| lb.cloud_security_group_ids.iter().cloned())
        .collect();
    let groups = map_by_cloud_id(
        client,
        client.store().security_groups(),
        ResourceKind::SecurityGroup,
        &region_filter(client, region),
        &sg_cloud_ids,
    )
    .await?;

    for cloud_lb in cloud {
        let Some(lb) = by_cloud_id.get(cloud_lb.cloud_id.as_str()) else {
            continue;
        };
        let order = cloud_lb
            .cloud_security_group_ids
            .iter()
            .map(|sg_cloud_id| {
                groups
                    .get(sg_cloud_id)
                    .map(|sg| sg.id.clone())
                    .ok_or_else(|| {
                        SyncError::dependency(ResourceKind::SecurityGroup, sg_cloud_id, &cloud_lb.cloud_id)
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        sync_owner(kit, client, lb, &order).await?;
    }
    Ok(())
}

/// Drop binding rows whose owning load balancer no longer exists
async fn remove_orphans(kit: &Kit, client: &SyncClient, owner_ids: &HashSet<&str>) -> Result<()> {
    let store = client.store();
    let limits = &client.limits;
    let rels = list_all(store.sg_common_rels(), &rel_filter(client), limits.default_page_limit)
        .await
        .map_err(SyncError::store_list(REL_KIND, &client.account_id))?;

    let candidates: Vec<String> = hcsync_core::slice::unique(
        rels.into_iter()
            .map(|r| r.res_id)
            .filter(|id| !owner_ids.contains(id.as_str())),
    );
    if candidates.is_empty() {
        return Ok(());
    }

    let mut existing = HashSet::new();
    for chunk in candidates.chunks(limits.batch_operation_max_limit) {
        let rows = list_all(
            store.load_balancers(),
            &Expression::new().is_in("id", chunk),
            limits.default_page_limit,
        )
        .await
        .map_err(SyncError::store_list(ResourceKind::LoadBalancer, &client.account_id))?;
        existing.extend(rows.into_iter().map(|lb| lb.id));
    }

    let orphans: Vec<String> = candidates
        .into_iter()
        .filter(|id| !existing.contains(id))
        .collect();
    for chunk in into_chunks(orphans, limits.batch_operation_max_limit) {
        let count = chunk.len();
        store
            .sg_common_rels()
            .batch_delete(&rel_filter(client).is_in("res_id", &chunk))
            .await
            .map_err(SyncError::store_write(REL_KIND, StoreOp::Delete))?;
        tracing::info!(rid = %kit.rid, vendor = %client.vendor, count, "Removed orphaned load balancer security group bindings");
    }
    Ok(())
}

async fn sync_owner(kit: &Kit, client: &SyncClient, lb: &LoadBalancer, order: &[String]) -> Result<()> {
    let store = client.store();
    let filter = rel_filter(client).equal("res_id", &lb.id);
    let stored = list_all(store.sg_common_rels(), &filter, client.limits.default_page_limit)
        .await
        .map_err(SyncError::store_list(REL_KIND, &lb.cloud_id))?;
    let stored: Vec<OrderedRelation> = stored
        .into_iter()
        .map(|r| OrderedRelation::new(r.security_group_id, r.priority))
        .collect();

    let plan = plan_ordered_relation(order, &stored);
    if plan.is_noop() {
        return Ok(());
    }

    if !plan.delete_target_ids.is_empty() {
        store
            .sg_common_rels()
            .batch_delete(&filter.clone().is_in("security_group_id", &plan.delete_target_ids))
            .await
            .map_err(SyncError::store_write(REL_KIND, StoreOp::Delete))?;
    }
    if !plan.delete_priorities.is_empty() {
        store
            .sg_common_rels()
            .batch_delete(&filter.clone().is_in("priority", &plan.delete_priorities))
            .await
            .map_err(SyncError::store_write(REL_KIND, StoreOp::Delete))?;
    }

    // Every tail target was either absent or just deleted, so the tail is
    // written as fresh rows.
    let rows: Vec<SgCommonRel> = plan
        .upserts
        .iter()
        .map(|rel| SgCommonRel {
            id: String::new(),
            vendor: client.vendor,
            res_id: lb.id.clone(),
            res_type: ResourceKind::LoadBalancer,
            security_group_id: rel.target_id.clone(),
            priority: rel.priority,
        })
        .collect();
    for chunk in into_chunks(rows, client.limits.batch_operation_max_limit) {
        store
            .sg_common_rels()
            .batch_create(chunk)
            .await
            .map_err(SyncError::store_write(REL_KIND, StoreOp::Create))?;
    }

    tracing::info!(
        rid = %kit.rid,
        vendor = %client.vendor,
        account_id = %client.account_id,
        lb = %lb.cloud_id,
        kept = plan.stays.len(),
        written = plan.upserts.len(),
        deleted = plan.delete_target_ids.len() + plan.delete_priorities.len(),
        "Synced load balancer security group bindings"
    );
    Ok(())
}
