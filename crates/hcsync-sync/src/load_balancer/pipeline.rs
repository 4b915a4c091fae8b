//! Load balancer pipeline
//!
//! Stages run strictly in order: load balancers, their security group
//! bindings, then listeners of every load balancer with bounded fan-out.
//! Inside one load balancer the listener, rule and target stages follow each
//! other without overlap.

use super::lb::LoadBalancerSyncer;
use super::listener::sync_listeners_of_lb;
use super::sg_rel::sync_lb_sg_rel;
use crate::client::SyncClient;
use crate::concurrency::run_bounded;
use crate::error::{Result, SyncError};
use crate::orchestrator::{remove_deleted_from_cloud, sync_resource};
use crate::params::{SyncBaseParams, SyncResult};
use hcsync_core::Kit;
use hcsync_core::model::LoadBalancer;
use std::collections::HashSet;

impl SyncClient {
    /// Sync load balancer rows only
    pub async fn sync_load_balancer(&self, kit: &Kit, params: &SyncBaseParams) -> Result<SyncResult> {
        self.check_params(params)?;
        sync_resource(kit, &LoadBalancerSyncer { client: self, params }).await
    }

    /// Sync load balancers together with everything hanging off them
    pub async fn sync_load_balancer_with_rel(
        &self,
        kit: &Kit,
        params: &SyncBaseParams,
    ) -> Result<SyncResult> {
        self.check_params(params)?;
        let syncer = LoadBalancerSyncer { client: self, params };
        let result = sync_resource(kit, &syncer).await?;

        let cloud = syncer.list(&params.cloud_ids).await?;
        if cloud.is_empty() {
            return Ok(result);
        }
        let local = syncer.list_local().await?;
        sync_lb_sg_rel(kit, self, &params.region, &cloud, &local).await?;

        let present: HashSet<&str> = cloud.iter().map(|lb| lb.cloud_id.as_str()).collect();
        let lbs: Vec<&LoadBalancer> = local
            .iter()
            .filter(|lb| present.contains(lb.cloud_id.as_str()))
            .collect();
        tracing::info!(
            rid = %kit.rid,
            vendor = %self.vendor,
            account_id = %self.account_id,
            region = %params.region,
            count = lbs.len(),
            "Syncing listeners of load balancers"
        );

        run_bounded(lbs, self.limits.listener_sync_concurrency, |lb| async move {
            let kit = kit.sub_kit();
            sync_listeners_of_lb(&kit, self, lb).await?;
            Ok::<(), SyncError>(())
        })
        .await?;
        Ok(result)
    }

    pub async fn remove_load_balancer_deleted_from_cloud(
        &self,
        kit: &Kit,
        account_id: &str,
        region: &str,
    ) -> Result<()> {
        let params = SyncBaseParams::new(account_id, region);
        self.check_params(&params)?;
        remove_deleted_from_cloud(kit, &LoadBalancerSyncer { client: self, params: &params }).await
    }
}
