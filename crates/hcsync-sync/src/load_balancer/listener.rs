//! Listener sync, per load balancer
//!
//! After the listeners of a load balancer converge, each cloud listener has
//! its rules synced and then the backends of every rule.

use super::rule::{RuleSyncer, build_rule};
use super::target::{BackendSource, sync_rule_targets};
use crate::client::SyncClient;
use crate::error::{Result, StoreOp, SyncError};
use crate::orchestrator::{ResourceSyncer, list_cloud, remove_deleted_from_cloud, sync_resource};
use crate::params::{SyncBaseParams, SyncResult};
use async_trait::async_trait;
use hcsync_core::model::{CloudListener, Listener, LoadBalancer, Protocol, Rule};
use hcsync_core::{Kit, ResourceKind};
use hcsync_gateway::{Expression, ListenerWithRule, Table, list_all};
use std::collections::HashMap;

/// Listeners of one cloud load balancer, every page or exactly `cloud_ids`
pub(crate) async fn list_cloud_listeners(
    client: &SyncClient,
    region: &str,
    cloud_lb_id: &str,
    cloud_ids: &[String],
) -> Result<Vec<CloudListener>> {
    list_cloud(client, ResourceKind::Listener, region, cloud_ids, |c, opt| {
        let cloud_lb_id = cloud_lb_id.to_string();
        Box::pin(async move { c.list_listeners(&opt, &cloud_lb_id).await })
    })
    .await
}

pub(crate) fn is_listener_changed(cloud: &CloudListener, stored: &Listener) -> bool {
    // Providers may report an empty name
    if !cloud.name.is_empty() && cloud.name != stored.name {
        return true;
    }
    if cloud.end_port != stored.end_port {
        return true;
    }
    match cloud.protocol {
        Protocol::Http => cloud.default_domain() != stored.default_domain,
        Protocol::Https => {
            cloud.default_domain() != stored.default_domain
                || cloud.sni_switch != stored.sni_switch
                || cloud.certificate != stored.certificate
        }
        // Layer-4 settings beyond the certificate live on the companion rule
        _ => cloud.certificate != stored.certificate,
    }
}

pub(crate) struct ListenerSyncer<'a> {
    pub client: &'a SyncClient,
    pub lb: &'a LoadBalancer,
    /// Listing read once by the caller
    pub cloud: &'a [CloudListener],
}

impl ListenerSyncer<'_> {
    fn build(&self, cloud: &CloudListener) -> Listener {
        let default_domain = if cloud.protocol.is_layer7() {
            cloud.default_domain()
        } else {
            String::new()
        };
        Listener {
            id: String::new(),
            vendor: self.client.vendor,
            account_id: self.client.account_id.clone(),
            region: self.lb.region.clone(),
            cloud_id: cloud.cloud_id.clone(),
            name: cloud.name.clone(),
            bk_biz_id: self.lb.bk_biz_id,
            lb_id: self.lb.id.clone(),
            cloud_lb_id: self.lb.cloud_id.clone(),
            protocol: cloud.protocol,
            port: cloud.port,
            end_port: cloud.end_port,
            default_domain,
            sni_switch: cloud.sni_switch,
            certificate: cloud.certificate.clone(),
            memo: None,
        }
    }

    fn companion_rule(&self, cloud: &CloudListener) -> Option<Rule> {
        super::rule::cloud_rules(cloud)
            .into_iter()
            .next()
            .map(|rule| build_rule(self.client, self.lb, cloud, "", rule))
    }
}

#[async_trait]
impl ResourceSyncer for ListenerSyncer<'_> {
    type Cloud = CloudListener;
    type Local = Listener;

    const KIND: ResourceKind = ResourceKind::Listener;

    fn client(&self) -> &SyncClient {
        self.client
    }

    fn scope(&self) -> String {
        format!(
            "{}/{}/{}",
            self.client.account_id, self.lb.region, self.lb.cloud_id
        )
    }

    fn table(&self) -> &dyn Table<Listener> {
        self.client.store().listeners()
    }

    fn store_filter(&self) -> Expression {
        Expression::new().equal("lb_id", &self.lb.id)
    }

    async fn list_from_cloud(&self, _kit: &Kit) -> Result<Vec<CloudListener>> {
        Ok(self.cloud.to_vec())
    }

    async fn list_cloud_by_ids(&self, _kit: &Kit, cloud_ids: &[String]) -> Result<Vec<CloudListener>> {
        list_cloud_listeners(self.client, &self.lb.region, &self.lb.cloud_id, cloud_ids).await
    }

    fn is_changed(&self, cloud: &CloudListener, stored: &Listener) -> bool {
        is_listener_changed(cloud, stored)
    }

    /// Layer-4 listeners are created together with their companion rule;
    /// layer-7 rules are synced afterwards
    async fn create(&self, _kit: &Kit, items: Vec<CloudListener>) -> Result<Vec<String>> {
        let (layer7, layer4): (Vec<CloudListener>, Vec<CloudListener>) =
            items.into_iter().partition(|l| l.protocol.is_layer7());
        let store = self.client.store();
        let mut ids = Vec::new();

        if !layer4.is_empty() {
            let with_rules = layer4
                .iter()
                .filter_map(|l| {
                    self.companion_rule(l).map(|rule| ListenerWithRule {
                        listener: self.build(l),
                        rule,
                    })
                })
                .collect();
            ids.extend(
                store
                    .create_listeners_with_rules(with_rules)
                    .await
                    .map_err(SyncError::store_write(Self::KIND, StoreOp::Create))?,
            );
        }
        if !layer7.is_empty() {
            let rows = layer7.iter().map(|l| self.build(l)).collect();
            ids.extend(
                self.table()
                    .batch_create(rows)
                    .await
                    .map_err(SyncError::store_write(Self::KIND, StoreOp::Create))?,
            );
        }
        Ok(ids)
    }

    async fn update(&self, _kit: &Kit, items: Vec<(Listener, CloudListener)>) -> Result<()> {
        let rows = items
            .into_iter()
            .map(|(stored, cloud)| Listener {
                id: stored.id,
                bk_biz_id: stored.bk_biz_id,
                memo: stored.memo,
                ..self.build(&cloud)
            })
            .collect();
        self.table()
            .batch_update(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Update))
    }

    /// Listeners go together with their rules and bindings
    async fn delete(&self, _kit: &Kit, keys: Vec<String>) -> Result<()> {
        let filter = self.store_filter().is_in("cloud_id", &keys);
        let ids: Vec<String> = list_all(self.table(), &filter, self.client.limits.default_page_limit)
            .await
            .map_err(SyncError::store_list(Self::KIND, &self.scope()))?
            .into_iter()
            .map(|l| l.id)
            .collect();
        self.client
            .store()
            .delete_listeners_cascade(&ids)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Delete))
    }
}

/// Sync listeners, rules and backends of one stored load balancer
pub(crate) async fn sync_listeners_of_lb(
    kit: &Kit,
    client: &SyncClient,
    lb: &LoadBalancer,
) -> Result<SyncResult> {
    let cloud = list_cloud_listeners(client, &lb.region, &lb.cloud_id, &[]).await?;
    let syncer = ListenerSyncer {
        client,
        lb,
        cloud: &cloud,
    };
    let result = sync_resource(kit, &syncer).await?;

    let local: HashMap<String, Listener> = list_all(
        syncer.table(),
        &syncer.store_filter(),
        client.limits.default_page_limit,
    )
    .await
    .map_err(SyncError::store_list(ResourceKind::Listener, &syncer.scope()))?
    .into_iter()
    .map(|l| (l.cloud_id.clone(), l))
    .collect();

    for cloud_listener in &cloud {
        let listener = local.get(&cloud_listener.cloud_id).ok_or_else(|| {
            SyncError::dependency(ResourceKind::Listener, &cloud_listener.cloud_id, &lb.cloud_id)
        })?;
        let rules = RuleSyncer::new(client, lb, listener, cloud_listener);
        sync_resource(kit, &rules).await?;

        let local_rules: HashMap<String, Rule> = list_all(
            rules.table(),
            &rules.store_filter(),
            client.limits.default_page_limit,
        )
        .await
        .map_err(SyncError::store_list(ResourceKind::Rule, &rules.scope()))?
        .into_iter()
        .map(|r| (r.cloud_id.clone(), r))
        .collect();

        for cloud_rule in &rules.rules {
            let rule = local_rules.get(&cloud_rule.cloud_id).ok_or_else(|| {
                SyncError::dependency(ResourceKind::Rule, &cloud_rule.cloud_id, &listener.cloud_id)
            })?;
            let source = BackendSource::Listener {
                region: &lb.region,
                cloud_lb_id: &lb.cloud_id,
                cloud_listener_id: &listener.cloud_id,
                cloud_rule_id: cloud_listener
                    .protocol
                    .is_layer7()
                    .then_some(cloud_rule.cloud_id.as_str()),
            };
            sync_rule_targets(kit, client, lb, listener, rule, &cloud_rule.backends, source).await?;
        }
    }
    Ok(result)
}

/// Load balancer of the scope by cloud id; it must already be synced
pub(crate) async fn find_local_lb(
    client: &SyncClient,
    params: &SyncBaseParams,
    cloud_lb_id: &str,
) -> Result<LoadBalancer> {
    let filter = crate::orchestrator::region_filter(client, &params.region).equal("cloud_id", cloud_lb_id);
    list_all(client.store().load_balancers(), &filter, 1)
        .await
        .map_err(SyncError::store_list(ResourceKind::LoadBalancer, &params.scope()))?
        .into_iter()
        .next()
        .ok_or_else(|| SyncError::dependency(ResourceKind::LoadBalancer, cloud_lb_id, params.scope()))
}

impl SyncClient {
    /// Sync listeners of one load balancer together with their rules and
    /// backends
    pub async fn sync_listener(
        &self,
        kit: &Kit,
        params: &SyncBaseParams,
        cloud_lb_id: &str,
    ) -> Result<SyncResult> {
        self.check_params(params)?;
        let lb = find_local_lb(self, params, cloud_lb_id).await?;
        sync_listeners_of_lb(kit, self, &lb).await
    }

    /// Delete listeners of one load balancer the cloud no longer reports
    pub async fn remove_listener_deleted_from_cloud(
        &self,
        kit: &Kit,
        account_id: &str,
        region: &str,
        cloud_lb_id: &str,
    ) -> Result<()> {
        let params = SyncBaseParams::new(account_id, region);
        self.check_params(&params)?;
        let lb = find_local_lb(self, &params, cloud_lb_id).await?;
        let syncer = ListenerSyncer {
            client: self,
            lb: &lb,
            cloud: &[],
        };
        remove_deleted_from_cloud(kit, &syncer).await
    }
}
