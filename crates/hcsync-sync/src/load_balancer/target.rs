//! Backend target sync
//!
//! Backends are reported either on a listener or rule, or on a provider-side
//! target group. Either way they land as target rows of one local target
//! group; rules whose backends have no local group yet get one created.
//! A backend is identified by instance and port, so one instance can serve
//! several ports of the same group.

use super::listener::list_cloud_listeners;
use crate::client::SyncClient;
use crate::error::{Result, StoreOp, SyncError};
use crate::orchestrator::{DeleteKey, ResourceSyncer, list_cloud, sync_resource};
use async_trait::async_trait;
use hcsync_core::model::{
    CloudBackend, Listener, LoadBalancer, Rule, RuleType, Target, TargetGroup,
    TargetGroupRuleRel, TargetGroupType,
};
use hcsync_core::{CloudResource, Kit, ResourceKind};
use hcsync_gateway::{Expression, Table, TargetGroupWithRel, list_all};
use std::collections::HashSet;

/// Where the backends of a target group are read from
#[derive(Debug, Clone, Copy)]
pub(crate) enum BackendSource<'a> {
    /// Bound to a listener, or to one of its layer-7 rules
    Listener {
        region: &'a str,
        cloud_lb_id: &'a str,
        cloud_listener_id: &'a str,
        cloud_rule_id: Option<&'a str>,
    },
    /// Registered with a provider-side target group
    TargetGroup {
        region: &'a str,
        cloud_target_group_id: &'a str,
    },
}

impl BackendSource<'_> {
    /// Current backends of the source; empty when the owner itself is gone
    async fn fetch(&self, client: &SyncClient) -> Result<Vec<CloudBackend>> {
        match *self {
            BackendSource::Listener {
                region,
                cloud_lb_id,
                cloud_listener_id,
                cloud_rule_id,
            } => {
                let listeners =
                    list_cloud_listeners(client, region, cloud_lb_id, &[cloud_listener_id.to_string()])
                        .await?;
                let Some(listener) = listeners.into_iter().find(|l| l.cloud_id == cloud_listener_id) else {
                    return Ok(Vec::new());
                };
                Ok(match cloud_rule_id {
                    Some(rule_id) => listener
                        .rules
                        .into_iter()
                        .find(|r| r.cloud_id == rule_id)
                        .map(|r| r.backends)
                        .unwrap_or_default(),
                    None => listener.backends,
                })
            }
            BackendSource::TargetGroup {
                region,
                cloud_target_group_id,
            } => {
                let groups = list_cloud(
                    client,
                    ResourceKind::TargetGroup,
                    region,
                    &[cloud_target_group_id.to_string()],
                    |c, opt| Box::pin(async move { c.list_target_groups(&opt).await }),
                )
                .await?;
                Ok(groups
                    .into_iter()
                    .find(|tg| tg.cloud_id == cloud_target_group_id)
                    .map(|tg| tg.backends)
                    .unwrap_or_default())
            }
        }
    }
}

/// A cloud backend together with its [`CloudBackend::target_key`]
#[derive(Debug, Clone)]
pub(crate) struct KeyedBackend {
    key: String,
    backend: CloudBackend,
}

impl From<&CloudBackend> for KeyedBackend {
    fn from(backend: &CloudBackend) -> Self {
        Self {
            key: backend.target_key(),
            backend: backend.clone(),
        }
    }
}

impl CloudResource for KeyedBackend {
    fn cloud_id(&self) -> &str {
        &self.key
    }
}

/// Drop repeated instance/port pairs, keeping the first report
fn unique_backends(backends: &[CloudBackend]) -> Vec<CloudBackend> {
    let mut seen = HashSet::new();
    backends
        .iter()
        .filter(|b| seen.insert(b.target_key()))
        .cloned()
        .collect()
}

fn same_set(a: &[String], b: &[String]) -> bool {
    a.iter().collect::<HashSet<_>>() == b.iter().collect::<HashSet<_>>()
}

pub(crate) fn is_target_changed(cloud: &CloudBackend, stored: &Target) -> bool {
    cloud.weight != stored.weight
        || cloud.inst_type != stored.inst_type
        || cloud.inst_name != stored.inst_name
        || !same_set(&cloud.private_ip_addresses, &stored.private_ip_addresses)
        || !same_set(&cloud.public_ip_addresses, &stored.public_ip_addresses)
}

pub(crate) fn build_target(client: &SyncClient, tg: &TargetGroup, cloud: &CloudBackend) -> Target {
    Target {
        id: String::new(),
        vendor: client.vendor,
        account_id: client.account_id.clone(),
        region: tg.region.clone(),
        target_group_id: tg.id.clone(),
        cloud_target_group_id: tg.cloud_id.clone(),
        cloud_id: cloud.target_key(),
        cloud_inst_id: cloud.cloud_id.clone(),
        inst_type: cloud.inst_type.clone(),
        port: cloud.port,
        weight: cloud.weight,
        private_ip_addresses: cloud.private_ip_addresses.clone(),
        public_ip_addresses: cloud.public_ip_addresses.clone(),
        inst_name: cloud.inst_name.clone(),
        zone: cloud.zone.clone(),
    }
}

/// Targets of one local target group
pub(crate) struct TargetSyncer<'a> {
    pub client: &'a SyncClient,
    pub target_group: &'a TargetGroup,
    pub backends: &'a [CloudBackend],
    pub source: BackendSource<'a>,
}

#[async_trait]
impl ResourceSyncer for TargetSyncer<'_> {
    type Cloud = KeyedBackend;
    type Local = Target;

    const KIND: ResourceKind = ResourceKind::Target;
    const DELETE_BY: DeleteKey = DeleteKey::LocalId;

    fn client(&self) -> &SyncClient {
        self.client
    }

    fn scope(&self) -> String {
        format!(
            "{}/{}/tg:{}",
            self.client.account_id, self.target_group.region, self.target_group.id
        )
    }

    fn table(&self) -> &dyn Table<Target> {
        self.client.store().targets()
    }

    fn store_filter(&self) -> Expression {
        Expression::new().equal("target_group_id", &self.target_group.id)
    }

    async fn list_from_cloud(&self, _kit: &Kit) -> Result<Vec<KeyedBackend>> {
        Ok(self.backends.iter().map(KeyedBackend::from).collect())
    }

    async fn list_cloud_by_ids(&self, _kit: &Kit, cloud_ids: &[String]) -> Result<Vec<KeyedBackend>> {
        let wanted: HashSet<&str> = cloud_ids.iter().map(String::as_str).collect();
        Ok(self
            .source
            .fetch(self.client)
            .await?
            .iter()
            .map(KeyedBackend::from)
            .filter(|b| wanted.contains(b.key.as_str()))
            .collect())
    }

    fn is_changed(&self, cloud: &KeyedBackend, stored: &Target) -> bool {
        is_target_changed(&cloud.backend, stored)
    }

    async fn create(&self, _kit: &Kit, items: Vec<KeyedBackend>) -> Result<Vec<String>> {
        let rows = items
            .iter()
            .map(|b| build_target(self.client, self.target_group, &b.backend))
            .collect();
        self.table()
            .batch_create(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Create))
    }

    async fn update(&self, _kit: &Kit, items: Vec<(Target, KeyedBackend)>) -> Result<()> {
        let rows = items
            .into_iter()
            .map(|(stored, cloud)| Target {
                id: stored.id,
                ..build_target(self.client, self.target_group, &cloud.backend)
            })
            .collect();
        self.table()
            .batch_update(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Update))
    }
}

/// Local target group bound to `rule`, if any
async fn bound_target_group(client: &SyncClient, rule: &Rule) -> Result<Option<TargetGroup>> {
    let limit = client.limits.default_page_limit;
    let rel = list_all(
        client.store().target_group_rule_rels(),
        &Expression::new().equal("listener_rule_id", &rule.id),
        limit,
    )
    .await
    .map_err(SyncError::store_list(ResourceKind::TargetGroup, &rule.cloud_id))?
    .into_iter()
    .next();
    let Some(rel) = rel else {
        return Ok(None);
    };

    list_all(
        client.store().target_groups(),
        &Expression::new().equal("id", &rel.target_group_id),
        limit,
    )
    .await
    .map_err(SyncError::store_list(ResourceKind::TargetGroup, &rule.cloud_id))?
    .into_iter()
    .next()
    .map(Some)
    .ok_or_else(|| SyncError::dependency(ResourceKind::TargetGroup, &rel.target_group_id, &rule.cloud_id))
}

fn implicit_target_group(client: &SyncClient, lb: &LoadBalancer, listener: &Listener, rule: &Rule) -> TargetGroup {
    let owner = match rule.rule_type {
        RuleType::Layer4 => "listener",
        RuleType::Layer7 => "rule",
    };
    TargetGroup {
        id: String::new(),
        vendor: client.vendor,
        account_id: client.account_id.clone(),
        cloud_id: String::new(),
        name: format!("auto-{}", rule.cloud_id),
        region: lb.region.clone(),
        bk_biz_id: listener.bk_biz_id,
        protocol: Some(listener.protocol),
        port: listener.port,
        vpc_id: lb.vpc_id.clone(),
        cloud_vpc_id: lb.cloud_vpc_id.clone(),
        target_group_type: TargetGroupType::CloudImplicit,
        weight: None,
        health_check: rule.health_check.clone(),
        memo: Some(format!("auto created for {owner} {}", rule.cloud_id)),
    }
}

/// Converge the backends of one rule.
///
/// Without a bound target group, backends reported by the cloud get an
/// implicit group created together with its binding and first targets.
pub(crate) async fn sync_rule_targets(
    kit: &Kit,
    client: &SyncClient,
    lb: &LoadBalancer,
    listener: &Listener,
    rule: &Rule,
    backends: &[CloudBackend],
    source: BackendSource<'_>,
) -> Result<()> {
    if let Some(tg) = bound_target_group(client, rule).await? {
        // Provider-side groups are converged by the target group sync
        if tg.target_group_type == TargetGroupType::Cloud {
            return Ok(());
        }
        let syncer = TargetSyncer {
            client,
            target_group: &tg,
            backends,
            source,
        };
        sync_resource(kit, &syncer).await?;
        return Ok(());
    }

    if backends.is_empty() {
        return Ok(());
    }

    let backends = unique_backends(backends);
    let mut tg = implicit_target_group(client, lb, listener, rule);
    let first = backends.len().min(client.limits.batch_operation_max_limit);
    let targets = backends[..first]
        .iter()
        .map(|b| build_target(client, &tg, b))
        .collect();
    let rel = TargetGroupRuleRel {
        id: String::new(),
        vendor: client.vendor,
        target_group_id: String::new(),
        cloud_target_group_id: String::new(),
        lb_id: lb.id.clone(),
        cloud_lb_id: lb.cloud_id.clone(),
        lbl_id: listener.id.clone(),
        cloud_lbl_id: listener.cloud_id.clone(),
        listener_rule_id: rule.id.clone(),
        cloud_listener_rule_id: rule.cloud_id.clone(),
        listener_rule_type: rule.rule_type,
        binding_status: "success".to_string(),
    };
    let store = client.store();
    tg.id = store
        .create_target_group_with_rel(TargetGroupWithRel {
            target_group: tg.clone(),
            rel,
            targets,
        })
        .await
        .map_err(SyncError::store_write(ResourceKind::TargetGroup, StoreOp::Create))?;

    store
        .rules()
        .batch_update(vec![Rule {
            target_group_id: tg.id.clone(),
            ..rule.clone()
        }])
        .await
        .map_err(SyncError::store_write(ResourceKind::Rule, StoreOp::Update))?;

    tracing::info!(
        rid = %kit.rid,
        vendor = %client.vendor,
        account_id = %client.account_id,
        region = %lb.region,
        rule = %rule.cloud_id,
        target_group_id = %tg.id,
        count = first,
        "Created implicit target group"
    );

    if backends.len() > first {
        let syncer = TargetSyncer {
            client,
            target_group: &tg,
            backends: &backends,
            source,
        };
        sync_resource(kit, &syncer).await?;
    }
    Ok(())
}
