//! Listener rule sync
//!
//! Layer-7 listeners own any number of url rules. A layer-4 listener owns a
//! single companion rule that shares its cloud id and carries the listener's
//! scheduling, health check and certificate settings.

use crate::client::SyncClient;
use crate::error::{Result, StoreOp, SyncError};
use crate::orchestrator::ResourceSyncer;
use async_trait::async_trait;
use hcsync_core::model::{
    CloudListener, CloudUrlRule, HealthCheck, Listener, LoadBalancer, Rule, RuleType,
};
use hcsync_core::{Kit, ResourceKind};
use hcsync_gateway::{Expression, Table, list_all};
use std::collections::HashSet;

/// Rules of a cloud listener as the store models them
pub(crate) fn cloud_rules(listener: &CloudListener) -> Vec<CloudUrlRule> {
    if listener.protocol.is_layer7() {
        return listener.rules.clone();
    }
    vec![CloudUrlRule {
        cloud_id: listener.cloud_id.clone(),
        domain: String::new(),
        url: String::new(),
        scheduler: listener.scheduler.clone(),
        session_type: listener.session_type.clone(),
        session_expire: listener.session_expire,
        health_check: listener.health_check.clone(),
        certificate: listener.certificate.clone(),
        default_server: false,
        backends: listener.backends.clone(),
    }]
}

/// Rule row for `cloud`. `lbl_id` may be empty when the listener is created
/// in the same store call.
pub(crate) fn build_rule(
    client: &SyncClient,
    lb: &LoadBalancer,
    listener: &CloudListener,
    lbl_id: &str,
    cloud: CloudUrlRule,
) -> Rule {
    Rule {
        id: String::new(),
        vendor: client.vendor,
        account_id: client.account_id.clone(),
        region: lb.region.clone(),
        cloud_id: cloud.cloud_id,
        name: listener.name.clone(),
        rule_type: listener.protocol.rule_type(),
        lb_id: lb.id.clone(),
        cloud_lb_id: lb.cloud_id.clone(),
        lbl_id: lbl_id.to_string(),
        cloud_lbl_id: listener.cloud_id.clone(),
        target_group_id: String::new(),
        cloud_target_group_id: String::new(),
        domain: cloud.domain,
        url: cloud.url,
        scheduler: cloud.scheduler,
        session_type: cloud.session_type,
        session_expire: cloud.session_expire,
        health_check: cloud.health_check,
        certificate: cloud.certificate,
        memo: None,
    }
}

pub(crate) fn is_rule_changed(cloud: &CloudUrlRule, stored: &Rule) -> bool {
    let layer7 = stored.rule_type == RuleType::Layer7;
    cloud.domain != stored.domain
        || cloud.url != stored.url
        || cloud.scheduler != stored.scheduler
        || cloud.session_type != stored.session_type
        || cloud.session_expire != stored.session_expire
        || HealthCheck::differs(cloud.health_check.as_ref(), stored.health_check.as_ref(), layer7)
        || cloud.certificate != stored.certificate
}

/// Rules of one stored listener
pub(crate) struct RuleSyncer<'a> {
    pub client: &'a SyncClient,
    pub lb: &'a LoadBalancer,
    pub listener: &'a Listener,
    pub cloud_listener: &'a CloudListener,
    pub rules: Vec<CloudUrlRule>,
}

impl<'a> RuleSyncer<'a> {
    pub fn new(
        client: &'a SyncClient,
        lb: &'a LoadBalancer,
        listener: &'a Listener,
        cloud_listener: &'a CloudListener,
    ) -> Self {
        Self {
            client,
            lb,
            listener,
            cloud_listener,
            rules: cloud_rules(cloud_listener),
        }
    }
}

#[async_trait]
impl ResourceSyncer for RuleSyncer<'_> {
    type Cloud = CloudUrlRule;
    type Local = Rule;

    const KIND: ResourceKind = ResourceKind::Rule;

    fn client(&self) -> &SyncClient {
        self.client
    }

    fn scope(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.client.account_id, self.lb.region, self.lb.cloud_id, self.listener.cloud_id
        )
    }

    fn table(&self) -> &dyn Table<Rule> {
        self.client.store().rules()
    }

    fn store_filter(&self) -> Expression {
        Expression::new().equal("lbl_id", &self.listener.id)
    }

    async fn list_from_cloud(&self, _kit: &Kit) -> Result<Vec<CloudUrlRule>> {
        Ok(self.rules.clone())
    }

    async fn list_cloud_by_ids(&self, _kit: &Kit, cloud_ids: &[String]) -> Result<Vec<CloudUrlRule>> {
        let wanted: HashSet<&str> = cloud_ids.iter().map(String::as_str).collect();
        let fresh = super::listener::list_cloud_listeners(
            self.client,
            &self.lb.region,
            &self.lb.cloud_id,
            std::slice::from_ref(&self.listener.cloud_id),
        )
        .await?;
        Ok(fresh
            .iter()
            .flat_map(cloud_rules)
            .filter(|r| wanted.contains(r.cloud_id.as_str()))
            .collect())
    }

    fn is_changed(&self, cloud: &CloudUrlRule, stored: &Rule) -> bool {
        is_rule_changed(cloud, stored)
    }

    async fn create(&self, _kit: &Kit, items: Vec<CloudUrlRule>) -> Result<Vec<String>> {
        let rows = items
            .into_iter()
            .map(|c| build_rule(self.client, self.lb, self.cloud_listener, &self.listener.id, c))
            .collect();
        self.table()
            .batch_create(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Create))
    }

    async fn update(&self, _kit: &Kit, items: Vec<(Rule, CloudUrlRule)>) -> Result<()> {
        let rows = items
            .into_iter()
            .map(|(stored, cloud)| Rule {
                id: stored.id,
                target_group_id: stored.target_group_id,
                cloud_target_group_id: stored.cloud_target_group_id,
                memo: stored.memo,
                ..build_rule(self.client, self.lb, self.cloud_listener, &self.listener.id, cloud)
            })
            .collect();
        self.table()
            .batch_update(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Update))
    }

    /// Rules go together with their target group bindings
    async fn delete(&self, _kit: &Kit, keys: Vec<String>) -> Result<()> {
        let filter = self.store_filter().is_in("cloud_id", &keys);
        let ids: Vec<String> = list_all(self.table(), &filter, self.client.limits.default_page_limit)
            .await
            .map_err(SyncError::store_list(Self::KIND, &self.scope()))?
            .into_iter()
            .map(|r| r.id)
            .collect();
        self.client
            .store()
            .delete_rules_cascade(&ids)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Delete))
    }
}
