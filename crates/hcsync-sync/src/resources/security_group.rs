//! Security group and security group rule sync

use crate::client::SyncClient;
use crate::concurrency::run_bounded;
use crate::error::{Result, StoreOp, SyncError};
use crate::orchestrator::{
    DeleteKey, ResourceSyncer, list_cloud, map_by_cloud_id, region_filter,
    remove_deleted_from_cloud, sync_resource, with_cloud_ids,
};
use crate::params::{SyncBaseParams, SyncResult};
use async_trait::async_trait;
use hcsync_core::limits::UNASSIGNED_BIZ_ID;
use hcsync_core::model::{
    ArgumentTemplate, CloudSecurityGroup, CloudSecurityGroupRule, SecurityGroup, SecurityGroupRule,
};
use hcsync_core::{Kit, ResourceKind};
use hcsync_gateway::{Expression, Table, list_all};
use std::collections::{HashMap, HashSet};

pub(crate) struct SecurityGroupSyncer<'a> {
    pub client: &'a SyncClient,
    pub params: &'a SyncBaseParams,
}

impl SecurityGroupSyncer<'_> {
    async fn list(&self, cloud_ids: &[String]) -> Result<Vec<CloudSecurityGroup>> {
        list_cloud(
            self.client,
            Self::KIND,
            &self.params.region,
            cloud_ids,
            |c, opt| Box::pin(async move { c.list_security_groups(&opt).await }),
        )
        .await
    }

    fn build(&self, cloud: CloudSecurityGroup) -> Result<SecurityGroup> {
        let ext_vendor = cloud.extension.as_ref().map(|e| e.vendor());
        self.client.check_extension(Self::KIND, &cloud.cloud_id, ext_vendor)?;
        Ok(SecurityGroup {
            id: String::new(),
            vendor: self.client.vendor,
            account_id: self.client.account_id.clone(),
            cloud_id: cloud.cloud_id,
            name: cloud.name,
            region: self.params.region.clone(),
            memo: cloud.memo,
            tags: cloud.tags,
            bk_biz_id: UNASSIGNED_BIZ_ID,
            cloud_created_time: cloud.cloud_created_time,
            cloud_update_time: cloud.cloud_update_time,
            extension: cloud.extension,
        })
    }
}

#[async_trait]
impl ResourceSyncer for SecurityGroupSyncer<'_> {
    type Cloud = CloudSecurityGroup;
    type Local = SecurityGroup;

    const KIND: ResourceKind = ResourceKind::SecurityGroup;

    fn client(&self) -> &SyncClient {
        self.client
    }

    fn scope(&self) -> String {
        self.params.scope()
    }

    fn table(&self) -> &dyn Table<SecurityGroup> {
        self.client.store().security_groups()
    }

    fn store_filter(&self) -> Expression {
        with_cloud_ids(
            region_filter(self.client, &self.params.region),
            &self.params.cloud_ids,
        )
    }

    async fn list_from_cloud(&self, _kit: &Kit) -> Result<Vec<CloudSecurityGroup>> {
        self.list(&self.params.cloud_ids).await
    }

    async fn list_cloud_by_ids(
        &self,
        _kit: &Kit,
        cloud_ids: &[String],
    ) -> Result<Vec<CloudSecurityGroup>> {
        self.list(cloud_ids).await
    }

    fn is_changed(&self, cloud: &CloudSecurityGroup, stored: &SecurityGroup) -> bool {
        cloud.name != stored.name
            || cloud.memo != stored.memo
            || cloud.tags != stored.tags
            || cloud.cloud_update_time != stored.cloud_update_time
            || cloud.extension != stored.extension
    }

    async fn create(&self, _kit: &Kit, items: Vec<CloudSecurityGroup>) -> Result<Vec<String>> {
        let rows = items
            .into_iter()
            .map(|c| self.build(c))
            .collect::<Result<Vec<_>>>()?;
        self.table()
            .batch_create(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Create))
    }

    async fn update(&self, _kit: &Kit, items: Vec<(SecurityGroup, CloudSecurityGroup)>) -> Result<()> {
        let mut rows = Vec::with_capacity(items.len());
        for (stored, cloud) in items {
            rows.push(SecurityGroup {
                id: stored.id,
                bk_biz_id: stored.bk_biz_id,
                ..self.build(cloud)?
            });
        }
        self.table()
            .batch_update(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Update))
    }

    /// Groups go together with their rules and resource bindings
    async fn delete(&self, _kit: &Kit, keys: Vec<String>) -> Result<()> {
        let filter = region_filter(self.client, &self.params.region).is_in("cloud_id", &keys);
        let doomed = list_all(self.table(), &filter, self.client.limits.default_page_limit)
            .await
            .map_err(SyncError::store_list(Self::KIND, &self.scope()))?;
        let ids: Vec<String> = doomed.into_iter().map(|sg| sg.id).collect();

        if !ids.is_empty() {
            self.client
                .store()
                .security_group_rules()
                .batch_delete(&Expression::new().is_in("security_group_id", &ids))
                .await
                .map_err(SyncError::store_write(ResourceKind::SecurityGroupRule, StoreOp::Delete))?;
            self.client
                .store()
                .sg_common_rels()
                .batch_delete(&Expression::new().is_in("security_group_id", &ids))
                .await
                .map_err(SyncError::store_write(Self::KIND, StoreOp::Delete))?;
        }
        self.table()
            .batch_delete(&filter)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Delete))
    }
}

/// Policies of one stored security group
pub(crate) struct SecurityGroupRuleSyncer<'a> {
    pub client: &'a SyncClient,
    pub group: &'a SecurityGroup,
}

impl SecurityGroupRuleSyncer<'_> {
    async fn list(&self) -> Result<Vec<CloudSecurityGroupRule>> {
        self.client
            .cloud()
            .list_security_group_rules(&self.group.region, &self.group.cloud_id)
            .await
            .map_err(SyncError::cloud_list(Self::KIND, &self.scope()))
    }

    /// Local argument templates referenced by the rules, keyed by cloud id
    async fn template_map(
        &self,
        items: &[&CloudSecurityGroupRule],
    ) -> Result<HashMap<String, ArgumentTemplate>> {
        let cloud_ids: Vec<String> = items
            .iter()
            .flat_map(|r| {
                [
                    &r.cloud_address_id,
                    &r.cloud_address_group_id,
                    &r.cloud_service_id,
                    &r.cloud_service_group_id,
                ]
            })
            .filter_map(|id| id.clone())
            .collect();
        if cloud_ids.is_empty() {
            return Ok(HashMap::new());
        }
        map_by_cloud_id(
            self.client,
            self.client.store().argument_templates(),
            ResourceKind::ArgumentTemplate,
            &region_filter(self.client, &self.group.region),
            &cloud_ids,
        )
        .await
    }

    fn build(
        &self,
        cloud: CloudSecurityGroupRule,
        templates: &HashMap<String, ArgumentTemplate>,
    ) -> SecurityGroupRule {
        let resolve = |cloud_id: &Option<String>| -> Option<String> {
            let cloud_id = cloud_id.as_ref()?;
            let found = templates.get(cloud_id).map(|t| t.id.clone());
            if found.is_none() {
                tracing::warn!(
                    security_group = %self.group.cloud_id,
                    rule = %cloud.cloud_id,
                    template = %cloud_id,
                    "Argument template referenced by rule is not synced"
                );
            }
            found
        };
        let address_id = resolve(&cloud.cloud_address_id);
        let address_group_id = resolve(&cloud.cloud_address_group_id);
        let service_id = resolve(&cloud.cloud_service_id);
        let service_group_id = resolve(&cloud.cloud_service_group_id);

        SecurityGroupRule {
            id: String::new(),
            vendor: self.client.vendor,
            account_id: self.client.account_id.clone(),
            region: self.group.region.clone(),
            cloud_id: cloud.cloud_id,
            security_group_id: self.group.id.clone(),
            cloud_security_group_id: self.group.cloud_id.clone(),
            direction: cloud.direction,
            cloud_policy_index: cloud.cloud_policy_index,
            protocol: cloud.protocol,
            port: cloud.port,
            ipv4_cidr: cloud.ipv4_cidr,
            ipv6_cidr: cloud.ipv6_cidr,
            cloud_target_security_group_id: cloud.cloud_target_security_group_id,
            address_id,
            cloud_address_id: cloud.cloud_address_id,
            address_group_id,
            cloud_address_group_id: cloud.cloud_address_group_id,
            service_id,
            cloud_service_id: cloud.cloud_service_id,
            service_group_id,
            cloud_service_group_id: cloud.cloud_service_group_id,
            action: cloud.action,
            memo: cloud.memo,
        }
    }
}

#[async_trait]
impl ResourceSyncer for SecurityGroupRuleSyncer<'_> {
    type Cloud = CloudSecurityGroupRule;
    type Local = SecurityGroupRule;

    const KIND: ResourceKind = ResourceKind::SecurityGroupRule;
    const DELETE_BY: DeleteKey = DeleteKey::LocalId;

    fn client(&self) -> &SyncClient {
        self.client
    }

    fn scope(&self) -> String {
        format!(
            "{}/{}/{}",
            self.client.account_id, self.group.region, self.group.cloud_id
        )
    }

    fn table(&self) -> &dyn Table<SecurityGroupRule> {
        self.client.store().security_group_rules()
    }

    fn store_filter(&self) -> Expression {
        Expression::new().equal("security_group_id", &self.group.id)
    }

    async fn list_from_cloud(&self, _kit: &Kit) -> Result<Vec<CloudSecurityGroupRule>> {
        self.list().await
    }

    async fn list_cloud_by_ids(
        &self,
        _kit: &Kit,
        cloud_ids: &[String],
    ) -> Result<Vec<CloudSecurityGroupRule>> {
        let wanted: HashSet<&str> = cloud_ids.iter().map(String::as_str).collect();
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|r| wanted.contains(r.cloud_id.as_str()))
            .collect())
    }

    fn is_changed(&self, cloud: &CloudSecurityGroupRule, stored: &SecurityGroupRule) -> bool {
        cloud.direction != stored.direction
            || cloud.cloud_policy_index != stored.cloud_policy_index
            || cloud.protocol != stored.protocol
            || cloud.port != stored.port
            || cloud.ipv4_cidr != stored.ipv4_cidr
            || cloud.ipv6_cidr != stored.ipv6_cidr
            || cloud.cloud_target_security_group_id != stored.cloud_target_security_group_id
            || cloud.cloud_address_id != stored.cloud_address_id
            || cloud.cloud_address_group_id != stored.cloud_address_group_id
            || cloud.cloud_service_id != stored.cloud_service_id
            || cloud.cloud_service_group_id != stored.cloud_service_group_id
            || cloud.action != stored.action
            || cloud.memo != stored.memo
    }

    async fn create(&self, _kit: &Kit, items: Vec<CloudSecurityGroupRule>) -> Result<Vec<String>> {
        let templates = self.template_map(&items.iter().collect::<Vec<_>>()).await?;
        let rows = items
            .into_iter()
            .map(|c| self.build(c, &templates))
            .collect();
        self.table()
            .batch_create(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Create))
    }

    async fn update(
        &self,
        _kit: &Kit,
        items: Vec<(SecurityGroupRule, CloudSecurityGroupRule)>,
    ) -> Result<()> {
        let templates = self
            .template_map(&items.iter().map(|(_, c)| c).collect::<Vec<_>>())
            .await?;
        let rows = items
            .into_iter()
            .map(|(stored, cloud)| SecurityGroupRule {
                id: stored.id,
                ..self.build(cloud, &templates)
            })
            .collect();
        self.table()
            .batch_update(rows)
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Update))
    }
}

impl SyncClient {
    /// Sync security groups, then the rules of every group in scope
    pub async fn sync_security_group(
        &self,
        kit: &Kit,
        params: &SyncBaseParams,
    ) -> Result<SyncResult> {
        self.check_params(params)?;
        let syncer = SecurityGroupSyncer { client: self, params };
        let result = sync_resource(kit, &syncer).await?;

        let groups = list_all(
            syncer.table(),
            &syncer.store_filter(),
            self.limits.default_page_limit,
        )
        .await
        .map_err(SyncError::store_list(ResourceKind::SecurityGroup, &params.scope()))?;

        run_bounded(groups.iter(), self.limits.sync_concurrency, |group| async move {
            let kit = kit.sub_kit();
            sync_resource(&kit, &SecurityGroupRuleSyncer { client: self, group })
                .await
                .map(|_| ())
        })
        .await?;

        Ok(result)
    }

    /// Sync the rules of one security group that is already in the store
    pub async fn sync_security_group_rule(
        &self,
        kit: &Kit,
        params: &SyncBaseParams,
        cloud_security_group_id: &str,
    ) -> Result<SyncResult> {
        self.check_params(params)?;
        let filter = region_filter(self, &params.region).equal("cloud_id", cloud_security_group_id);
        let group = list_all(self.store().security_groups(), &filter, 1)
            .await
            .map_err(SyncError::store_list(ResourceKind::SecurityGroup, &params.scope()))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                SyncError::dependency(
                    ResourceKind::SecurityGroup,
                    cloud_security_group_id,
                    params.scope(),
                )
            })?;
        sync_resource(kit, &SecurityGroupRuleSyncer { client: self, group: &group }).await
    }

    pub async fn remove_security_group_deleted_from_cloud(
        &self,
        kit: &Kit,
        account_id: &str,
        region: &str,
    ) -> Result<()> {
        let params = SyncBaseParams::new(account_id, region);
        self.check_params(&params)?;
        remove_deleted_from_cloud(kit, &SecurityGroupSyncer { client: self, params: &params }).await
    }
}
