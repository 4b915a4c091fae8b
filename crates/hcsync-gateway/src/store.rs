//! Store gateway
//!
//! The store is a set of tables, one per row type. Every batch call is a
//! single unit of work at the store level and carries at most
//! [`BATCH_OPERATION_MAX_LIMIT`] rows.

use crate::error::{GatewayError, Result};
use crate::filter::{Expression, ListResult, Page};
use crate::record::Record;
use async_trait::async_trait;
use hcsync_core::limits::BATCH_OPERATION_MAX_LIMIT;
use hcsync_core::model::{
    ArgumentTemplate, Cvm, CvmRelKind, CvmRelation, Disk, Eip, Image, Listener, LoadBalancer,
    Region, Route, RouteTable, Rule, SecurityGroup, SecurityGroupRule, SgCommonRel, SubAccount,
    Subnet, Target, TargetGroup, TargetGroupRuleRel, Vpc,
};

/// CRUD over one row type
#[async_trait]
pub trait Table<R: Record>: Send + Sync {
    async fn list(&self, filter: &Expression, page: Page) -> Result<ListResult<R>>;

    /// Insert rows; ids are assigned by the store and returned in input order
    async fn batch_create(&self, rows: Vec<R>) -> Result<Vec<String>>;

    /// Replace rows by id
    async fn batch_update(&self, rows: Vec<R>) -> Result<()>;

    /// Delete every row matching a non-empty filter
    async fn batch_delete(&self, filter: &Expression) -> Result<()>;
}

pub(crate) fn check_batch<R: Record>(count: usize) -> Result<()> {
    if count > BATCH_OPERATION_MAX_LIMIT {
        return Err(GatewayError::BatchLimitExceeded {
            table: R::TABLE,
            count,
            limit: BATCH_OPERATION_MAX_LIMIT,
        });
    }
    Ok(())
}

/// A layer-4 listener together with its companion rule
#[derive(Debug, Clone)]
pub struct ListenerWithRule {
    pub listener: Listener,
    pub rule: Rule,
}

/// A target group created for backends that had no local group, with the
/// relation binding it to its rule
#[derive(Debug, Clone)]
pub struct TargetGroupWithRel {
    pub target_group: TargetGroup,
    pub rel: TargetGroupRuleRel,
    pub targets: Vec<Target>,
}

/// Access to every table of the system of record
#[async_trait]
pub trait StoreGateway: Send + Sync {
    fn sub_accounts(&self) -> &dyn Table<SubAccount>;
    fn regions(&self) -> &dyn Table<Region>;
    fn vpcs(&self) -> &dyn Table<Vpc>;
    fn subnets(&self) -> &dyn Table<Subnet>;
    fn security_groups(&self) -> &dyn Table<SecurityGroup>;
    fn security_group_rules(&self) -> &dyn Table<SecurityGroupRule>;
    fn argument_templates(&self) -> &dyn Table<ArgumentTemplate>;
    fn images(&self) -> &dyn Table<Image>;
    fn disks(&self) -> &dyn Table<Disk>;
    fn eips(&self) -> &dyn Table<Eip>;
    fn cvms(&self) -> &dyn Table<Cvm>;
    fn route_tables(&self) -> &dyn Table<RouteTable>;
    fn routes(&self) -> &dyn Table<Route>;
    fn load_balancers(&self) -> &dyn Table<LoadBalancer>;
    fn listeners(&self) -> &dyn Table<Listener>;
    fn rules(&self) -> &dyn Table<Rule>;
    fn target_groups(&self) -> &dyn Table<TargetGroup>;
    fn targets(&self) -> &dyn Table<Target>;
    fn cvm_rels(&self, kind: CvmRelKind) -> &dyn Table<CvmRelation>;
    fn sg_common_rels(&self) -> &dyn Table<SgCommonRel>;
    fn target_group_rule_rels(&self) -> &dyn Table<TargetGroupRuleRel>;

    /// Create layer-4 listeners and their companion rules. Returns the
    /// listener ids.
    async fn create_listeners_with_rules(&self, items: Vec<ListenerWithRule>) -> Result<Vec<String>> {
        check_batch::<Listener>(items.len())?;
        let (listeners, rules): (Vec<Listener>, Vec<Rule>) =
            items.into_iter().map(|i| (i.listener, i.rule)).unzip();

        let ids = self.listeners().batch_create(listeners).await?;
        let rules = rules
            .into_iter()
            .zip(ids.iter())
            .map(|(mut rule, lbl_id)| {
                rule.lbl_id = lbl_id.clone();
                rule
            })
            .collect();
        self.rules().batch_create(rules).await?;
        Ok(ids)
    }

    /// Create a target group, bind it to its rule and add its targets.
    /// Returns the target group id.
    async fn create_target_group_with_rel(&self, item: TargetGroupWithRel) -> Result<String> {
        check_batch::<Target>(item.targets.len())?;
        let ids = self
            .target_groups()
            .batch_create(vec![item.target_group])
            .await?;
        let tg_id = ids
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::NotFound("created target group id".to_string()))?;

        let mut rel = item.rel;
        rel.target_group_id = tg_id.clone();
        self.target_group_rule_rels().batch_create(vec![rel]).await?;

        let targets: Vec<Target> = item
            .targets
            .into_iter()
            .map(|mut t| {
                t.target_group_id = tg_id.clone();
                t
            })
            .collect();
        if !targets.is_empty() {
            self.targets().batch_create(targets).await?;
        }
        Ok(tg_id)
    }

    /// Delete listeners by id together with their rules and the rules'
    /// target group bindings
    async fn delete_listeners_cascade(&self, listener_ids: &[String]) -> Result<()> {
        if listener_ids.is_empty() {
            return Ok(());
        }
        check_batch::<Listener>(listener_ids.len())?;
        self.target_group_rule_rels()
            .batch_delete(&Expression::new().is_in("lbl_id", listener_ids))
            .await?;
        self.rules()
            .batch_delete(&Expression::new().is_in("lbl_id", listener_ids))
            .await?;
        self.listeners()
            .batch_delete(&Expression::new().is_in("id", listener_ids))
            .await
    }

    /// Delete rules by id together with their target group bindings
    async fn delete_rules_cascade(&self, rule_ids: &[String]) -> Result<()> {
        if rule_ids.is_empty() {
            return Ok(());
        }
        check_batch::<Rule>(rule_ids.len())?;
        self.target_group_rule_rels()
            .batch_delete(&Expression::new().is_in("listener_rule_id", rule_ids))
            .await?;
        self.rules()
            .batch_delete(&Expression::new().is_in("id", rule_ids))
            .await
    }
}

/// Read every row matching `filter`, one page at a time
pub async fn list_all<R: Record>(
    table: &dyn Table<R>,
    filter: &Expression,
    page_limit: usize,
) -> Result<Vec<R>> {
    let mut page = Page::first(page_limit);
    let mut rows = Vec::new();
    loop {
        let result = table.list(filter, page).await?;
        let fetched = result.details.len();
        rows.extend(result.details);
        if fetched < page.limit || rows.len() >= result.count {
            break;
        }
        page = page.next_page();
    }
    Ok(rows)
}
