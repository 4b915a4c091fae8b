//! In-memory store gateway
//!
//! Tables are `BTreeMap`s keyed by local id behind async `RwLock`s. Ids come
//! from one counter shared by all tables, so they are unique store-wide and
//! sort in creation order.

use crate::error::{GatewayError, Result};
use crate::filter::{Expression, ListResult, Page};
use crate::record::Record;
use crate::store::{StoreGateway, Table, check_batch};
use async_trait::async_trait;
use hcsync_core::limits::DEFAULT_PAGE_LIMIT;
use hcsync_core::model::{
    ArgumentTemplate, Cvm, CvmRelKind, CvmRelation, Disk, Eip, Image, Listener, LoadBalancer,
    Region, Route, RouteTable, Rule, SecurityGroup, SecurityGroupRule, SgCommonRel, SubAccount,
    Subnet, Target, TargetGroup, TargetGroupRuleRel, Vpc,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    fn starting_at(next: u64) -> Self {
        Self {
            next: AtomicU64::new(next),
        }
    }

    fn generate(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{n:08}")
    }

    fn current(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}

pub struct MemoryTable<R> {
    rows: RwLock<BTreeMap<String, R>>,
    ids: Arc<IdGenerator>,
}

impl<R: Record> MemoryTable<R> {
    fn new(ids: Arc<IdGenerator>) -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            ids,
        }
    }

    async fn export(&self) -> Vec<R> {
        self.rows.read().await.values().cloned().collect()
    }

    async fn import(&self, rows: Vec<R>) {
        let mut guard = self.rows.write().await;
        guard.clear();
        for row in rows {
            guard.insert(row.id().to_string(), row);
        }
    }

    fn check_unique<'a>(
        existing: impl Iterator<Item = &'a R>,
        incoming: &[R],
    ) -> Result<()> {
        let mut keys: HashSet<String> = existing.filter_map(Record::unique_key).collect();
        for row in incoming {
            if let Some(key) = row.unique_key() {
                if !keys.insert(key.clone()) {
                    return Err(GatewayError::Conflict {
                        table: R::TABLE,
                        key,
                    });
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<R: Record> Table<R> for MemoryTable<R> {
    async fn list(&self, filter: &Expression, page: Page) -> Result<ListResult<R>> {
        if page.limit == 0 || page.limit > DEFAULT_PAGE_LIMIT {
            return Err(GatewayError::InvalidInput(format!(
                "page limit must be within 1..={}, got {}",
                DEFAULT_PAGE_LIMIT, page.limit
            )));
        }
        let guard = self.rows.read().await;
        let matched: Vec<&R> = guard.values().filter(|r| filter.matches(*r)).collect();
        let count = matched.len();
        let details = matched
            .into_iter()
            .skip(page.start)
            .take(page.limit)
            .cloned()
            .collect();
        Ok(ListResult { details, count })
    }

    async fn batch_create(&self, rows: Vec<R>) -> Result<Vec<String>> {
        check_batch::<R>(rows.len())?;
        if let Some(row) = rows.iter().find(|r| !r.id().is_empty()) {
            return Err(GatewayError::InvalidInput(format!(
                "{} create payload must not carry an id, got {}",
                R::TABLE,
                row.id()
            )));
        }

        let mut guard = self.rows.write().await;
        Self::check_unique(guard.values(), &rows)?;

        let mut ids = Vec::with_capacity(rows.len());
        for mut row in rows {
            let id = self.ids.generate();
            row.set_id(id.clone());
            guard.insert(id.clone(), row);
            ids.push(id);
        }
        tracing::debug!(table = R::TABLE, count = ids.len(), "Created rows");
        Ok(ids)
    }

    async fn batch_update(&self, rows: Vec<R>) -> Result<()> {
        check_batch::<R>(rows.len())?;
        let mut guard = self.rows.write().await;

        if let Some(row) = rows.iter().find(|r| !guard.contains_key(r.id())) {
            return Err(GatewayError::NotFound(format!("{} {}", R::TABLE, row.id())));
        }
        let updated: HashSet<&str> = rows.iter().map(Record::id).collect();
        Self::check_unique(
            guard.values().filter(|r| !updated.contains(r.id())),
            &rows,
        )?;

        for row in &rows {
            guard.insert(row.id().to_string(), row.clone());
        }
        tracing::debug!(table = R::TABLE, count = rows.len(), "Updated rows");
        Ok(())
    }

    async fn batch_delete(&self, filter: &Expression) -> Result<()> {
        if filter.is_empty() {
            return Err(GatewayError::InvalidInput(format!(
                "refusing to delete from {} without a filter",
                R::TABLE
            )));
        }
        let mut guard = self.rows.write().await;
        let before = guard.len();
        guard.retain(|_, r| !filter.matches(r));
        tracing::debug!(table = R::TABLE, count = before - guard.len(), "Deleted rows");
        Ok(())
    }
}

macro_rules! memory_store {
    ($($name:ident: $ty:ty),* $(,)?) => {
        /// Rows of every table
        #[derive(Debug, Clone, Default, Serialize, Deserialize)]
        #[serde(default)]
        pub struct StoreTables {
            $(pub $name: Vec<$ty>,)*
        }

        impl StoreTables {
            pub fn row_count(&self) -> usize {
                0 $(+ self.$name.len())*
            }

            fn max_id(&self) -> u64 {
                let mut max = 0;
                $(
                    for row in &self.$name {
                        if let Ok(n) = row.id().parse::<u64>() {
                            max = max.max(n);
                        }
                    }
                )*
                max
            }
        }

        pub struct MemoryStore {
            ids: Arc<IdGenerator>,
            $($name: MemoryTable<$ty>,)*
        }

        impl MemoryStore {
            pub fn new() -> Self {
                Self::with_ids(Arc::new(IdGenerator::default()))
            }

            fn with_ids(ids: Arc<IdGenerator>) -> Self {
                Self {
                    $($name: MemoryTable::new(ids.clone()),)*
                    ids,
                }
            }

            /// Copy out every table and the id counter
            pub async fn export(&self) -> (StoreTables, u64) {
                let tables = StoreTables {
                    $($name: self.$name.export().await,)*
                };
                (tables, self.ids.current())
            }

            /// Build a store holding `tables`. The id counter resumes after
            /// the highest id seen.
            pub async fn import(tables: StoreTables, next_id: u64) -> Self {
                let start = next_id.max(tables.max_id());
                let store = Self::with_ids(Arc::new(IdGenerator::starting_at(start)));
                $(store.$name.import(tables.$name).await;)*
                store
            }
        }
    };
}

memory_store! {
    sub_accounts: SubAccount,
    regions: Region,
    vpcs: Vpc,
    subnets: Subnet,
    security_groups: SecurityGroup,
    security_group_rules: SecurityGroupRule,
    argument_templates: ArgumentTemplate,
    images: Image,
    disks: Disk,
    eips: Eip,
    cvms: Cvm,
    route_tables: RouteTable,
    routes: Route,
    load_balancers: LoadBalancer,
    listeners: Listener,
    rules: Rule,
    target_groups: TargetGroup,
    targets: Target,
    cvm_sg_rels: CvmRelation,
    cvm_disk_rels: CvmRelation,
    cvm_eip_rels: CvmRelation,
    sg_common_rels: SgCommonRel,
    target_group_rule_rels: TargetGroupRuleRel,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreGateway for MemoryStore {
    fn sub_accounts(&self) -> &dyn Table<SubAccount> {
        &self.sub_accounts
    }

    fn regions(&self) -> &dyn Table<Region> {
        &self.regions
    }

    fn vpcs(&self) -> &dyn Table<Vpc> {
        &self.vpcs
    }

    fn subnets(&self) -> &dyn Table<Subnet> {
        &self.subnets
    }

    fn security_groups(&self) -> &dyn Table<SecurityGroup> {
        &self.security_groups
    }

    fn security_group_rules(&self) -> &dyn Table<SecurityGroupRule> {
        &self.security_group_rules
    }

    fn argument_templates(&self) -> &dyn Table<ArgumentTemplate> {
        &self.argument_templates
    }

    fn images(&self) -> &dyn Table<Image> {
        &self.images
    }

    fn disks(&self) -> &dyn Table<Disk> {
        &self.disks
    }

    fn eips(&self) -> &dyn Table<Eip> {
        &self.eips
    }

    fn cvms(&self) -> &dyn Table<Cvm> {
        &self.cvms
    }

    fn route_tables(&self) -> &dyn Table<RouteTable> {
        &self.route_tables
    }

    fn routes(&self) -> &dyn Table<Route> {
        &self.routes
    }

    fn load_balancers(&self) -> &dyn Table<LoadBalancer> {
        &self.load_balancers
    }

    fn listeners(&self) -> &dyn Table<Listener> {
        &self.listeners
    }

    fn rules(&self) -> &dyn Table<Rule> {
        &self.rules
    }

    fn target_groups(&self) -> &dyn Table<TargetGroup> {
        &self.target_groups
    }

    fn targets(&self) -> &dyn Table<Target> {
        &self.targets
    }

    fn cvm_rels(&self, kind: CvmRelKind) -> &dyn Table<CvmRelation> {
        match kind {
            CvmRelKind::SecurityGroup => &self.cvm_sg_rels,
            CvmRelKind::Disk => &self.cvm_disk_rels,
            CvmRelKind::Eip => &self.cvm_eip_rels,
        }
    }

    fn sg_common_rels(&self) -> &dyn Table<SgCommonRel> {
        &self.sg_common_rels
    }

    fn target_group_rule_rels(&self) -> &dyn Table<TargetGroupRuleRel> {
        &self.target_group_rule_rels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::list_all;
    use hcsync_core::Vendor;

    fn disk(cloud_id: &str) -> Disk {
        Disk {
            id: String::new(),
            vendor: Vendor::TCloud,
            account_id: "acc".into(),
            cloud_id: cloud_id.into(),
            name: cloud_id.into(),
            region: "ap-guangzhou".into(),
            zone: "ap-guangzhou-3".into(),
            disk_size_gb: 50,
            disk_type: "CLOUD_SSD".into(),
            status: "ATTACHED".into(),
            encrypted: false,
            is_system_disk: false,
            bk_biz_id: -1,
            memo: None,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_ordered_ids() {
        let store = MemoryStore::new();
        let ids = store
            .disks()
            .batch_create(vec![disk("disk-1"), disk("disk-2")])
            .await
            .unwrap();
        assert_eq!(ids, vec!["00000001", "00000002"]);

        let listed = store
            .vpcs()
            .list(&Expression::new(), Page::first(10))
            .await
            .unwrap();
        assert_eq!(listed.count, 0);
    }

    #[tokio::test]
    async fn test_unique_cloud_id_per_scope() {
        let store = MemoryStore::new();
        store.disks().batch_create(vec![disk("disk-1")]).await.unwrap();

        let err = store
            .disks()
            .batch_create(vec![disk("disk-1")])
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Conflict { .. }));

        let mut other_region = disk("disk-1");
        other_region.region = "ap-shanghai".into();
        assert!(store.disks().batch_create(vec![other_region]).await.is_ok());
    }

    #[tokio::test]
    async fn test_batch_limit_enforced() {
        let store = MemoryStore::new();
        let rows: Vec<Disk> = (0..101).map(|i| disk(&format!("disk-{i}"))).collect();
        let err = store.disks().batch_create(rows).await.unwrap_err();
        assert!(matches!(err, GatewayError::BatchLimitExceeded { count: 101, .. }));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = MemoryStore::new();
        let ids = store
            .disks()
            .batch_create(vec![disk("disk-1"), disk("disk-2")])
            .await
            .unwrap();

        let mut row = disk("disk-1");
        row.id = ids[0].clone();
        row.status = "UNATTACHED".into();
        store.disks().batch_update(vec![row]).await.unwrap();

        store
            .disks()
            .batch_delete(&Expression::new().is_in("cloud_id", ["disk-2"]))
            .await
            .unwrap();

        let rows = list_all(store.disks(), &Expression::new(), 500).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, "UNATTACHED");
    }

    #[tokio::test]
    async fn test_update_missing_row_fails() {
        let store = MemoryStore::new();
        let mut row = disk("disk-1");
        row.id = "00000042".into();
        let err = store.disks().batch_update(vec![row]).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_requires_filter() {
        let store = MemoryStore::new();
        assert!(store.disks().batch_delete(&Expression::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_paging() {
        let store = MemoryStore::new();
        let rows: Vec<Disk> = (0..30).map(|i| disk(&format!("disk-{i}"))).collect();
        store.disks().batch_create(rows).await.unwrap();

        let page = store
            .disks()
            .list(&Expression::new(), Page::new(20, 20))
            .await
            .unwrap();
        assert_eq!(page.count, 30);
        assert_eq!(page.details.len(), 10);

        let all = list_all(store.disks(), &Expression::new(), 7).await.unwrap();
        assert_eq!(all.len(), 30);
    }

    #[tokio::test]
    async fn test_export_import_resumes_ids() {
        let store = MemoryStore::new();
        store.disks().batch_create(vec![disk("disk-1")]).await.unwrap();
        let (tables, next_id) = store.export().await;
        assert_eq!(tables.row_count(), 1);

        let restored = MemoryStore::import(tables, next_id).await;
        let ids = restored
            .disks()
            .batch_create(vec![disk("disk-2")])
            .await
            .unwrap();
        assert_eq!(ids, vec!["00000002"]);
    }
}
