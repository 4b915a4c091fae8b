//! Shared orchestrator state machine
//!
//! `list cloud -> list store -> (both empty: done) -> diff -> validate and
//! delete -> create -> update`. Every stage runs to completion before the
//! next one starts and the first error aborts the invocation; batches that
//! were already committed stay committed.

use crate::client::SyncClient;
use crate::error::{Result, StoreOp, SyncError};
use crate::params::SyncResult;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use hcsync_core::{CloudResource, Kit, ResourceKind, StoreResource, diff, diff_local_ids};
use hcsync_gateway::{CloudGateway, Expression, ListOption, Page, Record, Table, list_all};
use std::collections::{HashMap, HashSet};

/// Key the store delete call of a resource type expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteKey {
    CloudId,
    LocalId,
}

/// One resource type bound to one sync scope
#[async_trait]
pub trait ResourceSyncer: Send + Sync {
    type Cloud: CloudResource + Clone + Send + Sync + 'static;
    type Local: StoreResource + Record;

    const KIND: ResourceKind;
    const DELETE_BY: DeleteKey = DeleteKey::CloudId;

    fn client(&self) -> &SyncClient;

    /// Human readable scope for logs and errors
    fn scope(&self) -> String;

    fn table(&self) -> &dyn Table<Self::Local>;

    /// Store rows that belong to the scope
    fn store_filter(&self) -> Expression;

    async fn list_from_cloud(&self, kit: &Kit) -> Result<Vec<Self::Cloud>>;

    /// Look up resources of the scope by cloud id, chunked to the provider
    /// limit
    async fn list_cloud_by_ids(&self, kit: &Kit, cloud_ids: &[String]) -> Result<Vec<Self::Cloud>>;

    fn is_changed(&self, cloud: &Self::Cloud, stored: &Self::Local) -> bool;

    /// Create rows for at most one batch of new cloud resources
    async fn create(&self, kit: &Kit, items: Vec<Self::Cloud>) -> Result<Vec<String>>;

    /// Update at most one batch of changed rows
    async fn update(&self, kit: &Kit, items: Vec<(Self::Local, Self::Cloud)>) -> Result<()>;

    async fn list_from_store(&self, _kit: &Kit) -> Result<Vec<Self::Local>> {
        list_all(
            self.table(),
            &self.store_filter(),
            self.client().limits.default_page_limit,
        )
        .await
        .map_err(SyncError::store_list(Self::KIND, &self.scope()))
    }

    /// Delete at most one batch of rows, keyed per [`Self::DELETE_BY`]
    async fn delete(&self, _kit: &Kit, keys: Vec<String>) -> Result<()> {
        let field = match Self::DELETE_BY {
            DeleteKey::CloudId => "cloud_id",
            DeleteKey::LocalId => "id",
        };
        self.table()
            .batch_delete(&self.store_filter().is_in(field, &keys))
            .await
            .map_err(SyncError::store_write(Self::KIND, StoreOp::Delete))
    }
}

/// Converge the scope of `syncer`
pub async fn sync_resource<S: ResourceSyncer>(kit: &Kit, syncer: &S) -> Result<SyncResult> {
    let result = run_sync(kit, syncer).await;
    if let Err(err) = &result {
        let client = syncer.client();
        tracing::error!(
            rid = %kit.rid,
            vendor = %client.vendor,
            account_id = %client.account_id,
            kind = %S::KIND,
            scope = %syncer.scope(),
            error = %err,
            "Sync failed"
        );
    }
    result
}

async fn run_sync<S: ResourceSyncer>(kit: &Kit, syncer: &S) -> Result<SyncResult> {
    let cloud = syncer.list_from_cloud(kit).await?;
    let stored = syncer.list_from_store(kit).await?;

    if cloud.is_empty() && stored.is_empty() {
        tracing::debug!(rid = %kit.rid, kind = %S::KIND, scope = %syncer.scope(), "Nothing to sync");
        return Ok(SyncResult::default());
    }

    let (to_add, to_update, delete_keys, delete_cloud_ids) = match S::DELETE_BY {
        DeleteKey::CloudId => {
            let result = diff(cloud, &stored, |c, s| syncer.is_changed(c, s));
            let ids = result.to_delete_cloud_ids;
            (result.to_add, result.to_update, ids.clone(), ids)
        }
        DeleteKey::LocalId => {
            let result = diff_local_ids(cloud, &stored, |c, s| syncer.is_changed(c, s));
            let doomed: HashSet<&str> = result.to_delete_ids.iter().map(String::as_str).collect();
            let cloud_ids = stored
                .iter()
                .filter(|s| doomed.contains(StoreResource::id(*s)))
                .map(|s| StoreResource::cloud_id(s).to_string())
                .collect();
            (result.to_add, result.to_update, result.to_delete_ids, cloud_ids)
        }
    };

    if !delete_keys.is_empty() {
        validate_deleted(kit, syncer, &delete_cloud_ids).await?;
        delete_in_batches(kit, syncer, delete_keys).await?;
    }

    let mut result = SyncResult::default();
    if !to_add.is_empty() {
        result.created_ids = create_in_batches(kit, syncer, to_add).await?;
    }

    if !to_update.is_empty() {
        let by_id: HashMap<&str, &S::Local> =
            stored.iter().map(|s| (StoreResource::id(s), s)).collect();
        let pairs: Vec<(S::Local, S::Cloud)> = to_update
            .into_iter()
            .filter_map(|(id, item)| by_id.get(id.as_str()).map(|s| ((*s).clone(), item)))
            .collect();
        update_in_batches(kit, syncer, pairs).await?;
    }

    Ok(result)
}

/// Re-query the cloud for resources about to be deleted; any hit aborts
pub async fn validate_deleted<S: ResourceSyncer>(
    kit: &Kit,
    syncer: &S,
    cloud_ids: &[String],
) -> Result<()> {
    if cloud_ids.is_empty() {
        return Ok(());
    }
    let present = syncer.list_cloud_by_ids(kit, cloud_ids).await?;
    if !present.is_empty() {
        let survivors: Vec<String> = present
            .iter()
            .map(|c| CloudResource::cloud_id(c).to_string())
            .collect();
        tracing::error!(
            rid = %kit.rid,
            kind = %S::KIND,
            scope = %syncer.scope(),
            count = survivors.len(),
            "Resources to delete still exist in cloud"
        );
        return Err(SyncError::ConsistencyViolation {
            kind: S::KIND,
            cloud_ids: survivors,
        });
    }
    Ok(())
}

async fn delete_in_batches<S: ResourceSyncer>(kit: &Kit, syncer: &S, keys: Vec<String>) -> Result<()> {
    let limit = syncer.client().limits.batch_operation_max_limit;
    for chunk in into_chunks(keys, limit) {
        let count = chunk.len();
        syncer.delete(kit, chunk).await?;
        log_batch(kit, syncer, StoreOp::Delete, count);
    }
    Ok(())
}

async fn create_in_batches<S: ResourceSyncer>(
    kit: &Kit,
    syncer: &S,
    items: Vec<S::Cloud>,
) -> Result<Vec<String>> {
    let limit = syncer.client().limits.batch_operation_max_limit;
    let mut ids = Vec::with_capacity(items.len());
    for chunk in into_chunks(items, limit) {
        let created = syncer.create(kit, chunk).await?;
        log_batch(kit, syncer, StoreOp::Create, created.len());
        ids.extend(created);
    }
    Ok(ids)
}

async fn update_in_batches<S: ResourceSyncer>(
    kit: &Kit,
    syncer: &S,
    items: Vec<(S::Local, S::Cloud)>,
) -> Result<()> {
    let limit = syncer.client().limits.batch_operation_max_limit;
    for chunk in into_chunks(items, limit) {
        let count = chunk.len();
        syncer.update(kit, chunk).await?;
        log_batch(kit, syncer, StoreOp::Update, count);
    }
    Ok(())
}

fn log_batch<S: ResourceSyncer>(kit: &Kit, syncer: &S, op: StoreOp, count: usize) {
    let client = syncer.client();
    tracing::info!(
        rid = %kit.rid,
        vendor = %client.vendor,
        account_id = %client.account_id,
        kind = %S::KIND,
        scope = %syncer.scope(),
        op = %op,
        count,
        "Committed sync batch"
    );
}

/// Delete stored rows of the scope whose cloud resource is gone.
///
/// Pages through the store one batch at a time, looks the page up in the
/// cloud and runs the validate-then-delete path for the missing part.
pub async fn remove_deleted_from_cloud<S: ResourceSyncer>(kit: &Kit, syncer: &S) -> Result<()> {
    let result = run_sweep(kit, syncer).await;
    if let Err(err) = &result {
        tracing::error!(
            rid = %kit.rid,
            kind = %S::KIND,
            scope = %syncer.scope(),
            error = %err,
            "Remove deleted from cloud failed"
        );
    }
    result
}

async fn run_sweep<S: ResourceSyncer>(kit: &Kit, syncer: &S) -> Result<()> {
    let limit = syncer.client().limits.batch_operation_max_limit;
    let filter = syncer.store_filter();
    let mut start = 0;

    loop {
        let page = syncer
            .table()
            .list(&filter, Page::new(start, limit))
            .await
            .map_err(SyncError::store_list(S::KIND, &syncer.scope()))?;
        let fetched = page.details.len();
        if fetched == 0 {
            break;
        }

        let cloud_ids: Vec<String> = page
            .details
            .iter()
            .map(|r| StoreResource::cloud_id(r).to_string())
            .collect();
        let present: HashSet<String> = syncer
            .list_cloud_by_ids(kit, &cloud_ids)
            .await?
            .iter()
            .map(|c| CloudResource::cloud_id(c).to_string())
            .collect();

        let gone: Vec<&S::Local> = page
            .details
            .iter()
            .filter(|r| !present.contains(StoreResource::cloud_id(*r)))
            .collect();

        if !gone.is_empty() {
            let gone_cloud_ids: Vec<String> = gone
                .iter()
                .map(|r| StoreResource::cloud_id(*r).to_string())
                .collect();
            validate_deleted(kit, syncer, &gone_cloud_ids).await?;

            let keys = match S::DELETE_BY {
                DeleteKey::CloudId => gone_cloud_ids,
                DeleteKey::LocalId => gone.iter().map(|r| StoreResource::id(*r).to_string()).collect(),
            };
            syncer.delete(kit, keys).await?;
            log_batch(kit, syncer, StoreOp::Delete, gone.len());
        }

        if fetched < limit {
            break;
        }
        // Deleted rows no longer occupy offsets
        start += fetched - gone.len();
    }
    Ok(())
}

/// List cloud resources of a region, either every page or exactly
/// `cloud_ids` in provider-sized chunks
pub(crate) async fn list_cloud<T, F>(
    client: &SyncClient,
    kind: ResourceKind,
    region: &str,
    cloud_ids: &[String],
    list: F,
) -> Result<Vec<T>>
where
    T: Send,
    F: for<'a> Fn(&'a dyn CloudGateway, ListOption) -> BoxFuture<'a, hcsync_gateway::Result<Vec<T>>>
        + Send
        + Sync,
{
    let cloud = client.cloud();
    let limit = cloud.max_ids_per_call(kind).max(1);
    let scope = format!("{}/{}", client.account_id, region);
    let mut all = Vec::new();

    if cloud_ids.is_empty() {
        let mut offset = 0;
        loop {
            let opt = ListOption::region(region).with_page(offset, limit);
            let page = list(cloud, opt)
                .await
                .map_err(SyncError::cloud_list(kind, &scope))?;
            let fetched = page.len();
            all.extend(page);
            if fetched < limit {
                break;
            }
            offset += limit;
        }
    } else {
        for chunk in cloud_ids.chunks(limit) {
            let opt = ListOption::region(region).with_cloud_ids(chunk.to_vec());
            let found = list(cloud, opt)
                .await
                .map_err(SyncError::cloud_list(kind, &scope))?;
            all.extend(found);
        }
    }
    Ok(all)
}

/// Rows of `table` matching `base`, indexed by cloud id
pub(crate) async fn map_by_cloud_id<R>(
    client: &SyncClient,
    table: &dyn Table<R>,
    kind: ResourceKind,
    base: &Expression,
    cloud_ids: &[String],
) -> Result<HashMap<String, R>>
where
    R: Record + StoreResource,
{
    let ids = hcsync_core::slice::unique(cloud_ids.iter().filter(|id| !id.is_empty()).cloned());
    let mut map = HashMap::with_capacity(ids.len());
    for chunk in ids.chunks(client.limits.batch_operation_max_limit) {
        let filter = base.clone().is_in("cloud_id", chunk);
        let rows = list_all(table, &filter, client.limits.default_page_limit)
            .await
            .map_err(SyncError::store_list(kind, &client.account_id))?;
        for row in rows {
            map.insert(StoreResource::cloud_id(&row).to_string(), row);
        }
    }
    Ok(map)
}

/// Filter for rows of this client's vendor and account in `region`
pub(crate) fn region_filter(client: &SyncClient, region: &str) -> Expression {
    Expression::new()
        .equal("vendor", client.vendor)
        .equal("account_id", &client.account_id)
        .equal("region", region)
}

/// Narrow `filter` to `cloud_ids` when any are given
pub(crate) fn with_cloud_ids(filter: Expression, cloud_ids: &[String]) -> Expression {
    if cloud_ids.is_empty() {
        filter
    } else {
        filter.is_in("cloud_id", cloud_ids)
    }
}

pub(crate) fn into_chunks<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut chunks = Vec::with_capacity(items.len().div_ceil(size));
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        chunks.push(iter.by_ref().take(size).collect());
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_chunks() {
        let chunks = into_chunks((0..205).collect::<Vec<u32>>(), 100);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[2], vec![200, 201, 202, 203, 204]);
        assert!(into_chunks(Vec::<u32>::new(), 10).is_empty());
    }
}
