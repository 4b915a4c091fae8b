//! Diff engine
//!
//! Partitions a cloud listing against stored rows by cloud id. The result is
//! pure data; callers decide what to do with an empty cloud listing.

use crate::resource::{CloudResource, StoreResource};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Diff result with deletions keyed by cloud id
#[derive(Debug, Clone, PartialEq)]
pub struct DiffResult<C> {
    pub to_add: Vec<C>,
    /// Changed cloud items keyed by the matching row's local id
    pub to_update: BTreeMap<String, C>,
    pub to_delete_cloud_ids: Vec<String>,
}

/// Diff result with deletions keyed by local id
#[derive(Debug, Clone, PartialEq)]
pub struct LocalDiffResult<C> {
    pub to_add: Vec<C>,
    pub to_update: BTreeMap<String, C>,
    pub to_delete_ids: Vec<String>,
}

impl<C> DiffResult<C> {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty() && self.to_delete_cloud_ids.is_empty()
    }
}

impl<C> LocalDiffResult<C> {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty() && self.to_delete_ids.is_empty()
    }
}

/// Compare `cloud` against `store`.
///
/// Cloud items with the same cloud id as an earlier one are ignored.
pub fn diff<C, S, F>(cloud: Vec<C>, store: &[S], is_changed: F) -> DiffResult<C>
where
    C: CloudResource,
    S: StoreResource,
    F: Fn(&C, &S) -> bool,
{
    let (to_add, to_update, unseen) = partition(cloud, store, is_changed);
    DiffResult {
        to_add,
        to_update,
        to_delete_cloud_ids: unseen
            .into_iter()
            .map(|s| StoreResource::cloud_id(s).to_string())
            .collect(),
    }
}

/// Same as [`diff`], returning local ids for the rows to delete
pub fn diff_local_ids<C, S, F>(cloud: Vec<C>, store: &[S], is_changed: F) -> LocalDiffResult<C>
where
    C: CloudResource,
    S: StoreResource,
    F: Fn(&C, &S) -> bool,
{
    let (to_add, to_update, unseen) = partition(cloud, store, is_changed);
    LocalDiffResult {
        to_add,
        to_update,
        to_delete_ids: unseen.into_iter().map(|s| s.id().to_string()).collect(),
    }
}

type Partition<'s, C, S> = (Vec<C>, BTreeMap<String, C>, Vec<&'s S>);

fn partition<'s, C, S, F>(cloud: Vec<C>, store: &'s [S], is_changed: F) -> Partition<'s, C, S>
where
    C: CloudResource,
    S: StoreResource,
    F: Fn(&C, &S) -> bool,
{
    let index: HashMap<&str, &S> = store
        .iter()
        .map(|s| (StoreResource::cloud_id(s), s))
        .collect();

    let mut seen: HashSet<String> = HashSet::with_capacity(cloud.len());
    let mut to_add = Vec::new();
    let mut to_update = BTreeMap::new();

    for item in cloud {
        let cloud_id = CloudResource::cloud_id(&item).to_string();
        if !seen.insert(cloud_id.clone()) {
            continue;
        }
        match index.get(cloud_id.as_str()) {
            None => to_add.push(item),
            Some(stored) => {
                if is_changed(&item, stored) {
                    to_update.insert(stored.id().to_string(), item);
                }
            }
        }
    }

    let unseen = store
        .iter()
        .filter(|s| !seen.contains(StoreResource::cloud_id(*s)))
        .collect();

    (to_add, to_update, unseen)
}
