//! Ordered relation planner
//!
//! Plans the edit that makes a stored priority-ordered binding list match the
//! order reported by the cloud. The common prefix (same target at the same
//! 1-based priority) is kept; everything from the first divergence on is
//! rewritten with priorities continuing from that point.

use crate::slice::unique;
use std::collections::HashSet;

/// One stored binding of an owner to a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedRelation {
    pub target_id: String,
    pub priority: i64,
}

impl OrderedRelation {
    pub fn new(target_id: impl Into<String>, priority: i64) -> Self {
        Self {
            target_id: target_id.into(),
            priority,
        }
    }
}

/// Planned edit for one owner
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderedRelPlan {
    /// Targets of the untouched prefix
    pub stays: Vec<String>,
    /// Rows to write for the rewritten tail
    pub upserts: Vec<OrderedRelation>,
    /// Stored targets outside the prefix; their rows must be deleted first
    pub delete_target_ids: Vec<String>,
    /// Priorities of extra rows for a prefix target, deleted by priority so
    /// the prefix row survives
    pub delete_priorities: Vec<i64>,
}

impl OrderedRelPlan {
    pub fn is_noop(&self) -> bool {
        self.upserts.is_empty() && self.delete_target_ids.is_empty() && self.delete_priorities.is_empty()
    }

    /// Final ordered target list once the plan is applied
    pub fn final_order(&self) -> Vec<String> {
        self.stays
            .iter()
            .cloned()
            .chain(self.upserts.iter().map(|r| r.target_id.clone()))
            .collect()
    }
}

/// Plan the rewrite of `stored` so that it follows `cloud_order`.
///
/// `cloud_order` holds target ids already translated to local ids. Duplicate
/// entries keep their first position.
pub fn plan_ordered_relation(cloud_order: &[String], stored: &[OrderedRelation]) -> OrderedRelPlan {
    let cloud_order = unique(cloud_order.iter().cloned());

    let mut stored: Vec<&OrderedRelation> = stored.iter().collect();
    stored.sort_by_key(|r| r.priority);

    let divergence = cloud_order
        .iter()
        .zip(stored.iter())
        .enumerate()
        .take_while(|(i, (target, rel))| rel.target_id == **target && rel.priority == *i as i64 + 1)
        .count();

    let stays: Vec<String> = cloud_order[..divergence].to_vec();
    let upserts = cloud_order[divergence..]
        .iter()
        .enumerate()
        .map(|(offset, target)| OrderedRelation::new(target.clone(), (divergence + offset) as i64 + 1))
        .collect();

    let keep: HashSet<&str> = stays.iter().map(String::as_str).collect();
    let delete_target_ids = unique(
        stored
            .iter()
            .filter(|r| !keep.contains(r.target_id.as_str()))
            .map(|r| r.target_id.clone()),
    );
    let delete_priorities = stored[divergence..]
        .iter()
        .filter(|r| keep.contains(r.target_id.as_str()))
        .map(|r| r.priority)
        .collect();

    OrderedRelPlan {
        stays,
        upserts,
        delete_target_ids,
        delete_priorities,
    }
}
