//! hcsync core
//!
//! Pure building blocks shared by every other hcsync crate:
//!
//! - the resource model (cloud-side and store-side shapes per resource type,
//!   plus the relation rows that join them)
//! - the [`diff`] engine that partitions a cloud listing against stored rows
//! - the [`ordered`] relation planner for priority-ordered bindings
//! - request context ([`Kit`]) and sync limits
//!
//! Nothing in this crate performs I/O.

pub mod diff;
pub mod error;
pub mod kit;
pub mod limits;
pub mod model;
pub mod ordered;
pub mod resource;
pub mod slice;
pub mod vendor;

// Re-exports
pub use diff::{DiffResult, LocalDiffResult, diff, diff_local_ids};
pub use error::{CoreError, Result};
pub use kit::Kit;
pub use limits::SyncLimits;
pub use ordered::{OrderedRelPlan, OrderedRelation, plan_ordered_relation};
pub use resource::{CloudResource, StoreResource};
pub use vendor::{ResourceKind, Vendor};
