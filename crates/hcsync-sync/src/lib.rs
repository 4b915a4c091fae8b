//! hcsync sync
//!
//! Orchestrators that converge the store with a cloud account. Every entry
//! point hangs off [`SyncClient`]:
//!
//! - `sync_*` for one resource type in one scope
//! - `remove_*_deleted_from_cloud` sweeps for rows the cloud no longer has
//! - [`SyncClient::sync_load_balancer_with_rel`] for the load balancer tree
//! - [`SyncClient::sync_cvm_with_rel_res`] for instances and what they use

pub mod client;
pub mod concurrency;
pub mod cvm_rel;
pub mod error;
mod load_balancer;
pub mod orchestrator;
pub mod params;
pub mod resources;

// Re-exports
pub use client::SyncClient;
pub use concurrency::run_bounded;
pub use cvm_rel::{CvmRelOption, supported_rel_kinds, validate_sync_rel};
pub use error::{Result, StoreOp, SyncError};
pub use orchestrator::{DeleteKey, ResourceSyncer, remove_deleted_from_cloud, sync_resource};
pub use params::{SyncBaseParams, SyncResult};
pub use resources::SyncDiskOption;
