//! Orchestrators for the flat resource types
//!
//! One module per resource family. Each exposes `SyncClient::sync_*` and,
//! where the scope is account/region, `SyncClient::remove_*_deleted_from_cloud`.

pub mod account;
pub mod argument_template;
pub mod cvm;
pub mod disk;
pub mod eip;
pub mod image;
pub mod route_table;
pub mod security_group;
pub mod subnet;
pub mod vpc;

pub use disk::SyncDiskOption;
