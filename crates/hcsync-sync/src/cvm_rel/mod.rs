//! CVM relationship sync

mod manager;
mod with_rel_res;

pub use with_rel_res::{CvmRelOption, supported_rel_kinds, validate_sync_rel};
