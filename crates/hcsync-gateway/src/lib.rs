//! hcsync gateways
//!
//! The two collaborators every orchestrator talks to:
//!
//! - [`CloudGateway`]: paged, id-filterable listings of one vendor account
//! - [`StoreGateway`]: batched CRUD over the system-of-record tables
//!
//! [`MemoryStore`] and [`FixtureCloud`] implement them in process; the
//! [`StateManager`] persists a [`MemoryStore`] between runs.

pub mod cloud;
pub mod error;
pub mod filter;
pub mod fixture;
pub mod memory;
pub mod record;
pub mod snapshot;
pub mod store;

// Re-exports
pub use cloud::{CloudGateway, CloudPage, ListOption};
pub use error::{GatewayError, Result};
pub use filter::{Condition, Expression, ListResult, Page};
pub use fixture::{CloudInventory, FixtureCloud, RegionInventory};
pub use memory::{MemoryStore, StoreTables};
pub use record::Record;
pub use snapshot::{StateLock, StateManager, StoreSnapshot};
pub use store::{ListenerWithRule, StoreGateway, Table, TargetGroupWithRel, list_all};
