//! Sync error types

use hcsync_core::{CoreError, ResourceKind, Vendor};
use hcsync_gateway::GatewayError;
use std::fmt;
use thiserror::Error;

/// Store mutation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Create,
    Update,
    Delete,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreOp::Create => write!(f, "create"),
            StoreOp::Update => write!(f, "update"),
            StoreOp::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to list {kind} from cloud ({scope}): {source}")]
    CloudList {
        kind: ResourceKind,
        scope: String,
        #[source]
        source: GatewayError,
    },

    #[error("Failed to list {kind} from store ({scope}): {source}")]
    StoreList {
        kind: ResourceKind,
        scope: String,
        #[source]
        source: GatewayError,
    },

    #[error("Failed to {op} {kind} in store: {source}")]
    StoreWrite {
        kind: ResourceKind,
        op: StoreOp,
        #[source]
        source: GatewayError,
    },

    #[error("{kind} {} still exist in cloud, refusing to delete", cloud_ids.join(","))]
    ConsistencyViolation {
        kind: ResourceKind,
        cloud_ids: Vec<String>,
    },

    #[error("{kind} {cloud_id} referenced by {owner} not found")]
    DependencyNotFound {
        kind: ResourceKind,
        cloud_id: String,
        owner: String,
    },

    #[error("{vendor} does not support syncing cvm relations with {kind}")]
    UnsupportedRelation { vendor: Vendor, kind: ResourceKind },
}

impl SyncError {
    pub fn cloud_list(kind: ResourceKind, scope: &str) -> impl FnOnce(GatewayError) -> Self + '_ {
        move |source| SyncError::CloudList {
            kind,
            scope: scope.to_string(),
            source,
        }
    }

    pub fn store_list(kind: ResourceKind, scope: &str) -> impl FnOnce(GatewayError) -> Self + '_ {
        move |source| SyncError::StoreList {
            kind,
            scope: scope.to_string(),
            source,
        }
    }

    pub fn store_write(kind: ResourceKind, op: StoreOp) -> impl FnOnce(GatewayError) -> Self {
        move |source| SyncError::StoreWrite { kind, op, source }
    }

    pub fn dependency(kind: ResourceKind, cloud_id: impl Into<String>, owner: impl Into<String>) -> Self {
        SyncError::DependencyNotFound {
            kind,
            cloud_id: cloud_id.into(),
            owner: owner.into(),
        }
    }
}

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        SyncError::InvalidInput(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
