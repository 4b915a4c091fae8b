//! Gateway error types

use thiserror::Error;

/// Errors returned by cloud and store gateways
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict in {table}: {key} already exists")]
    Conflict { table: &'static str, key: String },

    #[error("Batch of {count} rows exceeds the limit of {limit} for {table}")]
    BatchLimitExceeded {
        table: &'static str,
        count: usize,
        limit: usize,
    },

    #[error("Upstream unavailable: {0}")]
    Unavailable(String),

    #[error("State file error: {0}")]
    State(String),

    #[error("Lock acquisition failed: {0}")]
    Lock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
