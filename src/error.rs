//! Error types shared across the crawl engine.

use thiserror::Error;

/// Errors surfaced by the engine itself. Per-resource failures (network,
/// filtering) are reported through the listener contract instead and never
/// abort the crawl.
#[derive(Debug, Error)]
pub enum SpiderError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid seed URI `{uri}`: {reason}")]
    InvalidSeed { uri: String, reason: String },

    #[error("pending-request store error: {0}")]
    Store(#[from] StoreError),
}

/// Failures of the pending-request staging collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to stage pending request: {0}")]
    Persist(String),

    #[error("unknown pending-request handle {0}")]
    UnknownHandle(u64),
}
