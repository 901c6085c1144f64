//! Error types
//!
//! Only two failure classes ever reach a query caller: the underlying
//! executor failing, and contract violations (an empty caller-supplied cache
//! key, or a result that cannot decode into the requested type). Cache-layer
//! trouble, observer failures, and sink outages are absorbed and logged where
//! they occur: the support layers degrade to "slower but correct".

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller supplied an explicit cache key that is empty.
    #[error("invalid cache key: key must not be empty")]
    InvalidKey,

    /// The underlying query execution failed. The failure was still recorded
    /// as a trail before propagating.
    #[error("query execution failed: {0}")]
    Executor(anyhow::Error),

    /// The executed (or cached) value did not decode into the requested type.
    #[error("result decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
