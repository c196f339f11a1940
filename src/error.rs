//! Error types for the cache provider
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use thiserror::Error;

use crate::codec::{DecodingError, EncodingError};

// == Cache Error Enum ==
/// Unified error type for the cache provider.
///
/// A cache miss is never represented here: reads return `Option` and `None`
/// is the miss.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Wrong provider role or malformed connection parameters
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Handshake or round-trip failure against the remote store
    #[error("store unavailable: {0}")]
    Connectivity(#[from] StoreError),

    /// Value could not be serialized into an entry
    #[error("encoding failed: {0}")]
    Encoding(#[from] EncodingError),

    /// Stored bytes could not be turned back into an entry
    #[error("decoding failed: {0}")]
    Decoding(#[from] DecodingError),
}

// == Store Error Enum ==
/// Failure reported by a [`Store`](crate::store::Store) round trip.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No connection could be checked out of the pool
    #[error("connection pool: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    /// The server or the client library rejected the command
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    /// The round trip did not finish within the configured bound
    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    /// Transport failure from a non-Redis store implementation
    #[error("{0}")]
    Unavailable(String),
}

impl StoreError {
    /// Returns true for transport faults that may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Timeout(_) => true,
            StoreError::Pool(deadpool_redis::PoolError::Timeout(_)) => true,
            StoreError::Pool(deadpool_redis::PoolError::Backend(e)) | StoreError::Redis(e) => {
                e.is_io_error() || e.is_timeout() || e.is_connection_dropped()
            }
            StoreError::Pool(_) => false,
            StoreError::Unavailable(_) => false,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache provider.
pub type Result<T> = std::result::Result<T, CacheError>;
