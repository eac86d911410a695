//! Storage layer error types.

use brisk_commerce::envelope::{ErrorCode, Return};
use brisk_commerce::ids::ProductId;
use brisk_commerce::CommerceError;
use thiserror::Error;

/// Errors surfaced by a storage backend.
///
/// Repositories convert these into [`Return`] envelopes at their own
/// boundary; raw storage errors never reach callers.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The bounded wait for a row-exclusive lock expired.
    #[error("lock wait exceeded {waited_ms}ms for product {product_id}")]
    LockTimeout {
        product_id: ProductId,
        waited_ms: u64,
    },

    /// A write was attempted without the required row lock.
    #[error("stock write without a held row lock for product {0}")]
    LockNotHeld(ProductId),

    /// Any other backend failure (connection loss, constraint, etc.).
    #[error("storage backend failure")]
    Backend(#[source] anyhow::Error),
}

impl StoreError {
    /// Wrap an arbitrary backend error.
    pub fn backend(err: impl Into<anyhow::Error>) -> Self {
        StoreError::Backend(err.into())
    }

    /// The envelope code this error maps to.
    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::LockTimeout { .. } => ErrorCode::LockTimeout,
            StoreError::LockNotHeld(_) | StoreError::Backend(_) => {
                ErrorCode::InternalServerError
            }
        }
    }

    /// Convert into a failure envelope. Backend detail stays in the
    /// diagnostics-only slot.
    pub fn into_return<T>(self) -> Return<T> {
        match self {
            StoreError::LockTimeout { .. } => Return::err(ErrorCode::LockTimeout),
            other => Return::internal(anyhow::Error::new(other)),
        }
    }
}

impl From<StoreError> for CommerceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::LockTimeout { product_id, .. } => {
                CommerceError::LockTimeout(product_id)
            }
            other => CommerceError::Storage(anyhow::Error::new(other)),
        }
    }
}
