//! Commerce error types.

use crate::discount::RejectReason;
use crate::envelope::{ErrorCode, Return};
use crate::ids::ProductId;
use thiserror::Error;

/// Errors produced while driving a commerce operation.
///
/// These are internal: at every component boundary they are converted
/// into a [`Return`] envelope via [`CommerceError::into_return`].
#[derive(Error, Debug)]
pub enum CommerceError {
    /// Product absent, soft-deleted, or not purchasable.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// Cart row absent or the user's cart is empty.
    #[error("cart item not found")]
    CartNotFound,

    /// No active discount matches the supplied code.
    #[error("discount code not found: {0}")]
    DiscountNotFound(String),

    /// Quantity must be strictly positive.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// Requested quantity exceeds the locked stock snapshot.
    #[error("insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    /// The discount engine rejected the code for this cart.
    #[error("discount not applicable: {0}")]
    DiscountNotApplicable(RejectReason),

    /// A bounded row-lock wait expired.
    #[error("lock wait timed out for product {0}")]
    LockTimeout(ProductId),

    /// Unexpected storage failure; detail is diagnostics-only.
    #[error("storage failure")]
    Storage(#[source] anyhow::Error),
}

impl CommerceError {
    /// The structured code this error maps to.
    pub fn code(&self) -> ErrorCode {
        match self {
            CommerceError::ProductNotFound(_) => ErrorCode::ProductNotFound,
            CommerceError::CartNotFound => ErrorCode::CartNotFound,
            CommerceError::DiscountNotFound(_) => ErrorCode::DiscountNotFound,
            CommerceError::InvalidQuantity(_) => ErrorCode::InvalidQuantity,
            CommerceError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            CommerceError::DiscountNotApplicable(_) => ErrorCode::DiscountNotApplicable,
            CommerceError::LockTimeout(_) => ErrorCode::LockTimeout,
            CommerceError::Storage(_) => ErrorCode::InternalServerError,
        }
    }

    /// Convert into a failure envelope, retaining storage detail for
    /// diagnostics only.
    pub fn into_return<T>(self) -> Return<T> {
        match self {
            CommerceError::Storage(source) => Return::internal(source),
            other => Return::err(other.code()),
        }
    }
}
