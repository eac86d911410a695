//! E-commerce domain types and logic for BriskCommerce.
//!
//! This crate is the pure half of the transactional commerce core:
//!
//! - **Envelope**: the uniform [`Return`] wrapper every operation ends in
//! - **Catalog**: products with categories, images, and attributes
//! - **Cart**: line items and the caller-level (user, product) merge rule
//! - **Discount**: the data model and the eligibility/computation engine
//!
//! Nothing here performs I/O; the storage half lives in `brisk-store`.

pub mod cart;
pub mod catalog;
pub mod discount;
pub mod envelope;
pub mod error;
pub mod ids;
pub mod status;

pub use envelope::{ErrorClass, ErrorCode, Return};
pub use error::CommerceError;
pub use status::EntityStatus;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::envelope::{ErrorClass, ErrorCode, Return};
    pub use crate::error::CommerceError;
    pub use crate::ids::*;
    pub use crate::status::EntityStatus;

    pub use crate::catalog::{Category, Product, ProductAttribute, ProductImage};

    pub use crate::cart::{merge_lines, CartItem};

    pub use crate::discount::{
        evaluate, Discount, DiscountCode, DiscountProduct, DiscountResult, RejectReason,
    };
}
