//! Product and its owned associations.

use crate::catalog::Category;
use crate::ids::{ProductAttributeId, ProductId, ProductImageId};
use crate::status::EntityStatus;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A sellable product.
///
/// The locking read used by checkout returns the full shape including
/// categories, images, and attributes; the exclusive lock applies to the
/// product row only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    /// Unique product identifier.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Unit price. Never negative.
    pub price: Decimal,
    /// Units in stock. Never negative; only mutated under a row lock.
    pub stock_quantity: i64,
    /// Soft-delete status.
    pub status: EntityStatus,
    /// Categories this product belongs to.
    pub categories: Vec<Category>,
    /// Gallery images.
    pub images: Vec<ProductImage>,
    /// Free-form attributes (e.g. "color" = "red").
    pub attributes: Vec<ProductAttribute>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Create an active product with empty associations.
    pub fn new(name: impl Into<String>, price: Decimal, stock_quantity: i64) -> Self {
        let now = Utc::now();
        Self {
            id: ProductId::generate(),
            name: name.into(),
            price,
            stock_quantity,
            status: EntityStatus::Active,
            categories: Vec::new(),
            images: Vec::new(),
            attributes: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether checkout may sell this product at all.
    pub fn is_purchasable(&self) -> bool {
        self.status.is_active()
    }

    /// Whether the current stock covers a requested quantity.
    pub fn can_fulfill(&self, quantity: i64) -> bool {
        quantity > 0 && quantity <= self.stock_quantity
    }
}

/// A product gallery image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductImage {
    pub id: ProductImageId,
    pub product_id: ProductId,
    pub url: String,
    pub alt_text: Option<String>,
}

/// A named product attribute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductAttribute {
    pub id: ProductAttributeId,
    pub product_id: ProductId,
    pub name: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_product_is_purchasable() {
        let product = Product::new("Keyboard", dec!(59.99), 10);
        assert!(product.is_purchasable());
        assert!(product.can_fulfill(10));
        assert!(!product.can_fulfill(11));
    }

    #[test]
    fn test_inactive_product_is_not_purchasable() {
        let mut product = Product::new("Keyboard", dec!(59.99), 10);
        product.status = EntityStatus::Inactive;
        assert!(!product.is_purchasable());
    }

    #[test]
    fn test_can_fulfill_rejects_non_positive_quantity() {
        let product = Product::new("Keyboard", dec!(59.99), 10);
        assert!(!product.can_fulfill(0));
        assert!(!product.can_fulfill(-3));
    }
}
