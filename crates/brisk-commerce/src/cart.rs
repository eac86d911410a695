//! Cart line items and the caller-level merge rule.
//!
//! Storage keeps at most one row per (user, product) pair. That
//! uniqueness is a contract enforced by callers, not by a storage
//! constraint: [`merge_lines`] collapses a client-submitted set before a
//! bulk sync, and the aggregator's merge-on-add flow resolves collisions
//! before inserting.

use crate::ids::{CartItemId, ProductId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One cart line: a (user, product) pair with a quantity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartItem {
    /// Unique row identifier.
    pub id: CartItemId,
    /// Owning user.
    pub user_id: UserId,
    /// Referenced product.
    pub product_id: ProductId,
    /// Units requested. Always positive.
    pub quantity: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl CartItem {
    /// Create a new line item.
    pub fn new(user_id: UserId, product_id: ProductId, quantity: i64) -> Self {
        let now = Utc::now();
        Self {
            id: CartItemId::generate(),
            user_id,
            product_id,
            quantity,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fold another line for the same (user, product) into this one.
    pub fn absorb(&mut self, other: &CartItem) {
        self.quantity = self.quantity.saturating_add(other.quantity);
        self.updated_at = Utc::now();
    }
}

/// Collapse duplicate (user, product) entries, summing quantities.
///
/// The first occurrence keeps its identity and creation time; later
/// duplicates are folded into it. Input order is otherwise preserved.
/// Running the result through `merge_lines` again is a no-op.
pub fn merge_lines(lines: Vec<CartItem>) -> Vec<CartItem> {
    let mut merged: Vec<CartItem> = Vec::with_capacity(lines.len());
    for line in lines {
        match merged
            .iter_mut()
            .find(|m| m.user_id == line.user_id && m.product_id == line.product_id)
        {
            Some(existing) => existing.absorb(&line),
            None => merged.push(line),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_collapses_duplicates() {
        let user = UserId::generate();
        let product = ProductId::generate();
        let first = CartItem::new(user, product, 2);
        let first_id = first.id;
        let second = CartItem::new(user, product, 3);

        let merged = merge_lines(vec![first, second]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, first_id);
        assert_eq!(merged[0].quantity, 5);
    }

    #[test]
    fn test_merge_keeps_distinct_pairs() {
        let user = UserId::generate();
        let a = CartItem::new(user, ProductId::generate(), 1);
        let b = CartItem::new(user, ProductId::generate(), 1);
        let other_user = CartItem::new(UserId::generate(), a.product_id, 1);

        let merged = merge_lines(vec![a, b, other_user]);
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let user = UserId::generate();
        let product = ProductId::generate();
        let lines = vec![
            CartItem::new(user, product, 2),
            CartItem::new(user, product, 3),
            CartItem::new(user, ProductId::generate(), 1),
        ];

        let once = merge_lines(lines);
        let twice = merge_lines(once.clone());
        assert_eq!(once.len(), twice.len());
        assert_eq!(
            once.iter().map(|l| l.quantity).collect::<Vec<_>>(),
            twice.iter().map(|l| l.quantity).collect::<Vec<_>>()
        );
    }
}
