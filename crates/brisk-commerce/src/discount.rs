//! Discount data model and eligibility engine.
//!
//! A discount with zero restricting product rows is storewide. That rule
//! is modeled as an explicit empty-set-means-universal lookup, never as a
//! null check.

use crate::ids::{DiscountCodeId, DiscountId, DiscountProductId, ProductId, UserId};
use crate::status::EntityStatus;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A discount definition.
///
/// If `is_percentage` is true, `discount_value` is a 0..=100 percentage;
/// otherwise it is an absolute currency amount.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Discount {
    /// Unique discount identifier.
    pub id: DiscountId,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Percentage vs. flat amount.
    pub is_percentage: bool,
    /// Percentage (0..=100) or flat currency amount.
    pub discount_value: Decimal,
    /// Minimum cart subtotal required, if any.
    pub minimum_order_amount: Option<Decimal>,
    /// Ceiling on the computed amount, if any.
    pub maximum_discount: Option<Decimal>,
    /// Start of the validity window.
    pub from_date: DateTime<Utc>,
    /// End of the validity window.
    pub to_date: DateTime<Utc>,
    /// Soft-delete status.
    pub status: EntityStatus,
    /// Audit: creator.
    pub created_by: Option<UserId>,
    /// Audit: creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Audit: last editor.
    pub modified_by: Option<UserId>,
    /// Audit: last modification time.
    pub modified_at: Option<DateTime<Utc>>,
}

/// A redeemable code bound to exactly one discount.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscountCode {
    pub id: DiscountCodeId,
    pub discount_id: DiscountId,
    pub code: String,
    pub status: EntityStatus,
}

/// Join row restricting a discount to one product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscountProduct {
    pub id: DiscountProductId,
    pub discount_id: DiscountId,
    pub product_id: ProductId,
}

/// Why the engine rejected a discount for a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Discount status is not active.
    Inactive,
    /// Current time falls outside the validity window.
    OutOfWindow,
    /// Cart subtotal is below the configured minimum.
    BelowMinimum,
    /// The restricted product set does not intersect the cart.
    NoEligibleProduct,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Inactive => write!(f, "discount is not active"),
            RejectReason::OutOfWindow => write!(f, "outside validity window"),
            RejectReason::BelowMinimum => write!(f, "below minimum order amount"),
            RejectReason::NoEligibleProduct => write!(f, "no eligible product in cart"),
        }
    }
}

/// Outcome of a discount evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscountResult {
    /// Whether the discount applies to this cart.
    pub applicable: bool,
    /// Final discount amount. Always in `0..=subtotal`.
    pub amount: Decimal,
    /// Rejection reason when not applicable.
    pub reason: Option<RejectReason>,
}

impl DiscountResult {
    fn applied(amount: Decimal) -> Self {
        Self {
            applicable: true,
            amount,
            reason: None,
        }
    }

    fn rejected(reason: RejectReason) -> Self {
        Self {
            applicable: false,
            amount: Decimal::ZERO,
            reason: Some(reason),
        }
    }
}

/// Evaluate a discount against a cart snapshot at `now`.
///
/// `restricted_to` is the discount's product-join set; an empty set means
/// the discount is storewide. `cart_product_ids` are the products in the
/// cart being priced. All arithmetic stays in `Decimal`; the returned
/// amount never exceeds `subtotal` and never goes negative.
pub fn evaluate(
    discount: &Discount,
    restricted_to: &HashSet<ProductId>,
    subtotal: Decimal,
    cart_product_ids: &[ProductId],
    now: DateTime<Utc>,
) -> DiscountResult {
    if !discount.status.is_active() {
        return DiscountResult::rejected(RejectReason::Inactive);
    }

    if now < discount.from_date || now > discount.to_date {
        return DiscountResult::rejected(RejectReason::OutOfWindow);
    }

    if let Some(minimum) = discount.minimum_order_amount {
        if subtotal < minimum {
            return DiscountResult::rejected(RejectReason::BelowMinimum);
        }
    }

    // Empty restriction set means storewide. Otherwise at least one cart
    // product must appear in the set.
    if !restricted_to.is_empty()
        && !cart_product_ids.iter().any(|id| restricted_to.contains(id))
    {
        return DiscountResult::rejected(RejectReason::NoEligibleProduct);
    }

    let raw = if discount.is_percentage {
        subtotal * discount.discount_value / Decimal::ONE_HUNDRED
    } else {
        discount.discount_value
    };

    let mut amount = raw.clamp(Decimal::ZERO, subtotal);
    if let Some(cap) = discount.maximum_discount {
        amount = amount.min(cap.max(Decimal::ZERO));
    }

    DiscountResult::applied(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn open_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (now - Duration::days(1), now + Duration::days(1))
    }

    fn percentage_discount(value: Decimal, now: DateTime<Utc>) -> Discount {
        let (from_date, to_date) = open_window(now);
        Discount {
            id: DiscountId::generate(),
            name: "test".to_string(),
            description: None,
            is_percentage: true,
            discount_value: value,
            minimum_order_amount: None,
            maximum_discount: None,
            from_date,
            to_date,
            status: EntityStatus::Active,
            created_by: None,
            created_at: None,
            modified_by: None,
            modified_at: None,
        }
    }

    fn storewide() -> HashSet<ProductId> {
        HashSet::new()
    }

    #[test]
    fn test_percentage_computation() {
        let now = Utc::now();
        let discount = percentage_discount(dec!(10), now);
        let result = evaluate(&discount, &storewide(), dec!(100), &[], now);
        assert!(result.applicable);
        assert_eq!(result.amount, dec!(10));
    }

    #[test]
    fn test_percentage_keeps_decimal_precision() {
        let now = Utc::now();
        let discount = percentage_discount(dec!(7.5), now);
        let result = evaluate(&discount, &storewide(), dec!(19.99), &[], now);
        assert!(result.applicable);
        assert_eq!(result.amount, dec!(1.499250));
    }

    #[test]
    fn test_maximum_discount_caps_amount() {
        let now = Utc::now();
        let mut discount = percentage_discount(dec!(50), now);
        discount.maximum_discount = Some(dec!(20));
        let result = evaluate(&discount, &storewide(), dec!(100), &[], now);
        assert!(result.applicable);
        assert_eq!(result.amount, dec!(20));
    }

    #[test]
    fn test_flat_amount_clamped_to_subtotal() {
        let now = Utc::now();
        let mut discount = percentage_discount(dec!(0), now);
        discount.is_percentage = false;
        discount.discount_value = dec!(80);
        let result = evaluate(&discount, &storewide(), dec!(25), &[], now);
        assert!(result.applicable);
        assert_eq!(result.amount, dec!(25));
    }

    #[test]
    fn test_below_minimum_rejected() {
        let now = Utc::now();
        let mut discount = percentage_discount(dec!(10), now);
        discount.minimum_order_amount = Some(dec!(50));
        let result = evaluate(&discount, &storewide(), dec!(40), &[], now);
        assert!(!result.applicable);
        assert_eq!(result.reason, Some(RejectReason::BelowMinimum));
        assert_eq!(result.amount, Decimal::ZERO);
    }

    #[test]
    fn test_inactive_rejected() {
        let now = Utc::now();
        let mut discount = percentage_discount(dec!(10), now);
        discount.status = EntityStatus::Inactive;
        let result = evaluate(&discount, &storewide(), dec!(100), &[], now);
        assert_eq!(result.reason, Some(RejectReason::Inactive));
    }

    #[test]
    fn test_out_of_window_rejected() {
        let now = Utc::now();
        let mut discount = percentage_discount(dec!(10), now);
        discount.from_date = now + Duration::days(1);
        discount.to_date = now + Duration::days(2);
        let result = evaluate(&discount, &storewide(), dec!(100), &[], now);
        assert_eq!(result.reason, Some(RejectReason::OutOfWindow));

        discount.from_date = now - Duration::days(2);
        discount.to_date = now - Duration::days(1);
        let result = evaluate(&discount, &storewide(), dec!(100), &[], now);
        assert_eq!(result.reason, Some(RejectReason::OutOfWindow));
    }

    #[test]
    fn test_restricted_discount_needs_overlap() {
        let now = Utc::now();
        let discount = percentage_discount(dec!(10), now);
        let a = ProductId::generate();
        let b = ProductId::generate();
        let c = ProductId::generate();
        let restricted: HashSet<ProductId> = [c].into_iter().collect();

        let result = evaluate(&discount, &restricted, dec!(100), &[a, b], now);
        assert!(!result.applicable);
        assert_eq!(result.reason, Some(RejectReason::NoEligibleProduct));
    }

    #[test]
    fn test_restricted_discount_applies_with_overlap() {
        let now = Utc::now();
        let discount = percentage_discount(dec!(10), now);
        let a = ProductId::generate();
        let restricted: HashSet<ProductId> = [a].into_iter().collect();

        let result = evaluate(&discount, &restricted, dec!(100), &[a], now);
        assert!(result.applicable);
        assert_eq!(result.amount, dec!(10));
    }

    #[test]
    fn test_empty_restriction_set_is_storewide() {
        let now = Utc::now();
        let discount = percentage_discount(dec!(10), now);
        let result = evaluate(
            &discount,
            &storewide(),
            dec!(100),
            &[ProductId::generate()],
            now,
        );
        assert!(result.applicable);
    }

    #[test]
    fn test_negative_value_clamped_to_zero() {
        let now = Utc::now();
        let mut discount = percentage_discount(dec!(0), now);
        discount.is_percentage = false;
        discount.discount_value = dec!(-5);
        let result = evaluate(&discount, &storewide(), dec!(100), &[], now);
        assert!(result.applicable);
        assert_eq!(result.amount, Decimal::ZERO);
    }
}
