//! Discount lookups backing the eligibility engine.
//!
//! Discount rows are read-only within a checkout; eligibility is
//! re-evaluated against the locked-row subtotal, so no lock is taken
//! here.

use crate::backend::StoreBackend;
use brisk_commerce::discount::{Discount, DiscountCode};
use brisk_commerce::envelope::{ErrorCode, Return};
use brisk_commerce::ids::{DiscountId, ProductId};
use std::collections::HashSet;
use std::sync::Arc;

/// Read access to discounts, codes, and their product restrictions.
pub struct DiscountRepository<B: StoreBackend> {
    backend: Arc<B>,
}

impl<B: StoreBackend> DiscountRepository<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Resolve a redeemable code to its discount. Non-active codes and
    /// deleted discounts read as not found.
    pub async fn get_by_code(&self, code: &str) -> Return<(Discount, DiscountCode)> {
        match self.backend.fetch_discount_by_code(code).await {
            Ok(Some(pair)) => Return::ok(pair),
            Ok(None) => Return::err(ErrorCode::DiscountNotFound),
            Err(err) => err.into_return(),
        }
    }

    /// The discount's restricting product set. An empty set means the
    /// discount is storewide; callers must treat it as
    /// empty-set-means-universal, never as a missing value.
    pub async fn get_restricted_product_ids(
        &self,
        discount_id: DiscountId,
    ) -> Return<HashSet<ProductId>> {
        match self.backend.fetch_discount_product_ids(discount_id).await {
            Ok(ids) => {
                let total = ids.len() as i64;
                Return::ok_with_total(ids, total)
            }
            Err(err) => err.into_return(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use brisk_commerce::ids::DiscountCodeId;
    use brisk_commerce::EntityStatus;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn sample_discount() -> Discount {
        let now = Utc::now();
        Discount {
            id: DiscountId::generate(),
            name: "autumn".into(),
            description: None,
            is_percentage: false,
            discount_value: dec!(5),
            minimum_order_amount: None,
            maximum_discount: None,
            from_date: now - Duration::days(1),
            to_date: now + Duration::days(1),
            status: EntityStatus::Active,
            created_by: None,
            created_at: None,
            modified_by: None,
            modified_at: None,
        }
    }

    #[tokio::test]
    async fn test_get_by_code() {
        let store = Arc::new(MemoryStore::default());
        let discount = sample_discount();
        let discount_id = discount.id;
        store.seed_discount(discount);
        store.seed_discount_code(DiscountCode {
            id: DiscountCodeId::generate(),
            discount_id,
            code: "AUTUMN5".into(),
            status: EntityStatus::Active,
        });

        let repo = DiscountRepository::new(store);
        let ret = repo.get_by_code("AUTUMN5").await;
        assert!(ret.is_success());
        let (discount, code) = ret.into_data().unwrap();
        assert_eq!(discount.id, discount_id);
        assert_eq!(code.code, "AUTUMN5");
    }

    #[tokio::test]
    async fn test_unknown_code_is_not_found() {
        let repo = DiscountRepository::new(Arc::new(MemoryStore::default()));
        let ret = repo.get_by_code("NOPE").await;
        assert_eq!(ret.error_code, ErrorCode::DiscountNotFound);
    }

    #[tokio::test]
    async fn test_restriction_set_total_records() {
        let store = Arc::new(MemoryStore::default());
        let discount = sample_discount();
        let discount_id = discount.id;
        store.seed_discount(discount);
        store.seed_discount_products(
            discount_id,
            [ProductId::generate(), ProductId::generate()],
        );

        let repo = DiscountRepository::new(store);
        let ret = repo.get_restricted_product_ids(discount_id).await;
        assert!(ret.is_success());
        assert_eq!(ret.total_records, 2);
    }

    #[tokio::test]
    async fn test_unrestricted_discount_has_empty_set() {
        let store = Arc::new(MemoryStore::default());
        let discount = sample_discount();
        let discount_id = discount.id;
        store.seed_discount(discount);

        let repo = DiscountRepository::new(store);
        let ret = repo.get_restricted_product_ids(discount_id).await;
        assert!(ret.is_success());
        assert!(ret.into_data().unwrap().is_empty());
    }
}
