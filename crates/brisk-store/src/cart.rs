//! Cart aggregation: per-user, per-product line items.
//!
//! (user, product) uniqueness is a contract enforced above the raw
//! `add`/`bulk_sync` writes, not by a storage constraint. `add_merged`
//! is the merge-on-add flow upstream callers use; `bulk_sync` trusts the
//! caller to have resolved collisions (see
//! `brisk_commerce::cart::merge_lines`).

use crate::backend::StoreBackend;
use crate::config::StoreConfig;
use brisk_commerce::cart::CartItem;
use brisk_commerce::envelope::{ErrorCode, Return};
use brisk_commerce::ids::{CartItemId, ProductId, UserId};
use chrono::Utc;
use std::sync::Arc;

/// Cart line item repository.
pub struct CartRepository<B: StoreBackend> {
    backend: Arc<B>,
    config: StoreConfig,
}

impl<B: StoreBackend> CartRepository<B> {
    pub fn new(backend: Arc<B>, config: StoreConfig) -> Self {
        Self { backend, config }
    }

    /// Cart row by primary key.
    pub async fn get_item(&self, id: CartItemId) -> Return<CartItem> {
        match self.backend.fetch_cart_item(id).await {
            Ok(Some(item)) => Return::ok(item),
            Ok(None) => Return::err(ErrorCode::CartNotFound),
            Err(err) => err.into_return(),
        }
    }

    /// Cart row by its (user, product) pair. Upstream callers use this
    /// to detect an existing line before inserting.
    pub async fn get_item_by_product_and_user(
        &self,
        product_id: ProductId,
        user_id: UserId,
    ) -> Return<CartItem> {
        match self
            .backend
            .fetch_cart_item_by_product_and_user(product_id, user_id)
            .await
        {
            Ok(Some(item)) => Return::ok(item),
            Ok(None) => Return::err(ErrorCode::CartNotFound),
            Err(err) => err.into_return(),
        }
    }

    /// A user's cart, optionally paged.
    ///
    /// Pages are 1-based; paging applies only when both parameters are
    /// positive. `total_records` always reflects the unpaged count.
    pub async fn list_by_user(
        &self,
        user_id: UserId,
        page_index: Option<i64>,
        page_size: Option<i64>,
    ) -> Return<Vec<CartItem>> {
        let items = match self.backend.fetch_cart_items(user_id).await {
            Ok(items) => items,
            Err(err) => return err.into_return(),
        };
        let total = items.len() as i64;

        let page = match (page_index, page_size) {
            (Some(index), Some(size)) if index > 0 && size > 0 => {
                let size = size.min(self.config.max_page_size);
                // Both factors are positive; saturate rather than overflow
                // on an absurd page index.
                let offset = (index - 1).saturating_mul(size) as usize;
                items.into_iter().skip(offset).take(size as usize).collect()
            }
            _ => items,
        };

        Return::ok_with_total(page, total)
    }

    /// Raw insert. Callers are responsible for (user, product)
    /// collision resolution; see [`CartRepository::add_merged`].
    pub async fn add(&self, item: CartItem) -> Return<bool> {
        if item.quantity <= 0 {
            return Return::err(ErrorCode::InvalidQuantity);
        }
        match self.backend.insert_cart_item(item).await {
            Ok(()) => Return::ok(true),
            Err(err) => err.into_return(),
        }
    }

    /// Merge-on-add: bump the quantity of an existing (user, product)
    /// row, or insert a fresh one.
    pub async fn add_merged(&self, item: CartItem) -> Return<bool> {
        if item.quantity <= 0 {
            return Return::err(ErrorCode::InvalidQuantity);
        }
        let existing = match self
            .backend
            .fetch_cart_item_by_product_and_user(item.product_id, item.user_id)
            .await
        {
            Ok(existing) => existing,
            Err(err) => return err.into_return(),
        };

        let result = match existing {
            Some(mut line) => {
                line.absorb(&item);
                match self.backend.update_cart_item(line).await {
                    Ok(true) => Ok(()),
                    // The row vanished between the fetch and the write;
                    // insert the incoming line as fresh.
                    Ok(false) => self.backend.insert_cart_item(item).await,
                    Err(err) => Err(err),
                }
            }
            None => self.backend.insert_cart_item(item).await,
        };
        match result {
            Ok(()) => Return::ok(true),
            Err(err) => err.into_return(),
        }
    }

    /// Bulk insert used for client-side cart merge on login. Performs no
    /// deduplication; the caller resolves (user, product) collisions
    /// first.
    pub async fn bulk_sync(&self, items: Vec<CartItem>) -> Return<bool> {
        if items.iter().any(|item| item.quantity <= 0) {
            return Return::err(ErrorCode::InvalidQuantity);
        }
        let count = items.len() as i64;
        match self.backend.insert_cart_items(items).await {
            Ok(()) => Return::ok_with_total(true, count),
            Err(err) => err.into_return(),
        }
    }

    /// Replace an existing line item.
    pub async fn update(&self, mut item: CartItem) -> Return<bool> {
        if item.quantity <= 0 {
            return Return::err(ErrorCode::InvalidQuantity);
        }
        item.updated_at = Utc::now();
        match self.backend.update_cart_item(item).await {
            Ok(true) => Return::ok(true),
            Ok(false) => Return::err(ErrorCode::CartNotFound),
            Err(err) => err.into_return(),
        }
    }

    /// Delete a line item.
    pub async fn remove(&self, id: CartItemId) -> Return<bool> {
        match self.backend.delete_cart_item(id).await {
            Ok(true) => Return::ok(true),
            Ok(false) => Return::err(ErrorCode::CartNotFound),
            Err(err) => err.into_return(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::memory::MemoryStore;
    use async_trait::async_trait;
    use brisk_commerce::catalog::Product;
    use brisk_commerce::discount::{Discount, DiscountCode};
    use brisk_commerce::ids::DiscountId;
    use std::collections::HashSet;

    fn repo() -> CartRepository<MemoryStore> {
        CartRepository::new(Arc::new(MemoryStore::default()), StoreConfig::default())
    }

    /// Backend whose (user, product) lookup reports a row that is no
    /// longer stored, as when another session deleted it mid-flight.
    struct StaleReadStore {
        inner: MemoryStore,
        stale: CartItem,
    }

    #[async_trait]
    impl StoreBackend for StaleReadStore {
        type Tx = <MemoryStore as StoreBackend>::Tx;

        async fn begin(&self) -> Result<Self::Tx, StoreError> {
            self.inner.begin().await
        }

        async fn fetch_product(
            &self,
            product_id: ProductId,
        ) -> Result<Option<Product>, StoreError> {
            self.inner.fetch_product(product_id).await
        }

        async fn fetch_cart_item(
            &self,
            id: CartItemId,
        ) -> Result<Option<CartItem>, StoreError> {
            self.inner.fetch_cart_item(id).await
        }

        async fn fetch_cart_item_by_product_and_user(
            &self,
            _product_id: ProductId,
            _user_id: UserId,
        ) -> Result<Option<CartItem>, StoreError> {
            Ok(Some(self.stale.clone()))
        }

        async fn fetch_cart_items(
            &self,
            user_id: UserId,
        ) -> Result<Vec<CartItem>, StoreError> {
            self.inner.fetch_cart_items(user_id).await
        }

        async fn insert_cart_item(&self, item: CartItem) -> Result<(), StoreError> {
            self.inner.insert_cart_item(item).await
        }

        async fn insert_cart_items(&self, items: Vec<CartItem>) -> Result<(), StoreError> {
            self.inner.insert_cart_items(items).await
        }

        async fn update_cart_item(&self, item: CartItem) -> Result<bool, StoreError> {
            self.inner.update_cart_item(item).await
        }

        async fn delete_cart_item(&self, id: CartItemId) -> Result<bool, StoreError> {
            self.inner.delete_cart_item(id).await
        }

        async fn fetch_discount_by_code(
            &self,
            code: &str,
        ) -> Result<Option<(Discount, DiscountCode)>, StoreError> {
            self.inner.fetch_discount_by_code(code).await
        }

        async fn fetch_discount_product_ids(
            &self,
            discount_id: DiscountId,
        ) -> Result<HashSet<ProductId>, StoreError> {
            self.inner.fetch_discount_product_ids(discount_id).await
        }
    }

    #[tokio::test]
    async fn test_get_item_not_found() {
        let ret = repo().get_item(CartItemId::generate()).await;
        assert_eq!(ret.error_code, ErrorCode::CartNotFound);
    }

    #[tokio::test]
    async fn test_add_then_get_by_pair() {
        let repo = repo();
        let user = UserId::generate();
        let product = ProductId::generate();
        assert!(repo.add(CartItem::new(user, product, 2)).await.is_success());

        let ret = repo.get_item_by_product_and_user(product, user).await;
        assert!(ret.is_success());
        assert_eq!(ret.into_data().unwrap().quantity, 2);
    }

    #[tokio::test]
    async fn test_add_rejects_non_positive_quantity() {
        let repo = repo();
        let ret = repo
            .add(CartItem::new(UserId::generate(), ProductId::generate(), 0))
            .await;
        assert_eq!(ret.error_code, ErrorCode::InvalidQuantity);
    }

    #[tokio::test]
    async fn test_add_merged_keeps_one_row_per_pair() {
        let repo = repo();
        let user = UserId::generate();
        let product = ProductId::generate();

        assert!(repo
            .add_merged(CartItem::new(user, product, 2))
            .await
            .is_success());
        assert!(repo
            .add_merged(CartItem::new(user, product, 3))
            .await
            .is_success());

        let ret = repo.list_by_user(user, None, None).await;
        let items = ret.into_data().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 5);
    }

    #[tokio::test]
    async fn test_add_merged_inserts_when_updated_row_vanished() {
        let user = UserId::generate();
        let product = ProductId::generate();
        let store = StaleReadStore {
            inner: MemoryStore::default(),
            stale: CartItem::new(user, product, 2),
        };
        let repo = CartRepository::new(Arc::new(store), StoreConfig::default());

        let ret = repo.add_merged(CartItem::new(user, product, 3)).await;
        assert!(ret.is_success());

        // The merge target was already gone, so the incoming line must
        // land as a fresh row rather than vanishing.
        let items = repo
            .list_by_user(user, None, None)
            .await
            .into_data()
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_list_paging_and_total() {
        let repo = repo();
        let user = UserId::generate();
        for _ in 0..5 {
            repo.add(CartItem::new(user, ProductId::generate(), 1))
                .await;
        }

        let ret = repo.list_by_user(user, Some(2), Some(2)).await;
        assert_eq!(ret.total_records, 5);
        assert_eq!(ret.into_data().unwrap().len(), 2);

        // Non-positive paging parameters disable paging.
        let ret = repo.list_by_user(user, Some(0), Some(2)).await;
        assert_eq!(ret.into_data().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_list_paging_survives_huge_page_index() {
        let repo = repo();
        let user = UserId::generate();
        repo.add(CartItem::new(user, ProductId::generate(), 1))
            .await;

        let ret = repo.list_by_user(user, Some(i64::MAX), Some(2)).await;
        assert!(ret.is_success());
        assert_eq!(ret.total_records, 1);
        assert!(ret.into_data().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_empty_cart_is_success_with_zero_total() {
        let ret = repo().list_by_user(UserId::generate(), None, None).await;
        assert!(ret.is_success());
        assert_eq!(ret.total_records, 0);
        assert!(ret.into_data().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_row_is_cart_not_found() {
        let repo = repo();
        let ret = repo
            .update(CartItem::new(UserId::generate(), ProductId::generate(), 1))
            .await;
        assert_eq!(ret.error_code, ErrorCode::CartNotFound);
    }

    #[tokio::test]
    async fn test_remove_missing_row_is_cart_not_found() {
        let ret = repo().remove(CartItemId::generate()).await;
        assert_eq!(ret.error_code, ErrorCode::CartNotFound);
    }

    #[tokio::test]
    async fn test_bulk_sync_inserts_without_dedup() {
        let repo = repo();
        let user = UserId::generate();
        let product = ProductId::generate();
        // Deliberately colliding rows: bulk_sync trusts the caller.
        let ret = repo
            .bulk_sync(vec![
                CartItem::new(user, product, 1),
                CartItem::new(user, product, 2),
            ])
            .await;
        assert!(ret.is_success());
        assert_eq!(ret.total_records, 2);

        let items = repo
            .list_by_user(user, None, None)
            .await
            .into_data()
            .unwrap();
        assert_eq!(items.len(), 2);
    }
}
