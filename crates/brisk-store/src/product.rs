//! Product access, including the checkout locking read.
//!
//! `lock_for_update` is the only sanctioned way to read stock ahead of a
//! mutation. The plain `get_by_id` read is for display paths and must
//! never gate a stock decrement.

use crate::backend::{StoreBackend, StoreTransaction};
use crate::error::StoreError;
use brisk_commerce::catalog::Product;
use brisk_commerce::envelope::{ErrorCode, Return};
use brisk_commerce::ids::ProductId;
use std::sync::Arc;

/// Read access to product rows.
pub struct ProductRepository<B: StoreBackend> {
    backend: Arc<B>,
}

impl<B: StoreBackend> ProductRepository<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Non-locking read with associations. Soft-deleted products read as
    /// not found.
    pub async fn get_by_id(&self, product_id: ProductId) -> Return<Product> {
        match self.backend.fetch_product(product_id).await {
            Ok(Some(product)) if !product.status.is_deleted() => Return::ok(product),
            Ok(_) => Return::err(ErrorCode::ProductNotFound),
            Err(err) => err.into_return(),
        }
    }

    /// Read a product inside `tx` while taking its row-exclusive lock.
    ///
    /// The lock is held until `tx` commits or rolls back, blocking any
    /// other concurrent locker of the same row. The returned snapshot
    /// carries categories, images, and attributes for recomputation; the
    /// lock applies to the product row only.
    pub async fn lock_for_update(
        &self,
        tx: &mut B::Tx,
        product_id: ProductId,
    ) -> Return<Product> {
        match tx.fetch_product_for_update(product_id).await {
            Ok(Some(product)) => {
                tracing::debug!(%product_id, stock = product.stock_quantity, "row lock acquired");
                Return::ok(product)
            }
            Ok(None) => Return::err(ErrorCode::ProductNotFound),
            Err(err @ StoreError::LockTimeout { .. }) => {
                tracing::warn!(%product_id, "row lock wait timed out");
                err.into_return()
            }
            Err(err) => err.into_return(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::memory::MemoryStore;
    use brisk_commerce::EntityStatus;
    use rust_decimal_macros::dec;

    fn repo_with_product(status: EntityStatus) -> (ProductRepository<MemoryStore>, ProductId) {
        let store = MemoryStore::default();
        let mut product = Product::new("Lamp", dec!(25), 3);
        product.status = status;
        let id = product.id;
        store.seed_product(product);
        (ProductRepository::new(Arc::new(store)), id)
    }

    #[tokio::test]
    async fn test_get_by_id_found() {
        let (repo, id) = repo_with_product(EntityStatus::Active);
        let ret = repo.get_by_id(id).await;
        assert!(ret.is_success());
        assert_eq!(ret.total_records, 1);
    }

    #[tokio::test]
    async fn test_get_by_id_missing_is_not_found() {
        let (repo, _) = repo_with_product(EntityStatus::Active);
        let ret = repo.get_by_id(ProductId::generate()).await;
        assert_eq!(ret.error_code, ErrorCode::ProductNotFound);
    }

    #[tokio::test]
    async fn test_get_by_id_excludes_soft_deleted() {
        let (repo, id) = repo_with_product(EntityStatus::Deleted);
        let ret = repo.get_by_id(id).await;
        assert_eq!(ret.error_code, ErrorCode::ProductNotFound);
    }

    #[tokio::test]
    async fn test_lock_for_update_returns_envelope() {
        let store = Arc::new(MemoryStore::default());
        let product = Product::new("Lamp", dec!(25), 3);
        let id = product.id;
        store.seed_product(product);
        let repo = ProductRepository::new(Arc::clone(&store));

        let mut tx = store.begin().await.unwrap();
        let ret = repo.lock_for_update(&mut tx, id).await;
        assert!(ret.is_success());
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_lock_timeout_maps_to_timeout_code() {
        let store = Arc::new(MemoryStore::new(StoreConfig {
            lock_timeout_ms: 50,
            ..StoreConfig::default()
        }));
        let product = Product::new("Lamp", dec!(25), 3);
        let id = product.id;
        store.seed_product(product);
        let repo = ProductRepository::new(Arc::clone(&store));

        let mut holder = store.begin().await.unwrap();
        holder.fetch_product_for_update(id).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let ret = repo.lock_for_update(&mut tx, id).await;
        assert_eq!(ret.error_code, ErrorCode::LockTimeout);

        holder.rollback().await.unwrap();
        tx.rollback().await.unwrap();
    }
}
