//! The abstract persistence interface consumed by the commerce core.
//!
//! Two traits split the surface: [`StoreBackend`] for auto-committed
//! reads and cart writes, and [`StoreTransaction`] for the atomic unit a
//! checkout runs in. A transaction owns every row-exclusive lock it has
//! acquired; the locks are released when the transaction commits, rolls
//! back, or is dropped.

use crate::error::StoreError;
use async_trait::async_trait;
use brisk_commerce::cart::CartItem;
use brisk_commerce::catalog::Product;
use brisk_commerce::discount::{Discount, DiscountCode};
use brisk_commerce::ids::{CartItemId, DiscountId, ProductId, UserId};
use std::collections::HashSet;

/// One atomic storage transaction.
///
/// `fetch_product_for_update` must hold a row-exclusive lock on the
/// product row until the transaction resolves, blocking any other
/// concurrent locker of the same row. Lock waits are bounded; expiry
/// surfaces as [`StoreError::LockTimeout`]. Dropping the transaction
/// without committing discards all buffered writes and releases the
/// locks.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Read a product and take its row-exclusive lock.
    async fn fetch_product_for_update(
        &mut self,
        product_id: ProductId,
    ) -> Result<Option<Product>, StoreError>;

    /// Buffer a stock write for a row this transaction has locked.
    async fn persist_stock_decrement(
        &mut self,
        product_id: ProductId,
        new_quantity: i64,
    ) -> Result<(), StoreError>;

    /// Buffer removal of all of a user's cart rows.
    async fn clear_cart(&mut self, user_id: UserId) -> Result<(), StoreError>;

    /// Apply all buffered writes atomically and release the locks.
    async fn commit(self) -> Result<(), StoreError>;

    /// Discard all buffered writes and release the locks.
    async fn rollback(self) -> Result<(), StoreError>;
}

/// Storage engine surface outside of an explicit transaction.
#[async_trait]
pub trait StoreBackend: Send + Sync + 'static {
    type Tx: StoreTransaction;

    /// Open a transaction.
    async fn begin(&self) -> Result<Self::Tx, StoreError>;

    /// Non-locking product read, safe for display paths only.
    async fn fetch_product(&self, product_id: ProductId)
        -> Result<Option<Product>, StoreError>;

    /// Cart row by primary key.
    async fn fetch_cart_item(&self, id: CartItemId) -> Result<Option<CartItem>, StoreError>;

    /// Cart row by its (user, product) pair.
    async fn fetch_cart_item_by_product_and_user(
        &self,
        product_id: ProductId,
        user_id: UserId,
    ) -> Result<Option<CartItem>, StoreError>;

    /// All cart rows for a user, oldest first.
    async fn fetch_cart_items(&self, user_id: UserId) -> Result<Vec<CartItem>, StoreError>;

    /// Insert one cart row.
    async fn insert_cart_item(&self, item: CartItem) -> Result<(), StoreError>;

    /// Insert many cart rows. Performs no deduplication.
    async fn insert_cart_items(&self, items: Vec<CartItem>) -> Result<(), StoreError>;

    /// Replace an existing cart row. Returns false if the row is gone.
    async fn update_cart_item(&self, item: CartItem) -> Result<bool, StoreError>;

    /// Delete a cart row. Returns false if the row is gone.
    async fn delete_cart_item(&self, id: CartItemId) -> Result<bool, StoreError>;

    /// Resolve a redeemable code to its discount. Deleted discounts and
    /// non-active codes resolve to `None`.
    async fn fetch_discount_by_code(
        &self,
        code: &str,
    ) -> Result<Option<(Discount, DiscountCode)>, StoreError>;

    /// The discount's restricting product set. Empty means storewide.
    async fn fetch_discount_product_ids(
        &self,
        discount_id: DiscountId,
    ) -> Result<HashSet<ProductId>, StoreError>;
}
