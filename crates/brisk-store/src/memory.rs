//! In-process storage engine with row-level exclusive locks.
//!
//! `MemoryStore` backs tests and local development. It implements the
//! same transaction contract a SQL engine provides: a transaction
//! buffers its writes in a journal and applies them atomically at
//! commit, so no other task ever observes partial state, and
//! `fetch_product_for_update` holds a per-row async mutex until the
//! transaction resolves. Lock waits are bounded by
//! [`StoreConfig::lock_timeout`].

use crate::backend::{StoreBackend, StoreTransaction};
use crate::config::StoreConfig;
use crate::error::StoreError;
use async_trait::async_trait;
use brisk_commerce::cart::CartItem;
use brisk_commerce::catalog::Product;
use brisk_commerce::discount::{Discount, DiscountCode, DiscountProduct};
use brisk_commerce::ids::{CartItemId, DiscountId, DiscountProductId, ProductId, UserId};
use brisk_commerce::EntityStatus;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::timeout;

#[derive(Default)]
struct Tables {
    products: HashMap<ProductId, Product>,
    cart_items: HashMap<CartItemId, CartItem>,
    discounts: HashMap<DiscountId, Discount>,
    discount_codes: Vec<DiscountCode>,
    discount_products: Vec<DiscountProduct>,
}

struct Inner {
    config: StoreConfig,
    tables: StdMutex<Tables>,
    row_locks: StdMutex<HashMap<ProductId, Arc<AsyncMutex<()>>>>,
}

impl Inner {
    // Poisoning only happens if a test panicked mid-access; the tables
    // themselves are still consistent, so recover the guard.
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn row_lock(&self, product_id: ProductId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.row_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(product_id).or_default().clone()
    }
}

/// In-memory storage engine.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create an empty store with the given configuration.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                tables: StdMutex::new(Tables::default()),
                row_locks: StdMutex::new(HashMap::new()),
            }),
        }
    }

    /// Insert or replace a product row.
    pub fn seed_product(&self, product: Product) {
        self.inner.tables().products.insert(product.id, product);
    }

    /// Insert or replace a discount row.
    pub fn seed_discount(&self, discount: Discount) {
        self.inner.tables().discounts.insert(discount.id, discount);
    }

    /// Insert a redeemable code for a discount.
    pub fn seed_discount_code(&self, code: DiscountCode) {
        self.inner.tables().discount_codes.push(code);
    }

    /// Restrict a discount to a set of products.
    pub fn seed_discount_products(
        &self,
        discount_id: DiscountId,
        product_ids: impl IntoIterator<Item = ProductId>,
    ) {
        let mut tables = self.inner.tables();
        for product_id in product_ids {
            tables.discount_products.push(DiscountProduct {
                id: DiscountProductId::generate(),
                discount_id,
                product_id,
            });
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

#[async_trait]
impl StoreBackend for MemoryStore {
    type Tx = MemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        Ok(MemoryTransaction {
            inner: Arc::clone(&self.inner),
            guards: HashMap::new(),
            pending_stock: HashMap::new(),
            pending_clears: HashSet::new(),
        })
    }

    async fn fetch_product(
        &self,
        product_id: ProductId,
    ) -> Result<Option<Product>, StoreError> {
        Ok(self.inner.tables().products.get(&product_id).cloned())
    }

    async fn fetch_cart_item(&self, id: CartItemId) -> Result<Option<CartItem>, StoreError> {
        Ok(self.inner.tables().cart_items.get(&id).cloned())
    }

    async fn fetch_cart_item_by_product_and_user(
        &self,
        product_id: ProductId,
        user_id: UserId,
    ) -> Result<Option<CartItem>, StoreError> {
        Ok(self
            .inner
            .tables()
            .cart_items
            .values()
            .find(|item| item.product_id == product_id && item.user_id == user_id)
            .cloned())
    }

    async fn fetch_cart_items(&self, user_id: UserId) -> Result<Vec<CartItem>, StoreError> {
        let mut items: Vec<CartItem> = self
            .inner
            .tables()
            .cart_items
            .values()
            .filter(|item| item.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by_key(|item| (item.created_at, item.id));
        Ok(items)
    }

    async fn insert_cart_item(&self, item: CartItem) -> Result<(), StoreError> {
        self.inner.tables().cart_items.insert(item.id, item);
        Ok(())
    }

    async fn insert_cart_items(&self, items: Vec<CartItem>) -> Result<(), StoreError> {
        let mut tables = self.inner.tables();
        for item in items {
            tables.cart_items.insert(item.id, item);
        }
        Ok(())
    }

    async fn update_cart_item(&self, item: CartItem) -> Result<bool, StoreError> {
        let mut tables = self.inner.tables();
        match tables.cart_items.get_mut(&item.id) {
            Some(existing) => {
                *existing = item;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_cart_item(&self, id: CartItemId) -> Result<bool, StoreError> {
        Ok(self.inner.tables().cart_items.remove(&id).is_some())
    }

    async fn fetch_discount_by_code(
        &self,
        code: &str,
    ) -> Result<Option<(Discount, DiscountCode)>, StoreError> {
        let tables = self.inner.tables();
        let matched = tables
            .discount_codes
            .iter()
            .find(|c| c.code == code && c.status == EntityStatus::Active);
        let Some(matched) = matched else {
            return Ok(None);
        };
        let discount = tables
            .discounts
            .get(&matched.discount_id)
            .filter(|d| !d.status.is_deleted());
        Ok(discount.map(|d| (d.clone(), matched.clone())))
    }

    async fn fetch_discount_product_ids(
        &self,
        discount_id: DiscountId,
    ) -> Result<HashSet<ProductId>, StoreError> {
        Ok(self
            .inner
            .tables()
            .discount_products
            .iter()
            .filter(|dp| dp.discount_id == discount_id)
            .map(|dp| dp.product_id)
            .collect())
    }
}

/// An open transaction against a [`MemoryStore`].
///
/// Writes land in a journal and only reach the shared tables at commit.
/// Dropping the transaction releases its row locks and discards the
/// journal, which makes rollback the default outcome.
pub struct MemoryTransaction {
    inner: Arc<Inner>,
    guards: HashMap<ProductId, OwnedMutexGuard<()>>,
    pending_stock: HashMap<ProductId, i64>,
    pending_clears: HashSet<UserId>,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn fetch_product_for_update(
        &mut self,
        product_id: ProductId,
    ) -> Result<Option<Product>, StoreError> {
        if !self.guards.contains_key(&product_id) {
            let lock = self.inner.row_lock(product_id);
            let wait = self.inner.config.lock_timeout();
            let guard = timeout(wait, lock.lock_owned()).await.map_err(|_| {
                StoreError::LockTimeout {
                    product_id,
                    waited_ms: self.inner.config.lock_timeout_ms,
                }
            })?;
            self.guards.insert(product_id, guard);
        }

        let mut product = self.inner.tables().products.get(&product_id).cloned();
        // Re-reads within this transaction observe its own buffered write.
        if let Some(product) = product.as_mut() {
            if let Some(pending) = self.pending_stock.get(&product_id) {
                product.stock_quantity = *pending;
            }
        }
        Ok(product)
    }

    async fn persist_stock_decrement(
        &mut self,
        product_id: ProductId,
        new_quantity: i64,
    ) -> Result<(), StoreError> {
        if !self.guards.contains_key(&product_id) {
            return Err(StoreError::LockNotHeld(product_id));
        }
        if new_quantity < 0 {
            return Err(StoreError::backend(anyhow::anyhow!(
                "stock for {product_id} would go negative ({new_quantity})"
            )));
        }
        self.pending_stock.insert(product_id, new_quantity);
        Ok(())
    }

    async fn clear_cart(&mut self, user_id: UserId) -> Result<(), StoreError> {
        self.pending_clears.insert(user_id);
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut tables = self.inner.tables();
        for (product_id, quantity) in &self.pending_stock {
            if let Some(product) = tables.products.get_mut(product_id) {
                product.stock_quantity = *quantity;
                product.updated_at = now;
            }
        }
        tables
            .cart_items
            .retain(|_, item| !self.pending_clears.contains(&item.user_id));
        // Row lock guards drop with self, after the tables write.
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        // Journal and guards drop; committed state was never touched.
        Ok(())
    }
}
