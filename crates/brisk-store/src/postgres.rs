//! PostgreSQL storage engine.
//!
//! The row-exclusive lock is the database's own `SELECT ... FOR UPDATE`,
//! so correctness holds across multiple process instances. Lock waits
//! are bounded with `SET LOCAL lock_timeout`; Postgres reports an
//! expired wait as SQLSTATE 55P03, which maps to
//! [`StoreError::LockTimeout`].
//!
//! Expected schema (migrations are managed elsewhere):
//!
//! ```sql
//! products(product_id uuid primary key, name text, price numeric,
//!          stock_quantity bigint, status text, created_at timestamptz,
//!          updated_at timestamptz)
//! categories(category_id uuid primary key, name text, description text,
//!            status text)
//! product_categories(product_id uuid, category_id uuid)
//! product_images(image_id uuid primary key, product_id uuid, url text,
//!                alt_text text)
//! product_attributes(attribute_id uuid primary key, product_id uuid,
//!                    name text, value text)
//! cart_items(cart_item_id uuid primary key, user_id uuid,
//!            product_id uuid, quantity bigint, created_at timestamptz,
//!            updated_at timestamptz)
//! discounts(discount_id uuid primary key, name text, description text,
//!           is_percentage boolean, discount_value numeric,
//!           minimum_order_amount numeric, maximum_discount numeric,
//!           from_date timestamptz, to_date timestamptz, status text,
//!           created_by uuid, created_at timestamptz, modified_by uuid,
//!           modified_at timestamptz)
//! discount_codes(discount_code_id uuid primary key, discount_id uuid,
//!                code text, status text)
//! discount_products(discount_product_id uuid primary key,
//!                   discount_id uuid, product_id uuid)
//! ```

use crate::backend::{StoreBackend, StoreTransaction};
use crate::config::StoreConfig;
use crate::error::StoreError;
use async_trait::async_trait;
use brisk_commerce::cart::CartItem;
use brisk_commerce::catalog::{Category, Product, ProductAttribute, ProductImage};
use brisk_commerce::discount::{Discount, DiscountCode};
use brisk_commerce::ids::{
    CartItemId, CategoryId, DiscountCodeId, DiscountId, ProductAttributeId, ProductId,
    ProductImageId, UserId,
};
use brisk_commerce::EntityStatus;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, Row, Transaction};
use std::collections::HashSet;
use uuid::Uuid;

const LOCK_TIMEOUT_SQLSTATE: &str = "55P03";

/// PostgreSQL storage engine.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    config: StoreConfig,
}

impl PgStore {
    pub fn new(pool: PgPool, config: StoreConfig) -> Self {
        Self { pool, config }
    }
}

fn status_to_str(status: EntityStatus) -> &'static str {
    match status {
        EntityStatus::Active => "active",
        EntityStatus::Inactive => "inactive",
        EntityStatus::Deleted => "deleted",
    }
}

fn status_from_str(s: &str) -> Result<EntityStatus, StoreError> {
    match s {
        "active" => Ok(EntityStatus::Active),
        "inactive" => Ok(EntityStatus::Inactive),
        "deleted" => Ok(EntityStatus::Deleted),
        other => Err(StoreError::backend(anyhow::anyhow!(
            "unknown entity status in storage: {other}"
        ))),
    }
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let status: String = row.try_get("status").map_err(StoreError::backend)?;
    Ok(Product {
        id: ProductId::new(row.try_get::<Uuid, _>("product_id").map_err(StoreError::backend)?),
        name: row.try_get("name").map_err(StoreError::backend)?,
        price: row.try_get::<Decimal, _>("price").map_err(StoreError::backend)?,
        stock_quantity: row.try_get("stock_quantity").map_err(StoreError::backend)?,
        status: status_from_str(&status)?,
        categories: Vec::new(),
        images: Vec::new(),
        attributes: Vec::new(),
        created_at: row.try_get("created_at").map_err(StoreError::backend)?,
        updated_at: row.try_get("updated_at").map_err(StoreError::backend)?,
    })
}

fn cart_item_from_row(row: &PgRow) -> Result<CartItem, StoreError> {
    Ok(CartItem {
        id: CartItemId::new(row.try_get::<Uuid, _>("cart_item_id").map_err(StoreError::backend)?),
        user_id: UserId::new(row.try_get::<Uuid, _>("user_id").map_err(StoreError::backend)?),
        product_id: ProductId::new(
            row.try_get::<Uuid, _>("product_id").map_err(StoreError::backend)?,
        ),
        quantity: row.try_get("quantity").map_err(StoreError::backend)?,
        created_at: row.try_get("created_at").map_err(StoreError::backend)?,
        updated_at: row.try_get("updated_at").map_err(StoreError::backend)?,
    })
}

fn discount_from_row(row: &PgRow) -> Result<Discount, StoreError> {
    let status: String = row.try_get("status").map_err(StoreError::backend)?;
    Ok(Discount {
        id: DiscountId::new(row.try_get::<Uuid, _>("discount_id").map_err(StoreError::backend)?),
        name: row.try_get("name").map_err(StoreError::backend)?,
        description: row.try_get("description").map_err(StoreError::backend)?,
        is_percentage: row.try_get("is_percentage").map_err(StoreError::backend)?,
        discount_value: row.try_get("discount_value").map_err(StoreError::backend)?,
        minimum_order_amount: row
            .try_get("minimum_order_amount")
            .map_err(StoreError::backend)?,
        maximum_discount: row.try_get("maximum_discount").map_err(StoreError::backend)?,
        from_date: row.try_get("from_date").map_err(StoreError::backend)?,
        to_date: row.try_get("to_date").map_err(StoreError::backend)?,
        status: status_from_str(&status)?,
        created_by: row
            .try_get::<Option<Uuid>, _>("created_by")
            .map_err(StoreError::backend)?
            .map(UserId::new),
        created_at: row
            .try_get::<Option<DateTime<Utc>>, _>("created_at")
            .map_err(StoreError::backend)?,
        modified_by: row
            .try_get::<Option<Uuid>, _>("modified_by")
            .map_err(StoreError::backend)?
            .map(UserId::new),
        modified_at: row
            .try_get::<Option<DateTime<Utc>>, _>("modified_at")
            .map_err(StoreError::backend)?,
    })
}

fn lock_error(product_id: ProductId, waited_ms: u64, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(LOCK_TIMEOUT_SQLSTATE) {
            return StoreError::LockTimeout {
                product_id,
                waited_ms,
            };
        }
    }
    StoreError::backend(err)
}

/// Load a product's categories, images, and attributes.
async fn load_associations(
    conn: &mut sqlx::PgConnection,
    product: &mut Product,
) -> Result<(), StoreError> {
    let rows = sqlx::query(
        "SELECT c.category_id, c.name, c.description, c.status \
         FROM product_categories pc \
         JOIN categories c ON c.category_id = pc.category_id \
         WHERE pc.product_id = $1",
    )
    .bind(product.id.into_inner())
    .fetch_all(&mut *conn)
    .await
    .map_err(StoreError::backend)?;
    for row in &rows {
        let status: String = row.try_get("status").map_err(StoreError::backend)?;
        product.categories.push(Category {
            id: CategoryId::new(row.try_get::<Uuid, _>("category_id").map_err(StoreError::backend)?),
            name: row.try_get("name").map_err(StoreError::backend)?,
            description: row.try_get("description").map_err(StoreError::backend)?,
            status: status_from_str(&status)?,
        });
    }

    let rows = sqlx::query(
        "SELECT image_id, product_id, url, alt_text FROM product_images WHERE product_id = $1",
    )
    .bind(product.id.into_inner())
    .fetch_all(&mut *conn)
    .await
    .map_err(StoreError::backend)?;
    for row in &rows {
        product.images.push(ProductImage {
            id: ProductImageId::new(row.try_get::<Uuid, _>("image_id").map_err(StoreError::backend)?),
            product_id: product.id,
            url: row.try_get("url").map_err(StoreError::backend)?,
            alt_text: row.try_get("alt_text").map_err(StoreError::backend)?,
        });
    }

    let rows = sqlx::query(
        "SELECT attribute_id, product_id, name, value \
         FROM product_attributes WHERE product_id = $1",
    )
    .bind(product.id.into_inner())
    .fetch_all(&mut *conn)
    .await
    .map_err(StoreError::backend)?;
    for row in &rows {
        product.attributes.push(ProductAttribute {
            id: ProductAttributeId::new(
                row.try_get::<Uuid, _>("attribute_id").map_err(StoreError::backend)?,
            ),
            product_id: product.id,
            name: row.try_get("name").map_err(StoreError::backend)?,
            value: row.try_get("value").map_err(StoreError::backend)?,
        });
    }
    Ok(())
}

#[async_trait]
impl StoreBackend for PgStore {
    type Tx = PgStoreTransaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;
        // SET LOCAL scopes the bound to this transaction only.
        sqlx::query(&format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.config.lock_timeout_ms
        ))
        .execute(&mut *tx)
        .await
        .map_err(StoreError::backend)?;
        Ok(PgStoreTransaction {
            tx,
            lock_timeout_ms: self.config.lock_timeout_ms,
        })
    }

    async fn fetch_product(
        &self,
        product_id: ProductId,
    ) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            "SELECT product_id, name, price, stock_quantity, status, created_at, updated_at \
             FROM products WHERE product_id = $1",
        )
        .bind(product_id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        let Some(row) = row else { return Ok(None) };
        let mut product = product_from_row(&row)?;
        let mut conn = self.pool.acquire().await.map_err(StoreError::backend)?;
        load_associations(&mut conn, &mut product).await?;
        Ok(Some(product))
    }

    async fn fetch_cart_item(&self, id: CartItemId) -> Result<Option<CartItem>, StoreError> {
        let row = sqlx::query(
            "SELECT cart_item_id, user_id, product_id, quantity, created_at, updated_at \
             FROM cart_items WHERE cart_item_id = $1",
        )
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        row.as_ref().map(cart_item_from_row).transpose()
    }

    async fn fetch_cart_item_by_product_and_user(
        &self,
        product_id: ProductId,
        user_id: UserId,
    ) -> Result<Option<CartItem>, StoreError> {
        let row = sqlx::query(
            "SELECT cart_item_id, user_id, product_id, quantity, created_at, updated_at \
             FROM cart_items WHERE product_id = $1 AND user_id = $2",
        )
        .bind(product_id.into_inner())
        .bind(user_id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        row.as_ref().map(cart_item_from_row).transpose()
    }

    async fn fetch_cart_items(&self, user_id: UserId) -> Result<Vec<CartItem>, StoreError> {
        let rows = sqlx::query(
            "SELECT cart_item_id, user_id, product_id, quantity, created_at, updated_at \
             FROM cart_items WHERE user_id = $1 ORDER BY created_at, cart_item_id",
        )
        .bind(user_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        rows.iter().map(cart_item_from_row).collect()
    }

    async fn insert_cart_item(&self, item: CartItem) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO cart_items \
             (cart_item_id, user_id, product_id, quantity, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(item.id.into_inner())
        .bind(item.user_id.into_inner())
        .bind(item.product_id.into_inner())
        .bind(item.quantity)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        Ok(())
    }

    async fn insert_cart_items(&self, items: Vec<CartItem>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;
        for item in items {
            sqlx::query(
                "INSERT INTO cart_items \
                 (cart_item_id, user_id, product_id, quantity, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(item.id.into_inner())
            .bind(item.user_id.into_inner())
            .bind(item.product_id.into_inner())
            .bind(item.quantity)
            .bind(item.created_at)
            .bind(item.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::backend)?;
        }
        tx.commit().await.map_err(StoreError::backend)
    }

    async fn update_cart_item(&self, item: CartItem) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE cart_items SET quantity = $2, updated_at = $3 WHERE cart_item_id = $1",
        )
        .bind(item.id.into_inner())
        .bind(item.quantity)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_cart_item(&self, id: CartItemId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_item_id = $1")
            .bind(id.into_inner())
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn fetch_discount_by_code(
        &self,
        code: &str,
    ) -> Result<Option<(Discount, DiscountCode)>, StoreError> {
        let row = sqlx::query(
            "SELECT d.discount_id, d.name, d.description, d.is_percentage, \
                    d.discount_value, d.minimum_order_amount, d.maximum_discount, \
                    d.from_date, d.to_date, d.status, d.created_by, d.created_at, \
                    d.modified_by, d.modified_at, \
                    c.discount_code_id, c.code, c.status AS code_status \
             FROM discount_codes c \
             JOIN discounts d ON d.discount_id = c.discount_id \
             WHERE c.code = $1 AND c.status = $2 AND d.status <> $3",
        )
        .bind(code)
        .bind(status_to_str(EntityStatus::Active))
        .bind(status_to_str(EntityStatus::Deleted))
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        let Some(row) = row else { return Ok(None) };
        let discount = discount_from_row(&row)?;
        let code_status: String = row.try_get("code_status").map_err(StoreError::backend)?;
        let code = DiscountCode {
            id: DiscountCodeId::new(
                row.try_get::<Uuid, _>("discount_code_id").map_err(StoreError::backend)?,
            ),
            discount_id: discount.id,
            code: row.try_get("code").map_err(StoreError::backend)?,
            status: status_from_str(&code_status)?,
        };
        Ok(Some((discount, code)))
    }

    async fn fetch_discount_product_ids(
        &self,
        discount_id: DiscountId,
    ) -> Result<HashSet<ProductId>, StoreError> {
        let rows = sqlx::query(
            "SELECT product_id FROM discount_products WHERE discount_id = $1",
        )
        .bind(discount_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        rows.iter()
            .map(|row| {
                row.try_get::<Uuid, _>("product_id")
                    .map(ProductId::new)
                    .map_err(StoreError::backend)
            })
            .collect()
    }
}

/// An open PostgreSQL transaction.
pub struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
    lock_timeout_ms: u64,
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn fetch_product_for_update(
        &mut self,
        product_id: ProductId,
    ) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            "SELECT product_id, name, price, stock_quantity, status, created_at, updated_at \
             FROM products WHERE product_id = $1 FOR UPDATE",
        )
        .bind(product_id.into_inner())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|err| lock_error(product_id, self.lock_timeout_ms, err))?;

        let Some(row) = row else { return Ok(None) };
        let mut product = product_from_row(&row)?;
        load_associations(&mut *self.tx, &mut product).await?;
        Ok(Some(product))
    }

    async fn persist_stock_decrement(
        &mut self,
        product_id: ProductId,
        new_quantity: i64,
    ) -> Result<(), StoreError> {
        if new_quantity < 0 {
            return Err(StoreError::backend(anyhow::anyhow!(
                "stock for {product_id} would go negative ({new_quantity})"
            )));
        }
        sqlx::query(
            "UPDATE products SET stock_quantity = $2, updated_at = now() \
             WHERE product_id = $1",
        )
        .bind(product_id.into_inner())
        .bind(new_quantity)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::backend)?;
        Ok(())
    }

    async fn clear_cart(&mut self, user_id: UserId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id.into_inner())
            .execute(&mut *self.tx)
            .await
            .map_err(StoreError::backend)?;
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(StoreError::backend)
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(StoreError::backend)
    }
}
