//! The transactional checkout orchestrator.
//!
//! One checkout attempt is a state machine over a single storage
//! transaction:
//!
//! `Started -> RowsLocked -> SubtotalComputed -> DiscountApplied ->
//! StockDecremented -> Committed`
//!
//! with any stage able to divert to `RolledBack` instead of advancing.
//! Product rows are locked in ascending ID order so two attempts with
//! overlapping carts can never each hold a lock the other needs. A
//! failed attempt leaves no observable state behind, which makes
//! `checkout` safe to retry from the caller side.

use crate::backend::{StoreBackend, StoreTransaction};
use crate::cart::CartRepository;
use crate::config::StoreConfig;
use crate::discount::DiscountRepository;
use crate::product::ProductRepository;
use brisk_commerce::cart::CartItem;
use brisk_commerce::catalog::Product;
use brisk_commerce::discount::evaluate;
use brisk_commerce::envelope::{ErrorCode, Return};
use brisk_commerce::ids::{CartItemId, ProductId, UserId};
use brisk_commerce::CommerceError;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Stages of one checkout attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStage {
    Started,
    RowsLocked,
    SubtotalComputed,
    DiscountApplied,
    StockDecremented,
    Committed,
    RolledBack,
}

impl CheckoutStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutStage::Started => "started",
            CheckoutStage::RowsLocked => "rows_locked",
            CheckoutStage::SubtotalComputed => "subtotal_computed",
            CheckoutStage::DiscountApplied => "discount_applied",
            CheckoutStage::StockDecremented => "stock_decremented",
            CheckoutStage::Committed => "committed",
            CheckoutStage::RolledBack => "rolled_back",
        }
    }
}

/// Which cart rows a checkout covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartSelection {
    /// The user's whole cart.
    All,
    /// Specific cart rows; every listed row must exist.
    Items(Vec<CartItemId>),
}

/// One priced line of a finalized checkout, from the locked snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i64,
    /// Unit price at lock time, not cart time.
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// The finalized totals of a committed checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutReceipt {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub total: Decimal,
    pub lines: Vec<CheckoutLine>,
}

/// A stage that failed, carrying the envelope to hand back.
struct Abort {
    stage: CheckoutStage,
    failure: Return<CheckoutReceipt>,
}

impl Abort {
    fn at(stage: CheckoutStage, failure: Return<CheckoutReceipt>) -> Self {
        Self { stage, failure }
    }

    fn error(stage: CheckoutStage, error: CommerceError) -> Self {
        Self::at(stage, error.into_return())
    }
}

/// Composes the inventory gate, cart aggregator, and discount engine
/// into one atomic checkout call.
pub struct CheckoutOrchestrator<B: StoreBackend> {
    backend: Arc<B>,
    products: ProductRepository<B>,
    carts: CartRepository<B>,
    discounts: DiscountRepository<B>,
}

impl<B: StoreBackend> CheckoutOrchestrator<B> {
    pub fn new(backend: Arc<B>, config: StoreConfig) -> Self {
        Self {
            products: ProductRepository::new(Arc::clone(&backend)),
            carts: CartRepository::new(Arc::clone(&backend), config),
            discounts: DiscountRepository::new(Arc::clone(&backend)),
            backend,
        }
    }

    /// Run one checkout attempt to `Committed` or `RolledBack`.
    pub async fn checkout(
        &self,
        user_id: UserId,
        selection: CartSelection,
        discount_code: Option<&str>,
    ) -> Return<CheckoutReceipt> {
        let items = match self.select_items(user_id, selection).await {
            Ok(items) => items,
            Err(failure) => return failure,
        };

        let mut tx = match self.backend.begin().await {
            Ok(tx) => tx,
            Err(err) => return err.into_return(),
        };

        match self.attempt(&mut tx, user_id, &items, discount_code).await {
            Ok(receipt) => match tx.commit().await {
                Ok(()) => {
                    tracing::info!(
                        %user_id,
                        total = %receipt.total,
                        stage = CheckoutStage::Committed.as_str(),
                        "checkout committed"
                    );
                    Return::ok(receipt)
                }
                Err(err) => {
                    tracing::warn!(%user_id, error = %err, "checkout commit failed");
                    CommerceError::from(err).into_return()
                }
            },
            Err(abort) => {
                tracing::warn!(
                    %user_id,
                    failed_stage = abort.stage.as_str(),
                    error_code = ?abort.failure.error_code,
                    stage = CheckoutStage::RolledBack.as_str(),
                    "checkout rolled back"
                );
                if let Err(err) = tx.rollback().await {
                    tracing::error!(%user_id, error = %err, "rollback failed");
                }
                abort.failure
            }
        }
    }

    /// Resolve the cart rows the attempt covers. Runs before the
    /// transaction opens; an empty or unresolvable selection never takes
    /// a lock.
    async fn select_items(
        &self,
        user_id: UserId,
        selection: CartSelection,
    ) -> Result<Vec<CartItem>, Return<CheckoutReceipt>> {
        let ret = self.carts.list_by_user(user_id, None, None).await;
        if !ret.is_success() {
            return Err(ret.cast_failure());
        }
        let all = ret.into_data().unwrap_or_default();

        let items = match selection {
            CartSelection::All => all,
            CartSelection::Items(ids) => {
                let wanted: HashSet<CartItemId> = ids.iter().copied().collect();
                let picked: Vec<CartItem> = all
                    .into_iter()
                    .filter(|item| wanted.contains(&item.id))
                    .collect();
                if picked.len() != wanted.len() {
                    return Err(Return::err(ErrorCode::CartNotFound));
                }
                picked
            }
        };

        if items.is_empty() {
            return Err(Return::err(ErrorCode::CartNotFound));
        }
        Ok(items)
    }

    async fn attempt(
        &self,
        tx: &mut B::Tx,
        user_id: UserId,
        items: &[CartItem],
        discount_code: Option<&str>,
    ) -> Result<CheckoutReceipt, Abort> {
        // Aggregate per product; BTreeMap iteration gives the ascending
        // lock order that rules out lock-ordering deadlocks.
        let mut requested: BTreeMap<ProductId, i64> = BTreeMap::new();
        for item in items {
            if item.quantity <= 0 {
                return Err(Abort::error(
                    CheckoutStage::Started,
                    CommerceError::InvalidQuantity(item.quantity),
                ));
            }
            *requested.entry(item.product_id).or_insert(0) += item.quantity;
        }

        let mut locked: BTreeMap<ProductId, Product> = BTreeMap::new();
        for product_id in requested.keys().copied().collect::<Vec<_>>() {
            let ret = self.products.lock_for_update(tx, product_id).await;
            if !ret.is_success() {
                return Err(Abort::at(CheckoutStage::Started, ret.cast_failure()));
            }
            let product = match ret.into_data() {
                Some(product) => product,
                None => {
                    return Err(Abort::error(
                        CheckoutStage::Started,
                        CommerceError::ProductNotFound(product_id),
                    ))
                }
            };
            if !product.is_purchasable() {
                return Err(Abort::error(
                    CheckoutStage::RowsLocked,
                    CommerceError::ProductNotFound(product_id),
                ));
            }
            locked.insert(product_id, product);
        }
        tracing::debug!(%user_id, rows = locked.len(), stage = CheckoutStage::RowsLocked.as_str(), "rows locked");

        // Subtotal from the locked snapshot, not cart-time prices.
        let mut subtotal = Decimal::ZERO;
        let mut lines = Vec::with_capacity(requested.len());
        for (product_id, quantity) in &requested {
            let product = &locked[product_id];
            let line_total = product.price * Decimal::from(*quantity);
            subtotal += line_total;
            lines.push(CheckoutLine {
                product_id: *product_id,
                product_name: product.name.clone(),
                quantity: *quantity,
                unit_price: product.price,
                line_total,
            });
        }
        tracing::debug!(%user_id, %subtotal, stage = CheckoutStage::SubtotalComputed.as_str(), "subtotal computed");

        let discount_amount = match discount_code {
            None => Decimal::ZERO,
            Some(code) => {
                self.apply_discount(code, subtotal, &requested).await?
            }
        };

        for (product_id, quantity) in &requested {
            let product = &locked[product_id];
            if *quantity > product.stock_quantity {
                return Err(Abort::error(
                    CheckoutStage::DiscountApplied,
                    CommerceError::InsufficientStock {
                        product_id: *product_id,
                        requested: *quantity,
                        available: product.stock_quantity,
                    },
                ));
            }
            let new_quantity = product.stock_quantity - quantity;
            if let Err(err) = tx.persist_stock_decrement(*product_id, new_quantity).await {
                return Err(Abort::error(
                    CheckoutStage::DiscountApplied,
                    CommerceError::from(err),
                ));
            }
        }
        tracing::debug!(%user_id, stage = CheckoutStage::StockDecremented.as_str(), "stock decremented");

        if let Err(err) = tx.clear_cart(user_id).await {
            return Err(Abort::error(
                CheckoutStage::StockDecremented,
                CommerceError::from(err),
            ));
        }

        Ok(CheckoutReceipt {
            subtotal,
            discount_amount,
            total: subtotal - discount_amount,
            lines,
        })
    }

    /// Evaluate the code against the locked-row subtotal. A rejection
    /// fails the whole attempt; checkout never silently proceeds
    /// undiscounted.
    async fn apply_discount(
        &self,
        code: &str,
        subtotal: Decimal,
        requested: &BTreeMap<ProductId, i64>,
    ) -> Result<Decimal, Abort> {
        let ret = self.discounts.get_by_code(code).await;
        if !ret.is_success() {
            return Err(Abort::at(CheckoutStage::SubtotalComputed, ret.cast_failure()));
        }
        let Some((discount, _)) = ret.into_data() else {
            return Err(Abort::error(
                CheckoutStage::SubtotalComputed,
                CommerceError::DiscountNotFound(code.to_string()),
            ));
        };

        let ret = self.discounts.get_restricted_product_ids(discount.id).await;
        if !ret.is_success() {
            return Err(Abort::at(CheckoutStage::SubtotalComputed, ret.cast_failure()));
        }
        let restricted_to = ret.into_data().unwrap_or_default();

        let cart_product_ids: Vec<ProductId> = requested.keys().copied().collect();
        let result = evaluate(
            &discount,
            &restricted_to,
            subtotal,
            &cart_product_ids,
            Utc::now(),
        );
        if !result.applicable {
            let reason = result
                .reason
                .unwrap_or(brisk_commerce::discount::RejectReason::Inactive);
            tracing::debug!(code, %reason, "discount rejected");
            return Err(Abort::error(
                CheckoutStage::SubtotalComputed,
                CommerceError::DiscountNotApplicable(reason),
            ));
        }
        tracing::debug!(code, amount = %result.amount, stage = CheckoutStage::DiscountApplied.as_str(), "discount applied");
        Ok(result.amount)
    }
}
