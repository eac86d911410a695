//! Storage layer and transactional checkout for BriskCommerce.
//!
//! The storage half of the commerce core:
//!
//! - **Backend**: the abstract persistence interface ([`backend`])
//! - **Engines**: an in-memory engine with real row locks ([`memory`]),
//!   and a PostgreSQL engine behind the `postgres` feature
//! - **Repositories**: product access with the checkout locking read,
//!   cart aggregation, and discount lookups
//! - **Checkout**: the transactional orchestrator composing them
//!
//! Every public operation returns a `brisk_commerce::Return` envelope.

pub mod backend;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod discount;
pub mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod product;

pub use backend::{StoreBackend, StoreTransaction};
pub use cart::CartRepository;
pub use checkout::{
    CartSelection, CheckoutLine, CheckoutOrchestrator, CheckoutReceipt, CheckoutStage,
};
pub use config::StoreConfig;
pub use discount::DiscountRepository;
pub use error::StoreError;
pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;
pub use product::ProductRepository;
