//! Catalog types: products and their associations.

mod category;
mod product;

pub use category::Category;
pub use product::{Product, ProductAttribute, ProductImage};
