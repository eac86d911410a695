//! Product category.

use crate::ids::CategoryId;
use crate::status::EntityStatus;
use serde::{Deserialize, Serialize};

/// A catalog category a product can belong to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    /// Unique category identifier.
    pub id: CategoryId,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Soft-delete status.
    pub status: EntityStatus,
}

impl Category {
    /// Create an active category.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: CategoryId::generate(),
            name: name.into(),
            description: None,
            status: EntityStatus::Active,
        }
    }
}
