//! Soft-delete entity status shared across the data model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status carried by every soft-deletable entity.
///
/// Rows are never physically deleted; `Deleted` (and, where noted,
/// `Inactive`) rows are excluded from normal reads unless a caller asks
/// for them explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    #[default]
    Active,
    Inactive,
    Deleted,
}

impl EntityStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, EntityStatus::Active)
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, EntityStatus::Deleted)
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityStatus::Active => write!(f, "active"),
            EntityStatus::Inactive => write!(f, "inactive"),
            EntityStatus::Deleted => write!(f, "deleted"),
        }
    }
}
