//! Product record and read projections.

use super::category::CategoryId;
use super::ModelValidationError;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Storage-assigned product identity.
pub type ProductId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: Option<ProductId>,
    pub name: String,
    /// Whole currency units. Non-negative by convention only.
    pub price: i64,
    pub category_id: CategoryId,
}

impl Product {
    /// Creates an unsaved product owned by `category_id`.
    pub fn new(name: impl Into<String>, price: i64, category_id: CategoryId) -> Self {
        Self {
            id: None,
            name: name.into(),
            price,
            category_id,
        }
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if self.name.trim().is_empty() {
            return Err(ModelValidationError::BlankProductName);
        }
        Ok(())
    }
}

/// Read-only shape selected from `products` by projection queries.
///
/// `COLUMNS` is spliced into the select list, so implementations must use
/// literal column names only.
pub trait ProductProjection: Sized {
    const COLUMNS: &'static str;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Identity and name only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleProduct {
    pub id: ProductId,
    pub name: String,
}

impl ProductProjection for SimpleProduct {
    const COLUMNS: &'static str = "id, name";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
        })
    }
}

/// Identity and price only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPrice {
    pub id: ProductId,
    pub price: i64,
}

impl ProductProjection for ProductPrice {
    const COLUMNS: &'static str = "id, price";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            price: row.get("price")?,
        })
    }
}
