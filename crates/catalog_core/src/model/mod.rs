//! Catalog domain model.
//!
//! # Responsibility
//! - Define the records persisted in `categories` and `products`.
//! - Validate record shape before it reaches storage.
//!
//! # Invariants
//! - Identities are assigned by storage on first save and never change.
//! - A product references its category by identity only.

pub mod category;
pub mod product;

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// Record shape violations detected before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    BlankCategoryName,
    BlankProductName,
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankCategoryName => write!(f, "category name must not be blank"),
            Self::BlankProductName => write!(f, "product name must not be blank"),
        }
    }
}

impl Error for ModelValidationError {}

/// Current wall clock in epoch milliseconds, used for audit timestamps.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
