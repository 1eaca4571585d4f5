//! Category record.
//!
//! # Invariants
//! - `id` is `None` until the first save and immutable afterwards.
//! - `last_modified_date` never moves backwards across saves.

use super::ModelValidationError;
use serde::{Deserialize, Serialize};

/// Storage-assigned category identity.
pub type CategoryId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Option<CategoryId>,
    pub name: String,
    /// Epoch ms, set by the repository on insert.
    pub created_date: Option<i64>,
    /// Epoch ms, set by the repository on every write.
    pub last_modified_date: Option<i64>,
}

impl Category {
    /// Creates an unsaved category.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            created_date: None,
            last_modified_date: None,
        }
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if self.name.trim().is_empty() {
            return Err(ModelValidationError::BlankCategoryName);
        }
        Ok(())
    }
}

/// Example record used by query-by-example lookups.
///
/// `None` fields are ignored; set fields must all match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryExample {
    pub id: Option<CategoryId>,
    pub name: Option<String>,
}

/// Matching options for [`CategoryExample`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExampleMatcher {
    /// Compare text fields case-insensitively.
    pub ignore_case: bool,
}

impl ExampleMatcher {
    pub fn matching() -> Self {
        Self::default()
    }

    pub fn with_ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }
}
