//! Repository layer over the catalog tables.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for categories and
//!   products.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Repositories reach SQLite only through an [`Executor`], so the same
//!   repository runs in autocommit mode or inside a unit of work.
//! - Write paths validate records before any SQL mutation.
//!
//! [`Executor`]: crate::tx::Executor

pub mod category_repo;
pub mod paging;
pub mod product_repo;
pub mod product_spec;

use crate::db::DbError;
use crate::model::category::CategoryId;
use crate::model::product::ProductId;
use crate::model::ModelValidationError;
use crate::tx::TxError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for catalog persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ModelValidationError),
    Db(DbError),
    /// The surrounding unit of work refused the statement (e.g. timed out).
    Transaction(TxError),
    CategoryNotFound(CategoryId),
    ProductNotFound(ProductId),
    InvalidData(String),
    InvalidPageRequest(String),
    /// The operation only makes sense inside a unit of work.
    TransactionRequired(&'static str),
}

impl RepoError {
    /// Returns whether storage rejected the write because of a constraint,
    /// such as a product pointing at a missing category.
    pub fn is_integrity_violation(&self) -> bool {
        match self {
            Self::Db(err) => err.is_constraint_violation(),
            _ => false,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Transaction(err) => write!(f, "{err}"),
            Self::CategoryNotFound(id) => write!(f, "category not found: {id}"),
            Self::ProductNotFound(id) => write!(f, "product not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted catalog data: {message}"),
            Self::InvalidPageRequest(message) => write!(f, "invalid page request: {message}"),
            Self::TransactionRequired(operation) => {
                write!(f, "`{operation}` requires an active unit of work")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Transaction(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ModelValidationError> for RepoError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<TxError> for RepoError {
    fn from(value: TxError) -> Self {
        match value {
            TxError::Db(err) => Self::Db(err),
            other => Self::Transaction(other),
        }
    }
}
