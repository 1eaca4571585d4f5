//! Product use-case service.
//!
//! # Responsibility
//! - Give product writes their own unit of work (delete, price reset).
//! - Run read-modify-write updates under the unit of work's write lock.
//!
//! # Invariants
//! - Every public write either joins `outer` or opens a new unit of work.
//! - `update_price_locked` reads and writes inside one unit of work, so a
//!   concurrent caller starts from the committed result.

use crate::model::product::{Product, ProductId};
use crate::repo::product_repo::{ProductRepository, SqliteProductRepository};
use crate::repo::RepoError;
use crate::tx::{TransactionCoordinator, TransactionManager, TransactionStatus, TxError};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Service error for product use-cases.
#[derive(Debug)]
pub enum ProductServiceError {
    ProductNotFound(ProductId),
    Repo(RepoError),
    Transaction(TxError),
}

impl Display for ProductServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProductNotFound(id) => write!(f, "product not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Transaction(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ProductServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ProductNotFound(_) => None,
            Self::Repo(err) => Some(err),
            Self::Transaction(err) => Some(err),
        }
    }
}

impl From<RepoError> for ProductServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::ProductNotFound(id) => Self::ProductNotFound(id),
            RepoError::Transaction(err) => Self::Transaction(err),
            other => Self::Repo(other),
        }
    }
}

impl From<TxError> for ProductServiceError {
    fn from(value: TxError) -> Self {
        Self::Transaction(value)
    }
}

/// Product service over one transaction coordinator.
pub struct ProductService<'m> {
    coordinator: TransactionCoordinator<'m>,
}

impl<'m> ProductService<'m> {
    pub fn new(manager: &'m TransactionManager) -> Self {
        Self {
            coordinator: TransactionCoordinator::new(manager),
        }
    }

    /// Deletes products named `name` in their own unit of work.
    pub fn delete_by_name(&self, name: &str) -> Result<usize, ProductServiceError> {
        self.delete_by_name_in(None, name)
    }

    /// Deletes products named `name`, joining `outer` when given.
    pub fn delete_by_name_in(
        &self,
        outer: Option<&TransactionStatus<'m>>,
        name: &str,
    ) -> Result<usize, ProductServiceError> {
        let deleted = self.coordinator.run_programmatic(outer, |status| {
            SqliteProductRepository::new(status)
                .delete_by_name(name)
                .map_err(ProductServiceError::from)
        })?;
        info!(
            "event=product_delete_by_name module=service status=ok rows={}",
            deleted
        );
        Ok(deleted)
    }

    /// Sets the price of `id` to zero and returns the updated product.
    pub fn reset_price(&self, id: ProductId) -> Result<Product, ProductServiceError> {
        self.coordinator.run_programmatic(None, |status| {
            let repo = SqliteProductRepository::new(status);
            if repo.update_price_to_zero(id)? == 0 {
                return Err(ProductServiceError::ProductNotFound(id));
            }
            repo.find_by_id(id)?
                .ok_or(ProductServiceError::ProductNotFound(id))
        })
    }

    /// Locks `id`, replaces its price with `reprice(current)`, optionally
    /// keeps the lock for `hold`, then saves and commits.
    ///
    /// A second caller doing the same on another connection waits for this
    /// unit of work to finish and then sees the price written here.
    pub fn update_price_locked<F>(
        &self,
        id: ProductId,
        hold: Duration,
        reprice: F,
    ) -> Result<Product, ProductServiceError>
    where
        F: FnOnce(i64) -> i64,
    {
        self.coordinator.run_programmatic(None, |status| {
            let repo = SqliteProductRepository::new(status);
            let mut product = repo
                .find_first_by_id_for_update(id)?
                .ok_or(ProductServiceError::ProductNotFound(id))?;
            product.price = reprice(product.price);
            if !hold.is_zero() {
                std::thread::sleep(hold);
            }
            Ok(repo.save(&product)?)
        })
    }
}
