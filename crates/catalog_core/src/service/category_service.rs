//! Category use-case service.
//!
//! # Responsibility
//! - Show the three boundary strategies side by side: declarative
//!   (`create`), programmatic (`create_categories`) and manual (`manual`).
//! - Show a nested operation joining its caller's unit of work
//!   (`create_nested`).
//!
//! # Invariants
//! - `create`, `create_nested`, `create_categories` and `manual` always
//!   fail and leave no category behind.
//! - Failures are returned as produced by the work, never rewritten.

use crate::model::category::Category;
use crate::repo::category_repo::{CategoryRepository, SqliteCategoryRepository};
use crate::repo::RepoError;
use crate::tx::{
    TransactionCoordinator, TransactionDefinition, TransactionManager, TransactionStatus,
    TransactionalWork, TxError,
};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

const SAMPLE_CATEGORY_COUNT: usize = 5;
const MANUAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Service error for category use-cases.
#[derive(Debug)]
pub enum CategoryServiceError {
    /// Work asked for its unit of work to fail.
    Rejected(String),
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Boundary failure such as a timeout or a rollback-only commit.
    Transaction(TxError),
}

impl Display for CategoryServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(message) => write!(f, "rejected: {message}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Transaction(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CategoryServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Rejected(_) => None,
            Self::Repo(err) => Some(err),
            Self::Transaction(err) => Some(err),
        }
    }
}

impl From<RepoError> for CategoryServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Transaction(err) => Self::Transaction(err),
            other => Self::Repo(other),
        }
    }
}

impl From<TxError> for CategoryServiceError {
    fn from(value: TxError) -> Self {
        Self::Transaction(value)
    }
}

/// Saves "Category 0".."Category 4" and then fails.
struct CreateSampleCategories;

impl<'m> TransactionalWork<'m> for CreateSampleCategories {
    type Output = ();
    type Error = CategoryServiceError;

    fn definition(&self) -> TransactionDefinition {
        TransactionDefinition::required().named("category.create")
    }

    fn run(&self, status: &TransactionStatus<'m>) -> Result<(), CategoryServiceError> {
        let repo = SqliteCategoryRepository::new(status);
        for index in 0..SAMPLE_CATEGORY_COUNT {
            repo.save(&Category::new(format!("Category {index}")))?;
        }
        Err(CategoryServiceError::Rejected(
            "Ups rollback please".to_string(),
        ))
    }
}

/// Saves "Category Outer", then runs [`CreateSampleCategories`] joined to
/// the same unit of work.
struct CreateOuterThenSamples<'s, 'm> {
    service: &'s CategoryService<'m>,
}

impl<'m> TransactionalWork<'m> for CreateOuterThenSamples<'_, 'm> {
    type Output = ();
    type Error = CategoryServiceError;

    fn definition(&self) -> TransactionDefinition {
        TransactionDefinition::required().named("category.create_nested")
    }

    fn run(&self, status: &TransactionStatus<'m>) -> Result<(), CategoryServiceError> {
        SqliteCategoryRepository::new(status).save(&Category::new("Category Outer"))?;
        self.service.create_in(Some(status))
    }
}

/// Category service over one transaction coordinator.
pub struct CategoryService<'m> {
    coordinator: TransactionCoordinator<'m>,
}

impl<'m> CategoryService<'m> {
    pub fn new(manager: &'m TransactionManager) -> Self {
        Self {
            coordinator: TransactionCoordinator::new(manager),
        }
    }

    /// Declarative boundary: saves five categories, then fails.
    pub fn create(&self) -> Result<(), CategoryServiceError> {
        self.create_in(None)
    }

    /// Same as [`create`](Self::create), joining `outer` when given.
    pub fn create_in(
        &self,
        outer: Option<&TransactionStatus<'m>>,
    ) -> Result<(), CategoryServiceError> {
        self.coordinator
            .run_declarative(outer, &CreateSampleCategories)
    }

    /// Declarative boundary that delegates to `create` inside its own unit
    /// of work; the inner failure undoes the outer write as well.
    pub fn create_nested(&self) -> Result<(), CategoryServiceError> {
        self.coordinator
            .run_declarative(None, &CreateOuterThenSamples { service: self })
    }

    /// Programmatic boundary: saves five categories, then calls `error`.
    pub fn create_categories(&self) -> Result<(), CategoryServiceError> {
        self.coordinator.run_programmatic(None, |status| {
            let repo = SqliteCategoryRepository::new(status);
            for index in 0..SAMPLE_CATEGORY_COUNT {
                repo.save(&Category::new(format!("Category {index}")))?;
            }
            self.error()
        })
    }

    /// Manual boundary with a 10 second timeout: saves five categories, then
    /// calls `error`.
    pub fn manual(&self) -> Result<(), CategoryServiceError> {
        self.coordinator
            .run_manual(None, MANUAL_TIMEOUT, |status| {
                let repo = SqliteCategoryRepository::new(status);
                for index in 0..SAMPLE_CATEGORY_COUNT {
                    repo.save(&Category::new(format!("Category Manual {index}")))?;
                }
                self.error()
            })
    }

    /// Saves all `names` in one unit of work and returns the stored records
    /// in input order.
    pub fn create_all(&self, names: &[&str]) -> Result<Vec<Category>, CategoryServiceError> {
        let saved = self.coordinator.run_programmatic(None, |status| {
            let repo = SqliteCategoryRepository::new(status);
            names
                .iter()
                .map(|name| repo.save(&Category::new(*name)).map_err(CategoryServiceError::from))
                .collect::<Result<Vec<_>, _>>()
        })?;
        info!(
            "event=category_create_all module=service status=ok count={}",
            saved.len()
        );
        Ok(saved)
    }

    /// Always fails; used to force rollback in the demonstrations.
    pub fn error(&self) -> Result<(), CategoryServiceError> {
        Err(CategoryServiceError::Rejected("Ups".to_string()))
    }
}
