//! Core persistence logic for the catalog (categories and products).
//! Units of work, repositories and services live here.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod tx;

pub use config::CatalogConfig;
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::category::{Category, CategoryExample, CategoryId, ExampleMatcher};
pub use model::product::{Product, ProductId, ProductPrice, ProductProjection, SimpleProduct};
pub use model::ModelValidationError;
pub use repo::category_repo::{CategoryRepository, SqliteCategoryRepository};
pub use repo::paging::{Direction, Page, PageRequest, ProductSortField, Slice, Sort};
pub use repo::product_repo::{ProductRepository, SqliteProductRepository};
pub use repo::product_spec::ProductSpec;
pub use repo::{RepoError, RepoResult};
pub use service::category_service::{CategoryService, CategoryServiceError};
pub use service::product_service::{ProductService, ProductServiceError};
pub use tx::{
    Executor, Outcome, Propagation, TransactionCoordinator, TransactionDefinition,
    TransactionManager, TransactionStatus, TransactionTemplate, TransactionalWork, TxError,
    TxResult,
};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
