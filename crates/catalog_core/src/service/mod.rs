//! Catalog use-case services.
//!
//! # Responsibility
//! - Compose repository calls into units of work through the
//!   transaction coordinator.
//! - Keep callers unaware of SQL and transaction plumbing.

pub mod category_service;
pub mod product_service;
