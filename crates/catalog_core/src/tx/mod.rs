//! Transaction boundaries over a single SQLite connection.
//!
//! # Responsibility
//! - Provide the transaction manager primitive (`begin`/`commit`/`rollback`).
//! - Provide the boundary strategies used by services: declarative
//!   (`TransactionalWork`), programmatic (`TransactionTemplate`) and manual.
//! - Route repository statements through an [`Executor`] so transactional
//!   and autocommit access share one repository implementation.
//!
//! # Invariants
//! - There is no ambient transaction: callers pass the outer
//!   [`TransactionStatus`] explicitly when they want to join it.
//! - A failed unit of work leaves zero writes behind; a successful one
//!   commits all of them together.
//! - Errors produced by caller work are returned unchanged.

pub mod coordinator;
pub mod manager;
pub mod template;

use crate::db::DbError;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use coordinator::{TransactionCoordinator, TransactionalWork};
pub use manager::{
    Outcome, Propagation, TransactionDefinition, TransactionManager, TransactionStatus,
};
pub use template::TransactionTemplate;

pub type TxResult<T> = Result<T, TxError>;

/// Failures raised by the transaction manager itself.
#[derive(Debug)]
pub enum TxError {
    /// SQLite rejected a `BEGIN`, `COMMIT`, `ROLLBACK` or savepoint statement.
    Db(DbError),
    /// The unit of work outlived its configured timeout and was rolled back.
    TimedOut { timeout_ms: u128, elapsed_ms: u128 },
    /// `Propagation::Mandatory` was requested without an outer unit of work.
    NoExistingTransaction,
    /// A top-level transaction was requested while one is already open on
    /// the connection.
    TransactionAlreadyActive,
    /// The outer status belongs to a different transaction manager.
    ForeignTransaction,
    /// A participant rolled back, so the outer commit rolled back instead.
    UnexpectedRollback,
    /// The outer unit of work was committed while participants or
    /// savepoints opened inside it were still pending; it rolled back.
    PendingNestedWork { pending: u32 },
}

impl Display for TxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::TimedOut {
                timeout_ms,
                elapsed_ms,
            } => write!(
                f,
                "transaction timed out after {elapsed_ms}ms (timeout {timeout_ms}ms)"
            ),
            Self::NoExistingTransaction => write!(
                f,
                "no existing transaction found for propagation 'mandatory'"
            ),
            Self::TransactionAlreadyActive => {
                write!(f, "a transaction is already active on this connection")
            }
            Self::ForeignTransaction => {
                write!(f, "outer transaction belongs to a different manager")
            }
            Self::UnexpectedRollback => write!(
                f,
                "transaction rolled back because it has been marked as rollback-only"
            ),
            Self::PendingNestedWork { pending } => write!(
                f,
                "transaction rolled back: {pending} nested unit(s) of work still pending"
            ),
        }
    }
}

impl Error for TxError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for TxError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for TxError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Connection access used by repositories.
///
/// A bare [`Connection`] runs every statement in autocommit mode. A
/// [`TransactionStatus`] runs statements inside its unit of work and refuses
/// them once the unit of work has timed out.
pub trait Executor {
    fn connection(&self) -> TxResult<&Connection>;

    /// Returns whether statements run inside an explicit transaction.
    fn in_transaction(&self) -> bool;
}

impl Executor for Connection {
    fn connection(&self) -> TxResult<&Connection> {
        Ok(self)
    }

    fn in_transaction(&self) -> bool {
        !self.is_autocommit()
    }
}

impl Executor for TransactionManager {
    fn connection(&self) -> TxResult<&Connection> {
        Ok(self.raw_connection())
    }

    fn in_transaction(&self) -> bool {
        !self.raw_connection().is_autocommit()
    }
}
