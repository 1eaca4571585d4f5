//! Programmatic transaction boundary.
//!
//! # Responsibility
//! - Run a closure inside a unit of work described by a definition.
//! - Commit when the closure returns `Ok`, roll back when it returns `Err`.
//!
//! # Invariants
//! - The closure's error is returned as-is; a rollback failure after it is
//!   logged and never replaces it.

use super::manager::{TransactionDefinition, TransactionManager, TransactionStatus};
use super::TxError;
use log::warn;

/// Reusable boundary bound to one manager and one definition.
pub struct TransactionTemplate<'m> {
    manager: &'m TransactionManager,
    definition: TransactionDefinition,
}

impl<'m> TransactionTemplate<'m> {
    /// Creates a template with the default definition (`Required`, no
    /// timeout, read-write).
    pub fn new(manager: &'m TransactionManager) -> Self {
        Self::with_definition(manager, TransactionDefinition::default())
    }

    pub fn with_definition(manager: &'m TransactionManager, definition: TransactionDefinition) -> Self {
        Self {
            manager,
            definition,
        }
    }

    pub fn definition(&self) -> &TransactionDefinition {
        &self.definition
    }

    /// Runs `work` in a unit of work and returns its value.
    ///
    /// `outer` is the caller's unit of work, if any; `Required` joins it.
    pub fn execute<T, E, F>(&self, outer: Option<&TransactionStatus<'m>>, work: F) -> Result<T, E>
    where
        F: FnOnce(&TransactionStatus<'m>) -> Result<T, E>,
        E: From<TxError>,
    {
        let status = self.manager.begin(&self.definition, outer)?;
        match work(&status) {
            Ok(value) => {
                self.manager.commit(status)?;
                Ok(value)
            }
            Err(err) => {
                let tx_id = status.transaction_id();
                if let Err(rollback_err) = self.manager.rollback(status) {
                    warn!(
                        "event=tx_template module=tx status=error tx_id={} error_code=rollback_failed error={}",
                        tx_id, rollback_err
                    );
                }
                Err(err)
            }
        }
    }

    /// Same as [`execute`](Self::execute) for work without a result value.
    pub fn execute_without_result<E, F>(
        &self,
        outer: Option<&TransactionStatus<'m>>,
        work: F,
    ) -> Result<(), E>
    where
        F: FnOnce(&TransactionStatus<'m>) -> Result<(), E>,
        E: From<TxError>,
    {
        self.execute(outer, work)
    }
}

#[cfg(test)]
mod tests {
    use super::TransactionTemplate;
    use crate::db::open_db_in_memory;
    use crate::tx::{Executor, TransactionDefinition, TransactionManager, TxError};

    fn category_count(exec: &dyn Executor) -> i64 {
        exec.connection()
            .and_then(|conn| {
                conn.query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))
                    .map_err(TxError::from)
            })
            .expect("count categories")
    }

    fn insert_category(exec: &dyn Executor, name: &str) -> Result<(), TxError> {
        exec.connection()?.execute(
            "INSERT INTO categories (name, created_date, last_modified_date) VALUES (?1, 0, 0)",
            [name],
        )?;
        Ok(())
    }

    #[test]
    fn execute_without_result_commits_on_ok() {
        let manager = TransactionManager::new(open_db_in_memory().expect("open db"));
        let template = TransactionTemplate::new(&manager);

        template
            .execute_without_result(None, |status| insert_category(status, "kept"))
            .expect("work should commit");

        assert_eq!(category_count(&manager), 1);
    }

    #[test]
    fn execute_rolls_back_and_returns_work_error() {
        let manager = TransactionManager::new(open_db_in_memory().expect("open db"));
        let template = TransactionTemplate::with_definition(
            &manager,
            TransactionDefinition::required().named("template.test"),
        );
        assert_eq!(template.definition().name, Some("template.test"));

        let err = template
            .execute(None, |status| {
                insert_category(status, "dropped")?;
                Err::<(), _>(TxError::NoExistingTransaction)
            })
            .expect_err("work error must propagate");

        assert!(matches!(err, TxError::NoExistingTransaction));
        assert_eq!(category_count(&manager), 0);
        assert!(!manager.in_transaction());
    }
}
