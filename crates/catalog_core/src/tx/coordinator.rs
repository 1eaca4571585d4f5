//! Transaction-boundary coordinator.
//!
//! # Responsibility
//! - Execute caller work as one atomic unit of work using one of three
//!   boundary strategies: declarative, programmatic and manual.
//!
//! # Invariants
//! - All three strategies share one contract: begin or join, run the work,
//!   commit on `Ok`, roll back every write on `Err` and return that `Err`
//!   unchanged.
//! - Nested calls that pass the outer status join it under `Required`, so
//!   an inner failure rolls back the outer writes too.
//! - Nothing is retried.

use super::manager::{Propagation, TransactionDefinition, TransactionManager, TransactionStatus};
use super::template::TransactionTemplate;
use super::TxError;
use log::{debug, warn};
use std::time::Duration;

/// Work that declares its own transaction boundary.
///
/// The definition sits next to the body, the way an annotation would; the
/// coordinator establishes it before `run` and tears it down afterwards.
pub trait TransactionalWork<'m> {
    type Output;
    type Error: From<TxError>;

    /// Boundary attributes. Defaults to `Required` with no timeout.
    fn definition(&self) -> TransactionDefinition {
        TransactionDefinition::default()
    }

    fn run(&self, status: &TransactionStatus<'m>) -> Result<Self::Output, Self::Error>;
}

/// Gateway through which services run units of work.
///
/// Holds no mutable state; the injected manager owns the connection.
#[derive(Clone, Copy)]
pub struct TransactionCoordinator<'m> {
    manager: &'m TransactionManager,
}

impl<'m> TransactionCoordinator<'m> {
    pub fn new(manager: &'m TransactionManager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &'m TransactionManager {
        self.manager
    }

    /// Runs `work` inside the boundary it declares.
    pub fn run_declarative<W>(
        &self,
        outer: Option<&TransactionStatus<'m>>,
        work: &W,
    ) -> Result<W::Output, W::Error>
    where
        W: TransactionalWork<'m>,
    {
        let definition = work.definition();
        debug!(
            "event=tx_run module=tx strategy=declarative name={} joined={}",
            definition.name.unwrap_or("unnamed"),
            outer.is_some()
        );
        TransactionTemplate::with_definition(self.manager, definition)
            .execute(outer, |status| work.run(status))
    }

    /// Runs `work` inside a boundary established by this call.
    pub fn run_programmatic<T, E, F>(
        &self,
        outer: Option<&TransactionStatus<'m>>,
        work: F,
    ) -> Result<T, E>
    where
        F: FnOnce(&TransactionStatus<'m>) -> Result<T, E>,
        E: From<TxError>,
    {
        debug!(
            "event=tx_run module=tx strategy=programmatic joined={}",
            outer.is_some()
        );
        TransactionTemplate::new(self.manager).execute(outer, work)
    }

    /// Runs `work` with explicit `begin`/`commit`/`rollback` calls.
    ///
    /// The unit of work uses `Required` propagation and `timeout`. When the
    /// work fails the rollback is issued explicitly and the work's error is
    /// returned; a commit past the deadline rolls back and returns
    /// [`TxError::TimedOut`].
    pub fn run_manual<T, E, F>(
        &self,
        outer: Option<&TransactionStatus<'m>>,
        timeout: Duration,
        work: F,
    ) -> Result<T, E>
    where
        F: FnOnce(&TransactionStatus<'m>) -> Result<T, E>,
        E: From<TxError>,
    {
        let definition = TransactionDefinition::required()
            .with_propagation(Propagation::Required)
            .with_timeout(timeout)
            .named("manual");
        debug!(
            "event=tx_run module=tx strategy=manual joined={} timeout_ms={}",
            outer.is_some(),
            timeout.as_millis()
        );

        let status = self.manager.begin(&definition, outer)?;
        match work(&status) {
            Ok(value) => {
                self.manager.commit(status)?;
                Ok(value)
            }
            Err(err) => {
                let tx_id = status.transaction_id();
                if let Err(rollback_err) = self.manager.rollback(status) {
                    warn!(
                        "event=tx_run module=tx strategy=manual status=error tx_id={} error_code=rollback_failed error={}",
                        tx_id, rollback_err
                    );
                }
                Err(err)
            }
        }
    }
}
