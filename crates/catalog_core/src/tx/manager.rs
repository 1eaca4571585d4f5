//! Transaction manager primitive.
//!
//! # Responsibility
//! - Begin, join or nest units of work on one injected connection.
//! - Commit or roll back a unit of work and finalize its outcome.
//! - Enforce optional per-transaction timeouts.
//!
//! # Invariants
//! - Only the status that began a physical transaction may end it;
//!   participants can only mark it rollback-only.
//! - Dropping a pending status rolls back its scope.
//! - A physical transaction commits only after every participant and
//!   savepoint opened inside it has finished.
//! - Rolling back a savepoint restores the rollback-only flag to what it was
//!   when the savepoint opened, so failures contained by the savepoint do
//!   not doom the outer unit of work.
//! - New read-write transactions take the SQLite write lock at `BEGIN`
//!   (`BEGIN IMMEDIATE`), so concurrent writers are serialised per unit of
//!   work rather than per statement.

use super::{Executor, TxError, TxResult};
use log::{debug, info, warn};
use rusqlite::Connection;
use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Whether a unit of work joins the caller's unit of work or opens its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Propagation {
    /// Join the outer unit of work, or begin a new one without it.
    #[default]
    Required,
    /// Join the outer unit of work; fail when there is none.
    Mandatory,
    /// Open a savepoint inside the outer unit of work, or begin a new one
    /// without it.
    Nested,
}

impl Propagation {
    fn as_str(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Mandatory => "mandatory",
            Self::Nested => "nested",
        }
    }
}

/// Boundary attributes for one unit of work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionDefinition {
    pub propagation: Propagation,
    /// Ignored when joining an existing unit of work.
    pub timeout: Option<Duration>,
    /// Read-only transactions begin deferred and take no write lock upfront.
    pub read_only: bool,
    /// Label used in log events.
    pub name: Option<&'static str>,
}

impl TransactionDefinition {
    pub fn required() -> Self {
        Self::default()
    }

    pub fn with_propagation(mut self, propagation: Propagation) -> Self {
        self.propagation = propagation;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_timeout_secs(self, seconds: u64) -> Self {
        self.with_timeout(Duration::from_secs(seconds))
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn named(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }
}

/// Lifecycle state of one [`TransactionStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pending,
    /// For participants this means the work was handed to the outer unit
    /// of work, which still decides durability.
    Committed,
    RolledBack,
}

impl Outcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
        }
    }
}

/// State shared by every status taking part in one physical transaction.
#[derive(Debug)]
struct PhysicalTransaction {
    id: Uuid,
    started_at: Instant,
    timeout: Option<Duration>,
    rollback_only: Cell<bool>,
    savepoint_seq: Cell<u32>,
    /// Participants and savepoints that are still pending.
    open_children: Cell<u32>,
}

impl PhysicalTransaction {
    fn check_deadline(&self) -> TxResult<()> {
        let Some(timeout) = self.timeout else {
            return Ok(());
        };
        let elapsed = self.started_at.elapsed();
        if elapsed > timeout {
            return Err(TxError::TimedOut {
                timeout_ms: timeout.as_millis(),
                elapsed_ms: elapsed.as_millis(),
            });
        }
        Ok(())
    }
}

#[derive(Debug)]
enum Scope {
    New,
    Participating,
    Savepoint {
        name: String,
        rollback_only_at_open: bool,
    },
}

impl Scope {
    fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Participating => "participating",
            Self::Savepoint { .. } => "savepoint",
        }
    }
}

/// Handle to one unit of work.
///
/// Repositories bound to a status run their statements inside the unit of
/// work. The status borrows the manager's connection and is not `Send`.
#[derive(Debug)]
pub struct TransactionStatus<'m> {
    conn: &'m Connection,
    physical: Rc<PhysicalTransaction>,
    scope: Scope,
    propagation: Propagation,
    name: &'static str,
    local_rollback_only: Cell<bool>,
    outcome: Cell<Outcome>,
}

impl TransactionStatus<'_> {
    /// Correlation id of the physical transaction.
    pub fn transaction_id(&self) -> Uuid {
        self.physical.id
    }

    /// Returns whether this status began the physical transaction.
    pub fn is_new_transaction(&self) -> bool {
        matches!(self.scope, Scope::New)
    }

    pub fn has_savepoint(&self) -> bool {
        matches!(self.scope, Scope::Savepoint { .. })
    }

    pub fn propagation(&self) -> Propagation {
        self.propagation
    }

    /// Marks this unit of work so that commit rolls back instead.
    ///
    /// This is the signal for conditional rollback; returning an error from
    /// work is reserved for real failures.
    pub fn set_rollback_only(&self) {
        self.local_rollback_only.set(true);
    }

    /// Returns whether this status, or a participant of its physical
    /// transaction, asked for rollback.
    pub fn is_rollback_only(&self) -> bool {
        self.local_rollback_only.get() || self.physical.rollback_only.get()
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome.get()
    }

    pub fn elapsed(&self) -> Duration {
        self.physical.started_at.elapsed()
    }

    /// Fails with [`TxError::TimedOut`] once the deadline has passed.
    pub fn check_deadline(&self) -> TxResult<()> {
        self.physical.check_deadline()
    }

    fn finish(&self, outcome: Outcome) {
        if self.is_pending() && !matches!(self.scope, Scope::New) {
            let open = self.physical.open_children.get();
            self.physical.open_children.set(open.saturating_sub(1));
        }
        self.outcome.set(outcome);
    }

    fn is_pending(&self) -> bool {
        self.outcome.get() == Outcome::Pending
    }
}

impl Executor for TransactionStatus<'_> {
    fn connection(&self) -> TxResult<&Connection> {
        self.physical.check_deadline()?;
        Ok(self.conn)
    }

    fn in_transaction(&self) -> bool {
        true
    }
}

impl Drop for TransactionStatus<'_> {
    fn drop(&mut self) {
        if !self.is_pending() {
            return;
        }
        warn!(
            "event=tx_abandoned module=tx status=rollback tx_id={} name={} scope={}",
            self.physical.id,
            self.name,
            self.scope.as_str()
        );
        if let Err(err) = undo_scope(self) {
            warn!(
                "event=tx_abandoned module=tx status=error tx_id={} error={}",
                self.physical.id, err
            );
        }
        self.finish(Outcome::RolledBack);
    }
}

/// Owns the connection all units of work run on.
///
/// One manager serves one caller at a time; independent callers each use
/// their own manager over their own connection and rely on SQLite locking
/// for isolation.
pub struct TransactionManager {
    conn: Connection,
    default_timeout: Option<Duration>,
}

impl TransactionManager {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            default_timeout: None,
        }
    }

    /// Timeout applied to new transactions whose definition has none.
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub(crate) fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }

    /// Begins a unit of work, joining or nesting into `outer` according to
    /// `definition.propagation`.
    ///
    /// # Errors
    /// - `NoExistingTransaction` for `Mandatory` without `outer`.
    /// - `TransactionAlreadyActive` when a top-level begin finds an open
    ///   transaction on the connection.
    /// - `ForeignTransaction` when `outer` came from another manager.
    /// - `TimedOut` when joining an outer unit of work past its deadline.
    pub fn begin<'m>(
        &'m self,
        definition: &TransactionDefinition,
        outer: Option<&TransactionStatus<'m>>,
    ) -> TxResult<TransactionStatus<'m>> {
        if let Some(outer) = outer {
            if !std::ptr::eq(outer.conn, &self.conn) {
                return Err(TxError::ForeignTransaction);
            }
        }

        match (definition.propagation, outer) {
            (Propagation::Mandatory, None) => Err(TxError::NoExistingTransaction),
            (Propagation::Required | Propagation::Mandatory, Some(outer)) => {
                self.join(definition, outer)
            }
            (Propagation::Nested, Some(outer)) => self.open_savepoint(definition, outer),
            (Propagation::Required | Propagation::Nested, None) => self.begin_new(definition),
        }
    }

    /// Completes `status` successfully.
    ///
    /// For a new transaction this commits, unless the unit of work is
    /// rollback-only or past its deadline, in which case it rolls back and
    /// reports why (`UnexpectedRollback`, `TimedOut`). A status marked with
    /// [`TransactionStatus::set_rollback_only`] rolls back silently, even
    /// when a participant failed as well. Committing while a participant or
    /// savepoint is still pending rolls back with `PendingNestedWork`.
    pub fn commit(&self, status: TransactionStatus<'_>) -> TxResult<()> {
        let started_at = Instant::now();
        let result = self.complete(&status);
        let outcome = status.outcome();
        match &result {
            Ok(()) => info!(
                "event=tx_commit module=tx status=ok tx_id={} name={} scope={} outcome={} duration_ms={}",
                status.physical.id,
                status.name,
                status.scope.as_str(),
                outcome.as_str(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=tx_commit module=tx status=error tx_id={} name={} scope={} outcome={} error={}",
                status.physical.id,
                status.name,
                status.scope.as_str(),
                outcome.as_str(),
                err
            ),
        }
        result
    }

    /// Undoes every write made through `status`.
    ///
    /// Participants cannot end the physical transaction; they mark it
    /// rollback-only so the outer boundary rolls back.
    pub fn rollback(&self, status: TransactionStatus<'_>) -> TxResult<()> {
        let result = undo_scope(&status);
        status.finish(Outcome::RolledBack);
        match &result {
            Ok(()) => info!(
                "event=tx_rollback module=tx status=ok tx_id={} name={} scope={} elapsed_ms={}",
                status.physical.id,
                status.name,
                status.scope.as_str(),
                status.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=tx_rollback module=tx status=error tx_id={} name={} scope={} error={}",
                status.physical.id,
                status.name,
                status.scope.as_str(),
                err
            ),
        }
        result
    }

    fn begin_new<'m>(&'m self, definition: &TransactionDefinition) -> TxResult<TransactionStatus<'m>> {
        if !self.conn.is_autocommit() {
            return Err(TxError::TransactionAlreadyActive);
        }

        let begin_sql = if definition.read_only {
            "BEGIN DEFERRED;"
        } else {
            "BEGIN IMMEDIATE;"
        };
        if let Err(err) = self.conn.execute_batch(begin_sql) {
            let err = TxError::from(err);
            let error_code = match &err {
                TxError::Db(db_err) if db_err.is_busy() => "lock_wait_exhausted",
                _ => "begin_failed",
            };
            warn!(
                "event=tx_begin module=tx status=error name={} error_code={} error={}",
                definition.name.unwrap_or("unnamed"),
                error_code,
                err
            );
            return Err(err);
        }

        let physical = Rc::new(PhysicalTransaction {
            id: Uuid::new_v4(),
            started_at: Instant::now(),
            timeout: definition.timeout.or(self.default_timeout),
            rollback_only: Cell::new(false),
            savepoint_seq: Cell::new(0),
            open_children: Cell::new(0),
        });
        let name = definition.name.unwrap_or("unnamed");
        info!(
            "event=tx_begin module=tx status=ok tx_id={} name={} scope=new propagation={} read_only={} timeout_ms={}",
            physical.id,
            name,
            definition.propagation.as_str(),
            definition.read_only,
            physical
                .timeout
                .map_or_else(|| "none".to_string(), |t| t.as_millis().to_string())
        );

        Ok(TransactionStatus {
            conn: &self.conn,
            physical,
            scope: Scope::New,
            propagation: definition.propagation,
            name,
            local_rollback_only: Cell::new(false),
            outcome: Cell::new(Outcome::Pending),
        })
    }

    fn join<'m>(
        &'m self,
        definition: &TransactionDefinition,
        outer: &TransactionStatus<'m>,
    ) -> TxResult<TransactionStatus<'m>> {
        outer.physical.check_deadline()?;
        let name = definition.name.unwrap_or(outer.name);
        debug!(
            "event=tx_begin module=tx status=ok tx_id={} name={} scope=participating propagation={}",
            outer.physical.id,
            name,
            definition.propagation.as_str()
        );
        outer.physical.open_children.set(outer.physical.open_children.get() + 1);
        Ok(TransactionStatus {
            conn: outer.conn,
            physical: Rc::clone(&outer.physical),
            scope: Scope::Participating,
            propagation: definition.propagation,
            name,
            local_rollback_only: Cell::new(false),
            outcome: Cell::new(Outcome::Pending),
        })
    }

    fn open_savepoint<'m>(
        &'m self,
        definition: &TransactionDefinition,
        outer: &TransactionStatus<'m>,
    ) -> TxResult<TransactionStatus<'m>> {
        outer.physical.check_deadline()?;
        let seq = outer.physical.savepoint_seq.get() + 1;
        outer.physical.savepoint_seq.set(seq);
        let savepoint = format!("uow_sp_{seq}");
        outer.conn.execute_batch(&format!("SAVEPOINT {savepoint};"))?;

        let name = definition.name.unwrap_or(outer.name);
        debug!(
            "event=tx_begin module=tx status=ok tx_id={} name={} scope=savepoint savepoint={}",
            outer.physical.id, name, savepoint
        );
        outer.physical.open_children.set(outer.physical.open_children.get() + 1);
        Ok(TransactionStatus {
            conn: outer.conn,
            physical: Rc::clone(&outer.physical),
            scope: Scope::Savepoint {
                name: savepoint,
                rollback_only_at_open: outer.physical.rollback_only.get(),
            },
            propagation: definition.propagation,
            name,
            local_rollback_only: Cell::new(false),
            outcome: Cell::new(Outcome::Pending),
        })
    }

    fn complete(&self, status: &TransactionStatus<'_>) -> TxResult<()> {
        match &status.scope {
            Scope::Participating => {
                if status.local_rollback_only.get() {
                    status.physical.rollback_only.set(true);
                    status.finish(Outcome::RolledBack);
                } else {
                    status.finish(Outcome::Committed);
                }
                Ok(())
            }
            Scope::Savepoint {
                name: savepoint,
                rollback_only_at_open,
            } => {
                if status.local_rollback_only.get() {
                    let result = undo_scope(status);
                    status.finish(Outcome::RolledBack);
                    return result;
                }
                if status.physical.rollback_only.get() && !rollback_only_at_open {
                    // A participant inside the savepoint failed; contain it here.
                    let result = undo_scope(status);
                    status.finish(Outcome::RolledBack);
                    result?;
                    return Err(TxError::UnexpectedRollback);
                }
                let result = status
                    .conn
                    .execute_batch(&format!("RELEASE SAVEPOINT {savepoint};"))
                    .map_err(TxError::from);
                status.finish(if result.is_ok() {
                    Outcome::Committed
                } else {
                    Outcome::RolledBack
                });
                result
            }
            Scope::New => {
                let pending = status.physical.open_children.get();
                if pending > 0 {
                    let result = undo_scope(status);
                    status.finish(Outcome::RolledBack);
                    result?;
                    return Err(TxError::PendingNestedWork { pending });
                }
                if status.local_rollback_only.get() {
                    let result = undo_scope(status);
                    status.finish(Outcome::RolledBack);
                    return result;
                }
                if status.physical.rollback_only.get() {
                    let result = undo_scope(status);
                    status.finish(Outcome::RolledBack);
                    result?;
                    return Err(TxError::UnexpectedRollback);
                }
                if let Err(timeout) = status.physical.check_deadline() {
                    let result = undo_scope(status);
                    status.finish(Outcome::RolledBack);
                    result?;
                    return Err(timeout);
                }
                match status.conn.execute_batch("COMMIT;") {
                    Ok(()) => {
                        status.finish(Outcome::Committed);
                        Ok(())
                    }
                    Err(err) => {
                        // A failed COMMIT can leave the transaction open.
                        if let Err(undo_err) = undo_scope(status) {
                            warn!(
                                "event=tx_commit module=tx status=error tx_id={} error_code=rollback_after_commit_failed error={}",
                                status.physical.id, undo_err
                            );
                        }
                        status.finish(Outcome::RolledBack);
                        Err(err.into())
                    }
                }
            }
        }
    }
}

fn undo_scope(status: &TransactionStatus<'_>) -> TxResult<()> {
    match &status.scope {
        Scope::Participating => {
            status.physical.rollback_only.set(true);
            Ok(())
        }
        Scope::Savepoint {
            name: savepoint,
            rollback_only_at_open,
        } => {
            // The outer unit of work already ended and took the savepoint
            // with it.
            if status.conn.is_autocommit() {
                return Ok(());
            }
            status.conn.execute_batch(&format!(
                "ROLLBACK TO SAVEPOINT {savepoint}; RELEASE SAVEPOINT {savepoint};"
            ))?;
            status.physical.rollback_only.set(*rollback_only_at_open);
            Ok(())
        }
        Scope::New => {
            // SQLite may already have rolled back on its own (e.g. after an
            // interrupted statement).
            if status.conn.is_autocommit() {
                return Ok(());
            }
            status.conn.execute_batch("ROLLBACK;")?;
            Ok(())
        }
    }
}
