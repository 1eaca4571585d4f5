//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register catalog schema migrations in strictly increasing order.
//! - Apply pending migrations atomically.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.
//! - A database written by a newer binary is refused, never downgraded.

use crate::db::{DbError, DbResult};
use log::{debug, info, warn};
use rusqlite::Connection;
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("0001_init.sql"),
}];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations on the provided connection.
///
/// Emits one `db_migrate` event per applied version with its duration and a
/// closing event spanning the whole upgrade.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        warn!(
            "event=db_migrate module=db status=error error_code=schema_too_new from_version={} latest={}",
            current_version, latest
        );
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        debug!(
            "event=db_migrate module=db status=skip version={}",
            current_version
        );
        return Ok(());
    }

    let started_at = Instant::now();
    info!(
        "event=db_migrate module=db status=start from_version={} to_version={}",
        current_version, latest
    );
    let tx = conn.transaction()?;
    for migration in pending_migrations(current_version) {
        let step_started_at = Instant::now();
        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
        info!(
            "event=db_migrate module=db status=applied version={} duration_ms={}",
            migration.version,
            step_started_at.elapsed().as_millis()
        );
    }
    tx.commit()?;
    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={} duration_ms={}",
        current_version,
        latest,
        started_at.elapsed().as_millis()
    );

    Ok(())
}

fn pending_migrations(current_version: u32) -> impl Iterator<Item = &'static Migration> {
    MIGRATIONS
        .iter()
        .filter(move |migration| migration.version > current_version)
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
