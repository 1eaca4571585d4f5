use catalog_core::db::migrations::latest_version;
use catalog_core::db::{open_configured_db, open_db, open_db_in_memory, DbError};
use catalog_core::CatalogConfig;
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "categories");
    assert_table_exists(&conn, "products");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "products");
}

#[test]
fn file_databases_use_wal_and_enforce_foreign_keys() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_db(dir.path().join("catalog.db")).unwrap();

    let journal_mode: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(journal_mode.to_lowercase(), "wal");

    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(foreign_keys, 1);
}

#[test]
fn configured_db_opens_file_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("configured.db");
    let config = CatalogConfig {
        db_path: Some(path.clone()),
        ..CatalogConfig::default()
    };

    let conn = open_configured_db(&config).unwrap();
    assert_table_exists(&conn, "categories");
    assert!(path.exists());
}

#[test]
fn config_deserializes_with_defaults_for_missing_fields() {
    let config: CatalogConfig =
        serde_json::from_str(r#"{"busy_timeout_ms": 250, "default_tx_timeout_secs": 10}"#)
            .unwrap();
    assert_eq!(config.busy_timeout_ms, 250);
    assert_eq!(config.default_tx_timeout_secs, Some(10));
    assert!(config.db_path.is_none());
    assert!(config.log_dir.is_none());
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
