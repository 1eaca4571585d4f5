//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `catalog_core` linkage.
//! - Run the rollback demonstrations once and print `key=value` outcomes.
//!
//! Usage: `catalog_cli [DB_PATH]`. Without a path the run uses an in-memory
//! database. Set `CATALOG_LOG_DIR` to an absolute directory to write rolling
//! log files there.

use catalog_core::db::open_configured_db;
use catalog_core::{
    init_logging_from_config, CatalogConfig, CategoryRepository, CategoryService,
    CategoryServiceError, SqliteCategoryRepository, TransactionManager,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("catalog_core ping={}", catalog_core::ping());
    println!("catalog_core version={}", catalog_core::core_version());

    let config = CatalogConfig {
        db_path: std::env::args_os().nth(1).map(Into::into),
        log_dir: std::env::var_os("CATALOG_LOG_DIR").map(Into::into),
        ..CatalogConfig::default()
    };
    if let Err(err) = init_logging_from_config(&config) {
        eprintln!("logging=error error={err}");
        return ExitCode::FAILURE;
    }
    let conn = match open_configured_db(&config) {
        Ok(conn) => conn,
        Err(err) => {
            eprintln!("db_open=error error={err}");
            return ExitCode::FAILURE;
        }
    };
    let manager = TransactionManager::new(conn).with_default_timeout(config.default_tx_timeout());
    let service = CategoryService::new(&manager);

    report("create", service.create());
    report("create_nested", service.create_nested());
    report("create_categories", service.create_categories());
    report("manual", service.manual());

    match SqliteCategoryRepository::new(&manager).count_by_name_like("Category %") {
        Ok(count) => {
            println!("remaining_categories={count}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("remaining_categories=error error={err}");
            ExitCode::FAILURE
        }
    }
}

fn report(name: &str, result: Result<(), CategoryServiceError>) {
    match result {
        Ok(()) => println!("{name}=committed"),
        Err(err) => println!("{name}=rolled_back error={err}"),
    }
}
