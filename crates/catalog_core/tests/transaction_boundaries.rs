use catalog_core::db::open_db_in_memory;
use catalog_core::{
    Category, CategoryRepository, CategoryService, CategoryServiceError, Product,
    ProductRepository, RepoError, SqliteCategoryRepository, SqliteProductRepository,
    TransactionCoordinator, TransactionManager, TxError,
};
use std::time::Duration;

fn manager() -> TransactionManager {
    TransactionManager::new(open_db_in_memory().unwrap())
}

fn count(manager: &TransactionManager, pattern: &str) -> u64 {
    SqliteCategoryRepository::new(manager)
        .count_by_name_like(pattern)
        .unwrap()
}

#[test]
fn declarative_failure_rolls_back_all_five_categories() {
    let manager = manager();
    let service = CategoryService::new(&manager);

    let err = service.create().unwrap_err();

    assert!(
        matches!(&err, CategoryServiceError::Rejected(message) if message == "Ups rollback please")
    );
    assert_eq!(count(&manager, "Category %"), 0);
}

#[test]
fn nested_call_joins_outer_unit_of_work_and_rolls_back_outer_write() {
    let manager = manager();
    let service = CategoryService::new(&manager);

    let err = service.create_nested().unwrap_err();

    assert!(matches!(err, CategoryServiceError::Rejected(_)));
    assert_eq!(count(&manager, "Category Outer"), 0);
    assert_eq!(count(&manager, "Category %"), 0);
}

#[test]
fn programmatic_failure_rolls_back_and_keeps_error() {
    let manager = manager();
    let service = CategoryService::new(&manager);

    let err = service.create_categories().unwrap_err();

    assert!(matches!(&err, CategoryServiceError::Rejected(message) if message == "Ups"));
    assert_eq!(count(&manager, "Category %"), 0);
}

#[test]
fn manual_failure_rolls_back_with_work_error_not_timeout() {
    let manager = manager();
    let service = CategoryService::new(&manager);

    let err = service.manual().unwrap_err();

    assert!(matches!(err, CategoryServiceError::Rejected(_)));
    assert_eq!(count(&manager, "Category Manual %"), 0);
}

#[test]
fn successful_programmatic_work_commits_every_write_in_order() {
    let manager = manager();
    let service = CategoryService::new(&manager);

    let saved = service
        .create_all(&["Category A", "Category B", "Category C"])
        .unwrap();
    assert_eq!(saved.len(), 3);

    let stored = SqliteCategoryRepository::new(&manager)
        .find_all_by_name_like("Category %")
        .unwrap();
    let names: Vec<_> = stored.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Category A", "Category B", "Category C"]);
    assert!(stored[0].id < stored[1].id && stored[1].id < stored[2].id);
}

#[test]
fn all_strategies_commit_on_success() {
    let manager = manager();
    let coordinator = TransactionCoordinator::new(&manager);

    coordinator
        .run_programmatic(None, |status| {
            SqliteCategoryRepository::new(status).save(&Category::new("programmatic"))?;
            Ok::<_, RepoError>(())
        })
        .unwrap();
    coordinator
        .run_manual(None, Duration::from_secs(10), |status| {
            SqliteCategoryRepository::new(status).save(&Category::new("manual"))?;
            Ok::<_, RepoError>(())
        })
        .unwrap();

    let repo = SqliteCategoryRepository::new(&manager);
    assert!(repo.find_first_by_name_equals("programmatic").unwrap().is_some());
    assert!(repo.find_first_by_name_equals("manual").unwrap().is_some());
}

#[test]
fn integrity_violation_rolls_back_earlier_writes() {
    let manager = manager();
    let coordinator = TransactionCoordinator::new(&manager);

    let err = coordinator
        .run_programmatic(None, |status| {
            let category = SqliteCategoryRepository::new(status).save(&Category::new("kept?"))?;
            let products = SqliteProductRepository::new(status);
            products.save(&Product::new("ok", 1, category.id.unwrap_or_default()))?;
            products.save(&Product::new("orphan", 1, 987_654))?;
            Ok::<_, RepoError>(())
        })
        .unwrap_err();

    assert!(err.is_integrity_violation(), "unexpected error: {err}");
    assert_eq!(count(&manager, "kept?"), 0);
    assert!(!SqliteProductRepository::new(&manager)
        .exists_by_name("ok")
        .unwrap());
}

#[test]
fn manual_commit_after_deadline_rolls_back_with_timeout() {
    let manager = manager();
    let coordinator = TransactionCoordinator::new(&manager);

    let err = coordinator
        .run_manual(None, Duration::from_millis(50), |status| {
            SqliteCategoryRepository::new(status).save(&Category::new("slow"))?;
            std::thread::sleep(Duration::from_millis(150));
            Ok::<_, RepoError>(())
        })
        .unwrap_err();

    assert!(matches!(err, RepoError::Transaction(TxError::TimedOut { .. })));
    assert_eq!(count(&manager, "slow"), 0);
}

#[test]
fn statements_after_deadline_are_refused_and_surface_as_timeout() {
    let manager = manager();
    let coordinator = TransactionCoordinator::new(&manager);

    let err = coordinator
        .run_manual(None, Duration::from_millis(50), |status| {
            let repo = SqliteCategoryRepository::new(status);
            repo.save(&Category::new("before"))?;
            std::thread::sleep(Duration::from_millis(150));
            repo.save(&Category::new("after"))?;
            Ok::<_, CategoryServiceError>(())
        })
        .unwrap_err();

    assert!(matches!(
        err,
        CategoryServiceError::Transaction(TxError::TimedOut { .. })
    ));
    assert_eq!(count(&manager, "before"), 0);
    assert_eq!(count(&manager, "after"), 0);
}

#[test]
fn panicking_work_is_rolled_back_when_the_status_drops() {
    let manager = manager();
    let coordinator = TransactionCoordinator::new(&manager);

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _: Result<(), RepoError> = coordinator.run_programmatic(None, |status| {
            SqliteCategoryRepository::new(status).save(&Category::new("panicked"))?;
            panic!("work blew up");
        });
    }));

    assert!(result.is_err());
    assert_eq!(count(&manager, "panicked"), 0);
}
