use catalog_core::db::open_db_in_memory;
use catalog_core::{
    Category, CategoryExample, CategoryRepository, ExampleMatcher, ModelValidationError,
    RepoError, SqliteCategoryRepository,
};

#[test]
fn insert_assigns_identity_and_audit_timestamps() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCategoryRepository::new(&conn);

    let saved = repo.save(&Category::new("GADGET")).unwrap();

    assert!(saved.id.is_some());
    assert!(saved.created_date.is_some());
    assert_eq!(saved.created_date, saved.last_modified_date);
}

#[test]
fn update_keeps_identity_and_never_moves_last_modified_backwards() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCategoryRepository::new(&conn);
    let saved = repo.save(&Category::new("GADGET")).unwrap();
    let id = saved.id.unwrap();

    // Pretend the row was last touched far in the future.
    conn.execute(
        "UPDATE categories SET last_modified_date = 9999999999999 WHERE id = ?1;",
        [id],
    )
    .unwrap();

    let mut renamed = saved.clone();
    renamed.name = "GADGET MURAH".to_string();
    let updated = repo.save(&renamed).unwrap();

    assert_eq!(updated.id, Some(id));
    assert_eq!(updated.name, "GADGET MURAH");
    assert_eq!(updated.created_date, saved.created_date);
    assert_eq!(updated.last_modified_date, Some(9_999_999_999_999));

    let loaded = repo.find_by_id(id).unwrap().unwrap();
    assert_eq!(loaded.name, "GADGET MURAH");
}

#[test]
fn save_with_unknown_id_returns_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCategoryRepository::new(&conn);

    let mut ghost = Category::new("ghost");
    ghost.id = Some(404);
    let err = repo.save(&ghost).unwrap_err();
    assert!(matches!(err, RepoError::CategoryNotFound(404)));
}

#[test]
fn blank_name_is_rejected_before_sql() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCategoryRepository::new(&conn);

    let err = repo.save(&Category::new("  ")).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ModelValidationError::BlankCategoryName)
    ));
    assert_eq!(repo.count_by_name_like("%").unwrap(), 0);
}

#[test]
fn derived_name_finders() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCategoryRepository::new(&conn);
    repo.save(&Category::new("GADGET MURAH")).unwrap();
    repo.save(&Category::new("FASHION")).unwrap();

    let found = repo.find_first_by_name_equals("GADGET MURAH").unwrap().unwrap();
    assert_eq!(found.name, "GADGET MURAH");
    assert!(repo.find_first_by_name_equals("gadget murah").unwrap().is_none());

    let like = repo.find_all_by_name_like("%GADGET%").unwrap();
    assert_eq!(like.len(), 1);
    assert_eq!(like[0].name, "GADGET MURAH");
}

#[test]
fn query_by_example_ignores_unset_fields_and_can_ignore_case() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCategoryRepository::new(&conn);
    let saved = repo.save(&Category::new("GADGET MURAH")).unwrap();
    repo.save(&Category::new("FASHION")).unwrap();

    let by_id_and_name = CategoryExample {
        id: saved.id,
        name: Some("GADGET MURAH".to_string()),
    };
    let found = repo
        .find_all_by_example(&by_id_and_name, ExampleMatcher::matching())
        .unwrap();
    assert_eq!(found.len(), 1);

    let lower = CategoryExample {
        id: None,
        name: Some("gadget murah".to_string()),
    };
    assert!(repo
        .find_all_by_example(&lower, ExampleMatcher::matching())
        .unwrap()
        .is_empty());
    let found = repo
        .find_all_by_example(&lower, ExampleMatcher::matching().with_ignore_case())
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, saved.id);

    let everything = repo
        .find_all_by_example(&CategoryExample::default(), ExampleMatcher::matching())
        .unwrap();
    assert_eq!(everything.len(), 2);
}

#[test]
fn delete_by_name_reports_affected_rows_and_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCategoryRepository::new(&conn);
    repo.save(&Category::new("TEMP")).unwrap();

    assert_eq!(repo.delete_by_name("TEMP").unwrap(), 1);
    assert_eq!(repo.delete_by_name("TEMP").unwrap(), 0);
}

#[test]
fn single_row_lookups_return_none_when_absent() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCategoryRepository::new(&conn);
    let saved = repo.save(&Category::new("GADGET")).unwrap();

    assert_eq!(repo.find_by_id(saved.id.unwrap()).unwrap(), Some(saved));
    assert_eq!(repo.find_by_id(9_999).unwrap(), None);
    assert_eq!(repo.find_first_by_name_equals("missing").unwrap(), None);
}

#[test]
fn single_row_lookup_rejects_corrupt_row() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO categories (id, name, created_date, last_modified_date) VALUES (7, '  ', 0, 0);",
        [],
    )
    .unwrap();

    let err = SqliteCategoryRepository::new(&conn).find_by_id(7).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}
