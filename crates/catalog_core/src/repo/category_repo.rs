//! Category repository contract and SQLite implementation.
//!
//! # Invariants
//! - `save` assigns identity on first persist and never changes it.
//! - `created_date` is written once; `last_modified_date` never decreases.

use super::{RepoError, RepoResult};
use crate::model::category::{Category, CategoryExample, CategoryId, ExampleMatcher};
use crate::model::now_epoch_ms;
use crate::tx::Executor;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

const CATEGORY_SELECT_SQL: &str = "SELECT
    id,
    name,
    created_date,
    last_modified_date
FROM categories";

/// Repository interface for category persistence.
pub trait CategoryRepository {
    /// Inserts a new category or updates an existing one and returns the
    /// stored record.
    fn save(&self, category: &Category) -> RepoResult<Category>;
    fn find_by_id(&self, id: CategoryId) -> RepoResult<Option<Category>>;
    /// Exact, case-sensitive name match; lowest id wins.
    fn find_first_by_name_equals(&self, name: &str) -> RepoResult<Option<Category>>;
    /// SQL `LIKE` pattern match ordered by id.
    fn find_all_by_name_like(&self, pattern: &str) -> RepoResult<Vec<Category>>;
    /// Query by example: every set field of `example` must match.
    fn find_all_by_example(
        &self,
        example: &CategoryExample,
        matcher: ExampleMatcher,
    ) -> RepoResult<Vec<Category>>;
    fn count_by_name_like(&self, pattern: &str) -> RepoResult<u64>;
    /// Returns the number of deleted rows.
    fn delete_by_name(&self, name: &str) -> RepoResult<usize>;
}

/// SQLite-backed category repository.
pub struct SqliteCategoryRepository<'e> {
    exec: &'e dyn Executor,
}

impl<'e> SqliteCategoryRepository<'e> {
    pub fn new(exec: &'e dyn Executor) -> Self {
        Self { exec }
    }

    fn insert(&self, category: &Category) -> RepoResult<Category> {
        let conn = self.exec.connection()?;
        let now = now_epoch_ms();
        conn.execute(
            "INSERT INTO categories (name, created_date, last_modified_date)
             VALUES (?1, ?2, ?2);",
            params![category.name.as_str(), now],
        )?;

        Ok(Category {
            id: Some(conn.last_insert_rowid()),
            name: category.name.clone(),
            created_date: Some(now),
            last_modified_date: Some(now),
        })
    }

    fn update(&self, id: CategoryId, category: &Category) -> RepoResult<Category> {
        let conn = self.exec.connection()?;
        let changed = conn.execute(
            "UPDATE categories
             SET
                name = ?1,
                last_modified_date = MAX(last_modified_date, ?2)
             WHERE id = ?3;",
            params![category.name.as_str(), now_epoch_ms(), id],
        )?;
        if changed == 0 {
            return Err(RepoError::CategoryNotFound(id));
        }

        self.find_by_id(id)?.ok_or_else(|| {
            RepoError::InvalidData(format!("category {id} vanished after update"))
        })
    }

    fn query_all(&self, sql: &str, binds: Vec<Value>) -> RepoResult<Vec<Category>> {
        let conn = self.exec.connection()?;
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut categories = Vec::new();
        while let Some(row) = rows.next()? {
            categories.push(parse_category_row(row)?);
        }
        Ok(categories)
    }
}

impl CategoryRepository for SqliteCategoryRepository<'_> {
    fn save(&self, category: &Category) -> RepoResult<Category> {
        category.validate()?;
        match category.id {
            Some(id) => self.update(id, category),
            None => self.insert(category),
        }
    }

    fn find_by_id(&self, id: CategoryId) -> RepoResult<Option<Category>> {
        self.exec
            .connection()?
            .query_row(
                &format!("{CATEGORY_SELECT_SQL} WHERE id = ?1;"),
                [id],
                |row| Ok(parse_category_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn find_first_by_name_equals(&self, name: &str) -> RepoResult<Option<Category>> {
        self.exec
            .connection()?
            .query_row(
                &format!("{CATEGORY_SELECT_SQL} WHERE name = ?1 ORDER BY id ASC LIMIT 1;"),
                [name],
                |row| Ok(parse_category_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn find_all_by_name_like(&self, pattern: &str) -> RepoResult<Vec<Category>> {
        self.query_all(
            &format!("{CATEGORY_SELECT_SQL} WHERE name LIKE ?1 ORDER BY id ASC;"),
            vec![Value::Text(pattern.to_string())],
        )
    }

    fn find_all_by_example(
        &self,
        example: &CategoryExample,
        matcher: ExampleMatcher,
    ) -> RepoResult<Vec<Category>> {
        let mut sql = format!("{CATEGORY_SELECT_SQL} WHERE 1 = 1");
        let mut binds = Vec::new();

        if let Some(id) = example.id {
            sql.push_str(" AND id = ?");
            binds.push(Value::Integer(id));
        }
        if let Some(name) = example.name.as_ref() {
            if matcher.ignore_case {
                sql.push_str(" AND name = ? COLLATE NOCASE");
            } else {
                sql.push_str(" AND name = ?");
            }
            binds.push(Value::Text(name.clone()));
        }
        sql.push_str(" ORDER BY id ASC;");

        self.query_all(&sql, binds)
    }

    fn count_by_name_like(&self, pattern: &str) -> RepoResult<u64> {
        let conn = self.exec.connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM categories WHERE name LIKE ?1;",
            [pattern],
            |row| row.get(0),
        )?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative category count {count}")))
    }

    fn delete_by_name(&self, name: &str) -> RepoResult<usize> {
        let conn = self.exec.connection()?;
        let deleted = conn.execute("DELETE FROM categories WHERE name = ?1;", [name])?;
        Ok(deleted)
    }
}

fn parse_category_row(row: &Row<'_>) -> RepoResult<Category> {
    let category = Category {
        id: Some(row.get("id")?),
        name: row.get("name")?,
        created_date: Some(row.get("created_date")?),
        last_modified_date: Some(row.get("last_modified_date")?),
    };
    category.validate().map_err(|err| {
        RepoError::InvalidData(format!(
            "category {} failed validation: {err}",
            category.id.unwrap_or_default()
        ))
    })?;
    Ok(category)
}
