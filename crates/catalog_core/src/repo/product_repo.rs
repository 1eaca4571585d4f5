//! Product repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD, derived finders, paging, slicing, projections and
//!   specification queries over `products`.
//! - Provide the locking read used by read-modify-write units of work.
//!
//! # Invariants
//! - Category-name finders join `categories` and never return orphans.
//! - Default ordering is `p.id ASC` so pages are stable.
//! - `find_first_by_id_for_update` is refused outside a unit of work.

use super::paging::{Page, PageRequest, Slice, Sort};
use super::product_spec::ProductSpec;
use super::{RepoError, RepoResult};
use crate::model::category::CategoryId;
use crate::model::product::{Product, ProductId, ProductProjection};
use crate::tx::Executor;
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

const PRODUCT_SELECT_SQL: &str = "SELECT
    p.id AS id,
    p.name AS name,
    p.price AS price,
    p.category_id AS category_id
FROM products p
INNER JOIN categories c ON c.id = p.category_id";

/// Repository interface for product persistence and queries.
pub trait ProductRepository {
    fn save(&self, product: &Product) -> RepoResult<Product>;
    fn find_by_id(&self, id: ProductId) -> RepoResult<Option<Product>>;
    fn find_all_by_category_name(&self, name: &str, sort: &Sort) -> RepoResult<Vec<Product>>;
    fn find_page_by_category_name(
        &self,
        name: &str,
        request: &PageRequest,
    ) -> RepoResult<Page<Product>>;
    fn count_by_category_name(&self, name: &str) -> RepoResult<u64>;
    fn exists_by_name(&self, name: &str) -> RepoResult<bool>;
    /// Returns the number of deleted rows.
    fn delete_by_name(&self, name: &str) -> RepoResult<usize>;
    /// Exact product-name lookup, optionally windowed by `request`.
    fn search_product_using_name(
        &self,
        name: &str,
        request: Option<&PageRequest>,
    ) -> RepoResult<Vec<Product>>;
    /// Products whose own name or category name matches `pattern`.
    fn search_product(&self, pattern: &str, request: &PageRequest) -> RepoResult<Page<Product>>;
    /// Returns the number of updated rows (0 or 1).
    fn update_price_to_zero(&self, id: ProductId) -> RepoResult<usize>;
    /// Visits products of one category in id order without collecting them.
    fn for_each_by_category<F>(&self, category_id: CategoryId, visit: F) -> RepoResult<usize>
    where
        F: FnMut(Product);
    fn find_slice_by_category(
        &self,
        category_id: CategoryId,
        request: &PageRequest,
    ) -> RepoResult<Slice<Product>>;
    /// Reads one product while holding the write lock of the unit of work.
    fn find_first_by_id_for_update(&self, id: ProductId) -> RepoResult<Option<Product>>;
    fn find_all_matching(&self, spec: &ProductSpec) -> RepoResult<Vec<Product>>;
    fn find_all_by_name_like_as<P: ProductProjection>(&self, pattern: &str) -> RepoResult<Vec<P>>;
}

/// SQLite-backed product repository.
pub struct SqliteProductRepository<'e> {
    exec: &'e dyn Executor,
}

impl<'e> SqliteProductRepository<'e> {
    pub fn new(exec: &'e dyn Executor) -> Self {
        Self { exec }
    }

    fn insert(&self, product: &Product) -> RepoResult<Product> {
        let conn = self.exec.connection()?;
        conn.execute(
            "INSERT INTO products (name, price, category_id) VALUES (?1, ?2, ?3);",
            params![product.name.as_str(), product.price, product.category_id],
        )?;
        Ok(Product {
            id: Some(conn.last_insert_rowid()),
            ..product.clone()
        })
    }

    fn update(&self, id: ProductId, product: &Product) -> RepoResult<Product> {
        let conn = self.exec.connection()?;
        let changed = conn.execute(
            "UPDATE products
             SET
                name = ?1,
                price = ?2,
                category_id = ?3
             WHERE id = ?4;",
            params![product.name.as_str(), product.price, product.category_id, id],
        )?;
        if changed == 0 {
            return Err(RepoError::ProductNotFound(id));
        }
        Ok(product.clone())
    }

    fn query_products(&self, sql: &str, binds: Vec<Value>) -> RepoResult<Vec<Product>> {
        let conn = self.exec.connection()?;
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut products = Vec::new();
        while let Some(row) = rows.next()? {
            products.push(parse_product_row(row)?);
        }
        Ok(products)
    }

    fn count(&self, sql: &str, binds: Vec<Value>) -> RepoResult<u64> {
        let conn = self.exec.connection()?;
        let count: i64 = conn.query_row(sql, params_from_iter(binds), |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative product count {count}")))
    }
}

impl ProductRepository for SqliteProductRepository<'_> {
    fn save(&self, product: &Product) -> RepoResult<Product> {
        product.validate()?;
        match product.id {
            Some(id) => self.update(id, product),
            None => self.insert(product),
        }
    }

    fn find_by_id(&self, id: ProductId) -> RepoResult<Option<Product>> {
        self.exec
            .connection()?
            .query_row(
                &format!("{PRODUCT_SELECT_SQL} WHERE p.id = ?1;"),
                [id],
                |row| Ok(parse_product_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn find_all_by_category_name(&self, name: &str, sort: &Sort) -> RepoResult<Vec<Product>> {
        let sql = format!(
            "{PRODUCT_SELECT_SQL} WHERE c.name = ?{};",
            sort.to_order_by()
        );
        self.query_products(&sql, vec![Value::Text(name.to_string())])
    }

    fn find_page_by_category_name(
        &self,
        name: &str,
        request: &PageRequest,
    ) -> RepoResult<Page<Product>> {
        request.validate()?;
        let total_elements = self.count_by_category_name(name)?;
        let sql = format!(
            "{PRODUCT_SELECT_SQL} WHERE c.name = ?{} LIMIT ? OFFSET ?;",
            request.sort.to_order_by()
        );
        let content = self.query_products(
            &sql,
            vec![
                Value::Text(name.to_string()),
                Value::Integer(i64::from(request.size)),
                Value::Integer(request.offset()),
            ],
        )?;
        Ok(Page {
            content,
            number: request.page,
            size: request.size,
            total_elements,
        })
    }

    fn count_by_category_name(&self, name: &str) -> RepoResult<u64> {
        self.count(
            "SELECT COUNT(*)
             FROM products p
             INNER JOIN categories c ON c.id = p.category_id
             WHERE c.name = ?1;",
            vec![Value::Text(name.to_string())],
        )
    }

    fn exists_by_name(&self, name: &str) -> RepoResult<bool> {
        let conn = self.exec.connection()?;
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM products WHERE name = ?1);",
            [name],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn delete_by_name(&self, name: &str) -> RepoResult<usize> {
        let conn = self.exec.connection()?;
        let deleted = conn.execute("DELETE FROM products WHERE name = ?1;", [name])?;
        debug!(
            "event=product_delete module=repo status=ok rows={}",
            deleted
        );
        Ok(deleted)
    }

    fn search_product_using_name(
        &self,
        name: &str,
        request: Option<&PageRequest>,
    ) -> RepoResult<Vec<Product>> {
        let mut binds = vec![Value::Text(name.to_string())];
        let sql = match request {
            Some(request) => {
                request.validate()?;
                binds.push(Value::Integer(i64::from(request.size)));
                binds.push(Value::Integer(request.offset()));
                format!(
                    "{PRODUCT_SELECT_SQL} WHERE p.name = ?{} LIMIT ? OFFSET ?;",
                    request.sort.to_order_by()
                )
            }
            None => format!("{PRODUCT_SELECT_SQL} WHERE p.name = ? ORDER BY p.id ASC;"),
        };
        self.query_products(&sql, binds)
    }

    fn search_product(&self, pattern: &str, request: &PageRequest) -> RepoResult<Page<Product>> {
        request.validate()?;
        let total_elements = self.count(
            "SELECT COUNT(*)
             FROM products p
             INNER JOIN categories c ON c.id = p.category_id
             WHERE p.name LIKE ?1 OR c.name LIKE ?1;",
            vec![Value::Text(pattern.to_string())],
        )?;
        let sql = format!(
            "{PRODUCT_SELECT_SQL} WHERE p.name LIKE ?1 OR c.name LIKE ?1{} LIMIT ?2 OFFSET ?3;",
            request.sort.to_order_by()
        );
        let content = self.query_products(
            &sql,
            vec![
                Value::Text(pattern.to_string()),
                Value::Integer(i64::from(request.size)),
                Value::Integer(request.offset()),
            ],
        )?;
        Ok(Page {
            content,
            number: request.page,
            size: request.size,
            total_elements,
        })
    }

    fn update_price_to_zero(&self, id: ProductId) -> RepoResult<usize> {
        let conn = self.exec.connection()?;
        let changed = conn.execute("UPDATE products SET price = 0 WHERE id = ?1;", [id])?;
        Ok(changed)
    }

    fn for_each_by_category<F>(&self, category_id: CategoryId, mut visit: F) -> RepoResult<usize>
    where
        F: FnMut(Product),
    {
        let conn = self.exec.connection()?;
        let mut stmt = conn.prepare(&format!(
            "{PRODUCT_SELECT_SQL} WHERE p.category_id = ?1 ORDER BY p.id ASC;"
        ))?;
        let mut rows = stmt.query([category_id])?;
        let mut visited = 0;
        while let Some(row) = rows.next()? {
            visit(parse_product_row(row)?);
            visited += 1;
        }
        Ok(visited)
    }

    fn find_slice_by_category(
        &self,
        category_id: CategoryId,
        request: &PageRequest,
    ) -> RepoResult<Slice<Product>> {
        request.validate()?;
        // One extra row tells whether another slice follows.
        let sql = format!(
            "{PRODUCT_SELECT_SQL} WHERE p.category_id = ?{} LIMIT ? OFFSET ?;",
            request.sort.to_order_by()
        );
        let mut content = self.query_products(
            &sql,
            vec![
                Value::Integer(category_id),
                Value::Integer(i64::from(request.size) + 1),
                Value::Integer(request.offset()),
            ],
        )?;
        let size = request.size as usize;
        let has_next = content.len() > size;
        content.truncate(size);
        Ok(Slice {
            content,
            request: request.clone(),
            has_next,
        })
    }

    fn find_first_by_id_for_update(&self, id: ProductId) -> RepoResult<Option<Product>> {
        if !self.exec.in_transaction() {
            return Err(RepoError::TransactionRequired("find_first_by_id_for_update"));
        }
        let conn = self.exec.connection()?;
        // Claims the write lock when the unit of work began deferred; a no-op
        // for units of work that already hold it.
        conn.execute("UPDATE products SET price = price WHERE id = ?1;", [id])?;
        self.find_by_id(id)
    }

    fn find_all_matching(&self, spec: &ProductSpec) -> RepoResult<Vec<Product>> {
        let mut binds = Vec::new();
        let predicate = spec.to_sql(&mut binds);
        let sql = format!("{PRODUCT_SELECT_SQL} WHERE {predicate} ORDER BY p.id ASC;");
        self.query_products(&sql, binds)
    }

    fn find_all_by_name_like_as<P: ProductProjection>(&self, pattern: &str) -> RepoResult<Vec<P>> {
        let conn = self.exec.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM products WHERE name LIKE ?1 ORDER BY id ASC;",
            P::COLUMNS
        ))?;
        let mut rows = stmt.query([pattern])?;
        let mut projected = Vec::new();
        while let Some(row) = rows.next()? {
            projected.push(P::from_row(row)?);
        }
        Ok(projected)
    }
}

fn parse_product_row(row: &Row<'_>) -> RepoResult<Product> {
    let product = Product {
        id: Some(row.get("id")?),
        name: row.get("name")?,
        price: row.get("price")?,
        category_id: row.get("category_id")?,
    };
    product.validate().map_err(|err| {
        RepoError::InvalidData(format!(
            "product {} failed validation: {err}",
            product.id.unwrap_or_default()
        ))
    })?;
    Ok(product)
}
