//! Sorting, paging and slicing for product queries.
//!
//! # Invariants
//! - Sort keys are an enum, so no caller text ever reaches `ORDER BY`.
//! - Page numbers are zero-based; `size` must be at least 1.

use super::{RepoError, RepoResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Product columns that may be sorted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductSortField {
    Id,
    Name,
    Price,
}

impl ProductSortField {
    fn column(self) -> &'static str {
        match self {
            Self::Id => "p.id",
            Self::Name => "p.name",
            Self::Price => "p.price",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub field: ProductSortField,
    pub direction: Direction,
}

/// Ordered list of sort keys. Empty means "by id ascending".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sort {
    orders: Vec<Order>,
}

impl Sort {
    pub fn unsorted() -> Self {
        Self::default()
    }

    pub fn by(field: ProductSortField, direction: Direction) -> Self {
        Self::unsorted().and(field, direction)
    }

    pub fn asc(field: ProductSortField) -> Self {
        Self::by(field, Direction::Asc)
    }

    pub fn desc(field: ProductSortField) -> Self {
        Self::by(field, Direction::Desc)
    }

    pub fn and(mut self, field: ProductSortField, direction: Direction) -> Self {
        self.orders.push(Order { field, direction });
        self
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub(crate) fn to_order_by(&self) -> String {
        if self.orders.is_empty() {
            return " ORDER BY p.id ASC".to_string();
        }
        let keys = self
            .orders
            .iter()
            .map(|order| {
                let direction = match order.direction {
                    Direction::Asc => "ASC",
                    Direction::Desc => "DESC",
                };
                format!("{} {direction}", order.field.column())
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!(" ORDER BY {keys}")
    }
}

/// Zero-based page coordinates plus sort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
    pub sort: Sort,
}

impl PageRequest {
    pub fn of(page: u32, size: u32) -> Self {
        Self {
            page,
            size,
            sort: Sort::unsorted(),
        }
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    /// Request for the following page with the same size and sort.
    pub fn next(&self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            size: self.size,
            sort: self.sort.clone(),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.size)
    }

    pub(crate) fn validate(&self) -> RepoResult<()> {
        if self.size == 0 {
            return Err(RepoError::InvalidPageRequest(
                "page size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// One page of results plus the total across all pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub number: u32,
    pub size: u32,
    pub total_elements: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            return 0;
        }
        self.total_elements.div_ceil(u64::from(self.size))
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.number) + 1 < self.total_pages()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// One window of results that only knows whether more rows follow.
///
/// Cheaper than [`Page`]: no count query is issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice<T> {
    pub content: Vec<T>,
    pub request: PageRequest,
    pub has_next: bool,
}

impl<T> Slice<T> {
    /// Request for the next slice, or `None` on the last one.
    pub fn next_request(&self) -> Option<PageRequest> {
        self.has_next.then(|| self.request.next())
    }
}
