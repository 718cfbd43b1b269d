//! Paginated iteration over a query.
//!
//! ```ignore
//! let users = Query::table("user").on(db).where_eq("active", 1).collection().size(500);
//!
//! for batch in users.batches() {
//!     for row in batch? {
//!         // ...
//!     }
//! }
//!
//! // Or only page 3 with 20 rows per page:
//! let page = Query::table("user").on(db).collection().page(3, 20);
//! let total = page.total_count()?;
//! let rows: Vec<Row> = page.rows().collect::<OrmResult<_>>()?;
//! ```

use crate::error::OrmResult;
use crate::query::Query;
use crate::row::Row;
use std::cell::Cell;

/// Rows fetched per page unless [`Collection::size`] says otherwise.
pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// Pager over the rows matched by a [`Query`].
///
/// Pages are fetched lazily with `LIMIT offset, size`. Walking all pages stops at
/// the first short or empty page; single-page mode ([`Collection::page`]) stops after
/// the requested page.
#[derive(Debug, Clone)]
pub struct Collection {
    query: Query,
    size: u64,
    /// First page to fetch (1-based).
    start_page: u64,
    single_page: bool,
    total: Cell<Option<i64>>,
}

impl Collection {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            size: DEFAULT_PAGE_SIZE,
            start_page: 1,
            single_page: false,
            total: Cell::new(None),
        }
    }

    /// Rows per page (minimum 1).
    pub fn size(mut self, size: u64) -> Self {
        self.size = size.max(1);
        self
    }

    /// Fetch only page `page` (1-based) of `size` rows.
    pub fn page(mut self, page: u64, size: u64) -> Self {
        self.start_page = page.max(1);
        self.single_page = true;
        self.size(size)
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn page_size(&self) -> u64 {
        self.size
    }

    /// `COUNT(*)` over the query's conditions, computed once.
    pub fn total_count(&self) -> OrmResult<i64> {
        if let Some(total) = self.total.get() {
            return Ok(total);
        }
        let total = self.query.count("*")?;
        self.total.set(Some(total));
        Ok(total)
    }

    /// Number of pages for the current page size.
    pub fn total_pages(&self) -> OrmResult<u64> {
        let total = u64::try_from(self.total_count()?).unwrap_or(0);
        Ok(total.div_ceil(self.size))
    }

    pub(crate) fn page_query(&self, page: u64) -> Query {
        self.query.clone().limit_per_page(self.size, page)
    }

    /// Iterate page by page.
    pub fn batches(&self) -> Batches<'_> {
        Batches {
            collection: self,
            next_page: self.start_page,
            done: false,
        }
    }

    /// Iterate row by row, fetching a page at a time.
    pub fn rows(&self) -> Rows<'_> {
        Rows {
            batches: self.batches(),
            current: Vec::new().into_iter(),
        }
    }
}

/// Iterator over pages of a [`Collection`].
#[derive(Debug)]
pub struct Batches<'a> {
    collection: &'a Collection,
    next_page: u64,
    done: bool,
}

impl Iterator for Batches<'_> {
    type Item = OrmResult<Vec<Row>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let page = self.next_page;
        self.next_page += 1;

        match self.collection.page_query(page).find_all() {
            Ok(rows) if rows.is_empty() => {
                self.done = true;
                None
            }
            Ok(rows) => {
                if self.collection.single_page || (rows.len() as u64) < self.collection.size {
                    self.done = true;
                }
                Some(Ok(rows))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Iterator over the rows of a [`Collection`].
#[derive(Debug)]
pub struct Rows<'a> {
    batches: Batches<'a>,
    current: std::vec::IntoIter<Row>,
}

impl Iterator for Rows<'_> {
    type Item = OrmResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.current.next() {
                return Some(Ok(row));
            }
            match self.batches.next()? {
                Ok(rows) => self.current = rows.into_iter(),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
