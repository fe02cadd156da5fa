//! Offset pagination over a base statement.

use serde::Serialize;

use crate::error::{DataError, DataResult};
use crate::row::ResultRow;
use crate::scope::{ScopeConnection, TransactionScope};
use crate::tenant::TenantId;

use super::SqlParam;

/// One page of results plus the total match count.
#[derive(Debug, Clone, Serialize)]
pub struct PagedResult<T> {
    /// The items on this page.
    pub items: Vec<T>,
    /// Total number of rows the base statement matches.
    pub total_count: u64,
    /// The requested page (1-based).
    pub page: u32,
    /// The requested page size.
    pub page_size: u32,
}

impl<T> PagedResult<T> {
    /// Total number of pages at this page size.
    pub fn total_pages(&self) -> u32 {
        if self.total_count == 0 {
            0
        } else {
            self.total_count.div_ceil(u64::from(self.page_size)) as u32
        }
    }

    /// Whether a later page exists.
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Maps the items to a different type.
    pub fn map<U, F>(self, f: F) -> PagedResult<U>
    where
        F: FnMut(T) -> U,
    {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

impl TransactionScope {
    /// Runs a base statement paged: a `COUNT(*)` wrapper for the total and
    /// a `LIMIT`/`OFFSET` query for the page, both under this scope.
    ///
    /// Pages are 1-based. The base statement must use anonymous `?`
    /// placeholders, since the limit and offset are appended as two more.
    pub async fn query_paged<T, F>(
        &self,
        sql: &str,
        params: &[SqlParam],
        page: u32,
        page_size: u32,
        mapper: F,
    ) -> DataResult<PagedResult<T>>
    where
        F: FnMut(&ResultRow) -> DataResult<T>,
    {
        let sc = self.sole_connection()?;
        self.run_paged(sc, sql, params, page, page_size, mapper)
    }

    /// Paged query against a named participant of a joint scope.
    pub async fn query_paged_on<T, F>(
        &self,
        tenant: &TenantId,
        sql: &str,
        params: &[SqlParam],
        page: u32,
        page_size: u32,
        mapper: F,
    ) -> DataResult<PagedResult<T>>
    where
        F: FnMut(&ResultRow) -> DataResult<T>,
    {
        let sc = self.connection_for(tenant)?;
        self.run_paged(sc, sql, params, page, page_size, mapper)
    }

    fn run_paged<T, F>(
        &self,
        sc: &ScopeConnection,
        sql: &str,
        params: &[SqlParam],
        page: u32,
        page_size: u32,
        mapper: F,
    ) -> DataResult<PagedResult<T>>
    where
        F: FnMut(&ResultRow) -> DataResult<T>,
    {
        if page == 0 || page_size == 0 {
            return Err(DataError::Configuration {
                message: "pages are 1-based and page_size must be positive".to_string(),
            });
        }

        let count_sql = format!("SELECT COUNT(*) AS total FROM ({})", sql);
        let totals = self.run_query(sc, &count_sql, params, |row| row.get::<i64>("total"))?;
        let total_count = totals.first().copied().unwrap_or(0).max(0) as u64;

        let offset = i64::from(page - 1) * i64::from(page_size);
        let page_sql = format!("{} LIMIT ? OFFSET ?", sql);
        let mut bound = params.to_vec();
        bound.push(SqlParam::Integer(i64::from(page_size)));
        bound.push(SqlParam::Integer(offset));
        let items = self.run_query(sc, &page_sql, &bound, mapper)?;

        Ok(PagedResult {
            items,
            total_count,
            page,
            page_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        let paged = PagedResult {
            items: vec![1, 2, 3],
            total_count: 7,
            page: 1,
            page_size: 3,
        };
        assert_eq!(paged.total_pages(), 3);
        assert!(paged.has_next());

        let last = PagedResult {
            items: vec![7],
            total_count: 7,
            page: 3,
            page_size: 3,
        };
        assert!(!last.has_next());
    }

    #[test]
    fn test_empty_result_has_no_pages() {
        let paged: PagedResult<i64> = PagedResult {
            items: vec![],
            total_count: 0,
            page: 1,
            page_size: 20,
        };
        assert_eq!(paged.total_pages(), 0);
        assert!(!paged.has_next());
    }

    #[test]
    fn test_map_preserves_paging() {
        let paged = PagedResult {
            items: vec![1, 2],
            total_count: 2,
            page: 1,
            page_size: 10,
        };
        let mapped = paged.map(|n| n * 10);
        assert_eq!(mapped.items, vec![10, 20]);
        assert_eq!(mapped.total_count, 2);
    }
}
