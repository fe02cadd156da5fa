//! Typed statement execution against an open scope.
//!
//! Every executor call takes the scope explicitly; there is no ambient
//! transaction. Reads map rows through the [`ResultRow`] cursor; writes
//! return the affected row count. On a joint scope the `_on` variants name
//! the participating tenant; the plain variants require a single-tenant
//! scope.
//!
//! Engine failures surface pre-classified (see [`crate::classify`]); raw
//! engine text never reaches callers outside the classification's
//! `details` field, which is intended for logs.

use std::sync::Arc;

use rusqlite::params_from_iter;

use crate::error::DataResult;
use crate::row::ResultRow;
use crate::scope::TransactionScope;
use crate::tenant::TenantId;

mod batch;
mod paged;
mod params;
mod sets;

pub use batch::{BatchFailure, BatchItem, BatchReport};
pub use paged::PagedResult;
pub use params::SqlParam;
pub use sets::{ResultSet, ResultSets};

use crate::scope::ScopeConnection;

impl TransactionScope {
    /// Runs a parameterized read statement, mapping each row.
    ///
    /// Requires a single-tenant scope; use
    /// [`query_on`](Self::query_on) on joint scopes.
    pub async fn query<T, F>(&self, sql: &str, params: &[SqlParam], mapper: F) -> DataResult<Vec<T>>
    where
        F: FnMut(&ResultRow) -> DataResult<T>,
    {
        let sc = self.sole_connection()?;
        self.run_query(sc, sql, params, mapper)
    }

    /// Runs a read statement against a named participant of a joint scope.
    pub async fn query_on<T, F>(
        &self,
        tenant: &TenantId,
        sql: &str,
        params: &[SqlParam],
        mapper: F,
    ) -> DataResult<Vec<T>>
    where
        F: FnMut(&ResultRow) -> DataResult<T>,
    {
        let sc = self.connection_for(tenant)?;
        self.run_query(sc, sql, params, mapper)
    }

    /// Runs a read statement expected to produce at most one row.
    pub async fn query_opt<T, F>(
        &self,
        sql: &str,
        params: &[SqlParam],
        mapper: F,
    ) -> DataResult<Option<T>>
    where
        F: FnMut(&ResultRow) -> DataResult<T>,
    {
        let sc = self.sole_connection()?;
        let rows = self.run_query(sc, sql, params, mapper)?;
        Ok(rows.into_iter().next())
    }

    /// Runs a parameterized write statement, returning the affected row
    /// count.
    pub async fn execute(&self, sql: &str, params: &[SqlParam]) -> DataResult<u64> {
        let sc = self.sole_connection()?;
        self.run_execute(sc, sql, params)
    }

    /// Runs a write statement against a named participant of a joint scope.
    pub async fn execute_on(
        &self,
        tenant: &TenantId,
        sql: &str,
        params: &[SqlParam],
    ) -> DataResult<u64> {
        let sc = self.connection_for(tenant)?;
        self.run_execute(sc, sql, params)
    }

    pub(crate) fn run_query<T, F>(
        &self,
        sc: &ScopeConnection,
        sql: &str,
        params: &[SqlParam],
        mut mapper: F,
    ) -> DataResult<Vec<T>>
    where
        F: FnMut(&ResultRow) -> DataResult<T>,
    {
        self.ensure_open("execute a statement in")?;
        self.check_deadline()?;

        let conn = sc.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let columns: Arc<Vec<String>> =
            Arc::new(stmt.column_names().into_iter().map(String::from).collect());

        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut mapped = Vec::new();
        while let Some(row) = rows.next()? {
            let snapshot = ResultRow::from_sql_row(Arc::clone(&columns), row)?;
            mapped.push(mapper(&snapshot)?);
        }
        Ok(mapped)
    }

    pub(crate) fn run_execute(
        &self,
        sc: &ScopeConnection,
        sql: &str,
        params: &[SqlParam],
    ) -> DataResult<u64> {
        self.ensure_open("execute a statement in")?;
        self.check_deadline()?;

        let conn = sc.conn.lock();
        let affected = conn.execute(sql, params_from_iter(params.iter()))?;
        Ok(affected as u64)
    }
}
