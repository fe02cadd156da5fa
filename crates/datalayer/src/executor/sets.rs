//! Multiple independent result sets from one script.
//!
//! A statement script may contain several `;`-separated statements. The
//! executor runs them in order under the scope's transaction and snapshots
//! each statement's rows into its own [`ResultSet`]; the caller advances
//! through the sets explicitly with [`ResultSets::next_set`] until
//! exhaustion. Statements that produce no columns (writes, DDL) are
//! executed and contribute an empty set, keeping sets positionally aligned
//! with the script.

use std::collections::VecDeque;
use std::sync::Arc;

use rusqlite::fallible_iterator::FallibleIterator;
use rusqlite::params_from_iter;

use crate::error::{DataError, DataResult};
use crate::row::ResultRow;
use crate::scope::{ScopeConnection, TransactionScope};
use crate::tenant::TenantId;

use super::SqlParam;

/// The snapshot of one statement's rows.
#[derive(Debug, Clone)]
pub struct ResultSet {
    rows: Vec<ResultRow>,
}

impl ResultSet {
    /// The rows of this set.
    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    /// Maps every row of this set.
    pub fn map<T, F>(&self, mapper: F) -> DataResult<Vec<T>>
    where
        F: FnMut(&ResultRow) -> DataResult<T>,
    {
        self.rows.iter().map(mapper).collect()
    }

    /// Number of rows in this set.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether this set has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Cursor over the result sets of a script, advanced explicitly.
#[derive(Debug)]
pub struct ResultSets {
    sets: VecDeque<ResultSet>,
}

impl ResultSets {
    /// Advances to the next result set, or `None` when exhausted.
    pub fn next_set(&mut self) -> Option<ResultSet> {
        self.sets.pop_front()
    }

    /// Number of sets not yet consumed.
    pub fn remaining(&self) -> usize {
        self.sets.len()
    }
}

impl TransactionScope {
    /// Runs a multi-statement script, returning one result set per
    /// statement.
    ///
    /// Parameters are bound to each statement that declares placeholders;
    /// a statement whose placeholder count differs from the parameter list
    /// is a programming error.
    pub async fn query_multi(&self, script: &str, params: &[SqlParam]) -> DataResult<ResultSets> {
        let sc = self.sole_connection()?;
        self.run_multi(sc, script, params)
    }

    /// Runs a script against a named participant of a joint scope.
    pub async fn query_multi_on(
        &self,
        tenant: &TenantId,
        script: &str,
        params: &[SqlParam],
    ) -> DataResult<ResultSets> {
        let sc = self.connection_for(tenant)?;
        self.run_multi(sc, script, params)
    }

    fn run_multi(
        &self,
        sc: &ScopeConnection,
        script: &str,
        params: &[SqlParam],
    ) -> DataResult<ResultSets> {
        self.ensure_open("execute a statement in")?;
        self.check_deadline()?;

        let conn = sc.conn.lock();
        let mut sets = VecDeque::new();
        let mut batch = rusqlite::Batch::new(&conn, script);
        while let Some(mut stmt) = batch.next()? {
            let wanted = stmt.parameter_count();
            let bound: &[SqlParam] = if wanted == 0 {
                &[]
            } else if wanted == params.len() {
                params
            } else {
                return Err(DataError::Configuration {
                    message: format!(
                        "statement declares {} placeholder(s) but {} parameter(s) were supplied",
                        wanted,
                        params.len()
                    ),
                });
            };

            if stmt.column_count() == 0 {
                stmt.execute(params_from_iter(bound.iter()))?;
                sets.push_back(ResultSet { rows: Vec::new() });
            } else {
                let columns: Arc<Vec<String>> =
                    Arc::new(stmt.column_names().into_iter().map(String::from).collect());
                let mut rows = stmt.query(params_from_iter(bound.iter()))?;
                let mut collected = Vec::new();
                while let Some(row) = rows.next()? {
                    collected.push(ResultRow::from_sql_row(Arc::clone(&columns), row)?);
                }
                sets.push_back(ResultSet { rows: collected });
            }
        }

        Ok(ResultSets { sets })
    }
}
