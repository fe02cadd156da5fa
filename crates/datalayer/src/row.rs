//! Typed, null-aware access to one row of a query result.
//!
//! [`ResultRow`] is an owned snapshot of a single row: column names plus
//! engine values, detached from the statement that produced it. Extraction
//! is strict: a mapper that asks for a value the row does not have gets
//! [`MissingValue`](crate::error::DataError::MissingValue), and a stored
//! value of the wrong shape gets
//! [`TypeMismatch`](crate::error::DataError::TypeMismatch). There is no
//! silent truncation and no silent null-to-default conversion.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rust_decimal::Decimal;

use crate::error::{DataError, DataResult};

/// A read-only view over one row of a result set, addressed by column name.
///
/// # Examples
///
/// Mappers receive a `&ResultRow` and pull typed values out of it:
///
/// ```ignore
/// let accounts = scope
///     .query("SELECT code, balance, frozen FROM accounts", &[], |row| {
///         Ok(Account {
///             code: row.get("code")?,
///             balance: row.get("balance")?,
///             frozen: row.get_or("frozen", false)?,
///         })
///     })
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct ResultRow {
    columns: Arc<Vec<String>>,
    values: Vec<Value>,
}

impl ResultRow {
    /// Snapshots the current row of a live result set.
    pub(crate) fn from_sql_row(
        columns: Arc<Vec<String>>,
        row: &rusqlite::Row<'_>,
    ) -> DataResult<Self> {
        let mut values = Vec::with_capacity(columns.len());
        for index in 0..columns.len() {
            values.push(row.get_ref(index).map(Value::from)?);
        }
        Ok(Self { columns, values })
    }

    /// Builds a row from explicit columns and values. Test-oriented, but
    /// also handy for adapters that produce rows from non-engine sources.
    pub fn from_values(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self {
            columns: Arc::new(columns),
            values,
        }
    }

    /// The column names of this row, in result-set order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn lookup(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    /// Extracts a non-null value from the named column.
    ///
    /// Fails with `MissingValue` if the column is absent from the result
    /// set or holds SQL NULL: the mapper asked for a value it did not
    /// guard.
    pub fn get<T: FromRowValue>(&self, column: &str) -> DataResult<T> {
        match self.lookup(column) {
            Some(Value::Null) | None => Err(DataError::MissingValue {
                column: column.to_string(),
            }),
            Some(value) => T::from_value(column, value),
        }
    }

    /// Extracts a value, falling back to `default` when the column is
    /// absent or holds SQL NULL.
    ///
    /// A present value of the wrong type still fails with `TypeMismatch`;
    /// the default only covers absence.
    pub fn get_or<T: FromRowValue>(&self, column: &str, default: T) -> DataResult<T> {
        match self.lookup(column) {
            Some(Value::Null) | None => Ok(default),
            Some(value) => T::from_value(column, value),
        }
    }

    /// Extracts a nullable value: SQL NULL becomes `None`.
    ///
    /// An absent column is still `MissingValue`; asking for a column the
    /// statement did not select is a mapper defect, nullable or not.
    pub fn opt<T: FromRowValue>(&self, column: &str) -> DataResult<Option<T>> {
        match self.lookup(column) {
            None => Err(DataError::MissingValue {
                column: column.to_string(),
            }),
            Some(Value::Null) => Ok(None),
            Some(value) => T::from_value(column, value).map(Some),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Integer(_) => "integer",
        Value::Real(_) => "real",
        Value::Text(_) => "text",
        Value::Blob(_) => "blob",
    }
}

fn mismatch(column: &str, expected: &'static str, value: &Value) -> DataError {
    DataError::TypeMismatch {
        column: column.to_string(),
        expected,
        found: type_name(value),
    }
}

/// Strict conversion from a stored engine value.
///
/// Implementations must not truncate or guess: a numeric target accepts
/// only numerically stored values, a textual target only text.
pub trait FromRowValue: Sized {
    /// Converts a non-null stored value, or fails with `TypeMismatch`.
    fn from_value(column: &str, value: &Value) -> DataResult<Self>;
}

impl FromRowValue for i64 {
    fn from_value(column: &str, value: &Value) -> DataResult<Self> {
        match value {
            Value::Integer(i) => Ok(*i),
            other => Err(mismatch(column, "integer", other)),
        }
    }
}

impl FromRowValue for i32 {
    fn from_value(column: &str, value: &Value) -> DataResult<Self> {
        match value {
            Value::Integer(i) => i32::try_from(*i).map_err(|_| mismatch(column, "i32", value)),
            other => Err(mismatch(column, "i32", other)),
        }
    }
}

impl FromRowValue for f64 {
    fn from_value(column: &str, value: &Value) -> DataResult<Self> {
        match value {
            Value::Real(f) => Ok(*f),
            Value::Integer(i) => Ok(*i as f64),
            other => Err(mismatch(column, "real", other)),
        }
    }
}

impl FromRowValue for bool {
    fn from_value(column: &str, value: &Value) -> DataResult<Self> {
        match value {
            Value::Integer(0) => Ok(false),
            Value::Integer(1) => Ok(true),
            other => Err(mismatch(column, "boolean", other)),
        }
    }
}

impl FromRowValue for String {
    fn from_value(column: &str, value: &Value) -> DataResult<Self> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            other => Err(mismatch(column, "text", other)),
        }
    }
}

impl FromRowValue for Vec<u8> {
    fn from_value(column: &str, value: &Value) -> DataResult<Self> {
        match value {
            Value::Blob(b) => Ok(b.clone()),
            other => Err(mismatch(column, "blob", other)),
        }
    }
}

impl FromRowValue for Decimal {
    fn from_value(column: &str, value: &Value) -> DataResult<Self> {
        match value {
            // Decimals are stored as text to preserve scale.
            Value::Text(s) => Decimal::from_str(s).map_err(|_| mismatch(column, "decimal", value)),
            Value::Integer(i) => Ok(Decimal::from(*i)),
            Value::Real(f) => Decimal::try_from(*f).map_err(|_| mismatch(column, "decimal", value)),
            other => Err(mismatch(column, "decimal", other)),
        }
    }
}

impl FromRowValue for DateTime<Utc> {
    fn from_value(column: &str, value: &Value) -> DataResult<Self> {
        match value {
            // Timestamps are stored as RFC 3339 text.
            Value::Text(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| mismatch(column, "timestamp", value)),
            other => Err(mismatch(column, "timestamp", other)),
        }
    }
}
