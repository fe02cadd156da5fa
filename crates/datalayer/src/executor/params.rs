//! Statement parameter values.
//!
//! Callers never interpolate values into statement text; they pass
//! [`SqlParam`]s and the engine binds them. The value enum covers the
//! types the row cursor can read back: booleans are stored as 0/1,
//! timestamps as RFC 3339 text, decimals as text (preserving scale).

use chrono::{DateTime, Utc};
use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, Value};
use rust_decimal::Decimal;

/// A single bound statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// SQL NULL.
    Null,
    /// 64-bit integer.
    Integer(i64),
    /// Double-precision float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
    /// Boolean, stored as integer 0/1.
    Bool(bool),
    /// UTC timestamp, stored as RFC 3339 text.
    Timestamp(DateTime<Utc>),
    /// Fixed-point decimal, stored as text to preserve scale.
    Decimal(Decimal),
}

impl SqlParam {
    pub(crate) fn to_value(&self) -> Value {
        match self {
            SqlParam::Null => Value::Null,
            SqlParam::Integer(i) => Value::Integer(*i),
            SqlParam::Real(f) => Value::Real(*f),
            SqlParam::Text(s) => Value::Text(s.clone()),
            SqlParam::Blob(b) => Value::Blob(b.clone()),
            SqlParam::Bool(b) => Value::Integer(i64::from(*b)),
            SqlParam::Timestamp(ts) => Value::Text(ts.to_rfc3339()),
            SqlParam::Decimal(d) => Value::Text(d.to_string()),
        }
    }
}

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Owned(self.to_value()))
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        SqlParam::Integer(v)
    }
}

impl From<i32> for SqlParam {
    fn from(v: i32) -> Self {
        SqlParam::Integer(i64::from(v))
    }
}

impl From<f64> for SqlParam {
    fn from(v: f64) -> Self {
        SqlParam::Real(v)
    }
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        SqlParam::Bool(v)
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(v)
    }
}

impl From<Vec<u8>> for SqlParam {
    fn from(v: Vec<u8>) -> Self {
        SqlParam::Blob(v)
    }
}

impl From<DateTime<Utc>> for SqlParam {
    fn from(v: DateTime<Utc>) -> Self {
        SqlParam::Timestamp(v)
    }
}

impl From<Decimal> for SqlParam {
    fn from(v: Decimal) -> Self {
        SqlParam::Decimal(v)
    }
}

impl<T: Into<SqlParam>> From<Option<T>> for SqlParam {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => SqlParam::Null,
        }
    }
}

/// Builds a `Vec<SqlParam>` from a comma-separated list of values, each
/// converted via `Into<SqlParam>`.
///
/// ```
/// use helios_datalayer::bind;
/// use helios_datalayer::executor::SqlParam;
///
/// let params = bind!["acme", 42, true];
/// assert_eq!(params[1], SqlParam::Integer(42));
/// ```
#[macro_export]
macro_rules! bind {
    () => {
        ::std::vec::Vec::<$crate::executor::SqlParam>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::executor::SqlParam::from($value)),+]
    };
}
