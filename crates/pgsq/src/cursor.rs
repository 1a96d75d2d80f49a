//! Driver boundary: raw values, destinations, cursors.
//!
//! A [`Cursor`] binds all columns of its current row into a slice of
//! [`Destination`]s in one call, the way a driver fills scan targets. The
//! binder decides the destination shapes; the cursor only converts raw
//! values into them.

use crate::error::{SqError, SqResult};
use crate::param::Args;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Element shape of an array destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Elem {
    Bool,
    Int32,
    Int64,
    Float64,
    Text,
}

/// Shape a destination accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    Bool,
    Int32,
    Int64,
    Float64,
    Text,
    Time,
    Bytes,
    Json,
    Array(Elem),
    /// Accepts whatever the driver produces.
    Any,
    /// Ignores the column; drivers may skip decoding it.
    Discard,
}

impl ScanKind {
    /// Short name used in mismatch messages.
    pub fn name(self) -> &'static str {
        match self {
            ScanKind::Bool => "bool",
            ScanKind::Int32 => "int32",
            ScanKind::Int64 => "int64",
            ScanKind::Float64 => "float64",
            ScanKind::Text => "text",
            ScanKind::Time => "time",
            ScanKind::Bytes => "bytes",
            ScanKind::Json => "json",
            ScanKind::Array(_) => "array",
            ScanKind::Any => "any",
            ScanKind::Discard => "discard",
        }
    }
}

/// Driver-neutral raw column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Text(String),
    Bytes(Vec<u8>),
    Time(DateTime<Utc>),
    Json(serde_json::Value),
    Array(Vec<SqlValue>),
}

impl SqlValue {
    /// True for SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Name of the value's variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Bool(_) => "bool",
            SqlValue::Int32(_) => "int32",
            SqlValue::Int64(_) => "int64",
            SqlValue::Float64(_) => "float64",
            SqlValue::Text(_) => "text",
            SqlValue::Bytes(_) => "bytes",
            SqlValue::Time(_) => "time",
            SqlValue::Json(_) => "json",
            SqlValue::Array(_) => "array",
        }
    }
}

macro_rules! impl_from_for_sql_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for SqlValue {
                fn from(value: $ty) -> Self {
                    SqlValue::$variant(value.into())
                }
            }
        )*
    };
}

impl_from_for_sql_value!(
    bool => Bool,
    i32 => Int32,
    i64 => Int64,
    f64 => Float64,
    String => Text,
    &str => Text,
    Vec<u8> => Bytes,
    DateTime<Utc> => Time,
    serde_json::Value => Json,
);

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

/// A scan target.
pub trait Destination {
    fn kind(&self) -> ScanKind;

    /// Store `value`. `SqlValue::Null` clears the destination.
    fn assign(&mut self, value: SqlValue) -> SqResult<()>;
}

/// Forward-only iteration over a result set.
pub trait Cursor {
    /// Move to the next row. Returns `false` once exhausted.
    fn advance(&mut self) -> SqResult<bool>;

    fn column_count(&self) -> usize;

    /// Bind every column of the current row into `dest`, in order.
    ///
    /// May be called any number of times on the same row. `dest.len()` must
    /// equal [`Cursor::column_count`].
    fn scan(&mut self, dest: &mut [&mut dyn Destination]) -> SqResult<()>;
}

/// Executes statements and yields cursors.
pub trait Driver {
    type Cursor: Cursor;

    fn query(&mut self, sql: &str, args: &Args) -> SqResult<Self::Cursor>;

    /// Execute a statement that returns no rows; returns the affected count.
    fn execute(&mut self, sql: &str, args: &Args) -> SqResult<u64>;
}

/// Error for a scan whose destination count differs from the column count.
pub(crate) fn destination_count_error(columns: usize, dest: usize) -> SqError {
    SqError::Other(format!(
        "expected {columns} destination arguments in scan, not {dest}"
    ))
}

/// Accepts any value and keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl Destination for Discard {
    fn kind(&self) -> ScanKind {
        ScanKind::Discard
    }

    fn assign(&mut self, _value: SqlValue) -> SqResult<()> {
        Ok(())
    }
}

/// Conversion from a raw value into a Rust type.
pub trait FromSqlValue: Sized {
    const KIND: ScanKind;

    fn from_sql_value(value: SqlValue) -> SqResult<Self>;
}

fn mismatch<T>(want: &str, got: &SqlValue) -> SqResult<T> {
    Err(SqError::decode(
        "",
        format!("cannot store {} value into {want}", got.type_name()),
    ))
}

impl FromSqlValue for bool {
    const KIND: ScanKind = ScanKind::Bool;

    fn from_sql_value(value: SqlValue) -> SqResult<Self> {
        match value {
            SqlValue::Bool(v) => Ok(v),
            other => mismatch("bool", &other),
        }
    }
}

impl FromSqlValue for i32 {
    const KIND: ScanKind = ScanKind::Int32;

    fn from_sql_value(value: SqlValue) -> SqResult<Self> {
        match value {
            SqlValue::Int32(v) => Ok(v),
            other => mismatch("int32", &other),
        }
    }
}

impl FromSqlValue for i64 {
    const KIND: ScanKind = ScanKind::Int64;

    fn from_sql_value(value: SqlValue) -> SqResult<Self> {
        match value {
            SqlValue::Int64(v) => Ok(v),
            SqlValue::Int32(v) => Ok(i64::from(v)),
            other => mismatch("int64", &other),
        }
    }
}

const MAX_EXACT_F64_INT: u64 = 1 << 53;

impl FromSqlValue for f64 {
    const KIND: ScanKind = ScanKind::Float64;

    fn from_sql_value(value: SqlValue) -> SqResult<Self> {
        match value {
            SqlValue::Float64(v) => Ok(v),
            SqlValue::Int32(v) => Ok(f64::from(v)),
            // Integers beyond 2^53 have no exact f64.
            SqlValue::Int64(v) if v.unsigned_abs() <= MAX_EXACT_F64_INT => Ok(v as f64),
            SqlValue::Int64(v) => Err(SqError::decode(
                "",
                format!("int64 value {v} cannot be stored exactly into float64"),
            )),
            other => mismatch("float64", &other),
        }
    }
}

impl FromSqlValue for String {
    const KIND: ScanKind = ScanKind::Text;

    fn from_sql_value(value: SqlValue) -> SqResult<Self> {
        match value {
            SqlValue::Text(v) => Ok(v),
            other => mismatch("text", &other),
        }
    }
}

impl FromSqlValue for Vec<u8> {
    const KIND: ScanKind = ScanKind::Bytes;

    fn from_sql_value(value: SqlValue) -> SqResult<Self> {
        match value {
            SqlValue::Bytes(v) => Ok(v),
            other => mismatch("bytes", &other),
        }
    }
}

impl FromSqlValue for DateTime<Utc> {
    const KIND: ScanKind = ScanKind::Time;

    fn from_sql_value(value: SqlValue) -> SqResult<Self> {
        match value {
            SqlValue::Time(v) => Ok(v),
            other => mismatch("time", &other),
        }
    }
}

impl FromSqlValue for serde_json::Value {
    const KIND: ScanKind = ScanKind::Json;

    fn from_sql_value(value: SqlValue) -> SqResult<Self> {
        match value {
            SqlValue::Json(v) => Ok(v),
            SqlValue::Text(s) => serde_json::from_str(&s)
                .map_err(|e| SqError::decode("", format!("invalid json: {e}"))),
            SqlValue::Bytes(b) => serde_json::from_slice(&b)
                .map_err(|e| SqError::decode("", format!("invalid json: {e}"))),
            other => mismatch("json", &other),
        }
    }
}

/// Element types readable from one-dimensional arrays.
pub trait ArrayElement: FromSqlValue {
    const ELEM: Elem;
}

impl ArrayElement for bool {
    const ELEM: Elem = Elem::Bool;
}

impl ArrayElement for i32 {
    const ELEM: Elem = Elem::Int32;
}

impl ArrayElement for i64 {
    const ELEM: Elem = Elem::Int64;
}

impl ArrayElement for f64 {
    const ELEM: Elem = Elem::Float64;
}

impl ArrayElement for String {
    const ELEM: Elem = Elem::Text;
}

/// Convert an array value into `Vec<T>`; null elements are an error.
pub(crate) fn array_from_sql_value<T: ArrayElement>(value: SqlValue) -> SqResult<Vec<T>> {
    match value {
        SqlValue::Array(items) => items
            .into_iter()
            .map(|item| {
                if item.is_null() {
                    Err(SqError::decode("", "null array element"))
                } else {
                    T::from_sql_value(item)
                }
            })
            .collect(),
        other => mismatch("array", &other),
    }
}

/// Caller-owned destination writing into an `Option<T>`.
pub struct Target<'a, T> {
    out: &'a mut Option<T>,
}

impl<'a, T> Target<'a, T> {
    /// Write the column into `out`; NULL clears it.
    pub fn new(out: &'a mut Option<T>) -> Self {
        Self { out }
    }
}

impl<T: FromSqlValue> Destination for Target<'_, T> {
    fn kind(&self) -> ScanKind {
        T::KIND
    }

    fn assign(&mut self, value: SqlValue) -> SqResult<()> {
        *self.out = match value {
            SqlValue::Null => None,
            value => Some(T::from_sql_value(value)?),
        };
        Ok(())
    }
}

/// Destination writing a non-null array directly into a caller vector.
pub(crate) struct ArrayTarget<'a, T> {
    out: &'a mut Vec<T>,
}

impl<'a, T> ArrayTarget<'a, T> {
    pub(crate) fn new(out: &'a mut Vec<T>) -> Self {
        Self { out }
    }
}

impl<T: ArrayElement> Destination for ArrayTarget<'_, T> {
    fn kind(&self) -> ScanKind {
        ScanKind::Array(T::ELEM)
    }

    fn assign(&mut self, value: SqlValue) -> SqResult<()> {
        match value {
            SqlValue::Null => self.out.clear(),
            value => *self.out = array_from_sql_value(value)?,
        }
        Ok(())
    }
}

/// Scan `row` into `dest`, skipping discarded columns.
pub(crate) fn scan_values(row: &[SqlValue], dest: &mut [&mut dyn Destination]) -> SqResult<()> {
    if row.len() != dest.len() {
        return Err(destination_count_error(row.len(), dest.len()));
    }
    for (idx, (value, d)) in row.iter().zip(dest.iter_mut()).enumerate() {
        if d.kind() == ScanKind::Discard {
            continue;
        }
        d.assign(value.clone()).map_err(|e| e.at_column(idx))?;
    }
    Ok(())
}

/// In-memory cursor over buffered rows.
#[derive(Debug, Clone, Default)]
pub struct VecCursor {
    columns: usize,
    rows: VecDeque<Vec<SqlValue>>,
    current: Option<Vec<SqlValue>>,
}

impl VecCursor {
    /// Build a cursor; the column count is taken from the first row.
    pub fn new(rows: Vec<Vec<SqlValue>>) -> Self {
        let columns = rows.first().map_or(0, Vec::len);
        Self::with_columns(columns, rows)
    }

    /// Cursor with a fixed width, so empty results still report a column count.
    pub fn with_columns(columns: usize, rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            columns,
            rows: rows.into(),
            current: None,
        }
    }
}

impl Cursor for VecCursor {
    fn advance(&mut self) -> SqResult<bool> {
        self.current = self.rows.pop_front();
        if let Some(row) = &self.current {
            if row.len() != self.columns {
                return Err(SqError::Other(format!(
                    "row has {} columns, cursor has {}",
                    row.len(),
                    self.columns
                )));
            }
        }
        Ok(self.current.is_some())
    }

    fn column_count(&self) -> usize {
        self.columns
    }

    fn scan(&mut self, dest: &mut [&mut dyn Destination]) -> SqResult<()> {
        let Some(row) = &self.current else {
            return Err(SqError::Other("scan called without a current row".to_string()));
        };
        scan_values(row, dest)
    }
}

/// A statement seen by [`VecDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub sql: String,
    pub args: Vec<String>,
}

/// In-memory driver returning queued result sets and recording statements.
#[derive(Debug, Default)]
pub struct VecDriver {
    results: VecDeque<VecCursor>,
    statements: Vec<Recorded>,
}

impl VecDriver {
    /// Driver with no queued results.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result set for the next query.
    pub fn push_result(&mut self, rows: Vec<Vec<SqlValue>>) -> &mut Self {
        self.results.push_back(VecCursor::new(rows));
        self
    }

    /// Queue a result set with an explicit column count (for empty results).
    pub fn push_result_with_columns(&mut self, columns: usize, rows: Vec<Vec<SqlValue>>) -> &mut Self {
        self.results.push_back(VecCursor::with_columns(columns, rows));
        self
    }

    /// Every statement run so far, oldest first.
    pub fn statements(&self) -> &[Recorded] {
        &self.statements
    }

    fn record(&mut self, sql: &str, args: &Args) {
        self.statements.push(Recorded {
            sql: sql.to_string(),
            args: args.debug_values(),
        });
    }
}

impl Driver for VecDriver {
    type Cursor = VecCursor;

    fn query(&mut self, sql: &str, args: &Args) -> SqResult<VecCursor> {
        self.record(sql, args);
        Ok(self.results.pop_front().unwrap_or_default())
    }

    fn execute(&mut self, sql: &str, args: &Args) -> SqResult<u64> {
        self.record(sql, args);
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_writes_option_and_clears_on_null() {
        let mut out: Option<i64> = Some(1);
        let mut target = Target::new(&mut out);
        assert_eq!(target.kind(), ScanKind::Int64);
        target.assign(SqlValue::Int32(7)).unwrap();
        assert_eq!(out, Some(7));

        let mut target = Target::new(&mut out);
        target.assign(SqlValue::Null).unwrap();
        assert_eq!(out, None);
    }

    #[test]
    fn float_widening_rejects_inexact_integers() {
        assert_eq!(f64::from_sql_value(SqlValue::Int64(1 << 53)).unwrap(), 9_007_199_254_740_992.0);
        assert_eq!(f64::from_sql_value(SqlValue::Int64(-(1 << 53))).unwrap(), -9_007_199_254_740_992.0);

        let err = f64::from_sql_value(SqlValue::Int64((1 << 53) + 1)).unwrap_err();
        assert!(err.to_string().contains("exactly"));
        assert!(f64::from_sql_value(SqlValue::Int64(i64::MIN)).is_err());
    }

    #[test]
    fn json_accepts_text() {
        let v = serde_json::Value::from_sql_value(SqlValue::from(r#"{"a":1}"#)).unwrap();
        assert_eq!(v["a"], 1);
        assert!(serde_json::Value::from_sql_value(SqlValue::from("{")).is_err());
    }

    #[test]
    fn vec_cursor_scan_checks_destination_count() {
        let mut cursor = VecCursor::new(vec![vec![SqlValue::from(1_i64), SqlValue::from("a")]]);
        assert!(cursor.advance().unwrap());

        let mut one = Discard;
        let err = cursor.scan(&mut [&mut one]).unwrap_err();
        assert_eq!(err.to_string(), "expected 2 destination arguments in scan, not 1");

        let mut id = None::<i64>;
        let mut name = None::<String>;
        cursor
            .scan(&mut [&mut Target::new(&mut id), &mut Target::new(&mut name)])
            .unwrap();
        assert_eq!(id, Some(1));
        assert_eq!(name.as_deref(), Some("a"));
        assert!(!cursor.advance().unwrap());
    }

    #[test]
    fn decode_error_names_column() {
        let mut cursor = VecCursor::new(vec![vec![SqlValue::from("x")]]);
        cursor.advance().unwrap();
        let mut out = None::<bool>;
        let err = cursor.scan(&mut [&mut Target::new(&mut out)]).unwrap_err();
        assert!(matches!(err, SqError::Decode { ref column, .. } if column == "0"));
    }

    #[test]
    fn array_target_rejects_null_elements() {
        let mut out: Vec<i32> = Vec::new();
        let mut target = ArrayTarget::new(&mut out);
        target
            .assign(SqlValue::Array(vec![SqlValue::Int32(1), SqlValue::Int32(2)]))
            .unwrap();
        assert_eq!(out, vec![1, 2]);

        let mut target = ArrayTarget::new(&mut out);
        assert!(target.assign(SqlValue::Array(vec![SqlValue::Null])).is_err());
    }

    #[test]
    fn vec_driver_records_statements() {
        let mut driver = VecDriver::new();
        let mut args = Args::new();
        args.push("x");
        driver.execute("DELETE FROM t WHERE a = $1", &args).unwrap();
        assert_eq!(driver.statements()[0].args, vec!["\"x\""]);
        let mut cursor = driver.query("SELECT 1", &Args::new()).unwrap();
        assert!(!cursor.advance().unwrap());
    }
}
