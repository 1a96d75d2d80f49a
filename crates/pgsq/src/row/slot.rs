use crate::cursor::{Destination, Elem, FromSqlValue, ScanKind, SqlValue};
use crate::error::SqResult;
use chrono::{DateTime, Utc};

/// Typed nullable scratch destination reserved by a discovery accessor.
///
/// `Array` and `Any` slots are deferred: the row scan skips them and the
/// accessor reads the column with a dedicated rescan into the caller's
/// destination.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Bool(Option<bool>),
    Int32(Option<i32>),
    Int64(Option<i64>),
    Float64(Option<f64>),
    Text(Option<String>),
    Time(Option<DateTime<Utc>>),
    Bytes(Option<Vec<u8>>),
    Json(Option<serde_json::Value>),
    Array(Elem),
    Any,
}

impl Slot {
    /// An empty slot of the given shape.
    pub fn for_kind(kind: ScanKind) -> Slot {
        match kind {
            ScanKind::Bool => Slot::Bool(None),
            ScanKind::Int32 => Slot::Int32(None),
            ScanKind::Int64 => Slot::Int64(None),
            ScanKind::Float64 => Slot::Float64(None),
            ScanKind::Text => Slot::Text(None),
            ScanKind::Time => Slot::Time(None),
            ScanKind::Bytes => Slot::Bytes(None),
            ScanKind::Json => Slot::Json(None),
            ScanKind::Array(elem) => Slot::Array(elem),
            ScanKind::Any | ScanKind::Discard => Slot::Any,
        }
    }

    /// The shape this slot was reserved with.
    pub fn shape(&self) -> ScanKind {
        match self {
            Slot::Bool(_) => ScanKind::Bool,
            Slot::Int32(_) => ScanKind::Int32,
            Slot::Int64(_) => ScanKind::Int64,
            Slot::Float64(_) => ScanKind::Float64,
            Slot::Text(_) => ScanKind::Text,
            Slot::Time(_) => ScanKind::Time,
            Slot::Bytes(_) => ScanKind::Bytes,
            Slot::Json(_) => ScanKind::Json,
            Slot::Array(elem) => ScanKind::Array(*elem),
            Slot::Any => ScanKind::Any,
        }
    }

    /// Deferred slots are skipped by the main scan and filled by a rescan.
    pub fn is_deferred(&self) -> bool {
        matches!(self, Slot::Array(_) | Slot::Any)
    }

    /// Move the value out, leaving the slot empty with the same shape.
    pub(crate) fn take(&mut self) -> Slot {
        match self {
            Slot::Bool(v) => Slot::Bool(v.take()),
            Slot::Int32(v) => Slot::Int32(v.take()),
            Slot::Int64(v) => Slot::Int64(v.take()),
            Slot::Float64(v) => Slot::Float64(v.take()),
            Slot::Text(v) => Slot::Text(v.take()),
            Slot::Time(v) => Slot::Time(v.take()),
            Slot::Bytes(v) => Slot::Bytes(v.take()),
            Slot::Json(v) => Slot::Json(v.take()),
            Slot::Array(elem) => Slot::Array(*elem),
            Slot::Any => Slot::Any,
        }
    }
}

fn store<T: FromSqlValue>(out: &mut Option<T>, value: SqlValue) -> SqResult<()> {
    *out = match value {
        SqlValue::Null => None,
        value => Some(T::from_sql_value(value)?),
    };
    Ok(())
}

impl Destination for Slot {
    fn kind(&self) -> ScanKind {
        if self.is_deferred() {
            ScanKind::Discard
        } else {
            self.shape()
        }
    }

    fn assign(&mut self, value: SqlValue) -> SqResult<()> {
        match self {
            Slot::Bool(v) => store(v, value),
            Slot::Int32(v) => store(v, value),
            Slot::Int64(v) => store(v, value),
            Slot::Float64(v) => store(v, value),
            Slot::Text(v) => store(v, value),
            Slot::Time(v) => store(v, value),
            Slot::Bytes(v) => store(v, value),
            Slot::Json(v) => store(v, value),
            Slot::Array(_) | Slot::Any => Ok(()),
        }
    }
}
