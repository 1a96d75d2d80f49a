//! tokio-postgres adapter: client trait and a cursor over fetched rows.

use crate::cursor::{Cursor, Destination, ScanKind, SqlValue, destination_count_error};
use crate::error::{SqError, SqResult};
use crate::query::Query;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, Kind, ToSql, Type};

/// Anything that can run a statement: a client, a transaction or a pooled client.
pub trait GenericClient: Send + Sync {
    /// Run `sql` and collect every returned row.
    fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = SqResult<Vec<Row>>> + Send;

    /// Run `sql` and report how many rows it touched.
    fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = SqResult<u64>> + Send;
}

impl GenericClient for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> SqResult<Vec<Row>> {
        tokio_postgres::Client::query(self, sql, params)
            .await
            .map_err(SqError::from_db_error)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> SqResult<u64> {
        tokio_postgres::Client::execute(self, sql, params)
            .await
            .map_err(SqError::from_db_error)
    }
}

impl GenericClient for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> SqResult<Vec<Row>> {
        tokio_postgres::Transaction::query(self, sql, params)
            .await
            .map_err(SqError::from_db_error)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> SqResult<u64> {
        tokio_postgres::Transaction::execute(self, sql, params)
            .await
            .map_err(SqError::from_db_error)
    }
}

#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> SqResult<Vec<Row>> {
        // Deref target is tokio_postgres::Client.
        tokio_postgres::Client::query(self, sql, params)
            .await
            .map_err(SqError::from_db_error)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> SqResult<u64> {
        tokio_postgres::Client::execute(self, sql, params)
            .await
            .map_err(SqError::from_db_error)
    }
}

impl<C: GenericClient> GenericClient for &C {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> SqResult<Vec<Row>> {
        (*self).query(sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> SqResult<u64> {
        (*self).execute(sql, params).await
    }
}

/// Render `query` and execute it, returning the affected row count.
pub async fn execute(client: &impl GenericClient, query: &impl Query) -> SqResult<u64> {
    let (sql, args) = query.to_sql()?;
    client.execute(&sql, &args.as_refs()).await
}

/// Text-encoded values whose Postgres type has no dedicated Rust mapping:
/// enums, `citext`, `ltree` and friends.
struct RawText(String);

impl<'a> FromSql<'a> for RawText {
    fn from_sql(
        _ty: &Type,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(RawText(std::str::from_utf8(raw)?.to_string()))
    }

    fn accepts(ty: &Type) -> bool {
        matches!(ty.kind(), Kind::Enum(_)) || matches!(ty.name(), "citext" | "ltree" | "lquery")
    }
}

/// Cursor over rows already fetched by tokio-postgres.
pub struct PgCursor {
    rows: std::vec::IntoIter<Row>,
    current: Option<Row>,
    columns: usize,
}

impl PgCursor {
    /// Iterate over rows returned by `Client::query`.
    pub fn new(rows: Vec<Row>) -> Self {
        let columns = rows.first().map_or(0, Row::len);
        Self {
            rows: rows.into_iter(),
            current: None,
            columns,
        }
    }
}

impl Cursor for PgCursor {
    fn advance(&mut self) -> SqResult<bool> {
        self.current = self.rows.next();
        Ok(self.current.is_some())
    }

    fn column_count(&self) -> usize {
        self.columns
    }

    fn scan(&mut self, dest: &mut [&mut dyn Destination]) -> SqResult<()> {
        let Some(row) = &self.current else {
            return Err(SqError::Other("scan called without a current row".to_string()));
        };
        if row.len() != dest.len() {
            return Err(destination_count_error(row.len(), dest.len()));
        }
        for (idx, d) in dest.iter_mut().enumerate() {
            if d.kind() == ScanKind::Discard {
                continue;
            }
            let value = decode(row, idx)?;
            d.assign(value).map_err(|e| e.at_column(idx))?;
        }
        Ok(())
    }
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize) -> SqResult<Option<T>> {
    row.try_get::<_, Option<T>>(idx)
        .map_err(|e| SqError::decode(row.columns()[idx].name(), e.to_string()))
}

fn scalar<'a, T: FromSql<'a>>(
    row: &'a Row,
    idx: usize,
    wrap: impl Fn(T) -> SqlValue,
) -> SqResult<SqlValue> {
    Ok(get::<T>(row, idx)?.map_or(SqlValue::Null, wrap))
}

fn array<'a, T: FromSql<'a>>(
    row: &'a Row,
    idx: usize,
    wrap: impl Fn(T) -> SqlValue,
) -> SqResult<SqlValue> {
    Ok(match get::<Vec<Option<T>>>(row, idx)? {
        None => SqlValue::Null,
        Some(items) => SqlValue::Array(
            items
                .into_iter()
                .map(|item| item.map_or(SqlValue::Null, &wrap))
                .collect(),
        ),
    })
}

/// Decode column `idx` of `row` by its Postgres type.
fn decode(row: &Row, idx: usize) -> SqResult<SqlValue> {
    let ty = row.columns()[idx].type_().clone();
    match ty {
        Type::BOOL => scalar(row, idx, SqlValue::Bool),
        Type::INT2 => scalar(row, idx, |v: i16| SqlValue::Int32(i32::from(v))),
        Type::INT4 => scalar(row, idx, SqlValue::Int32),
        Type::INT8 => scalar(row, idx, SqlValue::Int64),
        Type::FLOAT4 => scalar(row, idx, |v: f32| SqlValue::Float64(f64::from(v))),
        Type::FLOAT8 => scalar(row, idx, SqlValue::Float64),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            scalar(row, idx, SqlValue::Text)
        }
        Type::BYTEA => scalar(row, idx, SqlValue::Bytes),
        Type::TIMESTAMPTZ => scalar::<DateTime<Utc>>(row, idx, SqlValue::Time),
        Type::TIMESTAMP => scalar(row, idx, |v: NaiveDateTime| SqlValue::Time(v.and_utc())),
        Type::DATE => scalar(row, idx, |v: NaiveDate| {
            SqlValue::Time(v.and_time(NaiveTime::MIN).and_utc())
        }),
        Type::JSON | Type::JSONB => scalar(row, idx, SqlValue::Json),
        Type::UUID => scalar(row, idx, |v: uuid::Uuid| SqlValue::Text(v.to_string())),
        Type::BOOL_ARRAY => array(row, idx, SqlValue::Bool),
        Type::INT2_ARRAY => array(row, idx, |v: i16| SqlValue::Int32(i32::from(v))),
        Type::INT4_ARRAY => array(row, idx, SqlValue::Int32),
        Type::INT8_ARRAY => array(row, idx, SqlValue::Int64),
        Type::FLOAT4_ARRAY => array(row, idx, |v: f32| SqlValue::Float64(f64::from(v))),
        Type::FLOAT8_ARRAY => array(row, idx, SqlValue::Float64),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY | Type::BPCHAR_ARRAY => {
            array(row, idx, SqlValue::Text)
        }
        Type::UUID_ARRAY => array(row, idx, |v: uuid::Uuid| SqlValue::Text(v.to_string())),
        ty if RawText::accepts(&ty) => scalar(row, idx, |v: RawText| SqlValue::Text(v.0)),
        ty => Err(SqError::decode(
            row.columns()[idx].name(),
            format!("unsupported column type {ty}"),
        )),
    }
}
