//! # pgsq
//!
//! A typed SQL expression builder with a two-phase row binder.
//!
//! ## Features
//!
//! - **Neutral rendering**: every node writes `?` slots and pushes its
//!   arguments in order; placeholders are translated once per statement
//! - **Composable queries**: any query can be nested inside another
//!   (`INSERT ... SELECT`, `EXISTS (...)`, `IN (...)`) without renumbering
//! - **Row mappers**: one closure both declares the select list and reads
//!   each result row
//! - **Safe defaults**: UPDATE without WHERE matches nothing, empty IN lists
//!   are constants, composition panics are returned as errors
//!
//! ## Example
//!
//! ```ignore
//! use pgsq::{Field, Query, StringField, TableInfo, values, select_from};
//!
//! let users = TableInfo::new("users");
//! let name = StringField::new("name", &users);
//! let email = StringField::new("email", &users);
//!
//! // VALUES ($1, $2), ($3, $4)
//! let (sql, args) = values()
//!     .values(("aaa", "aaa@example.com"))
//!     .values(("bbb", "bbb@example.com"))
//!     .to_sql()?;
//!
//! // SELECT users.name, users.email FROM users WHERE users.name LIKE $1
//! let rows = select_from(&users)
//!     .where_(name.like("a%"))
//!     .selectx(|row| (row.string(&name), row.string(&email)))
//!     .fetch_all(&client)
//!     .await?;
//! ```

pub mod config;
pub mod cursor;
pub mod error;
pub mod expr;
pub mod field;
pub mod ident;
pub mod param;
pub mod pg;
pub mod placeholder;
pub mod predicate;
pub mod query;
pub mod row;

pub use config::RenderConfig;
pub use cursor::{
    ArrayElement, Cursor, Destination, Discard, Driver, Elem, FromSqlValue, Recorded, ScanKind,
    SqlValue, Target, VecCursor, VecDriver,
};
pub use error::{SqError, SqResult};
pub use expr::{CustomExpr, Fragment, Named, Raw, SqlExpr, Value, append_list, render, value};
pub use field::{
    ArrayField, BinaryExpr, BinaryField, BooleanField, EnumField, Field, FieldInfo, FieldKind,
    JsonExpr, JsonField, NumberExpr, NumberField, StringField, Table, TableInfo, TextExpr,
    TimeExpr, TimeField,
};
pub use param::{Args, Param, ParamIndex};
pub use pg::{GenericClient, PgCursor, execute};
pub use placeholder::{Dialect, count_placeholders, translate};
pub use predicate::{
    Compare, CustomPredicate, Exists, InList, InQuery, IsNull, LogicalOp, Not, Predicate,
    VariadicPredicate, and, not, or, predicate,
};
pub use query::Query;
pub use query::insert::{InsertQuery, insert_into};
pub use query::select::{Ordering, SelectQuery, SelectRowx, select_from};
pub use query::update::{UpdateQuery, update};
pub use query::values::{
    Assignment, Column, ColumnMapper, ColumnMode, IntoRowValue, RowValue, RowValues, ValuesQuery,
    values,
};
pub use row::{Row, RowShape, Slot, bind_rows, discover};
