//! Tables, typed column references and field kinds.

use crate::cursor::ScanKind;
use crate::error::SqResult;
use crate::expr::{CustomExpr, Fragment, SqlExpr, Value};
use crate::ident::write_ident;
use crate::param::{Args, ParamIndex};
use crate::predicate::{Compare, CustomPredicate, InList, IsNull, Predicate};
use crate::query::select::Ordering;
use crate::query::values::Assignment;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// A table reference: optional schema, name, optional alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    schema: Option<String>,
    name: String,
    alias: Option<String>,
}

impl TableInfo {
    /// Unqualified table reference.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
            alias: None,
        }
    }

    /// Qualify the table with a schema (`schema.table`).
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Refer to the table by `alias` in every column reference.
    pub fn as_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name columns of this table are qualified with: the alias if set, else
    /// the table name.
    pub fn qualifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Renders `schema.name`; the alias is written by the enclosing clause.
impl SqlExpr for TableInfo {
    fn append_sql(
        &self,
        buf: &mut String,
        _args: &mut Args,
        _params: &mut ParamIndex,
    ) -> SqResult<()> {
        if let Some(schema) = &self.schema {
            write_ident(buf, schema);
            buf.push('.');
        }
        write_ident(buf, &self.name);
        Ok(())
    }

    fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }
}

/// Implemented by generated table structs.
pub trait Table: Send + Sync {
    fn table_info(&self) -> &TableInfo;
}

impl Table for TableInfo {
    fn table_info(&self) -> &TableInfo {
        self
    }
}

/// Column identity shared by every typed field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    table: Option<String>,
    name: String,
    alias: Option<String>,
}

impl FieldInfo {
    /// Column `name` qualified by `table`'s name or alias.
    pub fn new(name: impl Into<String>, table: &TableInfo) -> Self {
        Self {
            table: Some(table.qualifier().to_string()),
            name: name.into(),
            alias: None,
        }
    }

    /// Column written without a table qualifier.
    pub fn unqualified(name: impl Into<String>) -> Self {
        Self {
            table: None,
            name: name.into(),
            alias: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table name or alias used to qualify the column, if any.
    pub fn qualifier(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    fn write(&self, buf: &mut String) {
        if let Some(table) = &self.table {
            write_ident(buf, table);
            buf.push('.');
        }
        write_ident(buf, &self.name);
    }

    /// Write the bare column name, as used in INSERT column lists and SET.
    pub(crate) fn write_name(&self, buf: &mut String) {
        write_ident(buf, &self.name);
    }
}

/// Closed set of column kinds known to the binder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Boolean,
    Number,
    Text,
    Time,
    Enum,
    Binary,
    Json,
    Array,
}

impl FieldKind {
    /// Classify a catalog type name.
    ///
    /// Accepts both the bare type (`varchar`) and the full column type
    /// (`varchar(255)`); `tinyint(1)` is a boolean.
    pub fn from_raw_type(raw: &str) -> Option<FieldKind> {
        let raw = raw.trim().to_ascii_lowercase();
        if raw == "tinyint(1)" {
            return Some(FieldKind::Boolean);
        }
        if raw.ends_with("[]") || raw == "array" || raw.starts_with('_') {
            return Some(FieldKind::Array);
        }
        let base = raw.split('(').next().unwrap_or_default().trim();

        let kind = match base {
            "bool" | "boolean" => FieldKind::Boolean,
            b if b.starts_with("json") => FieldKind::Json,
            "decimal" | "numeric" | "float" | "double" | "double precision" | "real" | "float4"
            | "float8" | "integer" | "int" | "int2" | "int4" | "int8" | "smallint" | "tinyint"
            | "mediumint" | "bigint" | "serial" | "bigserial" | "smallserial" => FieldKind::Number,
            "tinytext" | "text" | "mediumtext" | "longtext" | "char" | "character" | "varchar"
            | "character varying" | "bpchar" | "citext" | "name" | "uuid" => FieldKind::Text,
            b if b == "date"
                || b == "datetime"
                || b.starts_with("time")
                || b.starts_with("timestamp") =>
            {
                FieldKind::Time
            }
            "enum" | "user-defined" => FieldKind::Enum,
            "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" | "bytea" => {
                FieldKind::Binary
            }
            _ => return None,
        };
        Some(kind)
    }

    /// Scratch slot shape the binder reserves for this kind.
    pub fn scan_kind(self) -> ScanKind {
        match self {
            FieldKind::Boolean => ScanKind::Bool,
            FieldKind::Number => ScanKind::Float64,
            FieldKind::Text | FieldKind::Enum => ScanKind::Text,
            FieldKind::Time => ScanKind::Time,
            FieldKind::Binary => ScanKind::Bytes,
            FieldKind::Json => ScanKind::Json,
            FieldKind::Array => ScanKind::Any,
        }
    }
}

/// A typed column reference.
///
/// Comparison methods build predicates; `set` builds a column assignment for
/// insert and update mappers.
pub trait Field: SqlExpr + Clone + 'static {
    const KIND: FieldKind;

    fn info(&self) -> &FieldInfo;

    fn name(&self) -> &str {
        self.info().name()
    }

    fn eq<T: ToSql + Send + Sync + 'static>(&self, value: T) -> Compare {
        Compare::new(self.clone(), "=", Value::new(value))
    }

    fn ne<T: ToSql + Send + Sync + 'static>(&self, value: T) -> Compare {
        Compare::new(self.clone(), "<>", Value::new(value))
    }

    fn gt<T: ToSql + Send + Sync + 'static>(&self, value: T) -> Compare {
        Compare::new(self.clone(), ">", Value::new(value))
    }

    fn ge<T: ToSql + Send + Sync + 'static>(&self, value: T) -> Compare {
        Compare::new(self.clone(), ">=", Value::new(value))
    }

    fn lt<T: ToSql + Send + Sync + 'static>(&self, value: T) -> Compare {
        Compare::new(self.clone(), "<", Value::new(value))
    }

    fn le<T: ToSql + Send + Sync + 'static>(&self, value: T) -> Compare {
        Compare::new(self.clone(), "<=", Value::new(value))
    }

    /// Compare against another column or expression.
    fn eq_expr(&self, other: impl SqlExpr + 'static) -> Compare {
        Compare::new(self.clone(), "=", other)
    }

    fn eq_field<F: Field>(&self, other: &F) -> Compare {
        Compare::new(self.clone(), "=", other.clone())
    }

    fn in_list<T, I>(&self, values: I) -> InList
    where
        T: ToSql + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
    {
        InList::new(self.clone(), values, false)
    }

    fn not_in_list<T, I>(&self, values: I) -> InList
    where
        T: ToSql + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
    {
        InList::new(self.clone(), values, true)
    }

    fn is_null(&self) -> IsNull {
        IsNull::new(self.clone(), false)
    }

    fn is_not_null(&self) -> IsNull {
        IsNull::new(self.clone(), true)
    }

    fn asc(&self) -> Ordering {
        Ordering::asc(self.clone())
    }

    fn desc(&self) -> Ordering {
        Ordering::desc(self.clone())
    }

    fn set<T: ToSql + Send + Sync + 'static>(&self, value: T) -> Assignment {
        Assignment::new(self.info().clone(), Value::new(value))
    }

    fn set_expr(&self, expr: impl SqlExpr + 'static) -> Assignment {
        Assignment::new(self.info().clone(), expr)
    }
}

macro_rules! typed_field {
    ($(#[$meta:meta])* $name:ident => $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            info: FieldInfo,
        }

        impl $name {
            /// Column `name` of `table`.
            pub fn new(name: impl Into<String>, table: &TableInfo) -> Self {
                Self {
                    info: FieldInfo::new(name, table),
                }
            }

            /// Column written without a table qualifier.
            pub fn unqualified(name: impl Into<String>) -> Self {
                Self {
                    info: FieldInfo::unqualified(name),
                }
            }

            /// Name the column in a select list (`... AS alias`).
            pub fn as_alias(mut self, alias: impl Into<String>) -> Self {
                self.info.alias = Some(alias.into());
                self
            }
        }

        impl SqlExpr for $name {
            fn append_sql(
                &self,
                buf: &mut String,
                _args: &mut Args,
                _params: &mut ParamIndex,
            ) -> SqResult<()> {
                self.info.write(buf);
                Ok(())
            }

            fn alias(&self) -> Option<&str> {
                self.info.alias()
            }
        }

        impl Field for $name {
            const KIND: FieldKind = $kind;

            fn info(&self) -> &FieldInfo {
                &self.info
            }
        }
    };
}

typed_field!(
    /// A boolean column. Usable directly as a predicate.
    BooleanField => FieldKind::Boolean
);
typed_field!(
    /// An integer or floating-point column.
    NumberField => FieldKind::Number
);
typed_field!(StringField => FieldKind::Text);
typed_field!(TimeField => FieldKind::Time);
typed_field!(
    /// An enum column, read and compared as text.
    EnumField => FieldKind::Enum
);
typed_field!(BinaryField => FieldKind::Binary);
typed_field!(JsonField => FieldKind::Json);
typed_field!(
    /// A one-dimensional Postgres array column.
    ArrayField => FieldKind::Array
);

macro_rules! text_ops {
    ($($name:ident),*) => {
        $(
            impl $name {
                /// `field LIKE pattern`
                pub fn like<T: ToSql + Send + Sync + 'static>(&self, pattern: T) -> Compare {
                    Compare::new(self.clone(), "LIKE", Value::new(pattern))
                }

                /// `field ILIKE pattern`
                pub fn ilike<T: ToSql + Send + Sync + 'static>(&self, pattern: T) -> Compare {
                    Compare::new(self.clone(), "ILIKE", Value::new(pattern))
                }
            }
        )*
    };
}

text_ops!(StringField, EnumField);

impl BooleanField {
    /// `field IS TRUE`
    pub fn is_true(&self) -> CustomPredicate {
        CustomPredicate::new("? IS TRUE").expr(self.clone())
    }

    /// `field IS FALSE`
    pub fn is_false(&self) -> CustomPredicate {
        CustomPredicate::new("? IS FALSE").expr(self.clone())
    }
}

impl Predicate for BooleanField {}

impl JsonField {
    /// `field ?? key`: top-level key exists.
    pub fn has_key(&self, key: impl Into<String>) -> CustomPredicate {
        CustomPredicate::new("? ?? ?").expr(self.clone()).arg(key.into())
    }
}

/// Expressions readable as numbers.
pub trait NumberExpr: SqlExpr {}
/// Expressions readable as text.
pub trait TextExpr: SqlExpr {}
/// Expressions readable as timestamps.
pub trait TimeExpr: SqlExpr {}
/// Expressions readable as bytes.
pub trait BinaryExpr: SqlExpr {}
/// Expressions readable as JSON.
pub trait JsonExpr: SqlExpr {}

impl NumberExpr for NumberField {}
impl TextExpr for StringField {}
impl TextExpr for EnumField {}
impl TimeExpr for TimeField {}
impl BinaryExpr for BinaryField {}
impl JsonExpr for JsonField {}

macro_rules! untyped_escape_hatch {
    ($($ty:ty),*) => {
        $(
            impl NumberExpr for $ty {}
            impl TextExpr for $ty {}
            impl TimeExpr for $ty {}
            impl BinaryExpr for $ty {}
            impl JsonExpr for $ty {}
            impl Predicate for $ty {}
        )*
    };
}

untyped_escape_hatch!(CustomExpr, Fragment);

impl<T: NumberExpr + ?Sized> NumberExpr for Arc<T> {}
impl<T: TextExpr + ?Sized> TextExpr for Arc<T> {}
