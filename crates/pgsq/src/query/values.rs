//! Row values, the column collector and the VALUES query.

use crate::config::RenderConfig;
use crate::error::{SqError, SqResult};
use crate::expr::{SqlExpr, Value, append_list};
use crate::field::{
    BinaryField, BooleanField, Field, FieldInfo, JsonField, NumberField, StringField, TimeField,
};
use crate::param::{Args, ParamIndex};
use crate::query::Query;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// One parenthesized row: `(v1, v2, ...)`.
#[derive(Clone, Default)]
pub struct RowValue(Vec<Arc<dyn SqlExpr>>);

impl RowValue {
    /// Empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a literal argument.
    pub fn value<T: ToSql + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.0.push(Arc::new(Value::new(value)));
        self
    }

    /// Append an expression node, embedded as is.
    pub fn expr(mut self, expr: impl SqlExpr + 'static) -> Self {
        self.0.push(Arc::new(expr));
        self
    }

    fn push(&mut self, expr: Arc<dyn SqlExpr>) {
        self.0.push(expr);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl SqlExpr for RowValue {
    fn append_sql(
        &self,
        buf: &mut String,
        args: &mut Args,
        params: &mut ParamIndex,
    ) -> SqResult<()> {
        buf.push('(');
        append_list(buf, args, params, self.0.iter(), ", ")?;
        buf.push(')');
        Ok(())
    }
}

/// Conversion into a [`RowValue`].
pub trait IntoRowValue {
    fn into_row_value(self) -> RowValue;
}

impl IntoRowValue for RowValue {
    fn into_row_value(self) -> RowValue {
        self
    }
}

impl<T: ToSql + Send + Sync + 'static> IntoRowValue for Vec<T> {
    fn into_row_value(self) -> RowValue {
        self.into_iter().fold(RowValue::new(), RowValue::value)
    }
}

impl<T: ToSql + Send + Sync + 'static, const N: usize> IntoRowValue for [T; N] {
    fn into_row_value(self) -> RowValue {
        self.into_iter().fold(RowValue::new(), RowValue::value)
    }
}

macro_rules! impl_into_row_value_for_tuple {
    ($($name:ident),+) => {
        impl<$($name),+> IntoRowValue for ($($name,)+)
        where
            $($name: ToSql + Send + Sync + 'static),+
        {
            #[allow(non_snake_case)]
            fn into_row_value(self) -> RowValue {
                let ($($name,)+) = self;
                RowValue::new()$(.value($name))+
            }
        }
    };
}

impl_into_row_value_for_tuple!(A);
impl_into_row_value_for_tuple!(A, B);
impl_into_row_value_for_tuple!(A, B, C);
impl_into_row_value_for_tuple!(A, B, C, D);
impl_into_row_value_for_tuple!(A, B, C, D, E);
impl_into_row_value_for_tuple!(A, B, C, D, E, F);
impl_into_row_value_for_tuple!(A, B, C, D, E, F, G);
impl_into_row_value_for_tuple!(A, B, C, D, E, F, G, H);
impl_into_row_value_for_tuple!(A, B, C, D, E, F, G, H, I);
impl_into_row_value_for_tuple!(A, B, C, D, E, F, G, H, I, J);
impl_into_row_value_for_tuple!(A, B, C, D, E, F, G, H, I, J, K);
impl_into_row_value_for_tuple!(A, B, C, D, E, F, G, H, I, J, K, L);

/// Rows rendered as `(..), (..)`. Every row must have the first row's width.
#[derive(Clone, Default)]
pub struct RowValues(Vec<RowValue>);

impl RowValues {
    /// Empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row.
    pub fn push(&mut self, row: RowValue) {
        self.0.push(row);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Width of the first row.
    pub fn arity(&self) -> Option<usize> {
        self.0.first().map(RowValue::len)
    }

    fn check_arity(&self) -> SqResult<()> {
        let Some(expected) = self.arity() else {
            return Err(SqError::composition("VALUES requires at least one row"));
        };
        if let Some((row, got)) = self
            .0
            .iter()
            .map(RowValue::len)
            .enumerate()
            .find(|&(_, len)| len != expected)
        {
            return Err(SqError::RowArity { row, expected, got });
        }
        Ok(())
    }
}

impl From<Vec<RowValue>> for RowValues {
    fn from(rows: Vec<RowValue>) -> Self {
        RowValues(rows)
    }
}

impl SqlExpr for RowValues {
    fn append_sql(
        &self,
        buf: &mut String,
        args: &mut Args,
        params: &mut ParamIndex,
    ) -> SqResult<()> {
        self.check_arity()?;
        append_list(buf, args, params, self.0.iter(), ", ")
    }
}

/// `column = value`, as written in UPDATE ... SET.
#[derive(Clone)]
pub struct Assignment {
    field: FieldInfo,
    value: Arc<dyn SqlExpr>,
}

impl Assignment {
    /// Assign `value` to `field`.
    pub fn new(field: FieldInfo, value: impl SqlExpr + 'static) -> Self {
        Self {
            field,
            value: Arc::new(value),
        }
    }

    /// Target column.
    pub fn field(&self) -> &FieldInfo {
        &self.field
    }
}

impl SqlExpr for Assignment {
    fn append_sql(
        &self,
        buf: &mut String,
        args: &mut Args,
        params: &mut ParamIndex,
    ) -> SqResult<()> {
        self.field.write_name(buf);
        buf.push_str(" = ");
        self.value.append_sql(buf, args, params)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnMode {
    /// Collect a column list and rows of values.
    Insert,
    /// Collect `column = value` assignments.
    Update,
}

/// Collector handed to column mappers.
///
/// In insert mode the first row ends when its first field is set again; every
/// later row ends after as many values as the first row had. The first
/// invalid call is kept and reported when the collector is finished.
pub struct Column {
    mode: ColumnMode,
    fields: Vec<FieldInfo>,
    rows: RowValues,
    current: RowValue,
    first_row_done: bool,
    assignments: Vec<Assignment>,
    error: Option<SqError>,
}

/// A fallible callback that fills a [`Column`].
pub type ColumnMapper = Arc<dyn Fn(&mut Column) -> SqResult<()> + Send + Sync>;

/// Output of an insert-mode collector.
pub(crate) struct CollectedRows {
    pub(crate) fields: Vec<FieldInfo>,
    pub(crate) rows: RowValues,
}

impl Column {
    /// Mapper target collecting rows (insert mode) or assignments (update mode).
    pub fn new(mode: ColumnMode) -> Self {
        Self {
            mode,
            fields: Vec::new(),
            rows: RowValues::new(),
            current: RowValue::new(),
            first_row_done: false,
            assignments: Vec::new(),
            error: None,
        }
    }

    /// Whether this mapper builds rows or assignments.
    pub fn mode(&self) -> ColumnMode {
        self.mode
    }

    /// Set `field` to a literal value.
    pub fn set<F: Field, T: ToSql + Send + Sync + 'static>(&mut self, field: &F, value: T) {
        self.set_expr(field, Value::new(value));
    }

    /// Set `field` to an expression.
    pub fn set_expr<F: Field>(&mut self, field: &F, expr: impl SqlExpr + 'static) {
        if self.error.is_some() {
            return;
        }
        let info = field.info();
        match self.mode {
            ColumnMode::Update => self.assignments.push(Assignment::new(info.clone(), expr)),
            ColumnMode::Insert => {
                if let Err(err) = self.insert(info, Arc::new(expr)) {
                    self.error = Some(err);
                }
            }
        }
    }

    pub fn set_bool(&mut self, field: &BooleanField, value: bool) {
        self.set(field, value);
    }

    pub fn set_i32(&mut self, field: &NumberField, value: i32) {
        self.set(field, value);
    }

    /// Typed shorthand for [`Column::set`].
    pub fn set_i64(&mut self, field: &NumberField, value: i64) {
        self.set(field, value);
    }

    pub fn set_f64(&mut self, field: &NumberField, value: f64) {
        self.set(field, value);
    }

    /// Typed shorthand for [`Column::set`].
    pub fn set_string(&mut self, field: &StringField, value: impl Into<String>) {
        self.set(field, value.into());
    }

    pub fn set_time(&mut self, field: &TimeField, value: DateTime<Utc>) {
        self.set(field, value);
    }

    pub fn set_json(&mut self, field: &JsonField, value: serde_json::Value) {
        self.set(field, value);
    }

    pub fn set_bytes(&mut self, field: &BinaryField, value: Vec<u8>) {
        self.set(field, value);
    }

    fn insert(&mut self, info: &FieldInfo, expr: Arc<dyn SqlExpr>) -> SqResult<()> {
        if !self.first_row_done {
            if self.fields.first() == Some(info) {
                self.first_row_done = true;
                self.rows.push(std::mem::take(&mut self.current));
            } else if self.fields.contains(info) {
                return Err(SqError::composition(format!(
                    "column {} set twice in the first row",
                    info.name()
                )));
            } else {
                self.fields.push(info.clone());
                self.current.push(expr);
                return Ok(());
            }
        }

        let expected = &self.fields[self.current.len()];
        if expected != info {
            return Err(SqError::composition(format!(
                "column {} set out of order in row {}: expected {}",
                info.name(),
                self.rows.len(),
                expected.name()
            )));
        }
        self.current.push(expr);
        if self.current.len() == self.fields.len() {
            self.rows.push(std::mem::take(&mut self.current));
        }
        Ok(())
    }

    /// Finish an insert-mode collection.
    pub(crate) fn into_rows(mut self) -> SqResult<CollectedRows> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        if !self.current.is_empty() {
            if self.first_row_done {
                return Err(SqError::RowArity {
                    row: self.rows.len(),
                    expected: self.fields.len(),
                    got: self.current.len(),
                });
            }
            self.rows.push(std::mem::take(&mut self.current));
        }
        Ok(CollectedRows {
            fields: self.fields,
            rows: self.rows,
        })
    }

    /// Finish an update-mode collection.
    pub(crate) fn into_assignments(mut self) -> SqResult<Vec<Assignment>> {
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(self.assignments),
        }
    }
}

/// Run `mapper` in insert mode.
pub(crate) fn collect_rows(mapper: &ColumnMapper) -> SqResult<CollectedRows> {
    let mut col = Column::new(ColumnMode::Insert);
    mapper(&mut col)?;
    col.into_rows()
}

/// Run `mapper` in update mode.
pub(crate) fn collect_assignments(mapper: &ColumnMapper) -> SqResult<Vec<Assignment>> {
    let mut col = Column::new(ColumnMode::Update);
    mapper(&mut col)?;
    col.into_assignments()
}

/// A `VALUES` list usable as a statement or embedded in another one.
#[derive(Clone, Default)]
pub struct ValuesQuery {
    nested: bool,
    row_values: RowValues,
    mapper: Option<ColumnMapper>,
    config: RenderConfig,
}

/// Start a VALUES query.
pub fn values() -> ValuesQuery {
    ValuesQuery::default()
}

impl ValuesQuery {
    /// Same as [`values`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row.
    pub fn values(mut self, row: impl IntoRowValue) -> Self {
        self.row_values.push(row.into_row_value());
        self
    }

    /// Produce rows from a column mapper. Replaces rows added with `values`.
    pub fn valuesx<F>(mut self, mapper: F) -> Self
    where
        F: Fn(&mut Column) -> SqResult<()> + Send + Sync + 'static,
    {
        self.mapper = Some(Arc::new(mapper));
        self
    }

    /// Mark as embedded: `to_sql` returns neutral text.
    pub fn nest_this(mut self) -> Self {
        self.nested = true;
        self
    }

    pub fn config(mut self, config: RenderConfig) -> Self {
        self.config = config;
        self
    }
}

impl SqlExpr for ValuesQuery {
    fn append_sql(
        &self,
        buf: &mut String,
        args: &mut Args,
        params: &mut ParamIndex,
    ) -> SqResult<()> {
        buf.push_str("VALUES ");
        match &self.mapper {
            Some(mapper) => collect_rows(mapper)?.rows.append_sql(buf, args, params),
            None => self.row_values.append_sql(buf, args, params),
        }
    }
}

impl Query for ValuesQuery {
    fn is_nested(&self) -> bool {
        self.nested
    }

    fn render_config(&self) -> &RenderConfig {
        &self.config
    }

    fn query_type(&self) -> &'static str {
        "values"
    }
}
