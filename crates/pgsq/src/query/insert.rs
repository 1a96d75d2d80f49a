//! INSERT query.

use crate::config::RenderConfig;
use crate::error::{SqError, SqResult};
use crate::expr::SqlExpr;
use crate::field::{Field, FieldInfo, Table, TableInfo};
use crate::param::{Args, ParamIndex};
use crate::query::select::{write_select_list, write_table};
use crate::query::values::{Column, IntoRowValue, RowValues, collect_rows};
use crate::query::{Query, values::ColumnMapper};
use std::sync::Arc;

/// INSERT query builder.
///
/// The row source is, in order of precedence: a column mapper, a nested
/// query, rows added with [`InsertQuery::values`]. With none of them the
/// statement is `INSERT INTO t DEFAULT VALUES`.
#[derive(Clone)]
pub struct InsertQuery {
    nested: bool,
    table: TableInfo,
    columns: Vec<FieldInfo>,
    rows: RowValues,
    mapper: Option<ColumnMapper>,
    select: Option<Arc<dyn SqlExpr>>,
    returning: Vec<Arc<dyn SqlExpr>>,
    config: RenderConfig,
}

/// Start an INSERT into `table`.
pub fn insert_into(table: &impl Table) -> InsertQuery {
    InsertQuery::new(table)
}

impl InsertQuery {
    /// INSERT into `table` with no columns yet.
    pub fn new(table: &impl Table) -> Self {
        Self {
            nested: false,
            table: table.table_info().clone(),
            columns: Vec::new(),
            rows: RowValues::new(),
            mapper: None,
            select: None,
            returning: Vec::new(),
            config: RenderConfig::default(),
        }
    }

    /// Append a column to the column list.
    pub fn column<F: Field>(mut self, field: &F) -> Self {
        self.columns.push(field.info().clone());
        self
    }

    /// Append a row of values.
    pub fn values(mut self, row: impl IntoRowValue) -> Self {
        self.rows.push(row.into_row_value());
        self
    }

    /// Let a column mapper decide both the column list and the rows.
    pub fn valuesx<F>(mut self, mapper: F) -> Self
    where
        F: Fn(&mut Column) -> SqResult<()> + Send + Sync + 'static,
    {
        self.mapper = Some(Arc::new(mapper));
        self
    }

    /// `INSERT INTO t (...) SELECT ...`
    pub fn select(mut self, query: impl Query + 'static) -> Self {
        self.select = Some(Arc::new(query));
        self
    }

    /// Append an expression to the RETURNING list.
    pub fn returning(mut self, expr: impl SqlExpr + 'static) -> Self {
        self.returning.push(Arc::new(expr));
        self
    }

    /// Mark as embedded; `to_sql` then returns neutral text.
    pub fn nest_this(mut self) -> Self {
        self.nested = true;
        self
    }

    /// Replace the render configuration.
    pub fn config(mut self, config: RenderConfig) -> Self {
        self.config = config;
        self
    }
}

fn write_columns(buf: &mut String, columns: &[FieldInfo]) {
    if columns.is_empty() {
        return;
    }
    buf.push_str(" (");
    for (i, col) in columns.iter().enumerate() {
        if i > 0 {
            buf.push_str(", ");
        }
        col.write_name(buf);
    }
    buf.push(')');
}

impl SqlExpr for InsertQuery {
    fn append_sql(
        &self,
        buf: &mut String,
        args: &mut Args,
        params: &mut ParamIndex,
    ) -> SqResult<()> {
        buf.push_str("INSERT INTO ");
        write_table(buf, args, params, &self.table)?;

        if let Some(mapper) = &self.mapper {
            let collected = collect_rows(mapper)?;
            write_columns(buf, &collected.fields);
            buf.push_str(" VALUES ");
            collected.rows.append_sql(buf, args, params)?;
        } else if let Some(select) = &self.select {
            write_columns(buf, &self.columns);
            buf.push(' ');
            select.append_sql(buf, args, params)?;
        } else if !self.rows.is_empty() {
            if let Some(arity) = self.rows.arity() {
                if !self.columns.is_empty() && arity != self.columns.len() {
                    return Err(SqError::RowArity {
                        row: 0,
                        expected: self.columns.len(),
                        got: arity,
                    });
                }
            }
            write_columns(buf, &self.columns);
            buf.push_str(" VALUES ");
            self.rows.append_sql(buf, args, params)?;
        } else if self.columns.is_empty() {
            buf.push_str(" DEFAULT VALUES");
        } else {
            return Err(SqError::composition(
                "INSERT has a column list but no rows",
            ));
        }

        if !self.returning.is_empty() {
            buf.push_str(" RETURNING ");
            write_select_list(buf, args, params, self.returning.iter())?;
        }
        Ok(())
    }
}

impl Query for InsertQuery {
    fn is_nested(&self) -> bool {
        self.nested
    }

    fn render_config(&self) -> &RenderConfig {
        &self.config
    }

    fn query_type(&self) -> &'static str {
        "insert"
    }
}
