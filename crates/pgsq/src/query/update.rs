//! UPDATE query.

use crate::config::RenderConfig;
use crate::error::{SqError, SqResult};
use crate::expr::{SqlExpr, append_list};
use crate::field::{Table, TableInfo};
use crate::param::{Args, ParamIndex};
use crate::predicate::Predicate;
use crate::query::Query;
use crate::query::select::{write_select_list, write_table, write_where};
use crate::query::values::{Assignment, Column, ColumnMapper, collect_assignments};
use std::sync::Arc;

/// UPDATE query builder.
///
/// Without a WHERE clause the statement matches no rows (`WHERE 1 = 0`)
/// unless [`UpdateQuery::allow_all`] is called.
#[derive(Clone)]
pub struct UpdateQuery {
    nested: bool,
    table: TableInfo,
    assignments: Vec<Assignment>,
    mapper: Option<ColumnMapper>,
    where_: Vec<Arc<dyn SqlExpr>>,
    allow_all: bool,
    returning: Vec<Arc<dyn SqlExpr>>,
    config: RenderConfig,
}

/// Start an UPDATE of `table`.
pub fn update(table: &impl Table) -> UpdateQuery {
    UpdateQuery::new(table)
}

impl UpdateQuery {
    /// UPDATE of `table` with no assignments yet.
    pub fn new(table: &impl Table) -> Self {
        Self {
            nested: false,
            table: table.table_info().clone(),
            assignments: Vec::new(),
            mapper: None,
            where_: Vec::new(),
            allow_all: false,
            returning: Vec::new(),
            config: RenderConfig::default(),
        }
    }

    /// Add a `column = value` assignment.
    pub fn set(mut self, assignment: Assignment) -> Self {
        self.assignments.push(assignment);
        self
    }

    /// Collect assignments from a column mapper, after those added with `set`.
    pub fn setx<F>(mut self, mapper: F) -> Self
    where
        F: Fn(&mut Column) -> SqResult<()> + Send + Sync + 'static,
    {
        self.mapper = Some(Arc::new(mapper));
        self
    }

    /// Add a condition; conditions are ANDed.
    pub fn where_(mut self, predicate: impl Predicate + 'static) -> Self {
        self.where_.push(Arc::new(predicate));
        self
    }

    /// Permit an UPDATE without WHERE to touch every row.
    pub fn allow_all(mut self) -> Self {
        self.allow_all = true;
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

impl SqlExpr for UpdateQuery {
    fn append_sql(
        &self,
        buf: &mut String,
        args: &mut Args,
        params: &mut ParamIndex,
    ) -> SqResult<()> {
        let mapped = match &self.mapper {
            Some(mapper) => collect_assignments(mapper)?,
            None => Vec::new(),
        };
        if self.assignments.is_empty() && mapped.is_empty() {
            return Err(SqError::composition("UPDATE requires at least one assignment"));
        }

        buf.push_str("UPDATE ");
        write_table(buf, args, params, &self.table)?;
        buf.push_str(" SET ");
        append_list(
            buf,
            args,
            params,
            self.assignments.iter().chain(mapped.iter()),
            ", ",
        )?;

        if self.where_.is_empty() {
            if !self.allow_all {
                buf.push_str(" WHERE 1 = 0");
            }
        } else {
            write_where(buf, args, params, &self.where_)?;
        }

        if !self.returning.is_empty() {
            buf.push_str(" RETURNING ");
            write_select_list(buf, args, params, self.returning.iter())?;
        }
        Ok(())
    }
}

impl Query for UpdateQuery {
    fn is_nested(&self) -> bool {
        self.nested
    }

    fn render_config(&self) -> &RenderConfig {
        &self.config
    }

    fn query_type(&self) -> &'static str {
        "update"
    }
}
