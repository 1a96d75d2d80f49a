//! SELECT query and its row-mapper form.

use crate::config::RenderConfig;
use crate::cursor::Driver;
use crate::error::SqResult;
use crate::expr::{SqlExpr, append_list};
use crate::field::{Table, TableInfo};
use crate::ident::write_ident;
use crate::param::{Args, ParamIndex};
use crate::pg::{GenericClient, PgCursor};
use crate::predicate::Predicate;
use crate::query::{Query, finalize};
use crate::row::{Row, RowShape, bind_rows_at, discover};
use std::marker::PhantomData;
use std::panic::Location;
use std::sync::Arc;

/// `expr ASC` / `expr DESC`
#[derive(Clone)]
pub struct Ordering {
    expr: Arc<dyn SqlExpr>,
    desc: bool,
}

impl Ordering {
    pub fn asc(expr: impl SqlExpr + 'static) -> Self {
        Self {
            expr: Arc::new(expr),
            desc: false,
        }
    }

    pub fn desc(expr: impl SqlExpr + 'static) -> Self {
        Self {
            expr: Arc::new(expr),
            desc: true,
        }
    }
}

impl SqlExpr for Ordering {
    fn append_sql(
        &self,
        buf: &mut String,
        args: &mut Args,
        params: &mut ParamIndex,
    ) -> SqResult<()> {
        self.expr.append_sql(buf, args, params)?;
        buf.push_str(if self.desc { " DESC" } else { " ASC" });
        Ok(())
    }
}

#[derive(Clone)]
struct Join {
    keyword: &'static str,
    table: TableInfo,
    on: Arc<dyn SqlExpr>,
}

/// Write `schema.name AS alias`.
pub(crate) fn write_table(
    buf: &mut String,
    args: &mut Args,
    params: &mut ParamIndex,
    table: &TableInfo,
) -> SqResult<()> {
    table.append_sql(buf, args, params)?;
    if let Some(alias) = SqlExpr::alias(table) {
        buf.push_str(" AS ");
        write_ident(buf, alias);
    }
    Ok(())
}

/// Write a select list, `AS alias` included.
pub(crate) fn write_select_list<'a, E, I>(
    buf: &mut String,
    args: &mut Args,
    params: &mut ParamIndex,
    items: I,
) -> SqResult<()>
where
    E: SqlExpr + ?Sized + 'a,
    I: IntoIterator<Item = &'a E>,
{
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            buf.push_str(", ");
        }
        item.append_sql(buf, args, params)?;
        if let Some(alias) = item.alias() {
            buf.push_str(" AS ");
            write_ident(buf, alias);
        }
    }
    Ok(())
}

/// Write predicates joined with AND, without outer parentheses.
pub(crate) fn write_where(
    buf: &mut String,
    args: &mut Args,
    params: &mut ParamIndex,
    predicates: &[Arc<dyn SqlExpr>],
) -> SqResult<()> {
    if predicates.is_empty() {
        return Ok(());
    }
    buf.push_str(" WHERE ");
    append_list(buf, args, params, predicates.iter(), " AND ")
}

/// SELECT query builder.
#[derive(Clone, Default)]
pub struct SelectQuery {
    nested: bool,
    distinct: bool,
    fields: Vec<Arc<dyn SqlExpr>>,
    from: Option<TableInfo>,
    joins: Vec<Join>,
    where_: Vec<Arc<dyn SqlExpr>>,
    group_by: Vec<Arc<dyn SqlExpr>>,
    order_by: Vec<Ordering>,
    limit: Option<i64>,
    offset: Option<i64>,
    config: RenderConfig,
}

/// Start a SELECT from `table`.
pub fn select_from(table: &impl Table) -> SelectQuery {
    SelectQuery::new().from(table)
}

impl SelectQuery {
    /// SELECT with no source; renders `SELECT 1` until fields are added.
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== FROM / JOIN ====================

    /// Set the FROM table.
    pub fn from(mut self, table: &impl Table) -> Self {
        self.from = Some(table.table_info().clone());
        self
    }

    /// `JOIN table ON on`
    pub fn join(mut self, table: &impl Table, on: impl Predicate + 'static) -> Self {
        self.joins.push(Join {
            keyword: "JOIN",
            table: table.table_info().clone(),
            on: Arc::new(on),
        });
        self
    }

    /// `LEFT JOIN table ON on`
    pub fn left_join(mut self, table: &impl Table, on: impl Predicate + 'static) -> Self {
        self.joins.push(Join {
            keyword: "LEFT JOIN",
            table: table.table_info().clone(),
            on: Arc::new(on),
        });
        self
    }

    // ==================== SELECT list ====================

    /// Append one expression to the select list.
    pub fn select(mut self, expr: impl SqlExpr + 'static) -> Self {
        self.fields.push(Arc::new(expr));
        self
    }

    /// Render `SELECT DISTINCT`.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Derive the select list from a row mapper.
    ///
    /// The mapper runs once in discovery mode to collect the fields it reads;
    /// those fields replace any select list set with [`SelectQuery::select`].
    pub fn selectx<F, T>(self, mapper: F) -> SelectRowx<F, T>
    where
        F: Fn(&mut Row<'_>) -> T + Send + Sync,
    {
        SelectRowx {
            query: self,
            mapper,
            _marker: PhantomData,
        }
    }

    // ==================== WHERE / GROUP / ORDER ====================

    /// Add a condition; conditions are ANDed.
    pub fn where_(mut self, predicate: impl Predicate + 'static) -> Self {
        self.where_.push(Arc::new(predicate));
        self
    }

    pub fn group_by(mut self, expr: impl SqlExpr + 'static) -> Self {
        self.group_by.push(Arc::new(expr));
        self
    }

    /// Append an ORDER BY term.
    pub fn order_by(mut self, ordering: Ordering) -> Self {
        self.order_by.push(ordering);
        self
    }

    // ==================== Pagination ====================

    /// Bind `n` as the LIMIT.
    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Bind `n` as the OFFSET.
    pub fn offset(mut self, n: i64) -> Self {
        self.offset = Some(n);
        self
    }

    // ==================== Rendering ====================

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

    fn append_with_fields<E: SqlExpr>(
        &self,
        buf: &mut String,
        args: &mut Args,
        params: &mut ParamIndex,
        fields: &[E],
    ) -> SqResult<()> {
        buf.push_str("SELECT ");
        if self.distinct {
            buf.push_str("DISTINCT ");
        }
        if fields.is_empty() {
            buf.push('1');
        } else {
            write_select_list(buf, args, params, fields.iter())?;
        }

        if let Some(from) = &self.from {
            buf.push_str(" FROM ");
            write_table(buf, args, params, from)?;
        }
        for join in &self.joins {
            buf.push(' ');
            buf.push_str(join.keyword);
            buf.push(' ');
            write_table(buf, args, params, &join.table)?;
            buf.push_str(" ON ");
            join.on.append_sql(buf, args, params)?;
        }

        write_where(buf, args, params, &self.where_)?;

        if !self.group_by.is_empty() {
            buf.push_str(" GROUP BY ");
            append_list(buf, args, params, self.group_by.iter(), ", ")?;
        }
        if !self.order_by.is_empty() {
            buf.push_str(" ORDER BY ");
            append_list(buf, args, params, self.order_by.iter(), ", ")?;
        }
        if let Some(limit) = self.limit {
            args.push(limit);
            buf.push_str(" LIMIT ?");
        }
        if let Some(offset) = self.offset {
            args.push(offset);
            buf.push_str(" OFFSET ?");
        }
        Ok(())
    }
}

impl SqlExpr for SelectQuery {
    fn append_sql(
        &self,
        buf: &mut String,
        args: &mut Args,
        params: &mut ParamIndex,
    ) -> SqResult<()> {
        self.append_with_fields(buf, args, params, &self.fields)
    }
}

impl Query for SelectQuery {
    fn is_nested(&self) -> bool {
        self.nested
    }

    fn render_config(&self) -> &RenderConfig {
        &self.config
    }

    fn query_type(&self) -> &'static str {
        "select"
    }
}

/// A SELECT whose list comes from a row mapper.
pub struct SelectRowx<F, T> {
    query: SelectQuery,
    mapper: F,
    _marker: PhantomData<fn() -> T>,
}

impl<F, T> SelectRowx<F, T>
where
    F: Fn(&mut Row<'_>) -> T + Send + Sync,
{
    /// Mark as embedded; `to_sql` then returns neutral text.
    pub fn nest_this(mut self) -> Self {
        self.query.nested = true;
        self
    }

    /// Replace the render configuration.
    pub fn config(mut self, config: RenderConfig) -> Self {
        self.query.config = config;
        self
    }

    /// Discover the fields, then render the statement around them.
    fn compose(&self) -> SqResult<(String, Args, RowShape)> {
        finalize(
            &self.query.config,
            self.query.nested,
            "select",
            |buf, args, params| {
                let shape = discover(&self.mapper)?;
                self.query
                    .append_with_fields(buf, args, params, shape.fields())?;
                Ok(shape)
            },
        )
    }

    /// Run the statement through `driver` and map every row.
    ///
    /// Scan failures report the caller's location.
    #[track_caller]
    pub fn fetch<D: Driver>(&self, driver: &mut D) -> SqResult<Vec<T>> {
        let location = Location::caller();
        let (sql, args, shape) = self.compose()?;
        let mut cursor = driver.query(&sql, &args)?;
        bind_rows_at(&mut cursor, shape, &self.mapper, location)
    }

    /// Like [`SelectRowx::fetch`] but keeps only the first row.
    #[track_caller]
    pub fn fetch_one<D: Driver>(&self, driver: &mut D) -> SqResult<Option<T>> {
        Ok(self.fetch(driver)?.into_iter().next())
    }

    /// Run the statement on a tokio-postgres client and map every row.
    #[track_caller]
    pub fn fetch_all<C: GenericClient>(
        &self,
        client: &C,
    ) -> impl std::future::Future<Output = SqResult<Vec<T>>> {
        let location = Location::caller();
        async move {
            let (sql, args, shape) = self.compose()?;
            let rows = client.query(&sql, &args.as_refs()).await?;
            let mut cursor = PgCursor::new(rows);
            bind_rows_at(&mut cursor, shape, &self.mapper, location)
        }
    }
}

impl<F, T> SqlExpr for SelectRowx<F, T>
where
    F: Fn(&mut Row<'_>) -> T + Send + Sync,
{
    fn append_sql(
        &self,
        buf: &mut String,
        args: &mut Args,
        params: &mut ParamIndex,
    ) -> SqResult<()> {
        let shape = discover(&self.mapper)?;
        self.query
            .append_with_fields(buf, args, params, shape.fields())
    }
}

impl<F, T> Query for SelectRowx<F, T>
where
    F: Fn(&mut Row<'_>) -> T + Send + Sync,
{
    fn is_nested(&self) -> bool {
        self.query.nested
    }

    fn render_config(&self) -> &RenderConfig {
        &self.query.config
    }

    fn query_type(&self) -> &'static str {
        "select"
    }
}
