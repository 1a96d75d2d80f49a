//! Boolean expression nodes for WHERE clauses.
//!
//! - comparisons, IN lists and NULL checks built from fields
//! - AND/OR groups and NOT
//! - custom predicates with `?` slots
//! - EXISTS and IN over nested queries
//!
//! Grouping rules: an AND/OR group with several members renders in
//! parentheses, a single member renders bare, and an empty group renders
//! `1 = 1` (AND) or `1 = 0` (OR).

use crate::error::SqResult;
use crate::expr::{CustomExpr, SqlExpr, Value, append_list};
use crate::param::{Args, ParamIndex};
use crate::query::Query;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// A boolean-valued expression.
pub trait Predicate: SqlExpr {
    fn and<P: Predicate + 'static>(self, other: P) -> VariadicPredicate
    where
        Self: Sized + 'static,
    {
        VariadicPredicate::all().with(self).with(other)
    }

    fn or<P: Predicate + 'static>(self, other: P) -> VariadicPredicate
    where
        Self: Sized + 'static,
    {
        VariadicPredicate::any().with(self).with(other)
    }

    fn not(self) -> Not
    where
        Self: Sized + 'static,
    {
        Not::new(self)
    }
}

/// `lhs op rhs`
#[derive(Clone)]
pub struct Compare {
    lhs: Arc<dyn SqlExpr>,
    op: &'static str,
    rhs: Arc<dyn SqlExpr>,
}

impl Compare {
    /// Compare two expressions with a binary operator such as `=` or `>=`.
    pub fn new(lhs: impl SqlExpr + 'static, op: &'static str, rhs: impl SqlExpr + 'static) -> Self {
        Self {
            lhs: Arc::new(lhs),
            op,
            rhs: Arc::new(rhs),
        }
    }
}

impl SqlExpr for Compare {
    fn append_sql(
        &self,
        buf: &mut String,
        args: &mut Args,
        params: &mut ParamIndex,
    ) -> SqResult<()> {
        self.lhs.append_sql(buf, args, params)?;
        buf.push(' ');
        buf.push_str(self.op);
        buf.push(' ');
        self.rhs.append_sql(buf, args, params)
    }
}

impl Predicate for Compare {}

/// `lhs IN (?, ?, ...)` or `lhs NOT IN (...)`.
///
/// An empty list is a constant: `1 = 0` for IN, `1 = 1` for NOT IN.
#[derive(Clone)]
pub struct InList {
    lhs: Arc<dyn SqlExpr>,
    values: Vec<Value>,
    negated: bool,
}

impl InList {
    /// `lhs IN (values...)`, or `NOT IN` when `negated`.
    pub fn new<T, I>(lhs: impl SqlExpr + 'static, values: I, negated: bool) -> Self
    where
        T: ToSql + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
    {
        Self {
            lhs: Arc::new(lhs),
            values: values.into_iter().map(Value::new).collect(),
            negated,
        }
    }
}

impl SqlExpr for InList {
    fn append_sql(
        &self,
        buf: &mut String,
        args: &mut Args,
        params: &mut ParamIndex,
    ) -> SqResult<()> {
        if self.values.is_empty() {
            buf.push_str(if self.negated { "1 = 1" } else { "1 = 0" });
            return Ok(());
        }
        self.lhs.append_sql(buf, args, params)?;
        buf.push_str(if self.negated { " NOT IN (" } else { " IN (" });
        append_list(buf, args, params, self.values.iter(), ", ")?;
        buf.push(')');
        Ok(())
    }
}

impl Predicate for InList {}

/// `lhs IS NULL` or `lhs IS NOT NULL`.
#[derive(Clone)]
pub struct IsNull {
    lhs: Arc<dyn SqlExpr>,
    negated: bool,
}

impl IsNull {
    /// `lhs IS NULL`, or `IS NOT NULL` when `negated`.
    pub fn new(lhs: impl SqlExpr + 'static, negated: bool) -> Self {
        Self {
            lhs: Arc::new(lhs),
            negated,
        }
    }
}

impl SqlExpr for IsNull {
    fn append_sql(
        &self,
        buf: &mut String,
        args: &mut Args,
        params: &mut ParamIndex,
    ) -> SqResult<()> {
        self.lhs.append_sql(buf, args, params)?;
        buf.push_str(if self.negated {
            " IS NOT NULL"
        } else {
            " IS NULL"
        });
        Ok(())
    }
}

impl Predicate for IsNull {}

/// `NOT (inner)`
#[derive(Clone)]
pub struct Not(Arc<dyn SqlExpr>);

impl Not {
    /// Negate `inner`.
    pub fn new(inner: impl Predicate + 'static) -> Self {
        Not(Arc::new(inner))
    }
}

impl SqlExpr for Not {
    fn append_sql(
        &self,
        buf: &mut String,
        args: &mut Args,
        params: &mut ParamIndex,
    ) -> SqResult<()> {
        buf.push_str("NOT (");
        self.0.append_sql(buf, args, params)?;
        buf.push(')');
        Ok(())
    }
}

impl Predicate for Not {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    fn keyword(self) -> &'static str {
        match self {
            LogicalOp::And => " AND ",
            LogicalOp::Or => " OR ",
        }
    }

    fn identity(self) -> &'static str {
        match self {
            LogicalOp::And => "1 = 1",
            LogicalOp::Or => "1 = 0",
        }
    }
}

/// An AND or OR group.
#[derive(Clone)]
pub struct VariadicPredicate {
    op: LogicalOp,
    predicates: Vec<Arc<dyn SqlExpr>>,
}

impl VariadicPredicate {
    /// An empty group joined by `op`.
    pub fn new(op: LogicalOp) -> Self {
        Self {
            op,
            predicates: Vec::new(),
        }
    }

    /// An empty AND group.
    pub fn all() -> Self {
        Self::new(LogicalOp::And)
    }

    /// An empty OR group.
    pub fn any() -> Self {
        Self::new(LogicalOp::Or)
    }

    /// Add a member to the group.
    pub fn with(mut self, predicate: impl Predicate + 'static) -> Self {
        self.predicates.push(Arc::new(predicate));
        self
    }

    /// Add a member in place.
    pub fn push(&mut self, predicate: impl Predicate + 'static) {
        self.predicates.push(Arc::new(predicate));
    }

    /// Operator joining the members.
    pub fn op(&self) -> LogicalOp {
        self.op
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    /// True when the group has no members; it then renders as its identity (`1 = 1` or `1 = 0`).
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    fn extend_or_wrap(self, op: LogicalOp, other: impl Predicate + 'static) -> VariadicPredicate {
        if self.op == op {
            self.with(other)
        } else {
            VariadicPredicate::new(op).with(self).with(other)
        }
    }
}

impl SqlExpr for VariadicPredicate {
    fn append_sql(
        &self,
        buf: &mut String,
        args: &mut Args,
        params: &mut ParamIndex,
    ) -> SqResult<()> {
        match self.predicates.as_slice() {
            [] => {
                buf.push_str(self.op.identity());
                Ok(())
            }
            [only] => only.append_sql(buf, args, params),
            many => {
                buf.push('(');
                append_list(buf, args, params, many.iter(), self.op.keyword())?;
                buf.push(')');
                Ok(())
            }
        }
    }
}

impl Predicate for VariadicPredicate {
    fn and<P: Predicate + 'static>(self, other: P) -> VariadicPredicate {
        self.extend_or_wrap(LogicalOp::And, other)
    }

    fn or<P: Predicate + 'static>(self, other: P) -> VariadicPredicate {
        self.extend_or_wrap(LogicalOp::Or, other)
    }
}

/// AND of homogeneous predicates. Use [`VariadicPredicate::with`] to mix types.
pub fn and<P, I>(predicates: I) -> VariadicPredicate
where
    P: Predicate + 'static,
    I: IntoIterator<Item = P>,
{
    predicates
        .into_iter()
        .fold(VariadicPredicate::all(), |group, p| group.with(p))
}

/// OR of homogeneous predicates.
pub fn or<P, I>(predicates: I) -> VariadicPredicate
where
    P: Predicate + 'static,
    I: IntoIterator<Item = P>,
{
    predicates
        .into_iter()
        .fold(VariadicPredicate::any(), |group, p| group.with(p))
}

/// `NOT (predicate)`
pub fn not(predicate: impl Predicate + 'static) -> Not {
    Not::new(predicate)
}

/// A predicate written as a format string with `?` slots.
#[derive(Clone, Debug)]
pub struct CustomPredicate(CustomExpr);

impl CustomPredicate {
    pub fn new(format: impl Into<String>) -> Self {
        CustomPredicate(CustomExpr::new(format))
    }

    /// Fill the next slot with a literal argument.
    pub fn arg<T: ToSql + Send + Sync + 'static>(self, value: T) -> Self {
        CustomPredicate(self.0.arg(value))
    }

    /// Fill the next slot with an expression node.
    pub fn expr(self, expr: impl SqlExpr + 'static) -> Self {
        CustomPredicate(self.0.expr(expr))
    }
}

impl From<CustomExpr> for CustomPredicate {
    fn from(expr: CustomExpr) -> Self {
        CustomPredicate(expr)
    }
}

impl SqlExpr for CustomPredicate {
    fn append_sql(
        &self,
        buf: &mut String,
        args: &mut Args,
        params: &mut ParamIndex,
    ) -> SqResult<()> {
        self.0.append_sql(buf, args, params)
    }
}

impl Predicate for CustomPredicate {}

/// Shorthand for [`CustomPredicate::new`].
pub fn predicate(format: impl Into<String>) -> CustomPredicate {
    CustomPredicate::new(format)
}

/// `EXISTS (subquery)`
#[derive(Clone)]
pub struct Exists {
    query: Arc<dyn SqlExpr>,
    negated: bool,
}

impl Exists {
    /// `EXISTS (query)`
    pub fn new(query: impl Query + 'static) -> Self {
        Self {
            query: Arc::new(query),
            negated: false,
        }
    }

    /// `NOT EXISTS (query)`
    pub fn not_exists(query: impl Query + 'static) -> Self {
        Self {
            query: Arc::new(query),
            negated: true,
        }
    }
}

impl SqlExpr for Exists {
    fn append_sql(
        &self,
        buf: &mut String,
        args: &mut Args,
        params: &mut ParamIndex,
    ) -> SqResult<()> {
        buf.push_str(if self.negated {
            "NOT EXISTS ("
        } else {
            "EXISTS ("
        });
        self.query.append_sql(buf, args, params)?;
        buf.push(')');
        Ok(())
    }
}

impl Predicate for Exists {}

/// `lhs IN (subquery)`
#[derive(Clone)]
pub struct InQuery {
    lhs: Arc<dyn SqlExpr>,
    query: Arc<dyn SqlExpr>,
}

impl InQuery {
    /// `lhs IN (query)`
    pub fn new(lhs: impl SqlExpr + 'static, query: impl Query + 'static) -> Self {
        Self {
            lhs: Arc::new(lhs),
            query: Arc::new(query),
        }
    }
}

impl SqlExpr for InQuery {
    fn append_sql(
        &self,
        buf: &mut String,
        args: &mut Args,
        params: &mut ParamIndex,
    ) -> SqResult<()> {
        self.lhs.append_sql(buf, args, params)?;
        buf.push_str(" IN (");
        self.query.append_sql(buf, args, params)?;
        buf.push(')');
        Ok(())
    }
}

impl Predicate for InQuery {}
