//! Expression nodes and the rendering protocol.
//!
//! Every node renders itself into a shared buffer in neutral form: each
//! argument slot is written as `?` and its value pushed onto [`Args`] in the
//! same order. Dialect translation happens once, at the top-level query
//! boundary (see [`crate::query`]).

use crate::error::{SqError, SqResult};
use crate::param::{Args, Param, ParamIndex};
use crate::placeholder::{self, Token};
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// A node that can render itself as neutral SQL plus arguments.
///
/// Implementations write only well-formed text for the node, push exactly the
/// arguments their text references, in placeholder order, and perform no
/// I/O. Rendering the same node twice yields the same output.
pub trait SqlExpr: Send + Sync {
    fn append_sql(&self, buf: &mut String, args: &mut Args, params: &mut ParamIndex)
    -> SqResult<()>;

    /// Alias used when the node appears in a select list.
    fn alias(&self) -> Option<&str> {
        None
    }
}

impl<T: SqlExpr + ?Sized> SqlExpr for &T {
    fn append_sql(
        &self,
        buf: &mut String,
        args: &mut Args,
        params: &mut ParamIndex,
    ) -> SqResult<()> {
        (**self).append_sql(buf, args, params)
    }

    fn alias(&self) -> Option<&str> {
        (**self).alias()
    }
}

impl<T: SqlExpr + ?Sized> SqlExpr for Box<T> {
    fn append_sql(
        &self,
        buf: &mut String,
        args: &mut Args,
        params: &mut ParamIndex,
    ) -> SqResult<()> {
        (**self).append_sql(buf, args, params)
    }

    fn alias(&self) -> Option<&str> {
        (**self).alias()
    }
}

impl<T: SqlExpr + ?Sized> SqlExpr for Arc<T> {
    fn append_sql(
        &self,
        buf: &mut String,
        args: &mut Args,
        params: &mut ParamIndex,
    ) -> SqResult<()> {
        (**self).append_sql(buf, args, params)
    }

    fn alias(&self) -> Option<&str> {
        (**self).alias()
    }
}

/// Render `expr` in neutral form with a fresh buffer, argument list and
/// parameter table.
pub fn render<E: SqlExpr + ?Sized>(expr: &E) -> SqResult<(String, Args)> {
    let mut buf = String::new();
    let mut args = Args::new();
    let mut params = ParamIndex::new();
    expr.append_sql(&mut buf, &mut args, &mut params)?;
    Ok((buf, args))
}

/// Render `items` separated by `sep`.
pub fn append_list<'a, E, I>(
    buf: &mut String,
    args: &mut Args,
    params: &mut ParamIndex,
    items: I,
    sep: &str,
) -> SqResult<()>
where
    E: SqlExpr + ?Sized + 'a,
    I: IntoIterator<Item = &'a E>,
{
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            buf.push_str(sep);
        }
        item.append_sql(buf, args, params)?;
    }
    Ok(())
}

/// A single literal argument.
#[derive(Clone, Debug)]
pub struct Value(Param);

impl Value {
    /// Wrap a literal.
    pub fn new<T: ToSql + Send + Sync + 'static>(value: T) -> Self {
        Value(Param::new(value))
    }

    /// Reuse an already wrapped argument.
    pub fn from_param(param: Param) -> Self {
        Value(param)
    }
}

impl SqlExpr for Value {
    fn append_sql(
        &self,
        buf: &mut String,
        args: &mut Args,
        _params: &mut ParamIndex,
    ) -> SqResult<()> {
        args.push_param(self.0.clone());
        buf.push('?');
        Ok(())
    }
}

/// Wrap a plain value as an expression node.
pub fn value<T: ToSql + Send + Sync + 'static>(value: T) -> Value {
    Value::new(value)
}

/// SQL text without arguments.
///
/// A literal question mark must be written as `??`.
#[derive(Clone, Debug)]
pub struct Raw(String);

impl Raw {
    /// Verbatim SQL text.
    pub fn new(sql: impl Into<String>) -> Self {
        Raw(sql.into())
    }

    /// The `DEFAULT` keyword, for row values.
    pub fn default_value() -> Self {
        Raw("DEFAULT".to_string())
    }
}

impl SqlExpr for Raw {
    fn append_sql(
        &self,
        buf: &mut String,
        _args: &mut Args,
        _params: &mut ParamIndex,
    ) -> SqResult<()> {
        buf.push_str(&self.0);
        Ok(())
    }
}

/// A named parameter.
///
/// The first binding of a name pushes its value; every later occurrence of
/// the name (bound or referenced) re-pushes that value with a fresh slot.
#[derive(Clone, Debug)]
pub struct Named {
    name: String,
    value: Option<Param>,
}

impl Named {
    /// Bind `name` to `value`.
    pub fn bind<T: ToSql + Send + Sync + 'static>(name: impl Into<String>, value: T) -> Self {
        Self {
            name: name.into(),
            value: Some(Param::new(value)),
        }
    }

    /// Refer to a name bound earlier in the same statement.
    pub fn reference(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl SqlExpr for Named {
    fn append_sql(
        &self,
        buf: &mut String,
        args: &mut Args,
        params: &mut ParamIndex,
    ) -> SqResult<()> {
        let param = match (&self.value, params.position(&self.name)) {
            (_, Some(_)) => params.resolve(&self.name, args)?,
            (Some(value), None) => {
                let idx = args.push_param(value.clone());
                params.bind(&self.name, idx);
                buf.push('?');
                return Ok(());
            }
            (None, None) => return Err(SqError::UnknownParam(self.name.clone())),
        };
        args.push_param(param);
        buf.push('?');
        Ok(())
    }
}

/// A format string with `?` slots filled by expression nodes.
///
/// ```ignore
/// let e = CustomExpr::new("coalesce(?, ?)").expr(users.nickname.clone()).arg("anonymous");
/// ```
///
/// `??` in the format is a literal question mark. Slots inside quoted text
/// or comments are not slots.
#[derive(Clone)]
pub struct CustomExpr {
    format: String,
    values: Vec<Arc<dyn SqlExpr>>,
    alias: Option<String>,
}

impl CustomExpr {
    /// Start from a format string with no values yet.
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            values: Vec::new(),
            alias: None,
        }
    }

    /// Fill the next slot with a literal argument.
    pub fn arg<T: ToSql + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.values.push(Arc::new(Value::new(value)));
        self
    }

    /// Fill the next slot with an expression node.
    pub fn expr(mut self, expr: impl SqlExpr + 'static) -> Self {
        self.values.push(Arc::new(expr));
        self
    }

    /// Name the expression in a select list (`... AS alias`).
    pub fn as_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn format(&self) -> &str {
        &self.format
    }
}

impl std::fmt::Debug for CustomExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomExpr")
            .field("format", &self.format)
            .field("values", &self.values.len())
            .field("alias", &self.alias)
            .finish()
    }
}

impl SqlExpr for CustomExpr {
    fn append_sql(
        &self,
        buf: &mut String,
        args: &mut Args,
        params: &mut ParamIndex,
    ) -> SqResult<()> {
        let mut next = 0;
        let mut failure = None;

        placeholder::tokens(&self.format, |token| {
            if failure.is_some() {
                return;
            }
            match token {
                Token::Text(s) => buf.push_str(s),
                Token::Escaped => buf.push_str("??"),
                Token::Placeholder => match self.values.get(next) {
                    Some(expr) => {
                        next += 1;
                        if let Err(e) = expr.append_sql(buf, args, params) {
                            failure = Some(e);
                        }
                    }
                    None => {
                        next += 1;
                        failure = Some(SqError::composition(format!(
                            "custom expression {:?} has more slots than values ({})",
                            self.format,
                            self.values.len()
                        )));
                    }
                },
            }
        });

        if let Some(e) = failure {
            return Err(e);
        }
        if next != self.values.len() {
            return Err(SqError::composition(format!(
                "custom expression {:?} has {} slots but {} values",
                self.format,
                next,
                self.values.len()
            )));
        }
        Ok(())
    }

    fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }
}

/// An owned snapshot of a rendered node.
///
/// Holds neutral text together with the arguments it references, so it can be
/// stored and spliced into another statement later. Names bound while
/// capturing are kept with their positions relative to the snapshot's own
/// arguments and are registered with the host statement on every splice.
#[derive(Clone, Debug)]
pub struct Fragment {
    sql: String,
    args: Args,
    bound: Vec<(String, usize)>,
    alias: Option<String>,
}

impl Fragment {
    /// Render `expr` into a snapshot.
    pub fn capture(expr: &dyn SqlExpr) -> SqResult<Self> {
        let mut sql = String::new();
        let mut args = Args::new();
        let mut params = ParamIndex::new();
        expr.append_sql(&mut sql, &mut args, &mut params)?;

        let mut bound: Vec<(String, usize)> = params
            .iter()
            .map(|(name, idx)| (name.to_string(), idx))
            .collect();
        bound.sort_by_key(|(_, idx)| *idx);

        Ok(Self {
            sql,
            args,
            bound,
            alias: expr.alias().map(str::to_string),
        })
    }

    /// Captured neutral text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Arguments referenced by [`Fragment::sql`].
    pub fn args(&self) -> &Args {
        &self.args
    }

    /// Names bound inside the snapshot and their relative argument positions.
    pub fn bound_names(&self) -> &[(String, usize)] {
        &self.bound
    }
}

impl SqlExpr for Fragment {
    fn append_sql(
        &self,
        buf: &mut String,
        args: &mut Args,
        params: &mut ParamIndex,
    ) -> SqResult<()> {
        let offset = args.len();
        buf.push_str(&self.sql);
        args.extend(&self.args);
        for (name, idx) in &self.bound {
            params.bind(name, offset + idx);
        }
        Ok(())
    }

    fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }
}
