//! Query types and the top-level rendering boundary.
//!
//! A query renders through [`SqlExpr::append_sql`] in neutral form like any
//! other node, so it can be embedded in another statement. Only
//! [`Query::to_sql`] finalizes: it catches panics raised while composing,
//! translates placeholders for the configured dialect exactly once, and
//! logs the statement.

pub mod insert;
pub mod select;
pub mod update;
pub mod values;

#[cfg(test)]
mod tests;

use crate::config::RenderConfig;
use crate::error::{SqError, SqResult};
use crate::expr::SqlExpr;
use crate::param::{Args, ParamIndex};
use crate::placeholder::translate_counted;
use std::panic::{self, AssertUnwindSafe};
use tracing::Level;

/// A complete statement.
pub trait Query: SqlExpr {
    /// Whether this query is marked as embedded in another statement.
    fn is_nested(&self) -> bool;

    fn render_config(&self) -> &RenderConfig;

    /// Statement kind, used in log events.
    fn query_type(&self) -> &'static str;

    /// Render the statement.
    ///
    /// A top-level query returns dialect-translated SQL; a nested one returns
    /// neutral text. Never panics: a panic while composing is returned as
    /// [`SqError::Panicked`].
    fn to_sql(&self) -> SqResult<(String, Args)> {
        let (sql, args, ()) = finalize(
            self.render_config(),
            self.is_nested(),
            self.query_type(),
            |buf, args, params| self.append_sql(buf, args, params),
        )?;
        Ok((sql, args))
    }
}

/// Run `compose` into fresh buffers and finalize the result.
pub(crate) fn finalize<R>(
    config: &RenderConfig,
    nested: bool,
    query_type: &'static str,
    compose: impl FnOnce(&mut String, &mut Args, &mut ParamIndex) -> SqResult<R>,
) -> SqResult<(String, Args, R)> {
    let mut buf = String::new();
    let mut args = Args::new();
    let mut params = ParamIndex::new();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        compose(&mut buf, &mut args, &mut params)
    }));
    let extra = match outcome {
        Ok(Ok(extra)) => extra,
        Ok(Err(err)) => {
            tracing::warn!(target: "pgsq.sql", query_type, error = %err, "query composition failed");
            return Err(err);
        }
        Err(payload) => {
            let err = SqError::from_panic(&*payload);
            tracing::warn!(target: "pgsq.sql", query_type, error = %err, "panic while composing query");
            return Err(err);
        }
    };

    if nested {
        return Ok((buf, args, extra));
    }

    let (sql, count) = match translate_counted(config.dialect, &buf) {
        Ok(out) => out,
        Err(err) => {
            tracing::warn!(target: "pgsq.sql", query_type, error = %err, "query composition failed");
            return Err(err);
        }
    };
    if count != args.len() {
        let err = SqError::composition(format!(
            "statement has {count} placeholders but {} arguments",
            args.len()
        ));
        tracing::warn!(target: "pgsq.sql", query_type, error = %err, "query composition failed");
        return Err(err);
    }

    emit(config, query_type, &sql, args.len());
    Ok((sql, args, extra))
}

fn emit(config: &RenderConfig, query_type: &'static str, sql: &str, param_count: usize) {
    macro_rules! emit_at_level {
        ($level:expr, $($field:tt)*) => {
            match $level {
                Level::ERROR => tracing::error!($($field)*),
                Level::WARN  => tracing::warn!($($field)*),
                Level::INFO  => tracing::info!($($field)*),
                Level::DEBUG => tracing::debug!($($field)*),
                Level::TRACE => tracing::trace!($($field)*),
            }
        };
    }

    let sql = config.truncate(sql);
    emit_at_level!(
        config.log_level,
        target: "pgsq.sql",
        query_type,
        dialect = config.dialect.name(),
        param_count,
        sql = %sql,
    );
}
