//! Dialect-neutral placeholder translation.
//!
//! Expression nodes render every argument slot as a neutral `?`. The final
//! statement is rewritten once, left to right, into the dialect's form:
//!
//! ```ignore
//! use pgsq::{Dialect, translate};
//!
//! assert_eq!(translate(Dialect::Postgres, "a = ? AND b = ?"), "a = $1 AND b = $2");
//! ```
//!
//! Lexical rules shared by [`translate`] and [`count_placeholders`]:
//! - `??` is an escaped literal question mark (needed for jsonb `?` operators)
//! - text inside `'...'`, `"..."`, `-- ...` and `/* ... */` is copied verbatim

use crate::error::{SqError, SqResult};
use std::fmt::Write;

/// Target SQL dialect for placeholder syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// `$1, $2, ...`
    #[default]
    Postgres,
    /// `?` (unchanged); a literal `??` cannot be expressed
    MySql,
    /// `?` (unchanged), same restriction as MySQL
    Sqlite,
    /// `@p1, @p2, ...`
    SqlServer,
}

impl Dialect {
    /// Whether the dialect numbers its placeholders.
    pub fn is_numbered(self) -> bool {
        matches!(self, Dialect::Postgres | Dialect::SqlServer)
    }

    /// Lowercase name used in log events and error messages.
    pub fn name(self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
            Dialect::SqlServer => "sqlserver",
        }
    }

    fn write_placeholder(self, out: &mut String, n: usize) {
        match self {
            Dialect::Postgres => {
                let _ = write!(out, "${n}");
            }
            Dialect::SqlServer => {
                let _ = write!(out, "@p{n}");
            }
            Dialect::MySql | Dialect::Sqlite => out.push('?'),
        }
    }
}

pub(crate) enum Token<'a> {
    Text(&'a str),
    Placeholder,
    Escaped,
}

/// Split `text` into verbatim runs, placeholders and `??` escapes.
pub(crate) fn tokens<'a>(text: &'a str, mut f: impl FnMut(Token<'a>)) {
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut i = 0;
    let mut start = 0;

    while i < len {
        match bytes[i] {
            quote @ (b'\'' | b'"') => {
                i += 1;
                while i < len {
                    if bytes[i] == quote {
                        // Doubled quote is an escape inside the literal.
                        if i + 1 < len && bytes[i + 1] == quote {
                            i += 2;
                            continue;
                        }
                        i += 1;
                        break;
                    }
                    i += 1;
                }
            }
            b'-' if i + 1 < len && bytes[i + 1] == b'-' => {
                i += 2;
                while i < len && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if i + 1 < len && bytes[i + 1] == b'*' => {
                i += 2;
                while i < len && !(bytes[i] == b'*' && i + 1 < len && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i = (i + 2).min(len);
            }
            b'?' => {
                if start < i {
                    f(Token::Text(&text[start..i]));
                }
                if i + 1 < len && bytes[i + 1] == b'?' {
                    f(Token::Escaped);
                    i += 2;
                } else {
                    f(Token::Placeholder);
                    i += 1;
                }
                start = i;
            }
            _ => i += 1,
        }
    }

    if start < len {
        f(Token::Text(&text[start..]));
    }
}

/// Rewrite neutral placeholders into `dialect`'s form, numbering from 1.
///
/// Must run exactly once on a top-level statement; running it on text that
/// was already translated would renumber nothing but would unescape `??`
/// twice.
pub fn translate(dialect: Dialect, text: &str) -> String {
    if !dialect.is_numbered() {
        return text.to_string();
    }
    renumber(dialect, text).0
}

/// Translate a finalized statement, returning the text and the number of
/// placeholders written.
///
/// A dialect that keeps `?` as its placeholder has no way to spell a literal
/// question mark, so any `??` escape is a composition error there.
pub(crate) fn translate_counted(dialect: Dialect, text: &str) -> SqResult<(String, usize)> {
    if dialect.is_numbered() {
        return Ok(renumber(dialect, text));
    }

    let mut n = 0;
    let mut escaped = false;
    tokens(text, |token| match token {
        Token::Placeholder => n += 1,
        Token::Escaped => escaped = true,
        Token::Text(_) => {}
    });
    if escaped {
        return Err(SqError::composition(format!(
            "literal ? cannot be expressed in {}",
            dialect.name()
        )));
    }
    Ok((text.to_string(), n))
}

fn renumber(dialect: Dialect, text: &str) -> (String, usize) {
    let mut out = String::with_capacity(text.len() + 16);
    let mut n = 0;
    tokens(text, |token| match token {
        Token::Text(s) => out.push_str(s),
        Token::Escaped => out.push('?'),
        Token::Placeholder => {
            n += 1;
            dialect.write_placeholder(&mut out, n);
        }
    });
    (out, n)
}

/// Count neutral placeholders in `text`.
pub fn count_placeholders(text: &str) -> usize {
    let mut n = 0;
    tokens(text, |token| {
        if matches!(token, Token::Placeholder) {
            n += 1;
        }
    });
    n
}
