use crate::placeholder::Dialect;
use tracing::Level;

/// Rendering configuration carried by every query type.
///
/// Controls the placeholder dialect applied at the top-level boundary and how
/// the final SQL is logged.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Placeholder dialect for top-level rendering.
    pub dialect: Dialect,
    /// Tracing event level for rendered SQL.
    pub log_level: Level,
    /// Truncate logged SQL (in bytes, at a char boundary). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Postgres,
            log_level: Level::DEBUG,
            max_sql_length: Some(200),
        }
    }
}

impl RenderConfig {
    /// Create a new configuration with defaults (Postgres, DEBUG, 200 bytes).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the placeholder dialect.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Override the tracing event level.
    pub fn with_log_level(mut self, level: Level) -> Self {
        self.log_level = level;
        self
    }

    /// Set maximum SQL length to log.
    pub fn with_max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub(crate) fn truncate<'a>(&self, sql: &'a str) -> std::borrow::Cow<'a, str> {
        match self.max_sql_length {
            Some(max) if sql.len() > max => {
                let mut end = max;
                while end > 0 && !sql.is_char_boundary(end) {
                    end -= 1;
                }
                std::borrow::Cow::Owned(format!("{}...", &sql[..end]))
            }
            _ => std::borrow::Cow::Borrowed(sql),
        }
    }
}
