use super::truncate_sql_bytes;
use super::types::{HookAction, QueryContext, QueryHook, QueryResult};
use std::time::Duration;
use tracing::Level;

/// Emit a tracing event at a level chosen at runtime.
macro_rules! event_at {
    ($level:expr, $($field:tt)*) => {
        match $level {
            Level::ERROR => tracing::error!($($field)*),
            Level::WARN => tracing::warn!($($field)*),
            Level::INFO => tracing::info!($($field)*),
            Level::DEBUG => tracing::debug!($($field)*),
            Level::TRACE => tracing::trace!($($field)*),
        }
    };
}

/// Logs every statement on the `adorm.sql` target.
///
/// The statement is logged before it runs (SQL, bind count, connection, tag). After it
/// completes, the outcome and duration are logged at the same level, or at `WARN` when
/// the statement took longer than the slow threshold.
///
/// Binds are never logged; use `Db::debug(true)` for interpolated SQL.
#[derive(Debug, Clone)]
pub struct TracingSqlHook {
    pub level: Level,
    /// Truncate logged SQL to this many bytes. `None` logs it whole.
    pub max_sql_length: Option<usize>,
    /// Statements slower than this are reported at `WARN`.
    pub slow_threshold: Option<Duration>,
}

impl Default for TracingSqlHook {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(200),
            slow_threshold: None,
        }
    }
}

impl TracingSqlHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub fn slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = Some(threshold);
        self
    }

    fn shown_sql<'a>(&self, sql: &'a str) -> std::borrow::Cow<'a, str> {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)).into(),
            _ => sql.into(),
        }
    }

    pub(crate) fn is_slow(&self, duration: Duration) -> bool {
        self.slow_threshold.is_some_and(|limit| duration > limit)
    }
}

impl QueryHook for TracingSqlHook {
    fn before_query(&self, ctx: &QueryContext) -> HookAction {
        event_at!(
            self.level,
            target: "adorm.sql",
            connection = %ctx.connection,
            query_type = ?ctx.query_type,
            tag = ctx.tag.as_deref().unwrap_or("-"),
            binds = ctx.param_count,
            sql = %self.shown_sql(&ctx.sql),
            "statement"
        );
        HookAction::Continue
    }

    fn after_query(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        let elapsed_ms = duration.as_secs_f64() * 1000.0;
        if self.is_slow(duration) {
            tracing::warn!(
                target: "adorm.sql",
                connection = %ctx.connection,
                elapsed_ms,
                result = %result,
                sql = %self.shown_sql(&ctx.sql),
                "slow statement"
            );
            return;
        }
        event_at!(
            self.level,
            target: "adorm.sql",
            connection = %ctx.connection,
            elapsed_ms,
            result = %result,
            "statement finished"
        );
    }
}
