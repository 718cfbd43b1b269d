//! Statement monitoring and hooks.
//!
//! Every statement issued through a [`Db`](crate::Db) handle runs through the hooks and
//! monitors registered on it:
//!
//! - [`QueryHook::before_query`] may abort the statement
//! - [`QueryMonitor::on_query_complete`] observes duration and outcome
//!
//! # Example
//!
//! ```rust,ignore
//! use adorm::monitor::{StatsMonitor, TracingSqlHook};
//! use std::rc::Rc;
//!
//! let stats = Rc::new(StatsMonitor::new());
//! db.add_hook(TracingSqlHook::new());
//! db.add_monitor_rc(stats.clone());
//!
//! // ... run queries ...
//! println!("{} statements", stats.stats().total_queries);
//! ```

mod monitors;
mod tracing_hook;
mod types;

#[cfg(test)]
mod tests;

pub use monitors::{QueryStats, StatsMonitor};
pub use tracing_hook::TracingSqlHook;
pub use types::{HookAction, QueryContext, QueryHook, QueryMonitor, QueryResult, QueryType};

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
