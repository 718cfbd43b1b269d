use super::types::{QueryContext, QueryMonitor, QueryResult, QueryType};
use std::cell::{Cell, RefCell};
use std::time::Duration;

/// Aggregated statement statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryStats {
    /// Total number of statements executed.
    pub total_queries: u64,
    /// Total number of failed statements.
    pub failed_queries: u64,
    /// Total execution time.
    pub total_duration: Duration,
    /// Number of SELECT queries.
    pub select_count: u64,
    /// Number of INSERT statements.
    pub insert_count: u64,
    /// Number of UPDATE statements.
    pub update_count: u64,
    /// Number of DELETE statements.
    pub delete_count: u64,
    /// Slowest statement duration.
    pub max_duration: Duration,
    /// Slowest statement SQL.
    pub slowest_query: Option<String>,
}

/// Monitor that collects [`QueryStats`].
#[derive(Debug)]
pub struct StatsMonitor {
    stats: RefCell<QueryStats>,
    enabled: Cell<bool>,
}

impl StatsMonitor {
    /// Create a new, enabled stats monitor.
    pub fn new() -> Self {
        Self {
            stats: RefCell::new(QueryStats::default()),
            enabled: Cell::new(true),
        }
    }

    /// Snapshot of the current statistics.
    pub fn stats(&self) -> QueryStats {
        self.stats.borrow().clone()
    }

    /// Reset all counters.
    pub fn reset(&self) {
        *self.stats.borrow_mut() = QueryStats::default();
    }

    /// Pause or resume collection.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }
}

impl Default for StatsMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryMonitor for StatsMonitor {
    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        if !self.enabled.get() {
            return;
        }
        let mut stats = self.stats.borrow_mut();

        stats.total_queries += 1;
        stats.total_duration = stats.total_duration.saturating_add(duration);

        match ctx.query_type {
            QueryType::Select => stats.select_count += 1,
            QueryType::Insert => stats.insert_count += 1,
            QueryType::Update => stats.update_count += 1,
            QueryType::Delete => stats.delete_count += 1,
            QueryType::Other => {}
        }

        if matches!(result, QueryResult::Error(_) | QueryResult::Done(false)) {
            stats.failed_queries += 1;
        }

        if duration > stats.max_duration || stats.slowest_query.is_none() {
            stats.max_duration = duration;
            stats.slowest_query = Some(ctx.sql.clone());
        }
    }
}
