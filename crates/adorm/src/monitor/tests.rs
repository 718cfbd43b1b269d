use super::*;
use std::time::Duration;

#[test]
fn test_query_type_detection() {
    assert_eq!(QueryType::from_sql("SELECT * FROM `user`"), QueryType::Select);
    assert_eq!(QueryType::from_sql("  select 1"), QueryType::Select);
    assert_eq!(QueryType::from_sql("(SELECT 1)"), QueryType::Select);
    assert_eq!(QueryType::from_sql("INSERT INTO t VALUES (?)"), QueryType::Insert);
    assert_eq!(QueryType::from_sql("REPLACE INTO t VALUES (?)"), QueryType::Insert);
    assert_eq!(QueryType::from_sql("update t set a = ?"), QueryType::Update);
    assert_eq!(QueryType::from_sql("DELETE FROM t"), QueryType::Delete);
    assert_eq!(QueryType::from_sql("SET NAMES utf8mb4"), QueryType::Other);
}

#[test]
fn test_query_result_error_truncates() {
    let long = "x".repeat(1000);
    match QueryResult::error(long) {
        QueryResult::Error(msg) => {
            assert!(msg.ends_with("..."));
            assert_eq!(msg.len(), 515);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_stats_monitor_counts() {
    let monitor = StatsMonitor::new();
    let select = QueryContext::new("SELECT 1", 0);
    let insert = QueryContext::new("INSERT INTO t (a) VALUES (?)", 1);

    monitor.on_query_complete(&select, Duration::from_millis(2), &QueryResult::Rows(1));
    monitor.on_query_complete(&insert, Duration::from_millis(5), &QueryResult::Done(false));

    let stats = monitor.stats();
    assert_eq!(stats.total_queries, 2);
    assert_eq!(stats.select_count, 1);
    assert_eq!(stats.insert_count, 1);
    assert_eq!(stats.failed_queries, 1);
    assert_eq!(stats.max_duration, Duration::from_millis(5));
    assert_eq!(stats.slowest_query.as_deref(), Some("INSERT INTO t (a) VALUES (?)"));

    monitor.reset();
    assert_eq!(monitor.stats(), QueryStats::default());
}

#[test]
fn test_stats_monitor_disabled() {
    let monitor = StatsMonitor::new();
    monitor.set_enabled(false);
    monitor.on_query_complete(
        &QueryContext::new("SELECT 1", 0),
        Duration::from_millis(1),
        &QueryResult::Rows(0),
    );
    assert_eq!(monitor.stats().total_queries, 0);
}

#[test]
fn test_tracing_hook_continues() {
    let hook = TracingSqlHook::new().max_sql_length(4);
    let ctx = QueryContext::new("SELECT * FROM `user`", 0).with_tag("users.list");
    assert_eq!(hook.before_query(&ctx), HookAction::Continue);
    hook.after_query(&ctx, Duration::from_millis(3), &QueryResult::Rows(2));
}

#[test]
fn test_tracing_hook_slow_threshold() {
    let hook = TracingSqlHook::new().slow_threshold(Duration::from_millis(50));
    assert!(!hook.is_slow(Duration::from_millis(50)));
    assert!(hook.is_slow(Duration::from_millis(51)));
    assert!(!TracingSqlHook::new().is_slow(Duration::from_secs(60)));
}
