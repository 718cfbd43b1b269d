use adorm::ident::map_qualifiers;
use adorm::{Order, Query};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

/// SELECT col0, col1, ... FROM `t` WHERE `t`.`col0` = ? AND `t`.`col1` = ? ...
fn build_select(n: usize) -> Query {
    let columns: Vec<String> = (0..n).map(|i| format!("col{i}")).collect();
    let refs: Vec<&str> = columns.iter().map(String::as_str).collect();
    let mut q = Query::table("t").select(&refs);
    for (i, col) in columns.iter().enumerate() {
        q = q.where_eq(col, i as i64);
    }
    q
}

fn bench_build_and_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_builder/build_and_render");

    for n in [1, 5, 10, 50, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let q = build_select(n);
                black_box(q.to_sql());
            });
        });
    }

    group.finish();
}

fn bench_condition_sql(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_builder/condition_sql");

    for n in [1, 5, 10, 50, 100] {
        let q = build_select(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &q, |b, q| {
            b.iter(|| black_box(q.condition_sql()));
        });
    }

    group.finish();
}

fn bench_in_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_builder/in_list");

    for n in [5, 20, 100, 500] {
        let values: Vec<i64> = (0..n).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &values, |b, values| {
            b.iter(|| {
                let q = Query::table("t").in_list("id", values.iter().copied());
                black_box((q.to_sql(), q.binds()));
            });
        });
    }

    group.finish();
}

fn bench_nested_groups(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_builder/nested_groups");

    for depth in [1, 4, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter(|| {
                let mut q = Query::table("user u").where_op("age", ">=", 18);
                for i in 0..depth {
                    q = q.or_group(|g| g.where_eq("role", i as i64).not_null("email"));
                }
                black_box(q.order_by("id", Order::Desc).limit(10).to_sql());
            });
        });
    }

    group.finish();
}

fn bench_map_qualifiers(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_builder/map_qualifiers");

    for n in [1, 10, 100] {
        let sql = (0..n)
            .map(|i| format!("{{col{i}}} = ?"))
            .collect::<Vec<_>>()
            .join(" AND ");
        group.bench_with_input(BenchmarkId::from_parameter(n), &sql, |b, sql| {
            b.iter(|| black_box(map_qualifiers(sql, Some("t"))));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_build_and_render,
    bench_condition_sql,
    bench_in_list,
    bench_nested_groups,
    bench_map_qualifiers,
);
criterion_main!(benches);
