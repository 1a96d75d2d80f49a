use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pgsq::{
    Dialect, Field, NumberField, Query, RowValue, StringField, TableInfo, ValuesQuery,
    select_from, translate, values,
};

/// VALUES with `n` rows of two arguments each.
fn build_values(n: usize) -> ValuesQuery {
    (0..n).fold(values(), |q, i| {
        q.values(RowValue::new().value(i as i64).value(format!("user{i}")))
    })
}

fn bench_values_to_sql(c: &mut Criterion) {
    let mut group = c.benchmark_group("render/values");

    for n in [1, 10, 100, 1000] {
        let q = build_values(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &q, |b, q| {
            b.iter(|| black_box(q.to_sql()));
        });
    }

    group.finish();
}

fn bench_select_to_sql(c: &mut Criterion) {
    let mut group = c.benchmark_group("render/select");
    let table = TableInfo::new("users");
    let id = NumberField::new("id", &table);
    let name = StringField::new("name", &table);

    for n in [1, 10, 50] {
        let q = (0..n).fold(
            select_from(&table).select(id.clone()).select(name.clone()),
            |q, i| q.where_(id.ne(i as i64)),
        );
        group.bench_with_input(BenchmarkId::from_parameter(n), &q, |b, q| {
            b.iter(|| black_box(q.to_sql()));
        });
    }

    group.finish();
}

fn bench_row_mapper_select(c: &mut Criterion) {
    let table = TableInfo::new("users");
    let id = NumberField::new("id", &table);
    let name = StringField::new("name", &table);
    let q = select_from(&table)
        .where_(name.like("a%"))
        .selectx(|row| (row.int64(&id), row.string(&name)));

    c.bench_function("render/selectx", |b| {
        b.iter(|| black_box(q.to_sql()));
    });
}

fn bench_translate(c: &mut Criterion) {
    let mut group = c.benchmark_group("render/translate");

    for n in [10, 100, 1000] {
        let text = vec!["(?, ?)"; n].join(", ");
        let text = format!("VALUES {text} -- trailing? comment");
        group.bench_with_input(BenchmarkId::from_parameter(n), &text, |b, text| {
            b.iter(|| black_box(translate(Dialect::Postgres, text)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_values_to_sql,
    bench_select_to_sql,
    bench_row_mapper_select,
    bench_translate
);
criterion_main!(benches);
