//! Statement Building Benchmarks
//!
//! Measures the per-call cost of turning names and values into commands:
//! - Identifier parsing (plain and quoted)
//! - Column definition validation
//! - Building the demo scenario's statements

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pgcrud::sql::{self, ColumnDef, Identifier, QualifiedName};

fn bench_identifier_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("identifier");

    group.bench_function("plain", |b| {
        b.iter(|| Identifier::parse(black_box("my_table")).unwrap());
    });

    group.bench_function("quoted", |b| {
        b.iter(|| Identifier::parse(black_box(r#""Mixed ""Case"" Table""#)).unwrap());
    });

    group.bench_function("qualified", |b| {
        b.iter(|| QualifiedName::parse(black_box(r#"public."Orders.2024""#)).unwrap());
    });

    group.finish();
}

fn bench_column_defs(c: &mut Criterion) {
    let defs = [
        "id SERIAL PRIMARY KEY",
        "data TEXT",
        "price NUMERIC(10, 2) NOT NULL DEFAULT 0",
        "note VARCHAR(80) DEFAULT 'a -- b; c'",
        "UNIQUE (data, note)",
    ];

    c.bench_function("column_defs", |b| {
        b.iter(|| {
            for def in black_box(&defs) {
                ColumnDef::parse(def).unwrap();
            }
        });
    });
}

fn bench_demo_statements(c: &mut Criterion) {
    let table = QualifiedName::parse("my_table").unwrap();
    let id = Identifier::parse("id").unwrap();
    let data = Identifier::parse("data").unwrap();
    let columns: Vec<ColumnDef> = ["id SERIAL PRIMARY KEY", "data TEXT"]
        .iter()
        .map(|def| ColumnDef::parse(def).unwrap())
        .collect();

    c.bench_function("demo_statements", |b| {
        b.iter(|| {
            black_box(sql::create_table(&table, &columns));
            black_box(sql::insert_data(&table, "Some data"));
            black_box(sql::count_rows(&table));
            black_box(sql::select(&table, &[]));
            black_box(sql::update_data(&table, &data, "New data", &id, "1"));
            black_box(sql::delete_data(&table, &id, "1"));
        });
    });
}

criterion_group!(benches, bench_identifier_parsing, bench_column_defs, bench_demo_statements);
criterion_main!(benches);
