use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use caproj::{ColumnMapping, Table, data::Value, set_dtypes};

fn generate_projects(rows: usize) -> Table {
    let mut pid = Vec::with_capacity(rows);
    let mut budget = Vec::with_capacity(rows);
    let mut approved = Vec::with_capacity(rows);
    for i in 0..rows {
        pid.push(Value::from(format!("{}", 1000 + i % 250)));
        budget.push(if i % 17 == 0 {
            Value::from("TBD")
        } else {
            Value::from(format!("{}.{:02}", i * 3, i % 100))
        });
        let day = (i % 28) + 1;
        approved.push(if i % 11 == 0 {
            Value::Null
        } else {
            Value::from(format!("2023-05-{day:02}"))
        });
    }
    Table::from_pairs([("PID", pid), ("budget", budget), ("approved", approved)])
        .expect("build table")
}

fn bench_set_dtypes(c: &mut Criterion) {
    let table = generate_projects(20_000);
    let mapping: ColumnMapping = [("PID", "unsigned"), ("budget", "float"), ("approved", "datetime")]
        .into_iter()
        .collect();

    let mut group = c.benchmark_group("set_dtypes");
    group.sample_size(20);
    for (label, coerce) in [("ignore", false), ("coerce", true)] {
        group.bench_function(label, |b| {
            b.iter_batched(
                || table.clone(),
                |mut working| set_dtypes(&mut working, &mapping, coerce).expect("convert"),
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_set_dtypes);
criterion_main!(benches);
