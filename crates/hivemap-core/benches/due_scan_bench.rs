use criterion::{criterion_group, criterion_main, Criterion};
use hivemap_core::due::{due_inspections, within_window};
use hivemap_core::{
    hive_stats, HiveRecord, Inspection, LayoutDocument, LayoutObject, MemoryStore, Repository,
};
use time::macros::date;

fn mk_layout(apiary: usize) -> LayoutDocument {
    let objects = (0..200)
        .map(|index| {
            let mut hive = HiveRecord::new(index.to_string());
            if index % 3 != 0 {
                hive.next_inspection_date = format!("2024-{:02}-{:02}", 1 + (index + apiary) % 12, 1 + index % 28);
            }
            hive.inspections.push(Inspection {
                date: "2024-01-01".to_string(),
                queen_status: if index % 5 == 0 { "Query".to_string() } else { "Marked".to_string() },
                notes: String::new(),
            });
            LayoutObject { hive_data: Some(hive), ..LayoutObject::default() }
        })
        .collect();
    LayoutDocument { objects, ..LayoutDocument::default() }
}

fn mk_repo() -> Repository<MemoryStore> {
    let mut repo = Repository::new(MemoryStore::new());
    let names = (0..25).map(|apiary| format!("Apiary {apiary}")).collect::<Vec<_>>();
    if let Err(err) = repo.save_apiaries(&names) {
        panic!("bench fixture apiary list failed: {err}");
    }
    for (apiary, name) in names.iter().enumerate() {
        if let Err(err) = repo.save_layout(name, &mk_layout(apiary)) {
            panic!("bench fixture layout failed: {err}");
        }
    }
    repo
}

fn bench_due_scan(c: &mut Criterion) {
    let repo = mk_repo();
    let today = date!(2024 - 06 - 15);

    c.bench_function("due_scan_25_apiaries_5000_hives", |b| {
        b.iter(|| match due_inspections(&repo) {
            Ok(entries) => within_window(&entries, today).len(),
            Err(err) => panic!("due scan failed: {err}"),
        });
    });
}

fn bench_stats(c: &mut Criterion) {
    let repo = mk_repo();

    c.bench_function("stats_25_apiaries_5000_hives", |b| {
        b.iter(|| {
            if let Err(err) = hive_stats(&repo) {
                panic!("stats scan failed: {err}");
            }
        });
    });
}

criterion_group!(due_benches, bench_due_scan, bench_stats);
criterion_main!(due_benches);
