use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use tempfile::TempDir;
use tts_diagnose::diagnose::{DiagnoseOptions, diagnose};
use tts_diagnose::domain::Domain;

fn generate_demand(rows: usize, items: usize) -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let csv_path = temp_dir.path().join("demand.csv");
    let mut file = File::create(&csv_path).expect("create csv");
    writeln!(file, "item_id,timestamp,demand,location").expect("header");
    for i in 0..rows {
        let day = (i % 28) + 1;
        let hour = i % 24;
        let store = i % 7;
        writeln!(
            file,
            "item_{},2024-01-{day:02} {hour:02}:00:00,{}.5,store_{store}",
            i % items,
            i % 113
        )
        .expect("row");
    }
    (temp_dir, csv_path)
}

fn bench_chunk_sizes(c: &mut Criterion) {
    let (temp_dir, csv_path) = generate_demand(50_000, 1_000);
    let mut group = c.benchmark_group("diagnose_chunk_size");

    for chunk_size in [500usize, 10_000, 50_000] {
        let options = DiagnoseOptions {
            domain: Some(Domain::Retail),
            chunk_size,
            ..DiagnoseOptions::default()
        };
        group.bench_function(format!("chunk_{chunk_size}"), |b| {
            b.iter_batched(
                || (),
                |_| {
                    diagnose(&csv_path, &options).expect("diagnose");
                },
                BatchSize::SmallInput,
            );
        });
    }

    drop(temp_dir);
    group.finish();
}

criterion_group!(benches, bench_chunk_sizes);
criterion_main!(benches);
