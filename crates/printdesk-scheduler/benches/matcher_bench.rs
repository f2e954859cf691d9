// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for printer selection, the settings-code codec and
// document fingerprinting in the printdesk-scheduler crate.

use std::collections::BTreeSet;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use printdesk_core::settings_code;
use printdesk_core::{DetectedCapabilities, JobRequest, PaperSize, PrintJob};
use printdesk_scheduler::{PrinterRecord, PrinterSet, hash_bytes, select_printer};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn printer_set(count: usize) -> PrinterSet {
    let printers = (0..count)
        .map(|i| {
            let mut record = PrinterRecord::from_detected(
                format!("printer-{i:03}"),
                DetectedCapabilities {
                    color: i % 2 == 0,
                    duplex: i % 3 == 0,
                    paper_sizes: PaperSize::all(),
                    max_copies: 999,
                    resolutions: vec!["600dpi".into()],
                },
            );
            record.inventory.insert(PaperSize::A4, 200 + (i as u32 * 37) % 800);
            record
        })
        .collect();
    PrinterSet::new(printers, BTreeSet::new())
}

fn job() -> PrintJob {
    let request: JobRequest = serde_json::from_value(serde_json::json!({
        "id": "bench",
        "user_id": "u1",
        "number_of_pages": 25,
        "printsettings_code": 110,
        "combined_file_path": "bench.pdf",
    }))
    .expect("request");
    PrintJob::from_request(request)
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Candidate filtering plus scoring across printer fleets of growing size.
fn bench_select_printer(c: &mut Criterion) {
    let job = job();
    let mut group = c.benchmark_group("select_printer");
    for count in [1usize, 8, 64] {
        let set = printer_set(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &set, |b, set| {
            b.iter(|| select_printer(black_box(set), black_box(&job), 27, |name| name.len() % 4));
        });
    }
    group.finish();
}

/// Decode then re-encode every code a shop can advertise.
fn bench_settings_code(c: &mut Criterion) {
    let codes: Vec<u32> = (0..4)
        .flat_map(|paper| [0, 1, 10, 11, 100, 101, 110, 111].map(|rest| paper * 1000 + rest))
        .collect();

    c.bench_function("settings_code decode+encode (32 codes)", |b| {
        b.iter(|| {
            for code in &codes {
                black_box(settings_code::encode(&settings_code::decode(black_box(*code))));
            }
        });
    });
}

/// SHA-256 fingerprint of a 1 MiB document.
fn bench_document_hash(c: &mut Criterion) {
    let data = vec![0xABu8; 1024 * 1024];
    c.bench_function("document_hash (1 MiB)", |b| {
        b.iter(|| black_box(hash_bytes(black_box(&data))));
    });
}

criterion_group!(
    benches,
    bench_select_printer,
    bench_settings_code,
    bench_document_hash
);
criterion_main!(benches);
