// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use mermaide::format::FenceScanner;
use mermaide::model::Diagram;
use mermaide::translate::friendly_error;

// Benchmark identity (keep stable):
// - Group names: `format.fence_scan`, `model.from_response`, `translate.friendly_error`
// - Case IDs after the `/` stay stable so results remain comparable over time.

fn class_diagram(classes: usize) -> String {
    let mut text = String::from("classDiagram\n");
    for index in 0..classes {
        text.push_str(&format!(
            "class Room{index} {{\n  +String name\n  +int area\n  +open() bool\n}}\nRoom{index} --> Room{}\n",
            index + 1
        ));
    }
    text
}

fn response(classes: usize) -> String {
    format!(
        "Here is the structure of the house, with one class per room and the doors between them.\n```mermaid\n{}```\nEach arrow is a door.",
        class_diagram(classes)
    )
}

fn token_chunks(text: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    for (index, _) in text.char_indices().skip(1).step_by(4) {
        chunks.push(&text[start..index]);
        start = index;
    }
    chunks.push(&text[start..]);
    chunks
}

fn benches_scan(c: &mut Criterion) {
    {
        let mut group = c.benchmark_group("format.fence_scan");
        for (case_id, classes) in [("small", 4), ("medium", 40), ("large", 400)] {
            let text = response(classes);
            let chunks: Vec<String> = token_chunks(&text).into_iter().map(str::to_owned).collect();
            group.throughput(Throughput::Bytes(text.len() as u64));
            group.bench_function(case_id, move |b| {
                b.iter(|| {
                    let mut scanner = FenceScanner::new();
                    let mut released = 0;
                    for chunk in &chunks {
                        released += scanner.push(black_box(chunk)).len();
                    }
                    black_box((released, scanner.finish()))
                })
            });
        }
        group.finish();
    }

    {
        let mut group = c.benchmark_group("model.from_response");
        for (case_id, classes) in [("small", 4), ("large", 400)] {
            let text = response(classes);
            group.throughput(Throughput::Bytes(text.len() as u64));
            group.bench_function(case_id, move |b| {
                b.iter(|| black_box(Diagram::from_response(black_box(&text))))
            });
        }
        group.finish();
    }

    {
        let mut group = c.benchmark_group("translate.friendly_error");
        let diagram = class_diagram(40);
        let json = r#"{"hash":{"text":"{","token":"OPEN_IN_STRUCT","line":9,"expected":["'STRUCT_STOP'","'MEMBER'"]}}"#;
        let jison = "Error: Parse error on line 10:\n...rage {    {\n-------------^\nExpecting 'STRUCT_STOP', 'MEMBER', got 'OPEN_IN_STRUCT'";
        for (case_id, raw) in [("json", json), ("jison_text", jison)] {
            let diagram = diagram.clone();
            group.bench_function(case_id, move |b| {
                b.iter(|| black_box(friendly_error(black_box(raw), Some(&diagram))))
            });
        }
        group.finish();
    }
}

criterion_group!(benches, benches_scan);
criterion_main!(benches);
