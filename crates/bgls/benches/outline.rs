// outline.rs - Benchmarks for single-document analysis: scanning, outline,
// reference classification and semantic tokens
//
// Run with: cargo bench --bench outline --features test-support

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use bgls::definition::classify_reference;
use bgls::outline::{build_outline, to_document_symbols};
use bgls::scanner::scan;
use bgls::semantic_tokens::{collect_semantic_tokens, encode};
use bgls::span::LineIndex;
use bgls::test_utils::{generate_script, FixtureConfig};

fn scripts() -> Vec<(&'static str, String)> {
    vec![
        ("small", generate_script(0, &FixtureConfig::small())),
        ("medium", generate_script(0, &FixtureConfig::medium())),
        ("large", generate_script(0, &FixtureConfig::large())),
    ]
}

fn bench_document_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("document");

    for (label, text) in scripts() {
        group.bench_with_input(BenchmarkId::new("scan", label), &text, |b, text| {
            b.iter(|| black_box(scan(black_box(text)).count()))
        });

        group.bench_with_input(BenchmarkId::new("outline", label), &text, |b, text| {
            b.iter(|| {
                let symbols = build_outline(black_box(text));
                black_box(to_document_symbols(&symbols, &LineIndex::new(text)))
            })
        });

        group.bench_with_input(BenchmarkId::new("semantic_tokens", label), &text, |b, text| {
            b.iter(|| {
                let tokens = collect_semantic_tokens(black_box(text));
                black_box(encode(&tokens, &LineIndex::new(text)))
            })
        });

        // Classification near the end of the document scans the whole text
        let offset = text.rfind("$(Out_").map(|i| i + 3).unwrap_or(0);
        group.bench_with_input(
            BenchmarkId::new("classify_reference", label),
            &(&text, offset),
            |b, &(text, offset)| b.iter(|| black_box(classify_reference(text, black_box(offset)))),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_document_analysis);
criterion_main!(benches);
