//! Criterion benchmarks for clonescan-core.
//!
//! ## Benchmark groups
//!
//! 1. **matcher**: Raw sequence-matching ratio at various text sizes.
//! 2. **engine**: Full and partial similarity, including the sampled path.
//! 3. **pairwise**: End-to-end corpus analysis, sequential vs. parallel.
//! 4. **report**: Clustering and summary over a synthetic pair table.
//! 5. **schema**: DDL init + migration overhead.
//!
//! ## Running
//!
//! ```sh
//! cargo bench --manifest-path crates/clonescan-core/Cargo.toml
//! # Run only the pairwise group:
//! cargo bench --manifest-path crates/clonescan-core/Cargo.toml -- pairwise
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rusqlite::Connection;

// The lib target is called `_clonescan_core` (matching the Python extension
// module name).
use _clonescan_core::config::AnalysisConfig;
use _clonescan_core::models::{ComparisonMethod, RawArtifact, SimilarityPair};
use _clonescan_core::normalizer::RawCorpus;
use _clonescan_core::pipeline::analyze_corpus;
use _clonescan_core::report::{build_clusters, summarize};
use _clonescan_core::similarity::{sequence_ratio, SimilarityEngine};
use _clonescan_core::store::schema::{migrate_schema, SCHEMA_STATEMENTS};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A Solidity-like contract of roughly `functions * 120` characters.
fn synthetic_contract(name: &str, functions: usize, variant: usize) -> String {
    let mut out = format!("pragma solidity ^0.8.0;\n\ncontract {name} {{\n    uint256 public supply;\n");
    for i in 0..functions {
        out.push_str(&format!(
            "    function action_{i}(address to, uint256 amount) external {{\n        supply = supply + amount * {};\n    }}\n",
            (i + variant) % 7
        ));
    }
    out.push_str("}\n");
    out
}

fn synthetic_corpus(n: usize) -> RawCorpus {
    (0..n)
        .map(|i| {
            let id = format!("0x{i:040x}");
            let source = synthetic_contract("Drop", 20, i % 3);
            (id, Some(RawArtifact::Text(source)))
        })
        .collect()
}

fn synthetic_pairs(n: usize) -> (Vec<String>, Vec<SimilarityPair>) {
    let ids: Vec<String> = (0..n).map(|i| format!("0x{i:040x}")).collect();
    let mut pairs = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            let score = ((i * 31 + j * 17) % 100) as f64 / 100.0;
            pairs.push(SimilarityPair {
                contract_a: ids[i].clone(),
                contract_b: ids[j].clone(),
                full_similarity: score,
                partial_similarity: 1.0 - score,
                method: ComparisonMethod::Complete,
                sampled: false,
            });
        }
    }
    (ids, pairs)
}

// ---------------------------------------------------------------------------
// 1. matcher
// ---------------------------------------------------------------------------

fn bench_matcher(c: &mut Criterion) {
    let mut group = c.benchmark_group("matcher");
    for functions in [5usize, 40, 160].iter() {
        let a: Vec<char> = synthetic_contract("A", *functions, 0).chars().collect();
        let b: Vec<char> = synthetic_contract("B", *functions, 1).chars().collect();
        group.bench_with_input(
            BenchmarkId::new("ratio", a.len()),
            functions,
            |bench, _| bench.iter(|| sequence_ratio(black_box(&a), black_box(&b), true)),
        );
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// 2. engine
// ---------------------------------------------------------------------------

fn bench_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine");
    let engine = SimilarityEngine::default();

    let a = synthetic_contract("A", 40, 0);
    let b = synthetic_contract("B", 40, 2);
    group.bench_function("full_complete", |bench| {
        bench.iter(|| engine.full_similarity(black_box(&a), black_box(&b)))
    });
    group.bench_function("partial", |bench| {
        bench.iter(|| engine.partial_similarity(black_box(&a), black_box(&b)))
    });

    let large_a = synthetic_contract("A", 600, 0);
    let large_b = synthetic_contract("B", 600, 1);
    group.bench_function("full_sampled", |bench| {
        bench.iter(|| engine.full_similarity(black_box(&large_a), black_box(&large_b)))
    });

    let pa = engine.prepare("a", &a);
    let pb = engine.prepare("b", &b);
    group.bench_function("score_prepared", |bench| {
        bench.iter(|| engine.score(black_box(&pa), black_box(&pb)))
    });
    group.finish();
}

// ---------------------------------------------------------------------------
// 3. pairwise
// ---------------------------------------------------------------------------

fn bench_pairwise(c: &mut Criterion) {
    let mut group = c.benchmark_group("pairwise");
    group.sample_size(10);
    for n in [10usize, 30].iter() {
        let corpus = synthetic_corpus(*n);
        group.bench_with_input(BenchmarkId::new("sequential", n), n, |bench, _| {
            let config = AnalysisConfig::default();
            bench.iter(|| analyze_corpus(black_box(&corpus), &config))
        });
        group.bench_with_input(BenchmarkId::new("parallel_4", n), n, |bench, _| {
            let config = AnalysisConfig {
                workers: 4,
                ..AnalysisConfig::default()
            };
            bench.iter(|| analyze_corpus(black_box(&corpus), &config))
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// 4. report
// ---------------------------------------------------------------------------

fn bench_report(c: &mut Criterion) {
    let mut group = c.benchmark_group("report");
    let config = AnalysisConfig::default();
    for n in [50usize, 200].iter() {
        let (ids, pairs) = synthetic_pairs(*n);
        group.bench_with_input(BenchmarkId::new("clusters", n), n, |bench, _| {
            bench.iter(|| build_clusters(black_box(&pairs), 0.9))
        });
        group.bench_with_input(BenchmarkId::new("summary", n), n, |bench, _| {
            bench.iter(|| {
                summarize(
                    black_box(&pairs),
                    &ids,
                    &config.thresholds,
                    config.clone_threshold,
                    config.top_k,
                )
            })
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// 5. schema
// ---------------------------------------------------------------------------

fn bench_schema_init(c: &mut Criterion) {
    c.bench_function("schema_init", |b| {
        b.iter(|| {
            let conn = Connection::open_in_memory().unwrap();
            conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
            for stmt in SCHEMA_STATEMENTS {
                conn.execute_batch(stmt).unwrap();
            }
            migrate_schema(&conn).unwrap();
            black_box(conn)
        })
    });
}

criterion_group!(
    benches,
    bench_matcher,
    bench_engine,
    bench_pairwise,
    bench_report,
    bench_schema_init
);
criterion_main!(benches);
