//! Criterion benchmarks for context-oracle-core.
//!
//! ## Benchmark groups
//!
//! 1. **parse** — Symbol URI parsing.
//! 2. **graph_build** — Graph construction from an in-memory index.
//! 3. **pagerank** — Plain and query-personalised convergence.
//! 4. **similarity** — Cosine scoring over resident embeddings.
//! 5. **assemble** — End-to-end context assembly with a warm store.
//! 6. **store** — SQLite save of a populated embedding store.
//!
//! ## Running
//!
//! ```sh
//! cargo bench --manifest-path crates/context-oracle-core/Cargo.toml
//! # Run only the pagerank group:
//! cargo bench --manifest-path crates/context-oracle-core/Cargo.toml -- pagerank
//! ```

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use context_oracle::indexer::graph::SymbolGraph;
use context_oracle::indexer::index_reader::{IndexEntry, MemoryIndex};
use context_oracle::indexer::pagerank::{rank, rank_for_query, SymbolRankConfig};
use context_oracle::indexer::symbols::parse_symbol;
use context_oracle::models::RelationKind;
use context_oracle::providers::{InMemorySources, SourceSpan, TokenHashEmbedder};
use context_oracle::query::context::ContextAssembler;
use context_oracle::query::similarity::SymbolSimilarity;
use context_oracle::store::embeddings::EmbeddingStore;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const SAMPLE_URIS: &[&str] = &[
    "scip-python python automata 75482692a6fe35f0fe5b6aa1fb9e7e3c4e2d1c5e `automata.core.base.tool`/ToolNotFoundError#__init__().",
    "scip-python python automata 75482692a6fe35f0fe5b6aa1fb9e7e3c4e2d1c5e `automata.core.tasks.automata_task_executor`/logger.",
    "scip-python python automata 75482692a6fe35f0fe5b6aa1fb9e7e3c4e2d1c5e `automata.core.symbol.graph`/SymbolGraph#get_potential_symbol_callers().(symbol)",
    "local 42",
];

fn uri(i: usize) -> String {
    format!(
        "scip-python python bench 1.0 `bench.mod{}`/Class{}#method_{}().",
        i % 17,
        i % 31,
        i
    )
}

/// `n` symbols; each calls the next two (wrapping) and every fifth symbol
/// also inherits from symbol 0, so rank has non-trivial structure.
fn synthetic_index(n: usize) -> MemoryIndex {
    let mut index = MemoryIndex::default();
    for i in 0..n {
        let mut entry = IndexEntry::new(uri(i))
            .with_relation(uri((i + 1) % n), RelationKind::Calls)
            .with_relation(uri((i + 2) % n), RelationKind::References);
        if i % 5 == 0 && i != 0 {
            entry = entry.with_relation(uri(0), RelationKind::Inherits);
        }
        index.push(entry);
    }
    index
}

fn warm_store(n: usize) -> Arc<EmbeddingStore> {
    let mut sources = InMemorySources::new();
    for i in 0..n {
        let symbol = parse_symbol(&uri(i)).unwrap();
        sources.insert(
            &symbol,
            SourceSpan::new(format!("def method_{i}(self):\n    return self.value_{i}"))
                .with_docstring(format!("Method {i} of class {} computes a value.", i % 31)),
        );
    }
    let store = Arc::new(EmbeddingStore::new(
        Arc::new(TokenHashEmbedder::default()),
        Arc::new(sources),
    ));
    for i in 0..n {
        store.get(&parse_symbol(&uri(i)).unwrap()).unwrap();
    }
    store
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    group.bench_function("sample_uris", |b| {
        b.iter(|| {
            for uri in SAMPLE_URIS {
                black_box(parse_symbol(black_box(uri)).unwrap());
            }
        })
    });
    group.bench_function("malformed", |b| {
        b.iter(|| black_box(parse_symbol(black_box("scip-python python pkg 1.0 no-module")).is_err()))
    });
    group.finish();
}

fn bench_graph_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_build");
    for &n in &[100, 1_000, 5_000] {
        let index = synthetic_index(n);
        group.bench_with_input(BenchmarkId::new("memory_index", n), &index, |b, index| {
            b.iter(|| black_box(SymbolGraph::build(index).unwrap()))
        });
    }
    group.finish();
}

fn bench_pagerank(c: &mut Criterion) {
    let mut group = c.benchmark_group("pagerank");
    group.measurement_time(std::time::Duration::from_secs(10));
    let config = SymbolRankConfig::default();

    for &n in &[100, 1_000, 5_000] {
        let graph = SymbolGraph::build(&synthetic_index(n)).unwrap();
        group.bench_with_input(BenchmarkId::new("plain", n), &graph, |b, graph| {
            b.iter(|| black_box(rank(graph, &config).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("personalized", n), &graph, |b, graph| {
            b.iter(|| black_box(rank_for_query(graph, &config, "method_7 Class3").unwrap()))
        });
    }
    group.finish();
}

fn bench_similarity(c: &mut Criterion) {
    let mut group = c.benchmark_group("similarity");
    for &n in &[100, 1_000] {
        let similarity = SymbolSimilarity::new(warm_store(n));
        group.bench_with_input(BenchmarkId::new("scores", n), &similarity, |b, similarity| {
            b.iter(|| black_box(similarity.similarity_scores("computes a value").unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("nearest_10", n), &similarity, |b, similarity| {
            b.iter(|| black_box(similarity.nearest("computes a value", 10).unwrap()))
        });
    }
    group.finish();
}

fn bench_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("assemble");
    for &n in &[100, 1_000] {
        let graph = Arc::new(SymbolGraph::build(&synthetic_index(n)).unwrap());
        let assembler =
            ContextAssembler::new(graph, warm_store(n), SymbolRankConfig::default()).unwrap();
        group.bench_with_input(BenchmarkId::new("max_related_5", n), &assembler, |b, a| {
            b.iter(|| black_box(a.assemble("method_3 value", 5).unwrap()))
        });
    }
    group.finish();
}

fn bench_store_save(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");
    group.sample_size(10);
    let n = 1_000;
    group.bench_function(BenchmarkId::new("save", n), |b| {
        b.iter_with_setup(
            || {
                let dir = tempfile::tempdir().unwrap();
                let store = EmbeddingStore::open(
                    dir.path().join("bench.db"),
                    Arc::new(TokenHashEmbedder::default()),
                    Arc::new(InMemorySources::new()),
                )
                .unwrap();
                for record in warm_store(n).records() {
                    store.insert((*record).clone()).unwrap();
                }
                (dir, store)
            },
            |(dir, store)| {
                black_box(store.save().unwrap());
                drop(dir);
            },
        );
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_parse,
    bench_graph_build,
    bench_pagerank,
    bench_similarity,
    bench_assemble,
    bench_store_save,
);
criterion_main!(benches);
