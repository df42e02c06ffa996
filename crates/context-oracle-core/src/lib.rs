//! Context oracle core library.
//!
//! Answers "which symbols of this codebase matter for this query" by combining
//! a PageRank-style importance ranking over a symbol relationship graph with
//! cosine similarity over cached per-symbol embeddings. The main entry points:
//!
//! - [`indexer::symbols::parse_symbol`] turns canonical symbol URIs into
//!   [`models::Symbol`] values.
//! - [`indexer::graph::SymbolGraph::build`] builds the relationship graph from
//!   an [`indexer::index_reader::IndexReader`].
//! - [`indexer::pagerank`] ranks the graph, optionally personalised to a query.
//! - [`store::embeddings::EmbeddingStore`] lazily computes and persists
//!   embeddings through a pluggable [`providers::EmbeddingProvider`].
//! - [`query::context::ContextAssembler`] assembles the final context text.
//! - [`tools`] exposes the assembler to agent runtimes.
//!
//! The crate logs through `tracing` and never installs a subscriber.

pub mod config;
pub mod errors;
pub mod indexer;
pub mod models;
pub mod providers;
pub mod query;
pub mod store;
pub mod tools;

pub use config::OracleConfig;
pub use errors::{OracleError, OracleResult};
pub use indexer::graph::{BuildReport, SymbolGraph};
pub use indexer::index_reader::{IndexEntry, IndexReader, JsonLinesIndex, MemoryIndex};
pub use indexer::pagerank::{rank, rank_for_query, SymbolRankConfig};
pub use indexer::symbols::parse_symbol;
pub use models::{
    Descriptor, DescriptorKind, EmbeddingRecord, Package, RankResult, RelationKind, Symbol,
};
pub use providers::{EmbeddingProvider, InMemorySources, SourceSpan, SymbolSource, TokenHashEmbedder};
pub use query::context::ContextAssembler;
pub use query::similarity::SymbolSimilarity;
pub use store::embeddings::EmbeddingStore;
pub use tools::{Tool, ToolDeps, ToolKind, ToolRegistry};

use std::sync::Arc;

/// Wire a ready-to-use assembler from a config: build the graph from
/// `reader`, open the embedding store (persistent when configured) and apply
/// the provider timeout.
pub fn assembler_from_config<R: IndexReader + ?Sized>(
    config: &OracleConfig,
    reader: &R,
    provider: Arc<dyn EmbeddingProvider>,
    sources: Arc<dyn SymbolSource>,
) -> OracleResult<ContextAssembler> {
    config.validate()?;
    let graph = Arc::new(SymbolGraph::build(reader)?);
    let store = match config.embedding_store.as_ref() {
        Some(path) => EmbeddingStore::open(path, provider, sources)?,
        None => EmbeddingStore::new(provider, sources),
    }
    .with_timeout(config.provider_timeout());
    ContextAssembler::new(graph, Arc::new(store), config.rank.clone())
}
