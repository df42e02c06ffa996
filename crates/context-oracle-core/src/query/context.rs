//! Context assembly for a free-text query.
//!
//! The output starts with the source and embedded text of the single best
//! semantic match, followed by `dotpath\nsummary` entries for the top
//! structurally ranked symbols. Symbols whose embedding cannot be produced are
//! skipped without consuming a slot.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::{OracleError, OracleResult};
use crate::indexer::graph::SymbolGraph;
use crate::indexer::pagerank::{rank_for_query, SymbolRankConfig};
use crate::models::{EmbeddingRecord, Symbol};
use crate::query::guards::{clamp_related, truncate_query};
use crate::query::similarity::{best_match, SymbolSimilarity};
use crate::query::tokenizer::estimate_tokens;
use crate::store::embeddings::EmbeddingStore;

/// Combines semantic similarity with symbol rank into a bounded context blob.
#[derive(Clone, Debug)]
pub struct ContextAssembler {
    graph: Arc<SymbolGraph>,
    store: Arc<EmbeddingStore>,
    similarity: SymbolSimilarity,
    rank_config: SymbolRankConfig,
}

impl ContextAssembler {
    pub fn new(
        graph: Arc<SymbolGraph>,
        store: Arc<EmbeddingStore>,
        rank_config: SymbolRankConfig,
    ) -> OracleResult<Self> {
        rank_config.validate()?;
        Ok(Self {
            graph,
            similarity: SymbolSimilarity::new(Arc::clone(&store)),
            store,
            rank_config,
        })
    }

    pub fn graph(&self) -> &Arc<SymbolGraph> {
        &self.graph
    }

    pub fn store(&self) -> &Arc<EmbeddingStore> {
        &self.store
    }

    pub fn rank_config(&self) -> &SymbolRankConfig {
        &self.rank_config
    }

    fn best_record(&self, query: &str) -> Option<Arc<EmbeddingRecord>> {
        let scores = match self.similarity.similarity_scores(query) {
            Ok(scores) => scores,
            Err(e) => {
                warn!("Query could not be embedded, continuing without a best match: {e}");
                return None;
            }
        };
        let Some((symbol, score)) = best_match(&scores) else {
            debug!("No embeddings resident, continuing without a best match");
            return None;
        };
        debug!("Best semantic match {} (score {score:.4})", symbol.dotpath());
        match self.store.get(symbol) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Best match {symbol} has no embedding: {e}");
                None
            }
        }
    }

    /// Build the context for `query` with at most `max_related` ranked
    /// entries after the best match.
    pub fn assemble(&self, query: &str, max_related: usize) -> OracleResult<String> {
        let query = truncate_query(query);
        let max_related = clamp_related(max_related);
        if self.graph.is_empty() {
            return Err(OracleError::RankComputation(
                "cannot assemble context over an empty symbol graph".into(),
            ));
        }

        let best = self.best_record(&query);
        let mut text = String::new();
        if let Some(record) = best.as_ref() {
            text.push_str(&record.source_code);
            text.push_str(&record.embedding_source);
        }
        if max_related == 0 {
            return Ok(text);
        }

        let best_symbol: Option<&Symbol> = best.as_ref().map(|r| &r.symbol);
        let ranked = rank_for_query(&self.graph, &self.rank_config, &query)?;

        let mut appended = 0usize;
        let mut skipped = 0usize;
        for (symbol, _) in ranked.iter() {
            if appended >= max_related {
                break;
            }
            if best_symbol == Some(symbol) {
                continue;
            }
            match self.store.get(symbol) {
                Ok(record) => {
                    if !text.is_empty() && !text.ends_with('\n') {
                        text.push('\n');
                    }
                    text.push_str(symbol.dotpath());
                    text.push('\n');
                    text.push_str(&record.summary);
                    appended += 1;
                }
                Err(e) if e.is_localized() => {
                    warn!("Skipping related symbol {symbol}: {e}");
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "Assembled context: {} related of {} requested, {} skipped, ~{} tokens",
            appended,
            max_related,
            skipped,
            estimate_tokens(&text)
        );
        Ok(text)
    }
}
