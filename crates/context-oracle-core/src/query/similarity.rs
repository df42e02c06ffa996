//! Cosine similarity between a query and every resident embedding.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::errors::OracleResult;
use crate::models::Symbol;
use crate::store::embeddings::EmbeddingStore;

/// Cosine similarity computed in `f64` and clamped to `[-1, 1]`.
///
/// Returns `None` for vectors of different lengths. A zero-norm side scores
/// `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f64::EPSILON {
        return Some(0.0);
    }
    Some((dot / denom).clamp(-1.0, 1.0))
}

/// Highest score first; ties by dotpath, then URI.
fn by_score(a: &(Symbol, f64), b: &(Symbol, f64)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.tie_break(&b.0))
}

/// The single best match: maximum score, ties broken by dotpath then URI.
pub fn best_match(scores: &HashMap<Symbol, f64>) -> Option<(&Symbol, f64)> {
    scores
        .iter()
        .min_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.tie_break(b.0)))
        .map(|(symbol, score)| (symbol, *score))
}

/// Scores symbols against free-text queries using an [`EmbeddingStore`].
#[derive(Clone, Debug)]
pub struct SymbolSimilarity {
    store: Arc<EmbeddingStore>,
}

impl SymbolSimilarity {
    pub fn new(store: Arc<EmbeddingStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<EmbeddingStore> {
        &self.store
    }

    /// Embed `query` and score it against every resident record. Symbols with
    /// no record are absent from the result; nothing is sorted.
    pub fn similarity_scores(&self, query: &str) -> OracleResult<HashMap<Symbol, f64>> {
        if self.store.is_empty() {
            debug!("No resident embeddings to score");
            return Ok(HashMap::new());
        }
        let query_vector = self.store.embed_text(query)?;
        Ok(self.scores_for_vector(&query_vector))
    }

    /// Score a precomputed query vector against every resident record.
    pub fn scores_for_vector(&self, query_vector: &[f32]) -> HashMap<Symbol, f64> {
        let records = self.store.records();
        let scored: Vec<Option<(Symbol, f64)>> = records
            .par_iter()
            .map(|record| {
                cosine_similarity(query_vector, &record.vector)
                    .map(|score| (record.symbol.clone(), score))
            })
            .collect();

        let mismatched = scored.iter().filter(|s| s.is_none()).count();
        if mismatched > 0 {
            warn!(
                "Skipped {} embeddings whose dimension differs from the query ({})",
                mismatched,
                query_vector.len()
            );
        }
        scored.into_iter().flatten().collect()
    }

    /// Top `k` symbols for `query`, highest score first.
    pub fn nearest(&self, query: &str, k: usize) -> OracleResult<Vec<(Symbol, f64)>> {
        let mut ranked: Vec<(Symbol, f64)> = self.similarity_scores(query)?.into_iter().collect();
        ranked.sort_by(by_score);
        ranked.truncate(k);
        Ok(ranked)
    }
}
