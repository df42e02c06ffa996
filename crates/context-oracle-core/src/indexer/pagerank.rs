//! PageRank computation over symbol graph edges.
//!
//! Plain PageRank teleports uniformly; the query variant concentrates the
//! teleport distribution on symbols whose names match the query. Dangling
//! nodes spread their mass uniformly over every node, so the scores always
//! form a distribution.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{OracleError, OracleResult};
use crate::indexer::graph::SymbolGraph;
use crate::models::{RankResult, RelationKind, Symbol};
use crate::query::guards::clamp_iterations;
use crate::query::tokenizer::{matches_query, query_terms};

/// Parameters of one rank computation. Reusable across calls.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolRankConfig {
    /// Probability mass retained by following edges.
    pub damping: f64,
    /// L1 delta between successive iterations below which we stop.
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Bias teleportation toward query seeds when any match.
    pub personalize: bool,
    /// Share of the teleport mass placed on seeds; the rest stays uniform.
    pub seed_weight: f64,
    /// Relation kinds followed by the random walk.
    pub relations: Vec<RelationKind>,
}

impl Default for SymbolRankConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            tolerance: 1e-6,
            max_iterations: 100,
            personalize: true,
            seed_weight: 1.0,
            relations: RelationKind::ALL.to_vec(),
        }
    }
}

impl SymbolRankConfig {
    pub fn validate(&self) -> OracleResult<()> {
        if !(self.damping > 0.0 && self.damping < 1.0) {
            return Err(OracleError::Config(format!(
                "damping must be in (0, 1), got {}",
                self.damping
            )));
        }
        if !(self.tolerance > 0.0) {
            return Err(OracleError::Config(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(OracleError::Config("max_iterations must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.seed_weight) {
            return Err(OracleError::Config(format!(
                "seed_weight must be in [0, 1], got {}",
                self.seed_weight
            )));
        }
        Ok(())
    }
}

/// Plain PageRank over the whole graph.
pub fn rank(graph: &SymbolGraph, config: &SymbolRankConfig) -> OracleResult<RankResult> {
    compute(graph, config, &[])
}

/// PageRank personalised toward symbols whose names match `query`.
///
/// With no matching symbol (or `personalize` off) this is exactly [`rank`].
pub fn rank_for_query(
    graph: &SymbolGraph,
    config: &SymbolRankConfig,
    query: &str,
) -> OracleResult<RankResult> {
    let seeds = if config.personalize {
        seed_indices(graph, query)
    } else {
        Vec::new()
    };
    debug!("Query {query:?} matched {} seed symbols", seeds.len());
    compute(graph, config, &seeds)
}

/// Symbols whose dotpath or descriptor names token-match `query`.
pub fn seed_set<'g>(graph: &'g SymbolGraph, query: &str) -> Vec<&'g Symbol> {
    seed_indices(graph, query)
        .into_iter()
        .filter_map(|idx| graph.symbol_at(idx))
        .collect()
}

fn seed_indices(graph: &SymbolGraph, query: &str) -> Vec<usize> {
    let terms = query_terms(query);
    if terms.is_empty() {
        return Vec::new();
    }
    graph
        .symbols()
        .enumerate()
        .filter(|(_, symbol)| matches_query(symbol, &terms))
        .map(|(idx, _)| idx)
        .collect()
}

fn compute(graph: &SymbolGraph, config: &SymbolRankConfig, seeds: &[usize]) -> OracleResult<RankResult> {
    let node_count = graph.node_count();
    if node_count == 0 {
        return Err(OracleError::RankComputation(
            "cannot rank an empty symbol graph".into(),
        ));
    }
    config.validate()?;

    let n = node_count as f64;
    let damping = config.damping;
    let uniform = 1.0 / n;

    let teleport: Vec<f64> = if seeds.is_empty() {
        vec![uniform; node_count]
    } else {
        let per_seed = config.seed_weight / seeds.len() as f64;
        let mut restart = vec![(1.0 - config.seed_weight) * uniform; node_count];
        for &seed in seeds {
            restart[seed] += per_seed;
        }
        restart
    };

    let adjacency: Vec<Vec<usize>> = (0..node_count)
        .map(|idx| {
            graph
                .out_edges(idx)
                .filter(|(_, kind)| config.relations.contains(kind))
                .map(|(target, _)| target)
                .collect()
        })
        .collect();

    let max_iterations = clamp_iterations(config.max_iterations);
    let mut scores = vec![uniform; node_count];
    let mut iterations = 0;
    let mut converged = false;
    let mut delta = f64::INFINITY;

    while iterations < max_iterations {
        iterations += 1;

        let dangling_mass: f64 = adjacency
            .iter()
            .zip(&scores)
            .filter(|(targets, _)| targets.is_empty())
            .map(|(_, score)| score)
            .sum();
        let dangling_contrib = damping * dangling_mass / n;

        let mut next_scores: Vec<f64> = teleport
            .iter()
            .map(|t| (1.0 - damping) * t + dangling_contrib)
            .collect();

        for (source, targets) in adjacency.iter().enumerate() {
            if targets.is_empty() {
                continue;
            }
            let share = damping * scores[source] / targets.len() as f64;
            for &target in targets {
                next_scores[target] += share;
            }
        }

        delta = next_scores
            .iter()
            .zip(&scores)
            .map(|(next, prev)| (next - prev).abs())
            .sum();
        scores = next_scores;
        if delta < config.tolerance {
            converged = true;
            break;
        }
    }

    if converged {
        debug!("Symbol rank converged after {iterations} iterations (delta {delta:.3e})");
    } else {
        warn!("Symbol rank hit the iteration cap ({iterations}) with delta {delta:.3e}; returning best effort");
    }

    // Floating point drift only; the update itself preserves total mass.
    let total: f64 = scores.iter().sum();
    if total > 0.0 {
        for score in &mut scores {
            *score /= total;
        }
    }

    let mut ranked: Vec<(Symbol, f64)> = scores
        .into_iter()
        .enumerate()
        .filter_map(|(idx, score)| graph.symbol_at(idx).map(|s| (s.clone(), score)))
        .collect();
    ranked.sort_by(|(sa, a), (sb, b)| b.total_cmp(a).then_with(|| sa.tie_break(sb)));

    Ok(RankResult {
        ranked,
        iterations,
        converged,
    })
}
