//! Read-only symbol relationship graph built from an index snapshot.
//!
//! Nodes live in an insertion-ordered set so that node indices are stable for
//! a given snapshot; edges are stored once and referenced from per-node
//! outgoing/incoming lists. After `build` returns the graph is never mutated.

use std::collections::HashSet;

use indexmap::IndexSet;
use tracing::{debug, info, warn};

use crate::errors::OracleResult;
use crate::indexer::index_reader::IndexReader;
use crate::indexer::symbols::parse_symbol;
use crate::models::{DescriptorKind, RelationKind, Symbol};

const MAX_SKIP_SAMPLES: usize = 8;

/// A typed directed edge between two node indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Edge {
    pub source: usize,
    pub target: usize,
    pub kind: RelationKind,
}

/// Diagnostics collected while building a graph.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub entries_seen: usize,
    pub symbols: usize,
    pub edges: usize,
    pub skipped_entries: usize,
    pub skipped_relations: usize,
    pub duplicate_edges: usize,
    /// First few offending texts, for diagnostics.
    pub skipped_samples: Vec<String>,
}

impl BuildReport {
    fn record_skip(&mut self, text: String) {
        if self.skipped_samples.len() < MAX_SKIP_SAMPLES {
            self.skipped_samples.push(text);
        }
    }
}

#[derive(Debug, Default)]
struct GraphBuilder {
    nodes: IndexSet<Symbol>,
    edges: Vec<Edge>,
    seen_edges: HashSet<Edge>,
    report: BuildReport,
}

impl GraphBuilder {
    fn add_node(&mut self, symbol: Symbol) -> usize {
        self.nodes.insert_full(symbol).0
    }

    fn add_edge(&mut self, source: usize, target: usize, kind: RelationKind) {
        let edge = Edge {
            source,
            target,
            kind,
        };
        if self.seen_edges.insert(edge) {
            self.edges.push(edge);
        } else {
            self.report.duplicate_edges += 1;
        }
    }

    fn finish(mut self) -> SymbolGraph {
        let mut outgoing = vec![Vec::new(); self.nodes.len()];
        let mut incoming = vec![Vec::new(); self.nodes.len()];
        for (edge_idx, edge) in self.edges.iter().enumerate() {
            outgoing[edge.source].push(edge_idx);
            incoming[edge.target].push(edge_idx);
        }
        self.report.symbols = self.nodes.len();
        self.report.edges = self.edges.len();
        SymbolGraph {
            nodes: self.nodes,
            edges: self.edges,
            outgoing,
            incoming,
            report: self.report,
        }
    }
}

/// Immutable directed graph of symbols and their typed relations.
#[derive(Debug, Clone)]
pub struct SymbolGraph {
    nodes: IndexSet<Symbol>,
    edges: Vec<Edge>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
    report: BuildReport,
}

impl SymbolGraph {
    /// Build a graph from an index snapshot.
    ///
    /// Malformed entry URIs, malformed relation targets and unknown relation
    /// kinds are skipped and
    /// counted in the [`BuildReport`]; only an unreadable snapshot fails.
    pub fn build<R: IndexReader + ?Sized>(reader: &R) -> OracleResult<Self> {
        let mut builder = GraphBuilder::default();

        for entry in reader.entries()? {
            builder.report.entries_seen += 1;
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable index entry: {e}");
                    builder.report.skipped_entries += 1;
                    builder.report.record_skip(e.to_string());
                    continue;
                }
            };
            let source = match parse_symbol(&entry.symbol) {
                Ok(symbol) => builder.add_node(symbol),
                Err(e) => {
                    debug!("Skipping malformed index entry: {e}");
                    builder.report.skipped_entries += 1;
                    builder.report.record_skip(entry.symbol);
                    continue;
                }
            };
            for relation in entry.relations {
                let kind = match relation.relation_kind() {
                    Ok(kind) => kind,
                    Err(e) => {
                        debug!("Skipping relation with unknown kind: {e}");
                        builder.report.skipped_relations += 1;
                        builder.report.record_skip(format!("{} -> {}", relation.kind, relation.target));
                        continue;
                    }
                };
                match parse_symbol(&relation.target) {
                    Ok(target) => {
                        let target = builder.add_node(target);
                        builder.add_edge(source, target, kind);
                    }
                    Err(e) => {
                        debug!("Skipping malformed relation target: {e}");
                        builder.report.skipped_relations += 1;
                        builder.report.record_skip(relation.target);
                    }
                }
            }
        }

        let graph = builder.finish();
        let report = &graph.report;
        info!(
            "Built symbol graph: {} symbols, {} edges from {} entries",
            report.symbols, report.edges, report.entries_seen
        );
        if report.skipped_entries > 0 || report.skipped_relations > 0 {
            warn!(
                "Symbol graph skipped {} malformed entries and {} malformed relations (samples: {:?})",
                report.skipped_entries, report.skipped_relations, report.skipped_samples
            );
        }
        Ok(graph)
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All symbols in snapshot order.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.nodes.iter()
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.nodes.contains(symbol)
    }

    /// Look a symbol up by its full URI.
    pub fn lookup(&self, uri: &str) -> Option<&Symbol> {
        self.nodes.iter().find(|s| s.uri() == uri)
    }

    /// All symbols sharing a dotpath; more than one means a cross-package collision.
    pub fn find_by_dotpath(&self, dotpath: &str) -> Vec<&Symbol> {
        self.nodes.iter().filter(|s| s.dotpath() == dotpath).collect()
    }

    /// Targets of `symbol`'s outgoing edges, optionally restricted to one kind.
    pub fn outgoing(&self, symbol: &Symbol, kind: Option<RelationKind>) -> Vec<(&Symbol, RelationKind)> {
        self.neighbours(symbol, kind, &self.outgoing, |edge| edge.target)
    }

    /// Sources of `symbol`'s incoming edges, optionally restricted to one kind.
    pub fn incoming(&self, symbol: &Symbol, kind: Option<RelationKind>) -> Vec<(&Symbol, RelationKind)> {
        self.neighbours(symbol, kind, &self.incoming, |edge| edge.source)
    }

    fn neighbours(
        &self,
        symbol: &Symbol,
        kind: Option<RelationKind>,
        lists: &[Vec<usize>],
        endpoint: impl Fn(&Edge) -> usize,
    ) -> Vec<(&Symbol, RelationKind)> {
        let Some(idx) = self.nodes.get_index_of(symbol) else {
            return Vec::new();
        };
        lists[idx]
            .iter()
            .map(|&edge_idx| &self.edges[edge_idx])
            .filter(|edge| kind.map_or(true, |k| edge.kind == k))
            .filter_map(|edge| self.nodes.get_index(endpoint(edge)).map(|s| (s, edge.kind)))
            .collect()
    }

    /// Graph restricted to nodes whose terminal descriptor has `kind`, keeping
    /// only the edges between retained nodes.
    pub fn subgraph(&self, kind: DescriptorKind) -> SymbolGraph {
        let mut builder = GraphBuilder::default();
        let mut remap = vec![None; self.nodes.len()];
        for (idx, symbol) in self.nodes.iter().enumerate() {
            if symbol.kind() == kind {
                remap[idx] = Some(builder.add_node(symbol.clone()));
            }
        }
        for edge in &self.edges {
            if let (Some(source), Some(target)) = (remap[edge.source], remap[edge.target]) {
                builder.add_edge(source, target, edge.kind);
            }
        }
        builder.report.entries_seen = builder.nodes.len();
        builder.finish()
    }

    pub(crate) fn symbol_at(&self, idx: usize) -> Option<&Symbol> {
        self.nodes.get_index(idx)
    }

    /// Outgoing edges of node `idx` as `(target, kind)` pairs.
    pub(crate) fn out_edges(&self, idx: usize) -> impl Iterator<Item = (usize, RelationKind)> + '_ {
        self.outgoing[idx].iter().map(move |&edge_idx| {
            let edge = &self.edges[edge_idx];
            (edge.target, edge.kind)
        })
    }
}
