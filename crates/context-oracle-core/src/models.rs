//! Shared typed models used across indexing, storage, and query layers.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::OracleError;

/// Compute a SHA-256 hex digest of the given text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// 1. DescriptorKind
// ---------------------------------------------------------------------------

/// Kind of a single descriptor segment, derived from its terminal marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorKind {
    Module,
    Class,
    Method,
    Attribute,
    Local,
    Parameter,
    Macro,
    Meta,
}

impl DescriptorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DescriptorKind::Module => "module",
            DescriptorKind::Class => "class",
            DescriptorKind::Method => "method",
            DescriptorKind::Attribute => "attribute",
            DescriptorKind::Local => "local",
            DescriptorKind::Parameter => "parameter",
            DescriptorKind::Macro => "macro",
            DescriptorKind::Meta => "meta",
        }
    }
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// 2. Descriptor / Package
// ---------------------------------------------------------------------------

/// One `(name, kind)` element of a symbol's descriptor chain.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Descriptor {
    pub name: String,
    pub kind: DescriptorKind,
    /// Method overload disambiguator, e.g. the `+1` in `run(+1).`.
    pub disambiguator: Option<String>,
}

impl Descriptor {
    pub fn new(name: impl Into<String>, kind: DescriptorKind) -> Self {
        Self {
            name: name.into(),
            kind,
            disambiguator: None,
        }
    }
}

/// Package segment of a symbol URI.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Package {
    pub manager: String,
    pub name: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// 3. Symbol
// ---------------------------------------------------------------------------

/// A uniquely identified code entity parsed from a canonical URI.
///
/// Identity (equality, hashing, cache keys) is the full URI. Two symbols from
/// different packages may share a dotpath, so the dotpath is only used for
/// display and for deterministic tie-breaking.
#[derive(Clone, Debug)]
pub struct Symbol {
    pub(crate) uri: String,
    pub(crate) scheme: String,
    pub(crate) package: Option<Package>,
    pub(crate) module_path: String,
    pub(crate) descriptors: Vec<Descriptor>,
    pub(crate) dotpath: String,
}

impl Symbol {
    pub(crate) fn from_parts(
        uri: String,
        scheme: String,
        package: Option<Package>,
        module_path: String,
        descriptors: Vec<Descriptor>,
    ) -> Self {
        let dotpath = descriptors
            .iter()
            .map(|d| d.name.as_str())
            .collect::<Vec<_>>()
            .join(".");
        Self {
            uri,
            scheme,
            package,
            module_path,
            descriptors,
            dotpath,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn package(&self) -> Option<&Package> {
        self.package.as_ref()
    }

    pub fn module_path(&self) -> &str {
        &self.module_path
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    pub fn dotpath(&self) -> &str {
        &self.dotpath
    }

    /// Kind of the terminal descriptor.
    pub fn kind(&self) -> DescriptorKind {
        self.descriptors
            .last()
            .map(|d| d.kind)
            .unwrap_or(DescriptorKind::Module)
    }

    /// Name of the terminal descriptor.
    pub fn name(&self) -> &str {
        self.descriptors
            .last()
            .map(|d| d.name.as_str())
            .unwrap_or("")
    }

    /// Ordering used wherever scores tie: lexical dotpath, then full URI.
    pub fn tie_break(&self, other: &Symbol) -> Ordering {
        self.dotpath
            .cmp(&other.dotpath)
            .then_with(|| self.uri.cmp(&other.uri))
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uri.hash(state);
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> Ordering {
        self.tie_break(other)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

impl FromStr for Symbol {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::indexer::symbols::parse_symbol(s)
    }
}

// ---------------------------------------------------------------------------
// 4. RelationKind
// ---------------------------------------------------------------------------

/// Typed relation between two symbols, directed source -> target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Contains,
    References,
    Calls,
    Inherits,
}

impl RelationKind {
    pub const ALL: [RelationKind; 4] = [
        RelationKind::Contains,
        RelationKind::References,
        RelationKind::Calls,
        RelationKind::Inherits,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Contains => "contains",
            RelationKind::References => "references",
            RelationKind::Calls => "calls",
            RelationKind::Inherits => "inherits",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationKind {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "contains" => Ok(RelationKind::Contains),
            "references" => Ok(RelationKind::References),
            "calls" => Ok(RelationKind::Calls),
            "inherits" => Ok(RelationKind::Inherits),
            other => Err(OracleError::Index(format!("unknown relation kind: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// 5. EmbeddingRecord
// ---------------------------------------------------------------------------

/// Cached embedding artifact for one symbol. Never mutated in place.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddingRecord {
    pub symbol: Symbol,
    pub vector: Vec<f32>,
    pub source_code: String,
    /// The exact text that was embedded.
    pub embedding_source: String,
    pub summary: String,
    /// SHA-256 of `embedding_source`.
    pub source_hash: String,
}

impl EmbeddingRecord {
    pub fn new(
        symbol: Symbol,
        vector: Vec<f32>,
        source_code: String,
        embedding_source: String,
        summary: String,
    ) -> Self {
        let source_hash = content_hash(&embedding_source);
        Self {
            symbol,
            vector,
            source_code,
            embedding_source,
            summary,
            source_hash,
        }
    }
}

// ---------------------------------------------------------------------------
// 6. RankResult
// ---------------------------------------------------------------------------

/// Ordered `(symbol, score)` pairs produced by one rank computation.
///
/// Scores cover every graph node, are non-negative and sum to 1.
#[derive(Clone, Debug)]
pub struct RankResult {
    pub ranked: Vec<(Symbol, f64)>,
    pub iterations: usize,
    pub converged: bool,
}

impl RankResult {
    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Symbol, f64)> {
        self.ranked.iter()
    }

    pub fn score_of(&self, symbol: &Symbol) -> Option<f64> {
        self.ranked
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, score)| *score)
    }

    pub fn total(&self) -> f64 {
        self.ranked.iter().map(|(_, score)| score).sum()
    }
}

impl IntoIterator for RankResult {
    type Item = (Symbol, f64);
    type IntoIter = std::vec::IntoIter<(Symbol, f64)>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranked.into_iter()
    }
}
