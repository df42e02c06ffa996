//! Pluggable capabilities consumed by the embedding store.
//!
//! [`EmbeddingProvider`] turns text into a fixed-length vector and
//! [`SymbolSource`] locates the source text of a symbol. Vendor clients live
//! outside this crate; [`TokenHashEmbedder`] is a deterministic offline
//! provider for tests, benchmarks and air-gapped use.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::errors::OracleResult;
use crate::models::Symbol;
use crate::query::tokenizer::tokens;

const SUMMARY_MAX_CHARS: usize = 200;

/// Text-to-vector capability. Implementations must return vectors of a
/// constant length with finite values.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> OracleResult<Vec<f32>>;
}

impl<F> EmbeddingProvider for F
where
    F: Fn(&str) -> OracleResult<Vec<f32>> + Send + Sync,
{
    fn embed(&self, text: &str) -> OracleResult<Vec<f32>> {
        self(text)
    }
}

/// Raw source span located for a symbol.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceSpan {
    pub source_code: String,
    pub docstring: Option<String>,
}

impl SourceSpan {
    pub fn new(source_code: impl Into<String>) -> Self {
        Self {
            source_code: source_code.into(),
            docstring: None,
        }
    }

    pub fn with_docstring(mut self, docstring: impl Into<String>) -> Self {
        self.docstring = Some(docstring.into());
        self
    }

    /// Text handed to the provider: the docstring when present, otherwise the
    /// source code.
    pub fn embedding_source(&self) -> &str {
        match self.docstring.as_deref().map(str::trim) {
            Some(doc) if !doc.is_empty() => doc,
            _ => &self.source_code,
        }
    }

    /// First non-empty line of the embedded text, capped in length.
    pub fn summary(&self) -> String {
        let line = self
            .embedding_source()
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("");
        if line.chars().count() <= SUMMARY_MAX_CHARS {
            line.to_string()
        } else {
            let mut cut: String = line.chars().take(SUMMARY_MAX_CHARS).collect();
            cut.push_str("...");
            cut
        }
    }

    pub fn is_empty(&self) -> bool {
        self.source_code.trim().is_empty()
            && self.docstring.as_deref().map_or(true, |d| d.trim().is_empty())
    }
}

/// Locates the source text associated with a symbol.
pub trait SymbolSource: Send + Sync {
    fn source_for(&self, symbol: &Symbol) -> Option<SourceSpan>;
}

impl<F> SymbolSource for F
where
    F: Fn(&Symbol) -> Option<SourceSpan> + Send + Sync,
{
    fn source_for(&self, symbol: &Symbol) -> Option<SourceSpan> {
        self(symbol)
    }
}

/// Source spans keyed by full symbol URI.
#[derive(Clone, Debug, Default)]
pub struct InMemorySources {
    spans: HashMap<String, SourceSpan>,
}

impl InMemorySources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: &Symbol, span: SourceSpan) {
        self.spans.insert(symbol.uri().to_string(), span);
    }

    pub fn remove(&mut self, symbol: &Symbol) -> Option<SourceSpan> {
        self.spans.remove(symbol.uri())
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

impl SymbolSource for InMemorySources {
    fn source_for(&self, symbol: &Symbol) -> Option<SourceSpan> {
        self.spans.get(symbol.uri()).cloned()
    }
}

/// Feature-hashing bag-of-words embedder.
///
/// Each token is hashed with SHA-256 into one of `dims` buckets with a sign
/// taken from the digest; the result is L2-normalised. Deterministic across
/// runs and platforms.
#[derive(Clone, Debug)]
pub struct TokenHashEmbedder {
    dims: usize,
}

impl TokenHashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }
}

impl Default for TokenHashEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EmbeddingProvider for TokenHashEmbedder {
    fn embed(&self, text: &str) -> OracleResult<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dims];
        for token in tokens(text) {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u64::from_le_bytes([
                digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6],
                digest[7],
            ]) as usize
                % self.dims;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::OracleError;

    #[test]
    fn test_embedding_source_prefers_docstring() {
        let span = SourceSpan::new("def rank(self):\n    pass").with_docstring("Rank symbols.\nMore.");
        assert_eq!(span.embedding_source(), "Rank symbols.\nMore.");
        assert_eq!(span.summary(), "Rank symbols.");

        let bare = SourceSpan::new("\n  def rank(self):\n    pass").with_docstring("   ");
        assert_eq!(bare.embedding_source(), "\n  def rank(self):\n    pass");
        assert_eq!(bare.summary(), "def rank(self):");
    }

    #[test]
    fn test_summary_is_capped() {
        let span = SourceSpan::new("x".repeat(500));
        assert_eq!(span.summary().chars().count(), SUMMARY_MAX_CHARS + 3);
    }

    #[test]
    fn test_token_hash_embedder_is_deterministic_and_normalised() {
        let embedder = TokenHashEmbedder::new(64);
        let a = embedder.embed("symbol rank graph").unwrap();
        let b = embedder.embed("symbol rank graph").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!(embedder.embed("").unwrap().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_closure_provider() {
        let provider = |text: &str| -> OracleResult<Vec<f32>> {
            if text.is_empty() {
                Err(OracleError::Provider("empty".into()))
            } else {
                Ok(vec![text.len() as f32])
            }
        };
        assert_eq!(provider.embed("abc").unwrap(), vec![3.0]);
        assert!(provider.embed("").is_err());
    }
}
