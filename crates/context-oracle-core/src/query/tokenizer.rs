//! Token helpers shared by seed matching and the offline embedder.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::Symbol;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]+").unwrap());

/// Lowercased identifier-like tokens of at least two characters.
pub fn tokens(value: &str) -> Vec<String> {
    TOKEN_RE
        .find_iter(value)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

pub fn query_terms(query: &str) -> HashSet<String> {
    tokens(query).into_iter().collect()
}

/// Tokens a query may match on a symbol: every descriptor name whole, plus
/// its snake_case parts.
pub fn symbol_tokens(symbol: &Symbol) -> HashSet<String> {
    let mut out = HashSet::new();
    for descriptor in symbol.descriptors() {
        for token in tokens(&descriptor.name) {
            for part in token.split('_').filter(|p| p.len() >= 2) {
                out.insert(part.to_string());
            }
            out.insert(token);
        }
    }
    out
}

pub fn matches_query(symbol: &Symbol, terms: &HashSet<String>) -> bool {
    if terms.is_empty() {
        return false;
    }
    let symbol_terms = symbol_tokens(symbol);
    terms.iter().any(|t| symbol_terms.contains(t))
}

/// Rough token count used for sizing context output.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    ((text.len() as f64 / 3.5) as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::symbols::parse_symbol;

    #[test]
    fn test_tokens_lowercase_and_skip_short() {
        assert_eq!(tokens("Tell me about SymbolRank!"), vec!["tell", "me", "about", "symbolrank"]);
        assert!(tokens("a b c").is_empty());
    }

    #[test]
    fn test_symbol_tokens_include_module_and_snake_parts() {
        let s = parse_symbol("scip-python python demo 1.0 `core.embedding`/EmbeddingStore#get_embedding().")
            .unwrap();
        let toks = symbol_tokens(&s);
        for expected in ["core", "embedding", "embeddingstore", "get_embedding", "get"] {
            assert!(toks.contains(expected), "missing {expected}");
        }
    }

    #[test]
    fn test_matches_query() {
        let s = parse_symbol("scip-python python demo 1.0 `core.rank`/SymbolRank#").unwrap();
        assert!(matches_query(&s, &query_terms("explain symbolrank")));
        assert!(!matches_query(&s, &query_terms("tokenizer")));
        assert!(!matches_query(&s, &query_terms("")));
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("ab"), 1);
        assert_eq!(estimate_tokens(&"x".repeat(35)), 10);
    }
}
