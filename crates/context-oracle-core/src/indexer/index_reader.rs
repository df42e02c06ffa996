//! Index snapshot readers consumed by graph construction.
//!
//! The on-disk format of a code index is opaque to the graph; it only needs a
//! finite sequence of `(symbol_uri, relations)` entries. A reader returns the
//! outer error when the snapshot itself is unreadable and per-entry errors
//! for noise inside an otherwise readable snapshot.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{OracleError, OracleResult};
use crate::models::RelationKind;

/// One relation attached to an index entry.
///
/// `kind` stays raw text so that an unknown kind only drops this relation
/// during graph construction, not the whole entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRelation {
    pub target: String,
    pub kind: String,
}

impl IndexRelation {
    pub fn relation_kind(&self) -> OracleResult<RelationKind> {
        self.kind.parse()
    }
}

/// One `(symbol_uri, relations)` entry of an index snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub symbol: String,
    #[serde(default)]
    pub relations: Vec<IndexRelation>,
}

impl IndexEntry {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            relations: Vec::new(),
        }
    }

    pub fn with_relation(mut self, target: impl Into<String>, kind: RelationKind) -> Self {
        self.relations.push(IndexRelation {
            target: target.into(),
            kind: kind.as_str().to_string(),
        });
        self
    }
}

/// Capability for reading a snapshot of a code index.
pub trait IndexReader {
    fn entries(&self) -> OracleResult<Vec<OracleResult<IndexEntry>>>;
}

/// In-memory snapshot, mostly useful for tests and for callers that already
/// decoded an index themselves.
#[derive(Clone, Debug, Default)]
pub struct MemoryIndex {
    entries: Vec<IndexEntry>,
}

impl MemoryIndex {
    pub fn new(entries: Vec<IndexEntry>) -> Self {
        Self { entries }
    }

    pub fn push(&mut self, entry: IndexEntry) {
        self.entries.push(entry);
    }
}

impl IndexReader for MemoryIndex {
    fn entries(&self) -> OracleResult<Vec<OracleResult<IndexEntry>>> {
        Ok(self.entries.iter().cloned().map(Ok).collect())
    }
}

/// JSON-lines snapshot: one `{"symbol": .., "relations": [..]}` object per line.
#[derive(Clone, Debug)]
pub struct JsonLinesIndex {
    path: PathBuf,
}

impl JsonLinesIndex {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IndexReader for JsonLinesIndex {
    fn entries(&self) -> OracleResult<Vec<OracleResult<IndexEntry>>> {
        let file = File::open(&self.path).map_err(|e| {
            OracleError::Index(format!("failed to open {}: {e}", self.path.display()))
        })?;
        let mut entries = Vec::new();
        for (line_no, raw) in BufReader::new(file).split(b'\n').enumerate() {
            let raw = raw?;
            let line = match String::from_utf8(raw) {
                Ok(line) => line,
                Err(_) => {
                    entries.push(Err(OracleError::Index(format!(
                        "line {}: invalid UTF-8",
                        line_no + 1
                    ))));
                    continue;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let entry = serde_json::from_str::<IndexEntry>(trimmed).map_err(|e| {
                OracleError::Index(format!("line {}: {e}: {trimmed}", line_no + 1))
            });
            entries.push(entry);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_memory_index_yields_entries_in_order() {
        let index = MemoryIndex::new(vec![
            IndexEntry::new("a"),
            IndexEntry::new("b").with_relation("a", RelationKind::Calls),
        ]);
        let entries: Vec<IndexEntry> = index
            .entries()
            .unwrap()
            .into_iter()
            .map(|e| e.unwrap())
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[1].relations[0].relation_kind().unwrap(),
            RelationKind::Calls
        );
    }

    #[test]
    fn test_json_lines_index_reports_bad_lines_per_entry() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"symbol": "a", "relations": [{{"target": "b", "kind": "calls"}}]}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(file, r#"{{"symbol": "b"}}"#).unwrap();

        let entries = JsonLinesIndex::new(file.path()).entries().unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].is_ok());
        assert!(matches!(entries[1], Err(OracleError::Index(_))));
        assert!(entries[2].as_ref().unwrap().relations.is_empty());
    }

    #[test]
    fn test_json_lines_index_invalid_utf8_is_per_entry() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for i in 0..100 {
            writeln!(
                file,
                r#"{{"symbol": "scip-python python pkg 1.0 `pkg.mod`/f{i}()."}}"#
            )
            .unwrap();
        }
        file.write_all(b"{\"symbol\": \"\xff\xfe bad\"}\n").unwrap();
        file.flush().unwrap();

        let entries = JsonLinesIndex::new(file.path()).entries().unwrap();
        assert_eq!(entries.len(), 101);
        assert!(matches!(&entries[100], Err(OracleError::Index(msg)) if msg.contains("line 101")));

        let graph = crate::indexer::graph::SymbolGraph::build(&JsonLinesIndex::new(file.path())).unwrap();
        assert_eq!(graph.node_count(), 100);
        assert_eq!(graph.report().skipped_entries, 1);
    }

    #[test]
    fn test_unknown_relation_kind_keeps_entry() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"symbol": "a", "relations": [{{"target": "b", "kind": "imports"}}]}}"#
        )
        .unwrap();

        let entries = JsonLinesIndex::new(file.path()).entries().unwrap();
        let entry = entries[0].as_ref().unwrap();
        assert_eq!(entry.relations[0].kind, "imports");
        assert!(entry.relations[0].relation_kind().is_err());
    }

    #[test]
    fn test_json_lines_index_missing_file_is_hard_error() {
        let index = JsonLinesIndex::new("/nonexistent/snapshot.jsonl");
        assert!(index.entries().is_err());
    }
}
