//! Per-symbol embedding cache with optional SQLite persistence.
//!
//! Records are computed lazily on first [`EmbeddingStore::get`] and kept in
//! memory. Nothing touches disk until [`EmbeddingStore::save`]; every public
//! method that does I/O opens its own connection.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use rusqlite::{params, Connection};
use tracing::{debug, info, warn};

use crate::errors::{OracleError, OracleResult};
use crate::indexer::symbols::parse_symbol;
use crate::models::{content_hash, EmbeddingRecord, Symbol};
use crate::providers::{EmbeddingProvider, SourceSpan, SymbolSource};
use crate::store::inflight::InFlight;
use crate::store::schema;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Expand a leading `~` to the user's home directory.
pub(crate) fn expand_tilde(path: &Path) -> PathBuf {
    let Some(text) = path.to_str() else {
        return path.to_path_buf();
    };
    if text == "~" || text.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            let mut expanded = PathBuf::from(home);
            if text.len() > 2 {
                expanded.push(&text[2..]);
            }
            return expanded;
        }
    }
    path.to_path_buf()
}

/// Encode a vector as a little-endian `f32` BLOB.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`]. Trailing partial chunks are
/// ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn check_vector(vector: &[f32], expected: Option<usize>) -> Result<(), String> {
    if vector.is_empty() {
        return Err("provider returned an empty vector".into());
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err("provider returned non-finite values".into());
    }
    match expected {
        Some(dims) if dims != vector.len() => Err(format!(
            "dimension mismatch: expected {dims}, got {}",
            vector.len()
        )),
        _ => Ok(()),
    }
}

fn failure_reason(err: OracleError) -> String {
    match err {
        OracleError::EmbeddingUnavailable { reason, .. } => reason,
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// EmbeddingStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Resident {
    by_uri: HashMap<String, Arc<EmbeddingRecord>>,
    dimension: Option<usize>,
}

/// Lazily populated map from symbol URI to [`EmbeddingRecord`].
///
/// Safe to share across threads. Concurrent `get` calls for the same missing
/// symbol trigger a single provider call; failures are returned to every
/// caller of that round and are not remembered.
pub struct EmbeddingStore {
    provider: Arc<dyn EmbeddingProvider>,
    sources: Arc<dyn SymbolSource>,
    resident: RwLock<Resident>,
    in_flight: InFlight<Arc<EmbeddingRecord>>,
    db_path: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for EmbeddingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingStore")
            .field("records", &self.len())
            .field("dimension", &self.dimension())
            .field("db_path", &self.db_path)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl EmbeddingStore {
    /// In-memory store with no backing file.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, sources: Arc<dyn SymbolSource>) -> Self {
        Self {
            provider,
            sources,
            resident: RwLock::new(Resident::default()),
            in_flight: InFlight::new(),
            db_path: None,
            timeout: None,
        }
    }

    /// Open (or create) a store backed by the SQLite file at `path` and load
    /// every persisted record. Rows whose URI no longer parses, or whose
    /// vector disagrees with the first loaded dimension, are skipped.
    pub fn open(
        path: impl AsRef<Path>,
        provider: Arc<dyn EmbeddingProvider>,
        sources: Arc<dyn SymbolSource>,
    ) -> OracleResult<Self> {
        let db_path = expand_tilde(path.as_ref());
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut store = Self::new(provider, sources);
        store.db_path = Some(db_path);
        let loaded = store.load()?;
        info!(
            "Opened embedding store at {} with {} records",
            store.db_path.as_deref().unwrap_or(Path::new("")).display(),
            loaded
        );
        Ok(store)
    }

    /// Bound each provider call by `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn connect(&self) -> OracleResult<Option<Connection>> {
        let Some(path) = self.db_path.as_ref() else {
            return Ok(None);
        };
        let conn = Connection::open(path)?;
        schema::init_schema(&conn)?;
        Ok(Some(conn))
    }

    fn load(&self) -> OracleResult<usize> {
        let Some(conn) = self.connect()? else {
            return Ok(0);
        };
        let mut stmt = conn.prepare(
            "SELECT uri, vector, source_code, embedding_source, summary, source_hash \
             FROM symbol_embeddings ORDER BY uri;",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut resident = self.resident.write();
        let mut skipped = 0usize;
        for row in rows {
            let (uri, blob, source_code, embedding_source, summary, source_hash) = row?;
            let symbol = match parse_symbol(&uri) {
                Ok(symbol) => symbol,
                Err(e) => {
                    warn!("Skipping persisted embedding {uri:?}: {e}");
                    skipped += 1;
                    continue;
                }
            };
            let vector = blob_to_vec(&blob);
            if let Err(reason) = check_vector(&vector, resident.dimension) {
                warn!("Skipping persisted embedding {uri:?}: {reason}");
                skipped += 1;
                continue;
            }
            resident.dimension.get_or_insert(vector.len());
            let source_hash = if source_hash.is_empty() {
                content_hash(&embedding_source)
            } else {
                source_hash
            };
            resident.by_uri.insert(
                uri,
                Arc::new(EmbeddingRecord {
                    symbol,
                    vector,
                    source_code,
                    embedding_source,
                    summary,
                    source_hash,
                }),
            );
        }
        if skipped > 0 {
            warn!("{skipped} persisted embeddings could not be loaded");
        }
        Ok(resident.by_uri.len())
    }

    /// Write every resident record to the backing file in one transaction and
    /// return the number of rows written. Fails with a config error when the
    /// store has no backing file.
    pub fn save(&self) -> OracleResult<usize> {
        let Some(mut conn) = self.connect()? else {
            return Err(OracleError::Config(
                "embedding store has no backing file".into(),
            ));
        };
        let snapshot = self.records();

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO symbol_embeddings\
                 (uri, dotpath, vector, source_code, embedding_source, summary, source_hash) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
                 ON CONFLICT(uri) DO UPDATE SET \
                 dotpath = excluded.dotpath, vector = excluded.vector, \
                 source_code = excluded.source_code, \
                 embedding_source = excluded.embedding_source, \
                 summary = excluded.summary, source_hash = excluded.source_hash;",
            )?;
            for record in &snapshot {
                stmt.execute(params![
                    record.symbol.uri(),
                    record.symbol.dotpath(),
                    vec_to_blob(&record.vector),
                    record.source_code,
                    record.embedding_source,
                    record.summary,
                    record.source_hash,
                ])?;
            }
        }
        tx.commit()?;

        info!("Saved {} embeddings", snapshot.len());
        Ok(snapshot.len())
    }

    // -- Lookup -------------------------------------------------------------

    fn cached(&self, uri: &str) -> Option<Arc<EmbeddingRecord>> {
        self.resident.read().by_uri.get(uri).cloned()
    }

    /// Return the record for `symbol`, computing and caching it on a miss.
    pub fn get(&self, symbol: &Symbol) -> OracleResult<Arc<EmbeddingRecord>> {
        let uri = symbol.uri();
        self.in_flight
            .get_or_compute(
                uri,
                || self.cached(uri),
                || self.compute(symbol),
                self.timeout,
            )
            .map_err(|reason| {
                debug!("Embedding unavailable for {uri}: {reason}");
                OracleError::unavailable(symbol, reason)
            })
    }

    /// Recompute the record for `symbol` when its current source text no
    /// longer matches the cached `source_hash`. Returns the fresh or
    /// unchanged record.
    pub fn refresh(&self, symbol: &Symbol) -> OracleResult<Arc<EmbeddingRecord>> {
        let uri = symbol.uri();
        let span = self
            .sources
            .source_for(symbol)
            .filter(|span| !span.is_empty())
            .ok_or_else(|| OracleError::unavailable(symbol, "no source available"))?;
        let current_hash = content_hash(span.embedding_source());

        self.in_flight
            .get_or_compute(
                uri,
                || self.cached(uri).filter(|r| r.source_hash == current_hash),
                || {
                    debug!("Source changed for {uri}, re-embedding");
                    self.embed_span(symbol, &span)
                },
                self.timeout,
            )
            .map_err(|reason| OracleError::unavailable(symbol, reason))
    }

    fn compute(&self, symbol: &Symbol) -> Result<Arc<EmbeddingRecord>, String> {
        let span = self
            .sources
            .source_for(symbol)
            .ok_or_else(|| "no source available".to_string())?;
        if span.is_empty() {
            return Err("source is empty".into());
        }
        self.embed_span(symbol, &span)
    }

    fn embed_span(
        &self,
        symbol: &Symbol,
        span: &SourceSpan,
    ) -> Result<Arc<EmbeddingRecord>, String> {
        let embedding_source = span.embedding_source().to_string();
        let vector = self.call_provider(&embedding_source).map_err(failure_reason)?;
        let record = EmbeddingRecord::new(
            symbol.clone(),
            vector,
            span.source_code.clone(),
            embedding_source,
            span.summary(),
        );
        self.store_record(record)
    }

    fn store_record(&self, record: EmbeddingRecord) -> Result<Arc<EmbeddingRecord>, String> {
        let mut resident = self.resident.write();
        check_vector(&record.vector, resident.dimension)?;
        resident.dimension.get_or_insert(record.vector.len());
        let record = Arc::new(record);
        resident
            .by_uri
            .insert(record.symbol.uri().to_string(), Arc::clone(&record));
        Ok(record)
    }

    fn call_provider(&self, text: &str) -> OracleResult<Vec<f32>> {
        let Some(timeout) = self.timeout else {
            return self.provider.embed(text);
        };

        let (tx, rx) = mpsc::channel();
        let provider = Arc::clone(&self.provider);
        let owned = text.to_string();
        std::thread::Builder::new()
            .name("oracle-embed".into())
            .spawn(move || {
                let _ = tx.send(provider.embed(&owned));
            })?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(OracleError::Provider(format!(
                "provider timed out after {} ms",
                timeout.as_millis()
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(OracleError::Provider(
                "provider exited without a result".into(),
            )),
        }
    }

    /// Embed free text with the store's provider, e.g. a user query. The
    /// vector is validated against the store's dimension when one is known.
    pub fn embed_text(&self, text: &str) -> OracleResult<Vec<f32>> {
        let vector = self.call_provider(text)?;
        check_vector(&vector, self.dimension()).map_err(OracleError::Provider)?;
        Ok(vector)
    }

    /// Insert a precomputed record, replacing any resident record for the
    /// same URI.
    pub fn insert(&self, record: EmbeddingRecord) -> OracleResult<Arc<EmbeddingRecord>> {
        let uri = record.symbol.uri().to_string();
        self.store_record(record)
            .map_err(|reason| OracleError::unavailable(uri, reason))
    }

    // -- Introspection -------------------------------------------------------

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.resident.read().by_uri.contains_key(symbol.uri())
    }

    pub fn len(&self) -> usize {
        self.resident.read().by_uri.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector length shared by every resident record, once known.
    pub fn dimension(&self) -> Option<usize> {
        self.resident.read().dimension
    }

    /// Snapshot of resident records ordered by URI.
    pub fn records(&self) -> Vec<Arc<EmbeddingRecord>> {
        let resident = self.resident.read();
        let mut records: Vec<_> = resident.by_uri.values().cloned().collect();
        records.sort_by(|a, b| a.symbol.uri().cmp(b.symbol.uri()));
        records
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }
}
