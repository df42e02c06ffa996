//! SQLite schema DDL and migration framework for the embedding store.

use rusqlite::Connection;

use crate::errors::OracleResult;
use crate::models::content_hash;

/// Current schema version. Migrations run from whatever the DB currently
/// reports up to this value.
pub const SCHEMA_VERSION: i32 = 2;

/// Core DDL statements, safe to replay on an already-initialised database.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS store_meta (
        key TEXT PRIMARY KEY,
        value TEXT
    );",
    "CREATE TABLE IF NOT EXISTS symbol_embeddings (
        uri TEXT PRIMARY KEY,
        dotpath TEXT NOT NULL,
        vector BLOB NOT NULL,
        source_code TEXT NOT NULL,
        embedding_source TEXT NOT NULL,
        summary TEXT NOT NULL,
        source_hash TEXT NOT NULL DEFAULT ''
    );",
    "CREATE TABLE IF NOT EXISTS migration_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        from_version INTEGER NOT NULL,
        to_version INTEGER NOT NULL,
        status TEXT NOT NULL,
        error_message TEXT,
        applied_at TEXT DEFAULT CURRENT_TIMESTAMP
    );",
    "CREATE INDEX IF NOT EXISTS idx_symbol_embeddings_dotpath ON symbol_embeddings(dotpath);",
];

/// Create all tables and run pending migrations.
pub fn init_schema(conn: &Connection) -> OracleResult<()> {
    for stmt in SCHEMA_STATEMENTS {
        conn.execute_batch(stmt)?;
    }
    migrate_schema(conn)
}

// ─── Migration framework ────────────────────────────────────────────────────

/// Run all pending migrations up to [`SCHEMA_VERSION`]. Each step runs inside
/// a SAVEPOINT so a failure rolls back only that step.
pub fn migrate_schema(conn: &Connection) -> OracleResult<()> {
    let mut current_version = get_schema_version(conn);

    while current_version < SCHEMA_VERSION {
        let next_version = current_version + 1;
        conn.execute_batch("SAVEPOINT oracle_migrate_step;")?;

        let step_result = (|| -> OracleResult<()> {
            match next_version {
                1 => migrate_to_v1(conn)?,
                2 => migrate_to_v2(conn)?,
                _ => {}
            }
            set_schema_version(conn, next_version)?;
            record_migration_step(conn, current_version, next_version, "success", None)?;
            conn.execute_batch("RELEASE SAVEPOINT oracle_migrate_step;")?;
            Ok(())
        })();

        match step_result {
            Ok(()) => {
                current_version = next_version;
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK TO SAVEPOINT oracle_migrate_step;");
                let _ = conn.execute_batch("RELEASE SAVEPOINT oracle_migrate_step;");
                let _ = record_migration_step(
                    conn,
                    current_version,
                    next_version,
                    "failed",
                    Some(&e.to_string()),
                );
                return Err(e);
            }
        }
    }

    Ok(())
}

/// Read the current schema version from `store_meta`.
/// Returns 0 when the key is absent or unparseable.
pub fn get_schema_version(conn: &Connection) -> i32 {
    let result: Result<String, _> = conn.query_row(
        "SELECT value FROM store_meta WHERE key = 'schema_version';",
        [],
        |row| row.get(0),
    );
    match result {
        Ok(v) => v.parse::<i32>().unwrap_or(0),
        Err(_) => 0,
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> OracleResult<()> {
    conn.execute(
        "INSERT INTO store_meta(key, value) VALUES('schema_version', ?1) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
        rusqlite::params![version.to_string()],
    )?;
    Ok(())
}

fn record_migration_step(
    conn: &Connection,
    from_v: i32,
    to_v: i32,
    status: &str,
    error_msg: Option<&str>,
) -> OracleResult<()> {
    conn.execute(
        "INSERT INTO migration_history(from_version, to_version, status, error_message) \
         VALUES (?1, ?2, ?3, ?4);",
        rusqlite::params![from_v, to_v, status, error_msg],
    )?;
    Ok(())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> OracleResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let names: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(names.iter().any(|n| n == column))
}

// ─── Individual migration steps ─────────────────────────────────────────────

/// v0 -> v1: baseline, no-op.
fn migrate_to_v1(_conn: &Connection) -> OracleResult<()> {
    Ok(())
}

/// v1 -> v2: add `source_hash` and backfill it from `embedding_source`.
fn migrate_to_v2(conn: &Connection) -> OracleResult<()> {
    if !column_exists(conn, "symbol_embeddings", "source_hash")? {
        conn.execute_batch(
            "ALTER TABLE symbol_embeddings ADD COLUMN source_hash TEXT NOT NULL DEFAULT '';",
        )?;
    }

    let mut stmt =
        conn.prepare("SELECT uri, embedding_source FROM symbol_embeddings WHERE source_hash = '';")?;
    let rows: Vec<(String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<_, _>>()?;
    for (uri, embedding_source) in rows {
        conn.execute(
            "UPDATE symbol_embeddings SET source_hash = ?1 WHERE uri = ?2;",
            rusqlite::params![content_hash(&embedding_source), uri],
        )?;
    }
    Ok(())
}
