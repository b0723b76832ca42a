//! `SQLite` document store: schema, pragmas, and filter translation.
//!
//! Documents live as JSON text in a single `documents` table partitioned by
//! collection name. A [`CompiledFilter`] becomes a `WHERE` clause over
//! `json_extract`/`json_type`; field paths and values are always bound as
//! parameters. Fields whose dotted name has no JSON path equivalent (empty
//! segments or embedded quotes) are checked in Rust after the query so both
//! stores agree on every field name.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::Value;
use tracing::{debug, info};

use super::{DocumentStore, StoreError, document_matches};
use crate::search::filter::{Bound, Clause, CompiledFilter};

const SCHEMA_VERSION: i64 = 1;

const MIGRATION_V1: &str = r"
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    collection TEXT NOT NULL,
    body TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, id);
";

/// JSON document collection backed by a SQLite file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    collection: String,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`, scoped to `collection`.
    pub fn open(
        path: &Path,
        collection: impl Into<String>,
        busy_timeout: Duration,
    ) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let start = Instant::now();
        let mut conn = Connection::open(path)?;
        apply_pragmas(&conn, busy_timeout)?;
        migrate(&mut conn)?;

        let collection = collection.into();
        info!(
            path = %path.display(),
            collection = %collection,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "opened SQLite document store"
        );
        Ok(Self {
            conn: Mutex::new(conn),
            collection,
        })
    }

    /// Private in-memory database; contents vanish with the store.
    pub fn open_in_memory(collection: impl Into<String>) -> Result<Self, StoreError> {
        let mut conn = Connection::open_in_memory()?;
        conn.busy_timeout(Duration::from_secs(5))?;
        migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            collection: collection.into(),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn schema_version(&self) -> Result<i64, StoreError> {
        read_schema_version(&self.conn.lock())?
            .ok_or_else(|| StoreError::Other("schema_version missing".to_string()))
    }

    /// Insert one document, returning its row id.
    pub fn insert(&self, doc: &Value) -> Result<i64, StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO documents(collection, body) VALUES(?, ?)",
            params![self.collection, doc.to_string()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert documents in one transaction.
    pub fn insert_many<'a>(
        &self,
        docs: impl IntoIterator<Item = &'a Value>,
    ) -> Result<usize, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare("INSERT INTO documents(collection, body) VALUES(?, ?)")?;
            for doc in docs {
                stmt.execute(params![self.collection, doc.to_string()])?;
                inserted += 1;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Number of documents in this store's collection.
    pub fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = self.conn.lock().query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?",
            params![self.collection],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}

impl DocumentStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn find(&self, filter: &CompiledFilter) -> Result<Vec<Value>, StoreError> {
        let (where_sql, mut binds, residual) = build_where(filter);
        let mut sql = String::from("SELECT id, body FROM documents WHERE collection = ?");
        if !where_sql.is_empty() {
            sql.push_str(" AND ");
            sql.push_str(&where_sql);
        }
        sql.push_str(" ORDER BY id");
        binds.insert(0, SqlValue::Text(self.collection.clone()));

        debug!(sql = %sql, binds = binds.len(), "sqlite find");

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(binds.iter()), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut docs = Vec::new();
        for row in rows {
            let (id, body) = row?;
            let doc = serde_json::from_str(&body)
                .map_err(|source| StoreError::Corrupt { id, source })?;
            if residual.is_empty() || document_matches(&doc, &residual) {
                docs.push(doc);
            }
        }
        Ok(docs)
    }
}

/// JSON path for a dotted field name, each segment quoted as a literal key
/// (`a.b` becomes `$."a"."b"`). `None` when a segment is empty or holds a
/// quote or backslash.
fn json_path(field: &str) -> Option<String> {
    let mut path = String::from("$");
    for segment in field.split('.') {
        if segment.is_empty() || segment.contains(['"', '\\']) {
            return None;
        }
        path.push_str(".\"");
        path.push_str(segment);
        path.push('"');
    }
    Some(path)
}

/// Translate `filter` into a conjunction of SQL predicates plus bind values.
///
/// Returns an empty string when nothing constrains the query, and the
/// clauses left for [`document_matches`] to check on each row.
fn build_where(filter: &CompiledFilter) -> (String, Vec<SqlValue>, CompiledFilter) {
    let mut parts = Vec::new();
    let mut binds = Vec::new();
    let mut residual = CompiledFilter::new();

    for (field, clause) in filter.iter() {
        let Some(path) = json_path(field) else {
            residual.insert(field, clause.clone());
            continue;
        };
        match clause {
            Clause::String(expected) => {
                parts.push(
                    "(json_type(body, ?) = 'text' AND json_extract(body, ?) = ?)".to_string(),
                );
                binds.push(SqlValue::Text(path.clone()));
                binds.push(SqlValue::Text(path));
                binds.push(SqlValue::Text(expected.clone()));
            }
            Clause::Int(bound) => {
                push_numeric(&mut parts, &mut binds, path, bound, SqlValue::Integer);
            }
            Clause::Float(bound) => {
                push_numeric(&mut parts, &mut binds, path, bound, SqlValue::Real);
            }
        }
    }

    (parts.join(" AND "), binds, residual)
}

fn push_numeric<T: Copy + PartialOrd>(
    parts: &mut Vec<String>,
    binds: &mut Vec<SqlValue>,
    path: String,
    bound: &Bound<T>,
    to_sql: impl Fn(T) -> SqlValue,
) {
    if bound.is_unbounded() {
        return;
    }

    let mut sql = String::from("(json_type(body, ?) IN ('integer', 'real')");
    binds.push(SqlValue::Text(path.clone()));
    match *bound {
        Bound::Eq(v) => {
            sql.push_str(" AND json_extract(body, ?) = ?");
            binds.push(SqlValue::Text(path));
            binds.push(to_sql(v));
        }
        Bound::Range { gte, lte } => {
            if let Some(lo) = gte {
                sql.push_str(" AND json_extract(body, ?) >= ?");
                binds.push(SqlValue::Text(path.clone()));
                binds.push(to_sql(lo));
            }
            if let Some(hi) = lte {
                sql.push_str(" AND json_extract(body, ?) <= ?");
                binds.push(SqlValue::Text(path));
                binds.push(to_sql(hi));
            }
        }
    }
    sql.push(')');
    parts.push(sql);
}

fn apply_pragmas(conn: &Connection, busy_timeout: Duration) -> Result<(), StoreError> {
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch(
        r"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA temp_store = MEMORY;
        ",
    )?;
    Ok(())
}

fn read_schema_version(conn: &Connection) -> Result<Option<i64>, StoreError> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'meta'",
        [],
        |row| row.get(0),
    )?;
    if !exists {
        return Ok(None);
    }
    Ok(conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get::<_, String>(0).map(|s| s.parse().unwrap_or(0)),
        )
        .optional()?)
}

fn migrate(conn: &mut Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS meta (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
        [],
    )?;
    let current = read_schema_version(conn)?.unwrap_or(0);
    if current == SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    match current {
        0 => tx.execute_batch(MIGRATION_V1)?,
        v => {
            return Err(StoreError::Other(format!(
                "unsupported schema version {v}"
            )));
        }
    }
    tx.execute(
        "INSERT INTO meta(key, value) VALUES('schema_version', ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![SCHEMA_VERSION.to_string()],
    )?;
    tx.commit()?;
    Ok(())
}
