use std::path::Path;
use std::sync::{Mutex, OnceLock};

use chrono::Utc;
use futures::future::BoxFuture;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use nodeweave_core::error::{NodeweaveError, Result};
use nodeweave_core::traits::DocumentStore;
use nodeweave_core::types::{metadata_from, AddResult, Metadata, QueryResult};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS documents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        collection TEXT NOT NULL,
        doc_id TEXT NOT NULL,
        content TEXT NOT NULL,
        metadata TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE(collection, doc_id)
    );

    CREATE INDEX IF NOT EXISTS idx_documents_collection
        ON documents(collection);

    CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(
        content,
        tokenize='porter unicode61'
    );";

/// SQLite-backed document store with FTS5 ranking.
///
/// Collections are a column, not separate tables; the FTS index shares rowids
/// with `documents` and is maintained by hand on every upsert.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    NodeweaveError::Database(format!("Failed to create db directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        debug!(path = %path.display(), "Document store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of documents stored in `collection`.
    pub fn count(&self, collection: &str) -> Result<usize> {
        let conn = self.conn.lock().map_err(|e| NodeweaveError::Database(e.to_string()))?;
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                params![collection],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(n as usize)
    }

    /// Names of all collections holding at least one document.
    pub fn collections(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().map_err(|e| NodeweaveError::Database(e.to_string()))?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT collection FROM documents ORDER BY collection")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(db_err)?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(db_err)
    }

    fn upsert(
        &self,
        collection: &str,
        documents: &[String],
        ids: &[String],
        metadata: &[Metadata],
    ) -> Result<()> {
        let mut conn = self.conn.lock().map_err(|e| NodeweaveError::Database(e.to_string()))?;
        let tx = conn.transaction().map_err(db_err)?;
        let now = Utc::now().to_rfc3339();

        for ((content, doc_id), meta) in documents.iter().zip(ids).zip(metadata) {
            let meta_json = serde_json::to_string(meta)?;
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM documents WHERE collection = ?1 AND doc_id = ?2",
                    params![collection, doc_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err)?;

            let rowid = match existing {
                Some(rowid) => {
                    tx.execute(
                        "UPDATE documents SET content = ?1, metadata = ?2, updated_at = ?3 WHERE id = ?4",
                        params![content, meta_json, now, rowid],
                    )
                    .map_err(db_err)?;
                    tx.execute("DELETE FROM documents_fts WHERE rowid = ?1", params![rowid])
                        .map_err(db_err)?;
                    rowid
                }
                None => {
                    tx.execute(
                        "INSERT INTO documents (collection, doc_id, content, metadata, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![collection, doc_id, content, meta_json, now],
                    )
                    .map_err(db_err)?;
                    tx.last_insert_rowid()
                }
            };

            tx.execute(
                "INSERT INTO documents_fts (rowid, content) VALUES (?1, ?2)",
                params![rowid, content],
            )
            .map_err(db_err)?;
        }

        tx.commit().map_err(db_err)
    }

    fn search(
        &self,
        collection: &str,
        query: &str,
        n_results: usize,
    ) -> Result<Vec<(String, String, Metadata, f64)>> {
        let Some(expr) = match_expression(query) else {
            return Ok(Vec::new());
        };

        let conn = self.conn.lock().map_err(|e| NodeweaveError::Database(e.to_string()))?;
        let mut stmt = conn
            .prepare(
                "SELECT d.doc_id, d.content, d.metadata, bm25(documents_fts) AS score
                 FROM documents_fts
                 JOIN documents d ON d.id = documents_fts.rowid
                 WHERE documents_fts MATCH ?1 AND d.collection = ?2
                 ORDER BY score
                 LIMIT ?3",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map(params![expr, collection, n_results as i64], |row| {
                let doc_id: String = row.get(0)?;
                let content: String = row.get(1)?;
                let meta_str: String = row.get(2)?;
                let score: f64 = row.get(3)?;
                Ok((doc_id, content, meta_str, score))
            })
            .map_err(db_err)?;

        let mut hits = Vec::new();
        for row in rows {
            let (doc_id, content, meta_str, score) = row.map_err(db_err)?;
            let metadata = serde_json::from_str(&meta_str).unwrap_or_else(|e| {
                warn!(doc_id = %doc_id, error = %e, "Stored metadata is not a JSON object");
                Metadata::new()
            });
            // bm25() is lower-is-better; flip it so callers see higher-is-better.
            hits.push((doc_id, content, metadata, -score));
        }
        Ok(hits)
    }
}

fn db_err(e: rusqlite::Error) -> NodeweaveError {
    NodeweaveError::Database(e.to_string())
}

/// Turn free text into an FTS5 expression: every word quoted, OR-joined.
fn match_expression(query: &str) -> Option<String> {
    static WORD: OnceLock<Option<Regex>> = OnceLock::new();
    let word = WORD.get_or_init(|| Regex::new(r"\w+").ok()).as_ref()?;

    let terms: Vec<String> = word
        .find_iter(query)
        .map(|m| format!("\"{}\"", m.as_str().to_lowercase()))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn add_documents(
        &self,
        collection: &str,
        documents: Vec<String>,
        ids: Option<Vec<String>>,
        metadata: Option<Vec<Metadata>>,
    ) -> BoxFuture<'_, Result<AddResult>> {
        let collection = collection.to_string();

        Box::pin(async move {
            let ids = ids.unwrap_or_else(|| {
                documents
                    .iter()
                    .map(|_| uuid::Uuid::new_v4().to_string())
                    .collect()
            });
            let metadata = metadata.unwrap_or_else(|| {
                documents
                    .iter()
                    .map(|_| metadata_from([("source", "unknown")]))
                    .collect()
            });

            if ids.len() != documents.len() || metadata.len() != documents.len() {
                warn!(
                    collection = %collection,
                    documents = documents.len(),
                    ids = ids.len(),
                    metadata = metadata.len(),
                    "Rejected add with mismatched lengths"
                );
                return Ok(AddResult::error(format!(
                    "Length mismatch: {} documents, {} ids, {} metadata entries",
                    documents.len(),
                    ids.len(),
                    metadata.len()
                )));
            }

            self.upsert(&collection, &documents, &ids, &metadata)?;
            info!(collection = %collection, count = ids.len(), "Documents added");
            Ok(AddResult::ok(collection, ids))
        })
    }

    fn query(
        &self,
        collection: &str,
        query_texts: Vec<String>,
        n_results: usize,
    ) -> BoxFuture<'_, Result<QueryResult>> {
        let collection = collection.to_string();

        Box::pin(async move {
            let mut result = QueryResult::default();
            for text in &query_texts {
                let hits = self.search(&collection, text, n_results)?;
                debug!(collection = %collection, hits = hits.len(), "Query executed");

                let mut ids = Vec::with_capacity(hits.len());
                let mut documents = Vec::with_capacity(hits.len());
                let mut metadatas = Vec::with_capacity(hits.len());
                let mut scores = Vec::with_capacity(hits.len());
                for (id, content, meta, score) in hits {
                    ids.push(id);
                    documents.push(content);
                    metadatas.push(meta);
                    scores.push(score);
                }
                result.ids.push(ids);
                result.documents.push(documents);
                result.metadatas.push(metadatas);
                result.scores.push(scores);
            }
            Ok(result)
        })
    }
}
