//! Durable embedded document store backed by SQLite.
//!
//! One table per (database, collection) pair, holding each document as a JSON
//! body column. Declared unique indexes become expression indexes over
//! `json_extract`, so the one-live-row invariant is enforced by the engine
//! even across processes. Filter evaluation is shared with the in-memory
//! backend; SQL narrows only by table.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use serde_json::Value;

use strata_core::errors::BackendError;
use strata_core::traits::{
    Document, DocumentCollection, DocumentDatabase, DocumentStore, Filter, FindQuery,
};

use super::matcher;

/// SQLite-backed document store. All databases share one file (or one
/// in-memory connection); the database name is folded into the table name.
pub struct SqliteDocumentStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDocumentStore {
    /// Open a store backed by a file on disk.
    pub fn open(path: &Path) -> Result<Self, BackendError> {
        let conn = Connection::open(path).map_err(sqlite_err)?;
        Self::configure(&conn)?;
        Ok(SqliteDocumentStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, BackendError> {
        let conn = Connection::open_in_memory().map_err(sqlite_err)?;
        Self::configure(&conn)?;
        Ok(SqliteDocumentStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn configure(conn: &Connection) -> Result<(), BackendError> {
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(sqlite_err)?;
        Ok(())
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn database(&self, name: &str) -> Arc<dyn DocumentDatabase> {
        Arc::new(SqliteDatabase {
            conn: self.conn.clone(),
            database: name.to_string(),
        })
    }
}

struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
    database: String,
}

impl DocumentDatabase for SqliteDatabase {
    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection> {
        Arc::new(SqliteCollection {
            conn: self.conn.clone(),
            collection: name.to_string(),
            table: format!("docs_{}__{}", self.database, name),
        })
    }
}

struct SqliteCollection {
    conn: Arc<Mutex<Connection>>,
    collection: String,
    table: String,
}

impl SqliteCollection {
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_table(&self, conn: &Connection) -> Result<(), BackendError> {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY AUTOINCREMENT, body TEXT NOT NULL)",
                quote_ident(&self.table)
            ),
            [],
        )
        .map_err(sqlite_err)?;
        Ok(())
    }

    /// All rows as (rowid, document) pairs.
    fn load_all(&self, conn: &Connection) -> Result<Vec<(i64, Document)>, BackendError> {
        self.ensure_table(conn)?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT id, body FROM {} ORDER BY id",
                quote_ident(&self.table)
            ))
            .map_err(sqlite_err)?;
        let rows = stmt
            .query_map([], |row| {
                let id: i64 = row.get(0)?;
                let body: String = row.get(1)?;
                Ok((id, body))
            })
            .map_err(sqlite_err)?;

        let mut documents = Vec::new();
        for row in rows {
            let (id, body) = row.map_err(sqlite_err)?;
            let parsed: Value = serde_json::from_str(&body).map_err(|e| {
                BackendError::new(format!(
                    "corrupt document body in '{}' (row {id}): {e}",
                    self.collection
                ))
            })?;
            match parsed {
                Value::Object(map) => documents.push((id, map)),
                _ => {
                    return Err(BackendError::new(format!(
                        "non-object document body in '{}' (row {id})",
                        self.collection
                    )))
                }
            }
        }
        Ok(documents)
    }
}

impl DocumentCollection for SqliteCollection {
    fn name(&self) -> &str {
        &self.collection
    }

    fn ensure_unique_index(&self, fields: &[String]) -> Result<(), BackendError> {
        let conn = self.lock();
        self.ensure_table(&conn)?;
        // JSON null extracts to SQL NULL, and NULLs are pairwise distinct in
        // SQLite unique indexes; coalesce so null-valued fields still occupy
        // one slot.
        let exprs: Vec<String> = fields
            .iter()
            .map(|f| format!("COALESCE(json_extract(body, '$.{f}'), '__null__')"))
            .collect();
        let index_name = format!("idx_{}_{}", self.table, fields.join("_"));
        conn.execute(
            &format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
                quote_ident(&index_name),
                quote_ident(&self.table),
                exprs.join(", ")
            ),
            [],
        )
        .map_err(sqlite_err)?;
        Ok(())
    }

    fn insert_one(&self, document: Document) -> Result<(), BackendError> {
        let body = serde_json::to_string(&Value::Object(document))
            .map_err(|e| BackendError::new(format!("serialize document: {e}")))?;
        let conn = self.lock();
        self.ensure_table(&conn)?;
        conn.execute(
            &format!("INSERT INTO {} (body) VALUES (?1)", quote_ident(&self.table)),
            [&body],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(inner, _)
                if inner.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                BackendError::new(format!(
                    "unique index violation in collection '{}'",
                    self.collection
                ))
            }
            other => sqlite_err(other),
        })?;
        Ok(())
    }

    fn find_one(&self, filter: &Filter) -> Result<Option<Document>, BackendError> {
        let conn = self.lock();
        let query = FindQuery::default();
        Ok(self
            .load_all(&conn)?
            .into_iter()
            .map(|(_, doc)| doc)
            .find(|doc| matcher::matches(doc, filter))
            .map(|doc| matcher::project(doc, &query)))
    }

    fn find(&self, query: &FindQuery) -> Result<Vec<Document>, BackendError> {
        let conn = self.lock();
        let documents = self.load_all(&conn)?.into_iter().map(|(_, doc)| doc);
        Ok(matcher::run_query(documents, query))
    }

    fn update_one(&self, filter: &Filter, set: &Document) -> Result<u64, BackendError> {
        let conn = self.lock();
        let target = self
            .load_all(&conn)?
            .into_iter()
            .find(|(_, doc)| matcher::matches(doc, filter));
        let Some((id, mut doc)) = target else {
            return Ok(0);
        };
        for (key, value) in set {
            doc.insert(key.clone(), value.clone());
        }
        let body = serde_json::to_string(&Value::Object(doc))
            .map_err(|e| BackendError::new(format!("serialize document: {e}")))?;
        conn.execute(
            &format!(
                "UPDATE {} SET body = ?1 WHERE id = ?2",
                quote_ident(&self.table)
            ),
            rusqlite::params![body, id],
        )
        .map_err(sqlite_err)?;
        Ok(1)
    }

    fn delete_many(&self, filter: &Filter) -> Result<u64, BackendError> {
        let conn = self.lock();
        let ids: Vec<i64> = self
            .load_all(&conn)?
            .into_iter()
            .filter(|(_, doc)| matcher::matches(doc, filter))
            .map(|(id, _)| id)
            .collect();
        for id in &ids {
            conn.execute(
                &format!("DELETE FROM {} WHERE id = ?1", quote_ident(&self.table)),
                [id],
            )
            .map_err(sqlite_err)?;
        }
        Ok(ids.len() as u64)
    }

    fn count(&self, filter: &Filter) -> Result<u64, BackendError> {
        let conn = self.lock();
        Ok(self
            .load_all(&conn)?
            .iter()
            .filter(|(_, doc)| matcher::matches(doc, filter))
            .count() as u64)
    }
}

fn quote_ident(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn sqlite_err(e: rusqlite::Error) -> BackendError {
    BackendError::new(format!("sqlite: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn insert_find_update_delete_round_trip() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        let coll = store.database("proj").collection("records");
        coll.insert_one(doc(json!({"schema_ref": "animal", "time_of_removal": null})))
            .unwrap();

        let found = coll
            .find_one(&doc(json!({"schema_ref": "animal"})))
            .unwrap()
            .unwrap();
        assert_eq!(found.get("time_of_removal"), Some(&Value::Null));

        assert_eq!(
            coll.update_one(
                &doc(json!({"schema_ref": "animal"})),
                &doc(json!({"time_of_removal": 5})),
            )
            .unwrap(),
            1
        );
        assert_eq!(coll.delete_many(&doc(json!({"schema_ref": "animal"}))).unwrap(), 1);
        assert_eq!(coll.count(&Filter::new()).unwrap(), 0);
    }

    #[test]
    fn expression_unique_index_is_enforced_by_the_engine() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        let coll = store.database("proj").collection("domain_models");
        coll.ensure_unique_index(&[
            "schema_name".to_string(),
            "version_timestamp".to_string(),
            "time_of_removal".to_string(),
        ])
        .unwrap();
        coll.insert_one(doc(
            json!({"schema_name": "animal", "version_timestamp": 0, "time_of_removal": null}),
        ))
        .unwrap();
        let err = coll
            .insert_one(doc(
                json!({"schema_name": "animal", "version_timestamp": 0, "time_of_removal": null}),
            ))
            .unwrap_err();
        assert!(err.message.contains("unique index violation"));
    }

    #[test]
    fn databases_map_to_distinct_tables() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        store
            .database("a")
            .collection("records")
            .insert_one(doc(json!({"x": 1})))
            .unwrap();
        assert_eq!(
            store
                .database("b")
                .collection("records")
                .count(&Filter::new())
                .unwrap(),
            0
        );
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        {
            let store = SqliteDocumentStore::open(&path).unwrap();
            store
                .database("proj")
                .collection("records")
                .insert_one(doc(json!({"schema_ref": "animal"})))
                .unwrap();
        }
        let store = SqliteDocumentStore::open(&path).unwrap();
        assert_eq!(
            store
                .database("proj")
                .collection("records")
                .count(&Filter::new())
                .unwrap(),
            1
        );
    }
}
