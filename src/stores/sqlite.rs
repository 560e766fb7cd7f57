//! SQLite-backed vector store using the `sqlite-vec` extension.
//!
//! Each collection owns a table pair: `<name>_chunks` holds the text and
//! metadata keyed by numeric document id, and `<name>_embeddings` is a
//! `vec0` virtual table whose rowid matches that id. Opening with a
//! persistence path yields a database file that survives restarts; omitting
//! it opens an in-memory connection that vanishes with the process.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::PathBuf;
use std::sync::Once;

use async_trait::async_trait;
use tokio_rusqlite::{Connection, ffi};

use super::{SearchResults, VectorStore};
use crate::types::RagError;

#[derive(Clone)]
pub struct SqliteVectorStore {
    conn: Connection,
    collection: String,
}

impl std::fmt::Debug for SqliteVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteVectorStore")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

impl SqliteVectorStore {
    /// Opens (or creates) the named collection.
    ///
    /// `persist_path` selects the durable file-backed mode; `None` opens an
    /// ephemeral in-memory database. The collection name becomes part of
    /// the table identifiers and must be alphanumeric/underscore.
    pub async fn open(
        collection: impl Into<String>,
        persist_path: Option<PathBuf>,
    ) -> Result<Self, RagError> {
        let collection = collection.into();
        if collection.is_empty()
            || !collection
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(RagError::Configuration(format!(
                "collection name '{collection}' must be non-empty and alphanumeric/underscore"
            )));
        }

        Self::register_sqlite_vec()?;

        let conn = match persist_path {
            Some(path) => Connection::open(path)
                .await
                .map_err(|err| RagError::Storage(err.to_string()))?,
            None => Connection::open_in_memory()
                .await
                .map_err(|err| RagError::Storage(err.to_string()))?,
        };

        // Fails here rather than at first insert if the extension is absent.
        conn.call(|conn| {
            conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0))
                .map(|_| ())
                .map_err(tokio_rusqlite::Error::Error)
        })
        .await
        .map_err(|err| RagError::Storage(err.to_string()))?;

        let store = Self { conn, collection };
        store.create_chunk_table().await?;
        Ok(store)
    }

    fn register_sqlite_vec() -> Result<(), RagError> {
        use std::sync::Mutex;

        static INIT: Once = Once::new();
        static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

        INIT.call_once(|| {
            let result = unsafe {
                type SqliteExtensionInit = unsafe extern "C" fn(
                    *mut ffi::sqlite3,
                    *mut *mut c_char,
                    *const ffi::sqlite3_api_routines,
                )
                    -> i32;

                let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
                let init_fn: SqliteExtensionInit =
                    transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
                let rc = ffi::sqlite3_auto_extension(Some(init_fn));
                if rc != 0 {
                    Err(format!(
                        "failed to register sqlite-vec extension (code {rc})"
                    ))
                } else {
                    Ok(())
                }
            };
            *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
        });

        INIT_RESULT
            .lock()
            .expect("init result mutex poisoned")
            .clone()
            .expect("init was called but result not set")
            .map_err(RagError::Storage)
    }

    fn chunk_table(&self) -> String {
        format!("{}_chunks", self.collection)
    }

    fn embedding_table(&self) -> String {
        format!("{}_embeddings", self.collection)
    }

    async fn create_chunk_table(&self) -> Result<(), RagError> {
        let table = self.chunk_table();
        self.conn
            .call(move |conn| {
                conn.execute(
                    &format!(
                        "CREATE TABLE IF NOT EXISTS {table} (
                            doc_id INTEGER PRIMARY KEY,
                            content TEXT NOT NULL,
                            metadata TEXT
                        )"
                    ),
                    [],
                )
                .map(|_| ())
                .map_err(tokio_rusqlite::Error::Error)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    /// Collection this store addresses.
    pub fn collection(&self) -> &str {
        &self.collection
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn add_documents(
        &self,
        texts: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        metadata: Option<Vec<serde_json::Value>>,
    ) -> Result<(), RagError> {
        if texts.is_empty() {
            return Ok(());
        }
        if texts.len() != embeddings.len() {
            return Err(RagError::Storage(format!(
                "batch has {} texts but {} embeddings",
                texts.len(),
                embeddings.len()
            )));
        }

        let chunk_table = self.chunk_table();
        let embedding_table = self.embedding_table();
        let dimension = embeddings[0].len();

        let mut rows = Vec::with_capacity(texts.len());
        for (i, (text, embedding)) in texts.into_iter().zip(embeddings).enumerate() {
            let metadata_json = metadata
                .as_ref()
                .and_then(|m| m.get(i))
                .map(|value| value.to_string());
            let embedding_json = serde_json::to_string(&embedding)
                .map_err(|err| RagError::Storage(err.to_string()))?;
            rows.push((text, embedding_json, metadata_json));
        }

        let inserted = rows.len();
        self.conn
            .call(move |conn| {
                // Observe the count once, then derive the whole id block
                // before any row is written.
                let existing: i64 = conn
                    .query_row(&format!("SELECT COUNT(*) FROM {chunk_table}"), [], |row| {
                        row.get(0)
                    })
                    .map_err(tokio_rusqlite::Error::Error)?;

                let tx = conn
                    .transaction()
                    .map_err(tokio_rusqlite::Error::Error)?;

                tx.execute(
                    &format!(
                        "CREATE VIRTUAL TABLE IF NOT EXISTS {embedding_table} \
                         USING vec0(embedding float[{dimension}])"
                    ),
                    [],
                )
                .map_err(tokio_rusqlite::Error::Error)?;

                for (offset, (content, embedding_json, metadata_json)) in
                    rows.into_iter().enumerate()
                {
                    let doc_id = existing + offset as i64;
                    tx.execute(
                        &format!(
                            "INSERT INTO {chunk_table} (doc_id, content, metadata) \
                             VALUES (?1, ?2, ?3)"
                        ),
                        (doc_id, &content, &metadata_json),
                    )
                    .map_err(tokio_rusqlite::Error::Error)?;
                    tx.execute(
                        &format!(
                            "INSERT INTO {embedding_table} (rowid, embedding) VALUES (?1, ?2)"
                        ),
                        (doc_id, &embedding_json),
                    )
                    .map_err(tokio_rusqlite::Error::Error)?;
                }

                tx.commit().map_err(tokio_rusqlite::Error::Error)?;
                Ok::<_, tokio_rusqlite::Error>(())
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;

        tracing::debug!(count = inserted, collection = %self.collection, "Stored document batch");
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<SearchResults, RagError> {
        let chunk_table = self.chunk_table();
        let embedding_table = self.embedding_table();
        let embedding_json = serde_json::to_string(query_embedding)
            .map_err(|err| RagError::Storage(err.to_string()))?;

        let rows = self
            .conn
            .call(move |conn| {
                // Nothing inserted yet: the embeddings table does not exist.
                let has_embeddings: bool = conn
                    .query_row(
                        "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
                        [&embedding_table],
                        |row| row.get::<_, i64>(0).map(|n| n > 0),
                    )
                    .map_err(tokio_rusqlite::Error::Error)?;
                if !has_embeddings {
                    return Ok(Vec::new());
                }

                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT c.doc_id, c.content, \
                         vec_distance_cosine(e.embedding, vec_f32(?1)) AS distance \
                         FROM {chunk_table} c \
                         JOIN {embedding_table} e ON e.rowid = c.doc_id \
                         ORDER BY distance ASC \
                         LIMIT {top_k}"
                    ))
                    .map_err(tokio_rusqlite::Error::Error)?;

                let mapped = stmt
                    .query_map([&embedding_json], |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, f32>(2)?,
                        ))
                    })
                    .map_err(tokio_rusqlite::Error::Error)?;

                let mut results = Vec::new();
                for row in mapped {
                    results.push(row.map_err(tokio_rusqlite::Error::Error)?);
                }
                Ok::<_, tokio_rusqlite::Error>(results)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;

        let mut ids = Vec::with_capacity(rows.len());
        let mut documents = Vec::with_capacity(rows.len());
        let mut distances = Vec::with_capacity(rows.len());
        for (doc_id, content, distance) in rows {
            ids.push(doc_id.to_string());
            documents.push(content);
            distances.push(distance);
        }

        Ok(SearchResults {
            ids: vec![ids],
            documents: vec![documents],
            distances: vec![distances],
        })
    }

    async fn clear(&self) -> Result<(), RagError> {
        let chunk_table = self.chunk_table();
        let embedding_table = self.embedding_table();
        self.conn
            .call(move |conn| {
                conn.execute(&format!("DROP TABLE IF EXISTS {embedding_table}"), [])
                    .map_err(tokio_rusqlite::Error::Error)?;
                conn.execute(&format!("DROP TABLE IF EXISTS {chunk_table}"), [])
                    .map_err(tokio_rusqlite::Error::Error)?;
                Ok::<_, tokio_rusqlite::Error>(())
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;

        self.create_chunk_table().await?;
        tracing::debug!(collection = %self.collection, "Cleared collection");
        Ok(())
    }

    async fn count(&self) -> Result<usize, RagError> {
        let chunk_table = self.chunk_table();
        self.conn
            .call(move |conn| {
                let count: i64 = conn
                    .query_row(&format!("SELECT COUNT(*) FROM {chunk_table}"), [], |row| {
                        row.get(0)
                    })
                    .map_err(tokio_rusqlite::Error::Error)?;
                Ok::<_, tokio_rusqlite::Error>(count as usize)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn ids_are_assigned_from_the_running_count() {
        let store = SqliteVectorStore::open("idtest", None).await.unwrap();

        store
            .add_documents(
                texts(&["a", "b"]),
                vec![vec![1.0, 0.0], vec![0.0, 1.0]],
                None,
            )
            .await
            .unwrap();
        store
            .add_documents(
                texts(&["c", "d"]),
                vec![vec![0.5, 0.5], vec![0.9, 0.1]],
                None,
            )
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 4);

        let results = store.search(&[1.0, 0.0], 10).await.unwrap();
        let mut ids = results.ids[0].clone();
        ids.sort();
        assert_eq!(ids, vec!["0", "1", "2", "3"]);
    }

    #[tokio::test]
    async fn clear_restarts_id_numbering() {
        let store = SqliteVectorStore::open("cleartest", None).await.unwrap();

        store
            .add_documents(texts(&["x", "y"]), vec![vec![1.0, 0.0], vec![0.0, 1.0]], None)
            .await
            .unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);

        store
            .add_documents(texts(&["z"]), vec![vec![1.0, 0.0]], None)
            .await
            .unwrap();
        let results = store.search(&[1.0, 0.0], 10).await.unwrap();
        assert_eq!(results.ids[0], vec!["0"]);
    }

    #[tokio::test]
    async fn search_orders_by_cosine_distance() {
        let store = SqliteVectorStore::open("searchtest", None).await.unwrap();
        store
            .add_documents(
                texts(&["east", "north", "northeast"]),
                vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
                None,
            )
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.1], 2).await.unwrap();
        assert_eq!(results.documents[0].len(), 2);
        assert_eq!(results.documents[0][0], "east");
        assert!(results.distances[0][0] <= results.distances[0][1]);
    }

    #[tokio::test]
    async fn search_on_empty_collection_returns_empty_slot() {
        let store = SqliteVectorStore::open("emptytest", None).await.unwrap();
        let results = store.search(&[1.0, 0.0], 5).await.unwrap();
        assert!(results.into_primary().is_empty());
    }

    #[tokio::test]
    async fn mismatched_batch_lengths_are_a_storage_error() {
        let store = SqliteVectorStore::open("mismatch", None).await.unwrap();
        let err = store
            .add_documents(texts(&["a", "b"]), vec![vec![1.0, 0.0]], None)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Storage(_)));
    }

    #[tokio::test]
    async fn persistent_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("chunks.sqlite");

        {
            let store = SqliteVectorStore::open("durable", Some(db_path.clone()))
                .await
                .unwrap();
            store
                .add_documents(texts(&["kept"]), vec![vec![1.0, 0.0]], None)
                .await
                .unwrap();
        }

        let reopened = SqliteVectorStore::open("durable", Some(db_path))
            .await
            .unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        let results = reopened.search(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(results.documents[0], vec!["kept"]);
    }

    #[tokio::test]
    async fn invalid_collection_name_is_rejected() {
        let err = SqliteVectorStore::open("bad name;", None).await.unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
    }
}
