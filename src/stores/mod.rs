//! Vector storage for retrieval.
//!
//! The pipeline treats the vector index as an opaque nearest-neighbor
//! oracle behind the [`VectorStore`] trait; this module only adds the
//! collection and id bookkeeping described below, no resilience.
//!
//! ```text
//!                  ┌──────────────────┐
//!                  │ VectorStore trait│
//!                  │  (async CRUD +   │
//!                  │   knn search)    │
//!                  └────────┬─────────┘
//!                           │
//!                           ▼
//!                  ┌──────────────────┐
//!                  │     SQLite       │
//!                  │   sqlite-vec     │
//!                  └──────────────────┘
//! ```
//!
//! # Id assignment
//!
//! Ids are decimal strings derived from the stored count observed once per
//! `add_documents` call: a batch of `n` texts inserted into a collection
//! holding `c` documents receives ids `c..c+n`. Ids are unique at any given
//! time but not stable across a `clear()` with different batch sizes. The
//! scheme assumes a single writer per collection.

pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::RagError;

pub use sqlite::SqliteVectorStore;

/// Nearest-neighbor results for a batch of queries.
///
/// The outer level is one slot per query, mirroring backends that support
/// multi-query searches. This pipeline always issues single-query searches
/// and consumes slot 0.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchResults {
    pub ids: Vec<Vec<String>>,
    pub documents: Vec<Vec<String>>,
    pub distances: Vec<Vec<f32>>,
}

impl SearchResults {
    /// Consumes the results and yields the primary (slot 0) document list,
    /// empty when the index returned nothing for that slot.
    pub fn into_primary(self) -> Vec<String> {
        self.documents.into_iter().next().unwrap_or_default()
    }
}

/// Storage contract for `(id, text, vector)` triples grouped into one named
/// collection.
///
/// Implementations propagate backend failures unmodified as
/// [`RagError::Storage`]: no retry, no partial-insert recovery.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Stores a batch of texts with their embeddings and optional
    /// per-document metadata, assigning ids from the current count.
    ///
    /// `texts` and `embeddings` must have equal length; a mismatch
    /// surfaces from the insert path as a storage error.
    async fn add_documents(
        &self,
        texts: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        metadata: Option<Vec<serde_json::Value>>,
    ) -> Result<(), RagError>;

    /// Returns up to `top_k` nearest documents for one query embedding,
    /// nearest first.
    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<SearchResults, RagError>;

    /// Deletes and recreates the collection; id numbering restarts at zero.
    async fn clear(&self) -> Result<(), RagError>;

    /// Current number of stored documents.
    async fn count(&self) -> Result<usize, RagError>;
}
