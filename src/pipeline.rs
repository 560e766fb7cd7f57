//! The RAG orchestrator: retrieve → rerank → generate, plus the ingestion
//! path that populates the store.
//!
//! A query is a pure call chain with no persisted state between stages; a
//! failure at any stage aborts the whole query with that stage's error.
//! The pipeline owns the chunk → embedding → index lifecycle and never
//! caches embeddings or answers across calls.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::chunking;
use crate::embeddings::{EmbeddingModelInfo, EmbeddingProvider};
use crate::generation::{AnswerGenerator, GeneratorInfo};
use crate::rerank::{RelevanceScorer, Reranker, ScorerInfo};
use crate::stores::VectorStore;
use crate::types::RagError;

/// Parameters for one end-to-end query.
#[derive(Clone, Debug)]
pub struct QueryRequest {
    pub question: String,
    /// Candidates pulled from the vector index.
    pub retrieve_k: usize,
    /// Candidates kept after reranking and handed to the generator.
    pub rerank_k: usize,
    /// Print the constructed prompt before sending it.
    pub show_prompt: bool,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            retrieve_k: 5,
            rerank_k: 3,
            show_prompt: false,
        }
    }

    #[must_use]
    pub fn with_retrieve_k(mut self, retrieve_k: usize) -> Self {
        self.retrieve_k = retrieve_k;
        self
    }

    #[must_use]
    pub fn with_rerank_k(mut self, rerank_k: usize) -> Self {
        self.rerank_k = rerank_k;
        self
    }

    #[must_use]
    pub fn with_show_prompt(mut self, show_prompt: bool) -> Self {
        self.show_prompt = show_prompt;
        self
    }
}

/// Aggregated model identities and live document count.
///
/// Recomputed on every [`RagPipeline::system_info`] call; nothing is cached.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemInfo {
    pub embedding_service: EmbeddingModelInfo,
    pub reranker: ScorerInfo,
    pub generator: GeneratorInfo,
    pub document_count: usize,
}

/// Composes the chunker, embedding provider, vector store, reranker, and
/// generator into ingestion and query pipelines.
#[derive(Clone)]
pub struct RagPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    reranker: Reranker,
    generator: Arc<dyn AnswerGenerator>,
}

impl std::fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagPipeline").finish_non_exhaustive()
    }
}

impl RagPipeline {
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Loads a document file: blank-line chunking, batched embedding, then
    /// storage. Returns the number of chunks added.
    pub async fn load_document(&self, path: impl AsRef<Path>) -> Result<usize, RagError> {
        let chunks = chunking::split_file_by_blank_line(path).await?;
        self.add_documents_from_texts(chunks).await
    }

    /// Ingests already-chunked texts: batched embedding, then storage.
    pub async fn add_documents_from_texts(&self, texts: Vec<String>) -> Result<usize, RagError> {
        let count = texts.len();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        self.store.add_documents(texts, embeddings, None).await?;
        tracing::debug!(count, "Ingested document chunks");
        Ok(count)
    }

    /// Embeds the query once and returns the index's nearest candidates,
    /// best first. Empty when the index holds nothing for that query slot.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<String>, RagError> {
        let query_embedding = self.embedder.embed(query).await?;
        let results = self.store.search(&query_embedding, top_k).await?;
        let candidates = results.into_primary();
        tracing::debug!(count = candidates.len(), "Retrieved candidates");
        Ok(candidates)
    }

    /// Runs the full retrieve → rerank → generate chain for one question.
    pub async fn query(&self, request: QueryRequest) -> Result<String, RagError> {
        let QueryRequest {
            question,
            retrieve_k,
            rerank_k,
            show_prompt,
        } = request;

        let retrieved = self.retrieve(&question, retrieve_k).await?;
        let reranked = self.reranker.rerank(&question, retrieved, rerank_k).await?;
        let answer = self
            .generator
            .generate_answer(&question, &reranked, show_prompt)
            .await?;
        tracing::debug!(context = reranked.len(), "Generated answer");
        Ok(answer)
    }

    /// Current model identities plus live document count.
    pub async fn system_info(&self) -> Result<SystemInfo, RagError> {
        Ok(SystemInfo {
            embedding_service: self.embedder.model_info(),
            reranker: self.reranker.model_info(),
            generator: self.generator.model_info(),
            document_count: self.store.count().await?,
        })
    }

    /// Number of stored document chunks.
    pub async fn document_count(&self) -> Result<usize, RagError> {
        self.store.count().await
    }

    /// Removes every stored document; id numbering restarts at zero.
    pub async fn clear_documents(&self) -> Result<(), RagError> {
        self.store.clear().await
    }
}

/// Builder for [`RagPipeline`]; every component is required.
#[derive(Default)]
pub struct RagPipelineBuilder {
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    store: Option<Arc<dyn VectorStore>>,
    scorer: Option<Arc<dyn RelevanceScorer>>,
    generator: Option<Arc<dyn AnswerGenerator>>,
}

impl RagPipelineBuilder {
    #[must_use]
    pub fn with_embedding_provider(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_scorer(mut self, scorer: Arc<dyn RelevanceScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn AnswerGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn build(self) -> Result<RagPipeline, RagError> {
        let embedder = self
            .embedder
            .ok_or_else(|| RagError::Configuration("missing embedding provider".into()))?;
        let store = self
            .store
            .ok_or_else(|| RagError::Configuration("missing vector store".into()))?;
        let scorer = self
            .scorer
            .ok_or_else(|| RagError::Configuration("missing relevance scorer".into()))?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::Configuration("missing answer generator".into()))?;

        Ok(RagPipeline {
            embedder,
            store,
            reranker: Reranker::new(scorer),
            generator,
        })
    }
}
