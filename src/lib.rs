//! ```text
//! Ingestion:  document ──► chunking ──► EmbeddingProvider ──► VectorStore
//!
//! Query:      question ──► EmbeddingProvider ──► VectorStore::search
//!                                                     │ top retrieve_k
//!                                                     ▼
//!                                              Reranker (cross-encoder)
//!                                                     │ top rerank_k
//!                                                     ▼
//!                                      prompt ──► AnswerGenerator ──► answer
//! ```
//!
//! # ragpipe
//!
//! A retrieval-augmented generation pipeline: documents are split into
//! chunks, embedded, and stored in a vector index; at query time the
//! nearest candidates are pulled back, reordered by a cross-encoder
//! relevance model, and handed to a language model together with a fixed
//! grounded-answer prompt.
//!
//! The embedding, reranking, and generation backends are opaque
//! capabilities behind narrow traits ([`embeddings::EmbeddingProvider`],
//! [`rerank::RelevanceScorer`], [`generation::AnswerGenerator`]); the
//! [`pipeline::RagPipeline`] depends only on the capability, never on a
//! concrete backend. Each trait ships with one HTTP adapter, and the
//! embedding side additionally ships a deterministic mock so the whole
//! pipeline runs offline in tests.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ragpipe::embeddings::HttpEmbeddingProvider;
//! use ragpipe::generation::DeepSeekGenerator;
//! use ragpipe::pipeline::{QueryRequest, RagPipeline};
//! use ragpipe::rerank::HttpRelevanceScorer;
//! use ragpipe::stores::SqliteVectorStore;
//!
//! let store = SqliteVectorStore::open("default", None).await?;
//! let pipeline = RagPipeline::builder()
//!     .with_embedding_provider(Arc::new(HttpEmbeddingProvider::new(
//!         "https://api.example.com/v1", "text2vec-base-chinese", None,
//!     )))
//!     .with_store(Arc::new(store))
//!     .with_scorer(Arc::new(HttpRelevanceScorer::new(
//!         "https://api.example.com/v1", "mmarco-mMiniLMv2-L12", None,
//!     )))
//!     .with_generator(Arc::new(DeepSeekGenerator::new("deepseek-chat", None)?))
//!     .build()?;
//!
//! pipeline.load_document("corpus.txt").await?;
//! let answer = pipeline.query(QueryRequest::new("什么是检索增强生成？")).await?;
//! ```

pub mod chunking;
pub mod embeddings;
pub mod generation;
pub mod pipeline;
pub mod rerank;
pub mod stores;
pub mod types;

pub use pipeline::{QueryRequest, RagPipeline, SystemInfo};
pub use types::RagError;
