//! End-to-end pipeline tests with mock oracles.
//!
//! Everything runs offline: deterministic mock embeddings, an in-memory
//! sqlite-vec store, a word-overlap relevance scorer, and an echoing
//! generator.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use ragpipe::embeddings::MockEmbeddingProvider;
use ragpipe::generation::{AnswerGenerator, GeneratorInfo};
use ragpipe::pipeline::{QueryRequest, RagPipeline};
use ragpipe::rerank::{RelevanceScorer, ScorerInfo};
use ragpipe::stores::SqliteVectorStore;
use ragpipe::types::RagError;
use tracing_subscriber::EnvFilter;

/// Installs a test-writer subscriber once so the pipeline's stage-boundary
/// `tracing::debug!` events show up under `RUST_LOG=debug`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Scores a candidate by how many query words it shares with the query.
struct OverlapScorer;

#[async_trait]
impl RelevanceScorer for OverlapScorer {
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, RagError> {
        let query_words: Vec<&str> = query.split_whitespace().collect();
        Ok(documents
            .iter()
            .map(|doc| {
                query_words
                    .iter()
                    .filter(|word| doc.contains(*word))
                    .count() as f32
            })
            .collect())
    }

    fn model_info(&self) -> ScorerInfo {
        ScorerInfo {
            model_name: "overlap".to_string(),
        }
    }
}

/// Returns a fixed answer and records the size of the most recent context.
struct EchoGenerator {
    answer: String,
    last_context_size: AtomicUsize,
}

impl EchoGenerator {
    fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            last_context_size: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AnswerGenerator for EchoGenerator {
    async fn generate_answer(
        &self,
        _query: &str,
        context_chunks: &[String],
        _show_prompt: bool,
    ) -> Result<String, RagError> {
        self.last_context_size
            .store(context_chunks.len(), Ordering::SeqCst);
        Ok(self.answer.clone())
    }

    async fn generate_with_custom_prompt(&self, _custom_prompt: &str) -> Result<String, RagError> {
        Ok(self.answer.clone())
    }

    fn model_info(&self) -> GeneratorInfo {
        GeneratorInfo {
            model_name: "echo".to_string(),
            provider: "test".to_string(),
            api_url: None,
        }
    }
}

/// Fails every call, for stage-abort tests.
struct FailingGenerator;

#[async_trait]
impl AnswerGenerator for FailingGenerator {
    async fn generate_answer(
        &self,
        _query: &str,
        _context_chunks: &[String],
        _show_prompt: bool,
    ) -> Result<String, RagError> {
        Err(RagError::Generation("backend unavailable".to_string()))
    }

    async fn generate_with_custom_prompt(&self, _custom_prompt: &str) -> Result<String, RagError> {
        Err(RagError::Generation("backend unavailable".to_string()))
    }

    fn model_info(&self) -> GeneratorInfo {
        GeneratorInfo {
            model_name: "failing".to_string(),
            provider: "test".to_string(),
            api_url: None,
        }
    }
}

async fn make_pipeline(collection: &str, generator: Arc<dyn AnswerGenerator>) -> RagPipeline {
    init_tracing();
    let store = SqliteVectorStore::open(collection, None).await.unwrap();
    RagPipeline::builder()
        .with_embedding_provider(Arc::new(MockEmbeddingProvider::new()))
        .with_store(Arc::new(store))
        .with_scorer(Arc::new(OverlapScorer))
        .with_generator(generator)
        .build()
        .unwrap()
}

#[tokio::test]
async fn document_chunks_ingest_and_count() {
    let generator = Arc::new(EchoGenerator::new("answer"));
    let pipeline = make_pipeline("ingest", generator).await;

    let chunks = ragpipe::chunking::split_by_blank_line("Para A text.\n\nPara B text.");
    assert_eq!(chunks, vec!["Para A text.".to_string(), "Para B text.".to_string()]);

    let added = pipeline.add_documents_from_texts(chunks).await.unwrap();
    assert_eq!(added, 2);
    assert_eq!(pipeline.document_count().await.unwrap(), 2);
}

#[tokio::test]
async fn retrieve_returns_the_nearest_chunk() {
    let generator = Arc::new(EchoGenerator::new("answer"));
    let pipeline = make_pipeline("retrieve", generator).await;

    pipeline
        .add_documents_from_texts(vec![
            "Para A text.".to_string(),
            "Para B text.".to_string(),
        ])
        .await
        .unwrap();

    // The query embeds identically to the first chunk under the mock
    // provider, so it must rank first.
    let retrieved = pipeline.retrieve("Para A text.", 1).await.unwrap();
    assert_eq!(retrieved, vec!["Para A text.".to_string()]);
}

#[tokio::test]
async fn retrieve_from_empty_store_is_empty() {
    let generator = Arc::new(EchoGenerator::new("answer"));
    let pipeline = make_pipeline("empty", generator).await;

    let retrieved = pipeline.retrieve("anything", 5).await.unwrap();
    assert!(retrieved.is_empty());
}

#[tokio::test]
async fn query_runs_the_full_chain_and_returns_the_generated_answer() {
    init_tracing();
    let generator = Arc::new(EchoGenerator::new("the fixed echo"));
    let store = SqliteVectorStore::open("fullchain", None).await.unwrap();
    let pipeline = RagPipeline::builder()
        .with_embedding_provider(Arc::new(MockEmbeddingProvider::new()))
        .with_store(Arc::new(store))
        .with_scorer(Arc::new(OverlapScorer))
        .with_generator(generator.clone())
        .build()
        .unwrap();

    pipeline
        .add_documents_from_texts(vec![
            "Rust ownership rules.".to_string(),
            "Borrow checker basics.".to_string(),
            "Unrelated cooking recipe.".to_string(),
        ])
        .await
        .unwrap();

    let answer = pipeline
        .query(QueryRequest::new("Rust ownership").with_retrieve_k(3).with_rerank_k(2))
        .await
        .unwrap();

    assert_eq!(answer, "the fixed echo");
    assert_eq!(generator.last_context_size.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn generation_failure_aborts_the_query() {
    let pipeline = make_pipeline("failing", Arc::new(FailingGenerator)).await;

    pipeline
        .add_documents_from_texts(vec!["some stored text".to_string()])
        .await
        .unwrap();

    let err = pipeline.query(QueryRequest::new("anything")).await.unwrap_err();
    assert!(matches!(err, RagError::Generation(_)));
    assert!(err.to_string().contains("backend unavailable"));
}

#[tokio::test]
async fn load_document_chunks_a_file_from_disk() {
    let generator = Arc::new(EchoGenerator::new("answer"));
    let pipeline = make_pipeline("fromfile", generator).await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "First paragraph.\n\nSecond paragraph.\n\nThird paragraph.").unwrap();

    let added = pipeline.load_document(file.path()).await.unwrap();
    assert_eq!(added, 3);
    assert_eq!(pipeline.document_count().await.unwrap(), 3);
}

#[tokio::test]
async fn load_document_with_missing_file_is_an_io_error() {
    let generator = Arc::new(EchoGenerator::new("answer"));
    let pipeline = make_pipeline("missingfile", generator).await;

    let err = pipeline.load_document("/no/such/file.txt").await.unwrap_err();
    assert!(matches!(err, RagError::Io(_)));
}

#[tokio::test]
async fn clear_documents_empties_the_collection() {
    let generator = Arc::new(EchoGenerator::new("answer"));
    let pipeline = make_pipeline("cleared", generator).await;

    pipeline
        .add_documents_from_texts(vec!["a".to_string(), "b".to_string()])
        .await
        .unwrap();
    assert_eq!(pipeline.document_count().await.unwrap(), 2);

    pipeline.clear_documents().await.unwrap();
    assert_eq!(pipeline.document_count().await.unwrap(), 0);
}

#[tokio::test]
async fn system_info_reports_identities_and_live_count() {
    let generator = Arc::new(EchoGenerator::new("answer"));
    let pipeline = make_pipeline("sysinfo", generator).await;

    pipeline
        .add_documents_from_texts(vec!["one chunk".to_string()])
        .await
        .unwrap();

    let info = pipeline.system_info().await.unwrap();
    assert_eq!(info.embedding_service.model_name, "mock-hashed-bow");
    assert_eq!(info.reranker.model_name, "overlap");
    assert_eq!(info.generator.model_name, "echo");
    assert_eq!(info.document_count, 1);

    // Count is recomputed, not cached.
    pipeline
        .add_documents_from_texts(vec!["another".to_string()])
        .await
        .unwrap();
    assert_eq!(pipeline.system_info().await.unwrap().document_count, 2);
}
