//! Candidate reranking with a cross-encoder style relevance oracle.
//!
//! Retrieval returns documents ordered by the index's similarity metric;
//! the [`Reranker`] reorders them with a more precise (and more expensive)
//! pairwise scoring model before they reach the generator.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::RagError;

/// Static identity of a reranking backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScorerInfo {
    pub model_name: String,
}

/// Opaque `(query, candidate) -> score` capability.
///
/// Scores are whatever the backend returns: plain floats, not constrained
/// to any range. Ordering is purely comparative.
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    /// Scores every `(query, document)` pair in one batched call,
    /// returning scores in input order.
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, RagError>;

    /// Static model identity.
    fn model_info(&self) -> ScorerInfo;
}

/// Reorders retrieval candidates by oracle relevance score.
#[derive(Clone)]
pub struct Reranker {
    scorer: Arc<dyn RelevanceScorer>,
}

impl Reranker {
    pub fn new(scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self { scorer }
    }

    /// Returns the `top_k` most relevant documents, best first.
    ///
    /// An empty candidate list short-circuits to `[]` without calling the
    /// scorer. If `top_k` exceeds the number of candidates, all of them
    /// are returned fully sorted.
    pub async fn rerank(
        &self,
        query: &str,
        documents: Vec<String>,
        top_k: usize,
    ) -> Result<Vec<String>, RagError> {
        let scored = self.rerank_with_scores(query, documents, top_k).await?;
        Ok(scored.into_iter().map(|(doc, _)| doc).collect())
    }

    /// Like [`Reranker::rerank`] but keeps the scores paired with each
    /// document, for display or threshold filtering downstream.
    pub async fn rerank_with_scores(
        &self,
        query: &str,
        documents: Vec<String>,
        top_k: usize,
    ) -> Result<Vec<(String, f32)>, RagError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let scores = self.scorer.score(query, &documents).await?;
        if scores.len() != documents.len() {
            return Err(RagError::Rerank(format!(
                "scorer returned {} scores for {} documents",
                scores.len(),
                documents.len()
            )));
        }

        let mut scored: Vec<(String, f32)> = documents.into_iter().zip(scores).collect();
        // sort_by is stable, so equal scores keep their retrieval order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        tracing::debug!(kept = scored.len(), "Reranked candidate set");
        Ok(scored)
    }

    pub fn model_info(&self) -> ScorerInfo {
        self.scorer.model_info()
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f32,
}

/// Adapter for Jina/Cohere-compatible `/rerank` endpoints.
///
/// The endpoint scores all pairs in one call and reports `(index, score)`
/// results; this adapter maps them back onto input order so the
/// [`Reranker`] owns the actual sort. A response that does not score every
/// document is rejected rather than padded.
pub struct HttpRelevanceScorer {
    client: reqwest::Client,
    base_url: String,
    model_name: String,
    api_key: Option<String>,
}

impl HttpRelevanceScorer {
    pub fn new(
        base_url: impl Into<String>,
        model_name: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model_name: model_name.into(),
            api_key,
        }
    }
}

#[async_trait]
impl RelevanceScorer for HttpRelevanceScorer {
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, RagError> {
        let url = format!("{}/rerank", self.base_url.trim_end_matches('/'));
        let body = RerankRequest {
            model: &self.model_name,
            query,
            documents,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| RagError::Rerank(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RagError::Rerank(format!("HTTP {status}: {text}")));
        }

        let parsed: RerankResponse = response
            .json()
            .await
            .map_err(|err| RagError::Rerank(err.to_string()))?;

        if parsed.results.len() != documents.len() {
            return Err(RagError::Rerank(format!(
                "backend scored {} of {} documents",
                parsed.results.len(),
                documents.len()
            )));
        }

        let mut scores = vec![0.0f32; documents.len()];
        for result in parsed.results {
            let slot = scores.get_mut(result.index).ok_or_else(|| {
                RagError::Rerank(format!(
                    "backend reported out-of-range index {}",
                    result.index
                ))
            })?;
            *slot = result.relevance_score;
        }
        Ok(scores)
    }

    fn model_info(&self) -> ScorerInfo {
        ScorerInfo {
            model_name: self.model_name.clone(),
        }
    }
}
