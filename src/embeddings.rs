//! Embedding capability: text in, fixed-dimension vector out.
//!
//! The pipeline never looks inside an embedding; it only requires that the
//! provider is deterministic per text and returns vectors of one fixed
//! dimension. [`HttpEmbeddingProvider`] talks to an OpenAI-compatible
//! `/embeddings` endpoint; [`MockEmbeddingProvider`] produces deterministic
//! hashed vectors for offline and CI use.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::RagError;

/// Static identity of an embedding backend, reported by
/// [`crate::pipeline::RagPipeline::system_info`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingModelInfo {
    pub model_name: String,
    pub dimension: Option<usize>,
}

/// Opaque text-to-vector capability.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;

    /// Embeds a batch of texts in one backend call, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;

    /// Static model identity.
    fn model_info(&self) -> EmbeddingModelInfo;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Adapter for OpenAI-compatible embedding endpoints.
///
/// Issues `POST {base_url}/embeddings` with `{"model", "input"}` and reads
/// the vectors back from `data[i].embedding`. Backend failures propagate
/// unmodified as [`RagError::Embedding`]; nothing is retried.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model_name: String,
    api_key: Option<String>,
}

impl HttpEmbeddingProvider {
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

    async fn request(&self, input: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let body = EmbeddingRequest {
            model: &self.model_name,
            input,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| RagError::Embedding(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!("HTTP {status}: {text}")));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|err| RagError::Embedding(err.to_string()))?;

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let input = [text.to_string()];
        let mut vectors = self.request(&input).await?;
        vectors
            .pop()
            .ok_or_else(|| RagError::Embedding("backend returned no vectors".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.request(texts).await?;
        if vectors.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "backend returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }

    fn model_info(&self) -> EmbeddingModelInfo {
        EmbeddingModelInfo {
            model_name: self.model_name.clone(),
            dimension: None,
        }
    }
}

/// Deterministic embedding provider for tests and offline runs.
///
/// Tokenizes on whitespace, hashes each token into one of `dimension`
/// buckets, and L2-normalizes the counts. Texts sharing tokens land near
/// each other under cosine distance, which is enough for retrieval tests.
#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    dimension: usize,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self { dimension: 16 }
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text.split_whitespace() {
            let bucket = fnv1a(token.as_bytes()) as usize % self.dimension;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(texts.iter().map(|text| self.embed_sync(text)).collect())
    }

    fn model_info(&self) -> EmbeddingModelInfo {
        EmbeddingModelInfo {
            model_name: "mock-hashed-bow".to_string(),
            dimension: Some(self.dimension),
        }
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf29ce484222325u64;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
