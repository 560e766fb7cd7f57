//! Single-shot generation via the Gemini REST API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{AnswerGenerator, GeneratorInfo, prompt::build_prompt};
use crate::types::RagError;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Blocking-style generator: one request, one complete response body.
pub struct GeminiGenerator {
    client: reqwest::Client,
    base_url: String,
    model_name: String,
    api_key: String,
}

impl GeminiGenerator {
    /// Creates a generator for the given model.
    ///
    /// The API key comes from `api_key` or, failing that, the
    /// `GEMINI_API_KEY` environment variable (a `.env` file is honored).
    /// Missing both is a fail-fast configuration error.
    pub fn new(model_name: impl Into<String>, api_key: Option<String>) -> Result<Self, RagError> {
        dotenvy::dotenv().ok();
        let api_key = api_key
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .ok_or_else(|| {
                RagError::Configuration(format!(
                    "no API key: pass one explicitly or set {API_KEY_ENV}"
                ))
            })?;

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model_name: model_name.into(),
            api_key,
        })
    }

    /// Overrides the API base URL (tests, proxies).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn call_api(&self, prompt: &str) -> Result<String, RagError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model_name
        );
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| RagError::Generation(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RagError::Generation(format!("HTTP {status}: {text}")));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| RagError::Generation(err.to_string()))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Generation("response contained no candidates".into()))?
            .content
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect();

        Ok(text)
    }
}

#[async_trait]
impl AnswerGenerator for GeminiGenerator {
    async fn generate_answer(
        &self,
        query: &str,
        context_chunks: &[String],
        show_prompt: bool,
    ) -> Result<String, RagError> {
        let prompt = build_prompt(query, context_chunks);
        if show_prompt {
            println!("{prompt}\n\n---\n");
        }
        self.call_api(&prompt).await
    }

    async fn generate_with_custom_prompt(&self, custom_prompt: &str) -> Result<String, RagError> {
        self.call_api(custom_prompt).await
    }

    fn model_info(&self) -> GeneratorInfo {
        GeneratorInfo {
            model_name: self.model_name.clone(),
            provider: "Google Gemini".to_string(),
            api_url: None,
        }
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}
