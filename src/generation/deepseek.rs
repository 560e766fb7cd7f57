//! Streaming-capable generation via the DeepSeek chat-completions API.
//!
//! The streaming path consumes a server-sent-event response body as a lazy
//! sequence of decoded fragments: lines without the `data: ` prefix are
//! ignored, a literal `[DONE]` payload terminates decoding, and fragments
//! that fail to parse are skipped so one corrupt event cannot discard an
//! otherwise complete answer.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use super::{AnswerGenerator, GeneratorInfo, prompt::build_prompt};
use crate::types::RagError;

const DEFAULT_API_URL: &str = "https://api.deepseek.com/v1/chat/completions";
const API_KEY_ENV: &str = "DEEPSEEK_API_KEY";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const SYSTEM_PROMPT: &str = "你是一个有用的AI助手，请用简洁明了的方式回答问题。";
const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// Generator for DeepSeek-compatible chat-completions endpoints.
#[derive(Debug)]
pub struct DeepSeekGenerator {
    client: reqwest::Client,
    api_url: String,
    model_name: String,
    api_key: String,
    stream: bool,
}

impl DeepSeekGenerator {
    /// Creates a generator for the given model.
    ///
    /// The API key comes from `api_key` or, failing that, the
    /// `DEEPSEEK_API_KEY` environment variable (a `.env` file is honored).
    /// Missing both fails here, before any network call.
    pub fn new(model_name: impl Into<String>, api_key: Option<String>) -> Result<Self, RagError> {
        dotenvy::dotenv().ok();
        let api_key = api_key
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .ok_or_else(|| {
                RagError::Configuration(format!(
                    "no API key: pass one explicitly or set {API_KEY_ENV}"
                ))
            })?;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| RagError::Configuration(err.to_string()))?;

        Ok(Self {
            client,
            api_url: DEFAULT_API_URL.to_string(),
            model_name: model_name.into(),
            api_key,
            stream: false,
        })
    }

    /// Overrides the endpoint URL (tests, self-hosted deployments).
    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Switches between incremental (SSE) and single-body delivery.
    #[must_use]
    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    async fn call_api(&self, prompt: &str) -> Result<String, RagError> {
        let body = ChatRequest {
            model: &self.model_name,
            messages: vec![
                Message {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Message {
                    role: "user",
                    content: prompt,
                },
            ],
            stream: self.stream,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    RagError::Generation("request timed out".to_string())
                } else if err.is_connect() {
                    RagError::Generation(format!("connection failed: {err}"))
                } else {
                    RagError::Generation(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|parsed| parsed.error.message)
                .unwrap_or(body);
            return Err(RagError::Generation(format!("HTTP {status}: {detail}")));
        }

        if self.stream {
            self.collect_stream(response).await
        } else {
            let parsed: ChatResponse = response
                .json()
                .await
                .map_err(|err| RagError::Generation(err.to_string()))?;
            parsed
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.message.content)
                .ok_or_else(|| RagError::Generation("response contained no choices".into()))
        }
    }

    async fn collect_stream(&self, response: reqwest::Response) -> Result<String, RagError> {
        let mut body = response.bytes_stream();
        let mut decoder = SseLineDecoder::default();
        let mut answer = String::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|err| {
                if err.is_timeout() {
                    RagError::Generation("request timed out".to_string())
                } else {
                    RagError::Generation(err.to_string())
                }
            })?;
            for line in decoder.push(&chunk) {
                match parse_stream_line(&line) {
                    StreamLine::Fragment(content) => answer.push_str(&content),
                    StreamLine::Done => return Ok(answer),
                    StreamLine::Skip => {}
                }
            }
        }

        // Stream ended without a terminator; drain any buffered tail.
        if let Some(line) = decoder.finish() {
            if let StreamLine::Fragment(content) = parse_stream_line(&line) {
                answer.push_str(&content);
            }
        }
        Ok(answer)
    }
}

#[async_trait]
impl AnswerGenerator for DeepSeekGenerator {
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
            provider: "DeepSeek".to_string(),
            api_url: Some(self.api_url.clone()),
        }
    }
}

/// One decoded event line from the stream.
#[derive(Debug, PartialEq)]
enum StreamLine {
    /// A content fragment to append to the answer.
    Fragment(String),
    /// The `[DONE]` terminator.
    Done,
    /// Anything else: empty lines, non-data framing, malformed payloads.
    Skip,
}

fn parse_stream_line(line: &str) -> StreamLine {
    let line = line.trim();
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return StreamLine::Skip;
    };
    if payload.trim() == DONE_SENTINEL {
        return StreamLine::Done;
    }

    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .map_or(StreamLine::Skip, StreamLine::Fragment),
        Err(_) => StreamLine::Skip,
    }
}

/// Splits an arriving byte stream into newline-framed lines, holding back
/// the trailing partial line until more bytes arrive.
#[derive(Default)]
struct SseLineDecoder {
    buffer: Vec<u8>,
}

impl SseLineDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            lines.push(text.trim_end_matches(['\n', '\r']).to_string());
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let text = String::from_utf8_lossy(&self.buffer).to_string();
        self.buffer.clear();
        Some(text)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Deserialize, Default)]
struct Delta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}
