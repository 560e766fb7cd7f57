//! Answer generation from a query and retrieved context.
//!
//! Two backends implement the [`AnswerGenerator`] capability:
//!
//! * [`gemini::GeminiGenerator`] — single-shot REST call, one response body.
//! * [`deepseek::DeepSeekGenerator`] — chat-completions endpoint with
//!   optional incremental (server-sent-event) delivery.
//!
//! Both share the prompt template in [`prompt`], which is the one piece of
//! prompt engineering this crate owns.

pub mod deepseek;
pub mod gemini;
pub mod prompt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::RagError;

pub use deepseek::DeepSeekGenerator;
pub use gemini::GeminiGenerator;
pub use prompt::build_prompt;

/// Static identity of a generation backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeneratorInfo {
    pub model_name: String,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

/// Opaque prompt-to-text capability.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Builds the grounded-answer prompt from `query` and `context_chunks`
    /// and returns the generated text.
    ///
    /// `show_prompt` prints the constructed prompt before sending it, a
    /// debugging side effect with no influence on the return value.
    async fn generate_answer(
        &self,
        query: &str,
        context_chunks: &[String],
        show_prompt: bool,
    ) -> Result<String, RagError>;

    /// Sends a caller-supplied prompt, bypassing the template.
    async fn generate_with_custom_prompt(&self, custom_prompt: &str) -> Result<String, RagError>;

    /// Static model identity.
    fn model_info(&self) -> GeneratorInfo;
}
