//! The grounded-answer prompt template.
//!
//! The wording is part of the external contract: a fixed instructional
//! preamble, the literal query, a header introducing the context, the
//! context chunks joined with a blank line, and a closing instruction to
//! answer only from the given material.

/// Builds the generation prompt from a query and its context chunks.
///
/// Deterministic: the same inputs always produce the same prompt, with
/// chunks concatenated in their given order.
pub fn build_prompt(query: &str, context_chunks: &[String]) -> String {
    let context = context_chunks.join("\n\n");
    format!(
        "你是一位知识助手，请根据用户的问题和下列片段生成准确的回答。\n\n\
         用户问题: {query}\n\n\
         相关片段:\n{context}\n\n\
         请基于上述内容作答，不要编造信息。"
    )
}
