//! services/api/src/adapters/outline_llm.rs
//!
//! This module contains the adapter for the outline-generating LLM.
//! It implements the `OutlineGenerationService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use textbook_core::{
    outline::GenerationOutput,
    ports::{OutlineGenerationService, PortError, PortResult},
};
use tracing::debug;

const SYSTEM_INSTRUCTIONS: &str = r#"You are a textbook author. You receive text extracted from one or more source documents and turn it into a textbook outline with written content.

Respond with a single JSON object and nothing else, in exactly this shape:
{"chapters": [{"title": "...", "sections": [{"title": "...", "content": "..."}]}]}

Rules:
- Order chapters from introductory material to advanced material.
- Every chapter has at least one section.
- Section content is a few explanatory paragraphs grounded in the source text.
- Do not invent facts that contradict the source text."#;

/// The corpus is capped before it is sent so one huge upload cannot blow the context window.
const MAX_CORPUS_CHARS: usize = 48_000;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `OutlineGenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiOutlineAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiOutlineAdapter {
    /// Creates a new `OpenAiOutlineAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// `OutlineGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl OutlineGenerationService for OpenAiOutlineAdapter {
    async fn generate_outline(&self, corpus: &str) -> PortResult<GenerationOutput> {
        let corpus: String = corpus.chars().take(MAX_CORPUS_CHARS).collect();

        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(format!("SOURCE TEXT:\n---\n{}\n---", corpus))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .response_format(ResponseFormat::JsonObject)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Transport(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::InvalidResponse("Outline LLM returned no text content.".to_string())
            })?;

        let output = GenerationOutput::from_response(&content);
        debug!(
            structured = matches!(output, GenerationOutput::Structured(_)),
            chars = content.len(),
            "Outline LLM answered"
        );
        Ok(output)
    }
}
