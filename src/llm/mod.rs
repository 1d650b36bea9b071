// src/llm/mod.rs
// Unified LLM client abstraction: one trait covering blocking chat
// completion, token streaming, and tool-bound invocation, implemented
// against an openai-compatible chat-completions endpoint.

pub mod embeddings;
pub mod openai_compatible;
pub mod provider;

pub use embeddings::EmbeddingClient;
pub use openai_compatible::OpenAiCompatibleProvider;
pub use provider::{LlmProvider, Message, Response, ToolCallInfo, ToolResponse};
