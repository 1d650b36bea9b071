// src/llm/provider.rs
// LLM Provider trait - unified chat-completion + tool-binding + streaming
// interface over a single configurable provider (§4.H).

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;

/// Tool call information for assistant messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallInfo {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Simple message format for all providers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallInfo>>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
            tool_call_id: None,
            tool_name: None,
            tool_calls: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
            tool_call_id: None,
            tool_name: None,
            tool_calls: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
            tool_call_id: None,
            tool_name: None,
            tool_calls: None,
        }
    }

    pub fn tool_result(call_id: String, tool_name: String, output: String) -> Self {
        Self {
            role: "tool".to_string(),
            content: output,
            tool_call_id: Some(call_id),
            tool_name: Some(tool_name),
            tool_calls: None,
        }
    }

    pub fn assistant_with_tool_calls(content: String, tool_calls: Vec<ToolCallInfo>) -> Self {
        Self {
            role: "assistant".to_string(),
            content,
            tool_call_id: None,
            tool_name: None,
            tool_calls: Some(tool_calls),
        }
    }
}

/// Token usage accounting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: i64,
    pub output: i64,
}

/// Basic chat response (no tools)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub content: String,
    pub model: String,
    pub tokens: TokenUsage,
}

/// Function call requested by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Tool-calling response: either plain text or one or more function calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    pub text_output: String,
    pub function_calls: Vec<FunctionCall>,
    pub tokens: TokenUsage,
}

/// Universal LLM provider interface (§4.H).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    /// Blocking chat completion.
    async fn invoke(&self, messages: Vec<Message>, system: &str) -> Result<Response>;

    /// Tool-bound invocation: returns either text or function calls.
    async fn invoke_with_tools(
        &self,
        messages: Vec<Message>,
        system: &str,
        tools: Vec<Value>,
    ) -> Result<ToolResponse>;

    /// Incremental token streaming.
    async fn invoke_stream(
        &self,
        _messages: Vec<Message>,
        _system: &str,
    ) -> Result<Box<dyn futures::Stream<Item = Result<String>> + Send + Unpin>> {
        Err(anyhow::anyhow!("{} does not support streaming", self.name()))
    }
}
