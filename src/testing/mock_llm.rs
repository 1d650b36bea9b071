// src/testing/mock_llm.rs
// Deterministic test double for LlmProvider. Grounded on the teacher's
// testing::mock_llm::MockLlmProvider: scripted/recorded responses replayed
// in order, with a fallback for anything unscripted.

use std::any::Any;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream;
use serde_json::Value;

use crate::llm::provider::{FunctionCall, LlmProvider, Message, Response, TokenUsage, ToolResponse};

pub struct MockLlmProvider {
    responses: Mutex<Vec<String>>,
    tool_calls: Mutex<Vec<Vec<FunctionCall>>>,
    fallback: String,
}

impl MockLlmProvider {
    pub fn empty() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            tool_calls: Mutex::new(Vec::new()),
            fallback: String::new(),
        }
    }

    pub fn with_response(text: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(vec![text.into()]),
            tool_calls: Mutex::new(Vec::new()),
            fallback: String::new(),
        }
    }

    pub fn from_recordings(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses),
            tool_calls: Mutex::new(Vec::new()),
            fallback: String::new(),
        }
    }

    pub fn with_tool_calls(mut self, calls: Vec<FunctionCall>) -> Self {
        self.tool_calls.get_mut().unwrap().push(calls);
        self
    }

    fn next_response(&self) -> String {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            self.fallback.clone()
        } else {
            responses.remove(0)
        }
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn invoke(&self, _messages: Vec<Message>, _system: &str) -> Result<Response> {
        Ok(Response {
            content: self.next_response(),
            model: "mock".to_string(),
            tokens: TokenUsage::default(),
        })
    }

    async fn invoke_with_tools(
        &self,
        _messages: Vec<Message>,
        _system: &str,
        _tools: Vec<Value>,
    ) -> Result<ToolResponse> {
        let mut tool_calls = self.tool_calls.lock().unwrap();
        let function_calls = if tool_calls.is_empty() {
            Vec::new()
        } else {
            tool_calls.remove(0)
        };

        Ok(ToolResponse {
            text_output: self.next_response(),
            function_calls,
            tokens: TokenUsage::default(),
        })
    }

    async fn invoke_stream(
        &self,
        _messages: Vec<Message>,
        _system: &str,
    ) -> Result<Box<dyn futures::Stream<Item = Result<String>> + Send + Unpin>> {
        let text = self.next_response();
        let chunks: Vec<Result<String>> = text
            .chars()
            .map(|c| Ok(c.to_string()))
            .collect();
        Ok(Box::new(Box::pin(stream::iter(chunks))))
    }
}
