// src/llm/openai_compatible.rs
// Single provider implementation targeting any chat-completions endpoint
// compatible with the OpenAI wire format. Base URL, model, and API key are
// all configuration-supplied so the same implementation serves both the
// main LLM slot and the faster/cheaper intent slot (§4.H, §6).

use std::any::Any;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::provider::{FunctionCall, LlmProvider, Message, Response, TokenUsage, ToolResponse};

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ToolCallMessage>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ToolCallMessage {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: FunctionCallMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCallMessage {
    name: String,
    arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Tool {
    #[serde(rename = "type")]
    tool_type: String,
    function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionDefinition {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallMessage>>,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    prompt_tokens: i64,
    completion_tokens: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChunkChoice {
    delta: DeltaMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct DeltaMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorDetail {
    message: String,
}

fn messages_to_wire(messages: &[Message], system: &str) -> Vec<ChatMessage> {
    let mut out = Vec::with_capacity(messages.len() + 1);

    if !system.is_empty() {
        out.push(ChatMessage {
            role: "system".to_string(),
            content: Some(system.to_string()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        });
    }

    for msg in messages {
        match msg.role.as_str() {
            "assistant" => {
                if let Some(ref tool_calls) = msg.tool_calls {
                    let wire_calls: Vec<ToolCallMessage> = tool_calls
                        .iter()
                        .map(|tc| ToolCallMessage {
                            id: tc.id.clone(),
                            call_type: "function".to_string(),
                            function: FunctionCallMessage {
                                name: tc.name.clone(),
                                arguments: tc.arguments.to_string(),
                            },
                        })
                        .collect();

                    out.push(ChatMessage {
                        role: "assistant".to_string(),
                        content: if msg.content.is_empty() {
                            None
                        } else {
                            Some(msg.content.clone())
                        },
                        tool_calls: Some(wire_calls),
                        tool_call_id: None,
                        name: None,
                    });
                } else {
                    out.push(ChatMessage {
                        role: "assistant".to_string(),
                        content: Some(msg.content.clone()),
                        tool_calls: None,
                        tool_call_id: None,
                        name: None,
                    });
                }
            }
            "tool" => {
                out.push(ChatMessage {
                    role: "tool".to_string(),
                    content: Some(msg.content.clone()),
                    tool_calls: None,
                    tool_call_id: msg.tool_call_id.clone(),
                    name: msg.tool_name.clone(),
                });
            }
            "system" => {}
            _ => {
                out.push(ChatMessage {
                    role: "user".to_string(),
                    content: Some(msg.content.clone()),
                    tool_calls: None,
                    tool_call_id: None,
                    name: None,
                });
            }
        }
    }

    out
}

fn tools_to_wire(tools: &[Value]) -> Vec<Tool> {
    tools
        .iter()
        .filter_map(|tool_def| {
            let func = tool_def.get("function").unwrap_or(tool_def);
            let name = func.get("name")?.as_str()?.to_string();
            let description = func
                .get("description")
                .and_then(|d| d.as_str())
                .unwrap_or("")
                .to_string();
            let parameters = func
                .get("parameters")
                .cloned()
                .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}}));
            Some(Tool {
                tool_type: "function".to_string(),
                function: FunctionDefinition {
                    name,
                    description,
                    parameters,
                },
            })
        })
        .collect()
}

pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: i64,
}

impl OpenAiCompatibleProvider {
    pub fn new(base_url: String, api_key: String, model: String, temperature: f64, max_tokens: i64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("failed to build reqwest client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            temperature,
            max_tokens,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn send(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if let Ok(err) = serde_json::from_str::<ErrorResponse>(&body) {
                return Err(anyhow!("{} returned {}: {}", self.model, status, err.error.message));
            }
            return Err(anyhow!("{} returned {}: {}", self.model, status, body));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &'static str {
        "openai-compatible"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn invoke(&self, messages: Vec<Message>, system: &str) -> Result<Response> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages_to_wire(&messages, system),
            tools: None,
            tool_choice: None,
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            stream: None,
        };

        let response = self.send(&request).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("{} returned no choices", self.model))?;

        Ok(Response {
            content: choice.message.content.unwrap_or_default(),
            model: self.model.clone(),
            tokens: response
                .usage
                .map(|u| TokenUsage {
                    input: u.prompt_tokens,
                    output: u.completion_tokens,
                })
                .unwrap_or_default(),
        })
    }

    async fn invoke_with_tools(
        &self,
        messages: Vec<Message>,
        system: &str,
        tools: Vec<Value>,
    ) -> Result<ToolResponse> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages_to_wire(&messages, system),
            tools: Some(tools_to_wire(&tools)),
            tool_choice: Some(Value::String("auto".to_string())),
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            stream: None,
        };

        let response = self.send(&request).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("{} returned no choices", self.model))?;

        let function_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                let arguments = serde_json::from_str(&tc.function.arguments).unwrap_or(Value::Null);
                FunctionCall {
                    id: tc.id,
                    name: tc.function.name,
                    arguments,
                }
            })
            .collect();

        Ok(ToolResponse {
            text_output: choice.message.content.unwrap_or_default(),
            function_calls,
            tokens: response
                .usage
                .map(|u| TokenUsage {
                    input: u.prompt_tokens,
                    output: u.completion_tokens,
                })
                .unwrap_or_default(),
        })
    }

    async fn invoke_stream(
        &self,
        messages: Vec<Message>,
        system: &str,
    ) -> Result<Box<dyn futures::Stream<Item = Result<String>> + Send + Unpin>> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages_to_wire(&messages, system),
            tools: None,
            tool_choice: None,
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            stream: Some(true),
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("{} returned {}: {}", self.model, status, body));
        }

        let byte_stream = response.bytes_stream();
        let text_stream = byte_stream.map(|chunk_result| -> Result<Option<String>> {
            let bytes = chunk_result?;
            let text = String::from_utf8_lossy(&bytes);
            let mut delta = String::new();

            for line in text.lines() {
                let line = line.trim();
                let Some(payload) = line.strip_prefix("data: ") else {
                    continue;
                };
                if payload == "[DONE]" {
                    continue;
                }
                if let Ok(chunk) = serde_json::from_str::<ChatCompletionChunk>(payload) {
                    for choice in chunk.choices {
                        if let Some(content) = choice.delta.content {
                            delta.push_str(&content);
                        }
                    }
                }
            }

            Ok(if delta.is_empty() { None } else { Some(delta) })
        });

        let filtered = text_stream.filter_map(|item| async move {
            match item {
                Ok(Some(delta)) => Some(Ok(delta)),
                Ok(None) => None,
                Err(e) => Some(Err(e)),
            }
        });

        Ok(Box::new(Box::pin(filtered)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_to_wire_basic() {
        let messages = vec![Message::user("hi"), Message::assistant("hello")];
        let wire = messages_to_wire(&messages, "be nice");
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[0].role, "system");
        assert_eq!(wire[1].role, "user");
        assert_eq!(wire[2].role, "assistant");
    }

    #[test]
    fn test_tools_to_wire() {
        let tools = vec![serde_json::json!({
            "type": "function",
            "function": {
                "name": "query_order",
                "description": "fetch an order",
                "parameters": {"type": "object", "properties": {}}
            }
        })];
        let wire = tools_to_wire(&tools);
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0].function.name, "query_order");
    }

    #[test]
    fn test_provider_endpoint() {
        let provider = OpenAiCompatibleProvider::new(
            "https://api.openai.com/v1/".to_string(),
            "key".to_string(),
            "gpt-4o-mini".to_string(),
            0.7,
            512,
        );
        assert_eq!(provider.endpoint(), "https://api.openai.com/v1/chat/completions");
    }
}
