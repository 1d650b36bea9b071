// src/tools/schema.rs
// Fluent builder for OpenAI-style function-calling JSON schemas, grounded
// on the teacher's operations::tool_builder::ToolBuilder.

use serde_json::{json, Value};

pub struct ToolBuilder {
    name: String,
    description: String,
    properties: Vec<(String, Value)>,
    required: Vec<String>,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            properties: Vec::new(),
            required: Vec::new(),
        }
    }

    pub fn param(mut self, name: &str, schema: Value, required: bool) -> Self {
        self.properties.push((name.to_string(), schema));
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    pub fn build(self) -> Value {
        let properties: serde_json::Map<String, Value> = self.properties.into_iter().collect();

        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "properties": properties,
                    "required": self.required,
                }
            }
        })
    }
}

pub mod properties {
    use serde_json::{json, Value};

    pub fn string(description: &str) -> Value {
        json!({"type": "string", "description": description})
    }

    pub fn number(description: &str) -> Value {
        json!({"type": "number", "description": description})
    }

    pub fn integer(description: &str) -> Value {
        json!({"type": "integer", "description": description})
    }

    pub fn string_array(description: &str) -> Value {
        json!({"type": "array", "items": {"type": "string"}, "description": description})
    }
}
