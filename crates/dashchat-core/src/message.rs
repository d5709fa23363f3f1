//! Message types: the conversation exchanged with the model.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::tool::ToolResult;

/// Author of a piece of conversation content.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    Function,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
            Self::Function => "function",
        }
    }
}

/// A function call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRequest {
    pub name: String,
    /// JSON object of argument name → value.
    #[serde(default)]
    pub args: Value,
}

impl ToolCallRequest {
    pub fn new(name: &str, args: Value) -> Self {
        Self {
            name: name.to_string(),
            args,
        }
    }
}

/// One part of a content block.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    FunctionCall(ToolCallRequest),
    FunctionResponse { name: String, response: Value },
}

/// A turn in the model conversation: who said it and what they said.
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: &str) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text(text.to_string())],
        }
    }

    pub fn model_text(text: &str) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::Text(text.to_string())],
        }
    }

    /// The model's own function-call turn, replayed so the conversation
    /// stays well-formed when the function response follows.
    pub fn model_call(call: &ToolCallRequest) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::FunctionCall(call.clone())],
        }
    }

    /// A function response tagged with the originating tool name. The
    /// tool's result is wrapped as `{"content": ...}`.
    pub fn function_response(name: &str, result: &ToolResult) -> Self {
        Self {
            role: Role::Function,
            parts: vec![Part::FunctionResponse {
                name: name.to_string(),
                response: json!({ "content": result.to_value() }),
            }],
        }
    }
}

/// A model reply, decoded once at the provider boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    FunctionCall(ToolCallRequest),
    FinalText(String),
}

impl ModelReply {
    /// Decode the parts of the first candidate.
    ///
    /// Only the first part decides whether this is a function call; a text
    /// reply is every text part concatenated in order, no separator.
    pub fn from_parts(parts: Vec<Part>) -> Self {
        if let Some(Part::FunctionCall(call)) = parts.first() {
            return Self::FunctionCall(call.clone());
        }

        let text = parts
            .into_iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t),
                _ => None,
            })
            .collect::<String>();
        Self::FinalText(text)
    }

    pub fn is_function_call(&self) -> bool {
        matches!(self, Self::FunctionCall(_))
    }
}
