//! Ollama chat API wire types and adapter.

use serde::Serialize;
use serde_json::Value;
use typed_builder::TypedBuilder;

use easyrag_common::chat::{Message, MessageRole};
use easyrag_common::tools::{Tool, ToolCall};
use easyrag_common::ModelOptions;

pub mod client;
pub use client::{CHAT_PATH, DEFAULT_BASE_URL, OllamaAdapter, tool_prompt};

/// Outgoing message in Ollama format.
#[derive(Debug, Clone, Serialize)]
pub struct OllamaMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OllamaToolCall>>,
}

impl From<&Message> for OllamaMessage {
    fn from(message: &Message) -> Self {
        let tool_calls = (!message.tool_calls.is_empty())
            .then(|| message.tool_calls.iter().map(OllamaToolCall::from).collect());

        Self {
            role: message.role,
            content: message.content.clone(),
            tool_calls,
        }
    }
}

/// Tool calls go back to Ollama with object arguments.
#[derive(Debug, Clone, Serialize)]
pub struct OllamaToolCall {
    pub function: OllamaFunction,
}

#[derive(Debug, Clone, Serialize)]
pub struct OllamaFunction {
    pub name: String,
    pub arguments: Value,
}

impl From<&ToolCall> for OllamaToolCall {
    fn from(call: &ToolCall) -> Self {
        Self {
            function: OllamaFunction {
                name: call.function.name.clone(),
                arguments: Value::Object(call.function.arguments.clone()),
            },
        }
    }
}

/// Sampling options, nested under `options` in the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    /// Context window size, taken from `max_tokens`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

impl OllamaOptions {
    /// Maps model options, or `None` when none are set.
    #[must_use]
    pub fn from_model_options(options: &ModelOptions) -> Option<Self> {
        let mapped = Self {
            temperature: options.temperature,
            frequency_penalty: options.frequency_penalty,
            num_ctx: options.max_tokens,
            top_p: options.top_p,
            seed: options.seed,
        };
        (mapped != Self::default()).then_some(mapped)
    }
}

/// Request body for `/api/chat`.
#[derive(Debug, Clone, Serialize, TypedBuilder)]
pub struct OllamaChatRequest {
    pub model: String,
    pub messages: Vec<OllamaMessage>,
    #[builder(default)]
    pub stream: bool,
    /// `"json"` constrains the model to JSON output.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<OllamaOptions>,
}
