//! OpenAI chat completions wire types and adapter.
//!
//! This module provides types for the OpenAI chat completions API
//! and an adapter that works with any OpenAI-compatible endpoint.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use typed_builder::TypedBuilder;

use easyrag_common::chat::{Message, MessageRole};
use easyrag_common::tools::{FunctionCall, Tool, ToolCall};

pub mod client;
pub use client::{CHAT_COMPLETIONS_PATH, DEFAULT_BASE_URL, OpenAIAdapter};

/// A single choice from a chat completion response.
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    /// The index of this choice in the response array.
    #[serde(default)]
    pub index: u32,
    /// The generated message for this choice.
    pub message: OpenAIResponseMessage,
    /// Why generation stopped for this choice.
    ///
    /// Common values: "stop", "length", "tool_calls", "content_filter"
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Outgoing message in OpenAI format.
///
/// `content` always serializes, as `null` for assistant messages that only
/// carry tool calls.
#[derive(Debug, Clone, Serialize, TypedBuilder)]
pub struct OpenAIMessage {
    /// The role of the message author (user, assistant, system, or tool).
    pub role: MessageRole,
    /// The text content of the message.
    #[builder(default)]
    pub content: Option<String>,
    /// Optional name of the message author.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tool calls requested by the assistant (optional).
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<SmallVec<[OpenAIToolCall; 2]>>,
    /// ID of the tool call this message is responding to (for tool messages).
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl From<&Message> for OpenAIMessage {
    fn from(message: &Message) -> Self {
        let tool_calls = if message.tool_calls.is_empty() {
            None
        } else {
            Some(
                message
                    .tool_calls
                    .iter()
                    .map(OpenAIToolCall::from)
                    .collect(),
            )
        };

        let content = if tool_calls.is_some() && message.content.is_empty() {
            None
        } else {
            Some(message.content.clone())
        };

        // The API rejects `name` on tool results; the call id identifies them
        let name = match message.role {
            MessageRole::Tool => None,
            _ => message.name.clone(),
        };

        Self::builder()
            .role(message.role)
            .content(content)
            .name(name)
            .tool_calls(tool_calls)
            .tool_call_id(message.tool_call_id.clone())
            .build()
    }
}

/// Message returned inside a [`ChatChoice`].
#[derive(Debug, Deserialize)]
pub struct OpenAIResponseMessage {
    /// Text content; `null` when the model requests tools.
    #[serde(default)]
    pub content: Option<String>,
    /// Requested tool calls.
    #[serde(default)]
    pub tool_calls: Option<Vec<OpenAIToolCall>>,
}

/// OpenAI-compatible tool call format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIToolCall {
    /// Unique identifier for this tool call.
    #[serde(default)]
    pub id: String,
    /// Type of the tool call, typically "function".
    #[serde(rename = "type", default = "default_tool_call_type")]
    pub r#type: String,
    /// The function to call with its arguments.
    pub function: OpenAIFunction,
}

impl From<&ToolCall> for OpenAIToolCall {
    fn from(tool_call: &ToolCall) -> Self {
        Self {
            id: tool_call.id.clone(),
            r#type: tool_call.call_type.clone(),
            function: OpenAIFunction::from(&tool_call.function),
        }
    }
}

fn default_tool_call_type() -> String {
    "function".to_string()
}

/// Function name and JSON-encoded arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIFunction {
    /// The name of the function to call.
    pub name: String,
    /// The arguments as a JSON-serialized string.
    #[serde(default)]
    pub arguments: String,
}

impl From<&FunctionCall> for OpenAIFunction {
    fn from(function_call: &FunctionCall) -> Self {
        Self {
            name: function_call.name.clone(),
            arguments: function_call.arguments_json(),
        }
    }
}

/// Request for a chat completion.
///
/// # Examples
///
/// ```
/// use easyrag_client::openai::ChatCompletionRequest;
///
/// let request = ChatCompletionRequest::builder()
///     .model("gpt-4o".to_string())
///     .messages(vec![])
///     .temperature(Some(0.7))
///     .max_tokens(Some(1000))
///     .build();
///
/// let json = serde_json::to_value(&request).unwrap();
/// assert_eq!(json["max_tokens"], 1000);
/// assert!(json.get("tools").is_none());
/// ```
#[derive(Debug, Clone, Serialize, TypedBuilder)]
pub struct ChatCompletionRequest {
    /// The model identifier to use.
    pub model: String,
    /// The conversation messages in OpenAI format.
    pub messages: Vec<OpenAIMessage>,
    /// Tools available for function calling (optional).
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    /// Sampling temperature 0.0 to 2.0 (optional).
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Frequency penalty -2.0 to 2.0 (optional).
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    /// Maximum tokens to generate (optional).
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Nucleus sampling threshold 0.0 to 1.0 (optional).
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Sampling seed (optional).
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

/// Response from a chat completion request.
///
/// Only the parts the normalizer reads are modelled; everything else in the
/// body is ignored.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    /// Unique identifier for this completion.
    #[serde(default)]
    pub id: Option<String>,
    /// The model that generated this completion.
    #[serde(default)]
    pub model: Option<String>,
    /// Generated completions.
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}
