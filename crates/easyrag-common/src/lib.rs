//! # easyrag-common
//!
//! Common types for LLM conversations, tool schemas and backend configuration.
//!
//! This crate provides the foundational types shared by the adapters, the tool
//! registry and the orchestration loop:
//! - The conversation store and its messages
//! - Tool schemas, canonical tool calls and argument parsing
//! - Model and backend configuration
//!
//! ## Example
//!
//! ```
//! use easyrag_common::{Conversation, Tool, ToolCall, ToolParameter};
//! use serde_json::json;
//!
//! let mut conv = Conversation::new();
//! conv.add_message(conv.user_message("What's the weather in 92021?")).unwrap();
//!
//! // Define a tool from an ordered parameter list
//! let tool = Tool::from_parameters(
//!     "weather",
//!     "Current weather for a US zip code",
//!     &[ToolParameter::string("zipCode", "The zip code").required()],
//! );
//! assert_eq!(tool.function.parameters.required, vec!["zipCode"]);
//!
//! // A canonical tool call, as produced by a normalizer
//! let args = json!({"zipCode": "92021"}).as_object().cloned().unwrap();
//! let call = ToolCall::new("weather", args);
//! assert!(call.id.starts_with("tool_"));
//! ```

/// Conversation store and message types.
pub mod chat;
/// Backend connection settings, model descriptions and reply classification.
pub mod client;
/// Tool schemas, tool calls and name handling.
pub mod tools;

pub use chat::{Conversation, ConversationOptions, DEFAULT_SYSTEM_PROMPT, Message, MessageRole};
pub use client::{BackendConfig, InvalidOption, Model, ModelOptions, ModelType, Reply, RetryConfig};
pub use tools::{
    Arguments, Function, FunctionCall, ParameterType, Parameters, Property, RESPOND_TOOL_NAME,
    Tool, ToolCall, ToolParameter, generate_call_id, parse_arguments, sanitize_tool_name,
};
