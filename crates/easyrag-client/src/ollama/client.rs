//! Ollama backend adapter.
//!
//! The loose backend. Local models often ignore native tool calling, so when
//! tools are offered the adapter also describes them in the system prompt,
//! forces JSON output, and asks the model to finish through
//! `respond_to_user`. Replies that come back in the wrong shape are retried
//! rather than treated as errors.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;

use easyrag_common::chat::MessageRole;
use easyrag_common::tools::{
    Arguments, RESPOND_TOOL_NAME, ToolCall, parse_arguments, sanitize_tool_name,
};
use easyrag_common::{BackendConfig, Message, Model, Reply, Tool};

use super::{OllamaChatRequest, OllamaMessage, OllamaOptions};
use crate::BackendAdapter;
use crate::error::ClientError;
use crate::transport::{HttpTransport, Transport};

/// Base URL used when the configuration does not set one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Chat endpoint path.
pub const CHAT_PATH: &str = "/api/chat";

/// Renders the instructions that tell a loose model how to use `tools`.
#[must_use]
pub fn tool_prompt(tools: &[Tool]) -> String {
    let catalogue = serde_json::to_string(tools).unwrap_or_else(|_| "[]".to_string());
    format!(
        "You can call tools to gather what you need before answering. \
         The tools are described as JSON between <tools></tools> tags:\n\
         <tools>{catalogue}</tools>\n\
         Call a tool by name with arguments that match its parameters. \
         Once you have your answer, call the \"{RESPOND_TOOL_NAME}\" tool with it. \
         Always reply with JSON."
    )
}

/// Adapter for Ollama's `/api/chat`.
#[derive(Clone)]
pub struct OllamaAdapter {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for OllamaAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaAdapter").finish_non_exhaustive()
    }
}

impl OllamaAdapter {
    /// Create a new adapter talking HTTP to the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or HTTP client creation fails.
    pub fn new(config: &BackendConfig) -> Result<Self, ClientError> {
        let transport = HttpTransport::new(config, DEFAULT_BASE_URL)?;
        Ok(Self::with_transport(Arc::new(transport)))
    }

    #[must_use]
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Copies `messages` with the tool prompt appended to the first system
    /// message, or prepended as a new one.
    fn with_tool_prompt(messages: &[Message], tools: &[Tool]) -> Vec<Message> {
        let prompt = tool_prompt(tools);
        let mut out = messages.to_vec();

        match out.iter_mut().find(|m| m.role == MessageRole::System) {
            Some(system) => {
                system.content = format!("{}\n\n{prompt}", system.content);
            }
            None => {
                let conversation_id = messages.first().map(|m| m.conversation_id).unwrap_or_default();
                out.insert(0, Message::system(conversation_id, prompt));
            }
        }
        out
    }

    fn classify_content(content: &str) -> Reply {
        match serde_json::from_str::<Value>(content) {
            Ok(Value::Object(map)) => match map.get("response") {
                Some(Value::String(text)) if !text.is_empty() => Reply::Final(text.clone()),
                Some(value) if !value.is_null() && !value.is_string() => {
                    Reply::Final(value.to_string())
                }
                _ => {
                    warn!("JSON reply without a usable \"response\" field, retrying: {content}");
                    Reply::Retry
                }
            },
            Ok(Value::Array(_)) => {
                warn!("JSON array reply, retrying: {content}");
                Reply::Retry
            }
            _ => Reply::Final(content.to_string()),
        }
    }

    fn parse_tool_calls(calls: &[Value]) -> Reply {
        let mut parsed = Vec::with_capacity(calls.len());

        for call in calls {
            let function = call.get("function");
            let raw_name = function
                .and_then(|f| f.get("name"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            let name = sanitize_tool_name(raw_name);
            if name.is_empty() {
                warn!("Tool call without a usable name, retrying: {call}");
                return Reply::Retry;
            }

            let arguments = match function.and_then(|f| f.get("arguments")) {
                None | Some(Value::Null) => Arguments::new(),
                Some(Value::Object(map)) => map.clone(),
                Some(Value::String(raw)) => match parse_arguments(raw) {
                    Ok(map) => map,
                    Err(e) => {
                        warn!("Unparseable arguments for tool '{name}', retrying: {e}");
                        return Reply::Retry;
                    }
                },
                Some(other) => {
                    warn!("Arguments for tool '{name}' are not an object, retrying: {other}");
                    return Reply::Retry;
                }
            };

            parsed.push(ToolCall::new(name, arguments));
        }

        Reply::ToolCalls(parsed)
    }
}

#[async_trait]
impl BackendAdapter for OllamaAdapter {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn build_request(
        &self,
        model: &Model,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<Value, ClientError> {
        self.validate_options(&model.options)?;

        let has_tools = !tools.is_empty();
        let outgoing = if has_tools {
            Self::with_tool_prompt(messages, tools)
        } else {
            messages.to_vec()
        };

        let request = OllamaChatRequest::builder()
            .model(model.name.clone())
            .messages(outgoing.iter().map(OllamaMessage::from).collect())
            .stream(false)
            .format(has_tools.then(|| "json".to_string()))
            .tools(has_tools.then(|| tools.to_vec()))
            .options(OllamaOptions::from_model_options(&model.options))
            .build();

        Ok(serde_json::to_value(request)?)
    }

    async fn send(&self, payload: &Value) -> Result<Value, ClientError> {
        self.transport.send(CHAT_PATH, payload).await
    }

    fn normalize(&self, raw: &Value) -> Result<Reply, ClientError> {
        let message = raw
            .get("message")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                ClientError::InvalidResponse("reply is missing the \"message\" object".to_string())
            })?;

        let content = message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !content.trim().is_empty() {
            debug!("Classifying content reply: {content}");
            return Ok(Self::classify_content(content));
        }

        match message.get("tool_calls").and_then(Value::as_array) {
            Some(calls) if !calls.is_empty() => Ok(Self::parse_tool_calls(calls)),
            _ => {
                warn!("Reply carries neither content nor tool calls, retrying");
                Ok(Reply::Retry)
            }
        }
    }
}
