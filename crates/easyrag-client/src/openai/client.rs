//! OpenAI-compatible backend adapter.
//!
//! The strict backend: tool calls arrive through the native `tool_calls`
//! field and the reply shape is trusted. A reply that breaks that shape is a
//! [`ClientError::ProtocolViolation`], never a retry.
//!
//! # Examples
//!
//! ```no_run
//! use easyrag_client::{BackendAdapter, OpenAIAdapter};
//! use easyrag_common::{BackendConfig, Message, Model, Reply};
//! use uuid::Uuid;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = BackendConfig::new().with_api_key("sk-...");
//! let adapter = OpenAIAdapter::new(&config)?;
//!
//! let messages = vec![Message::user(Uuid::new_v4(), "Hello!")];
//! let payload = adapter.build_request(&Model::chat("gpt-4o"), &messages, &[])?;
//!
//! if let Reply::Final(text) = adapter.normalize(&adapter.send(&payload).await?)? {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Security
//!
//! API keys are stored using the `secrecy` crate and only exposed when the
//! `Authorization` header is written.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;

use easyrag_common::tools::{ToolCall, parse_arguments, sanitize_tool_name};
use easyrag_common::{BackendConfig, Message, Model, Reply, Tool};

use super::{ChatCompletionRequest, ChatCompletionResponse, OpenAIMessage, OpenAIToolCall};
use crate::BackendAdapter;
use crate::error::ClientError;
use crate::transport::{HttpTransport, Transport};

/// Base URL used when the configuration does not set one.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Chat completions endpoint path.
pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Adapter for OpenAI-style chat completions.
#[derive(Clone)]
pub struct OpenAIAdapter {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for OpenAIAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIAdapter").finish_non_exhaustive()
    }
}

impl OpenAIAdapter {
    /// Create a new adapter talking HTTP to the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or HTTP client creation fails.
    pub fn new(config: &BackendConfig) -> Result<Self, ClientError> {
        if config.api_key.is_none() {
            return Err(ClientError::ConfigurationError(
                "API key is required".to_string(),
            ));
        }
        let transport = HttpTransport::new(config, DEFAULT_BASE_URL)?;
        Ok(Self::with_transport(Arc::new(transport)))
    }

    /// Create an adapter over an arbitrary transport.
    #[must_use]
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    fn convert_tool_call(call: &OpenAIToolCall) -> Result<ToolCall, ClientError> {
        let name = sanitize_tool_name(&call.function.name);
        if name.is_empty() {
            return Err(ClientError::ProtocolViolation(format!(
                "tool call has no usable name: {:?}",
                call.function.name
            )));
        }

        let arguments = parse_arguments(&call.function.arguments).map_err(|e| {
            ClientError::ProtocolViolation(format!("invalid arguments for tool '{name}': {e}"))
        })?;

        Ok(if call.id.is_empty() {
            ToolCall::new(name, arguments)
        } else {
            ToolCall::with_id(call.id.clone(), name, arguments)
        })
    }
}

#[async_trait]
impl BackendAdapter for OpenAIAdapter {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn build_request(
        &self,
        model: &Model,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<Value, ClientError> {
        self.validate_options(&model.options)?;

        let request = ChatCompletionRequest::builder()
            .model(model.name.clone())
            .messages(messages.iter().map(OpenAIMessage::from).collect())
            .tools((!tools.is_empty()).then(|| tools.to_vec()))
            .temperature(model.options.temperature)
            .frequency_penalty(model.options.frequency_penalty)
            .max_tokens(model.options.max_tokens)
            .top_p(model.options.top_p)
            .seed(model.options.seed)
            .build();

        Ok(serde_json::to_value(request)?)
    }

    async fn send(&self, payload: &Value) -> Result<Value, ClientError> {
        self.transport.send(CHAT_COMPLETIONS_PATH, payload).await
    }

    fn normalize(&self, raw: &Value) -> Result<Reply, ClientError> {
        let response: ChatCompletionResponse = serde_json::from_value(raw.clone())
            .map_err(|e| ClientError::ProtocolViolation(format!("undecodable reply: {e}")))?;

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            ClientError::ProtocolViolation("reply contains no choices".to_string())
        })?;
        debug!(
            "Choice {} finished with {:?}",
            choice.index, choice.finish_reason
        );

        let message = choice.message;
        let tool_calls = message.tool_calls.unwrap_or_default();

        match message.content {
            // An empty string next to tool calls is how some compatible
            // servers spell `null`
            Some(text) if !(text.is_empty() && !tool_calls.is_empty()) => Ok(Reply::Final(text)),
            _ if !tool_calls.is_empty() => {
                let calls = tool_calls
                    .iter()
                    .map(Self::convert_tool_call)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Reply::ToolCalls(calls))
            }
            _ => {
                warn!("Reply carries neither content nor tool calls");
                Err(ClientError::ProtocolViolation(
                    "reply has neither content nor tool calls".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use easyrag_common::{ModelOptions, RetryConfig};
    use serde_json::json;
    use uuid::Uuid;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter_for(uri: &str) -> OpenAIAdapter {
        let config = BackendConfig::new()
            .with_api_key("test-key")
            .with_base_url(uri)
            .with_retry_config(RetryConfig {
                max_retries: 0,
                ..RetryConfig::default()
            });
        OpenAIAdapter::new(&config).unwrap()
    }

    fn offline() -> OpenAIAdapter {
        adapter_for(DEFAULT_BASE_URL)
    }

    fn reply(message: Value) -> Value {
        json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "created": 1_677_652_288,
            "model": "gpt-4o",
            "choices": [{"index": 0, "message": message, "finish_reason": "stop"}]
        })
    }

    #[test]
    fn test_requires_api_key() {
        let err = OpenAIAdapter::new(&BackendConfig::new()).unwrap_err();
        assert!(matches!(err, ClientError::ConfigurationError(_)));
    }

    #[test]
    fn test_normalize_content_is_final() {
        let raw = reply(json!({"role": "assistant", "content": "It is sunny"}));
        assert_eq!(
            offline().normalize(&raw).unwrap(),
            Reply::Final("It is sunny".to_string())
        );
    }

    #[test]
    fn test_normalize_tool_calls() {
        let raw = reply(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_abc",
                "type": "function",
                "function": {"name": "weather!!", "arguments": "{\"zipCode\":\"92021\"}"}
            }]
        }));

        let Reply::ToolCalls(calls) = offline().normalize(&raw).unwrap() else {
            panic!("expected tool calls");
        };

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_abc");
        assert_eq!(calls[0].function.name, "weather");
        assert_eq!(calls[0].function.arguments["zipCode"], "92021");
    }

    #[test]
    fn test_normalize_empty_arguments_and_missing_id() {
        let raw = reply(json!({
            "content": null,
            "tool_calls": [{"function": {"name": "schedule", "arguments": ""}}]
        }));

        let Reply::ToolCalls(calls) = offline().normalize(&raw).unwrap() else {
            panic!("expected tool calls");
        };

        assert!(calls[0].function.arguments.is_empty());
        assert!(calls[0].id.starts_with("tool_"));
    }

    #[test]
    fn test_normalize_empty_content_with_tool_calls() {
        let raw = reply(json!({
            "content": "",
            "tool_calls": [{"id": "c1", "function": {"name": "schedule", "arguments": "{}"}}]
        }));

        assert!(matches!(
            offline().normalize(&raw).unwrap(),
            Reply::ToolCalls(_)
        ));
    }

    #[test]
    fn test_normalize_shape_violations() {
        let adapter = offline();

        let cases = [
            json!({"choices": []}),
            json!({"unexpected": true}),
            reply(json!({"role": "assistant", "content": null})),
            reply(json!({"content": ["not", "a", "string"]})),
            reply(json!({
                "content": null,
                "tool_calls": [{"id": "c1", "function": {"name": "weather", "arguments": "{not json"}}]
            })),
            reply(json!({
                "content": null,
                "tool_calls": [{"id": "c1", "function": {"name": "weather", "arguments": "[1,2]"}}]
            })),
        ];

        for raw in cases {
            let err = adapter.normalize(&raw).unwrap_err();
            assert!(
                matches!(err, ClientError::ProtocolViolation(_)),
                "expected protocol violation for {raw}, got {err:?}"
            );
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn test_build_request_shape() {
        let conv = Uuid::new_v4();
        let call = ToolCall::with_id(
            "call_1",
            "weather",
            json!({"zipCode": "92021"}).as_object().cloned().unwrap(),
        );
        let messages = vec![
            Message::system(conv, "Be brief."),
            Message::user(conv, "Weather?"),
            Message::assistant_tool_calls(conv, [call]),
            Message::tool(conv, "Sunny", "call_1".to_string(), "weather".to_string()).unwrap(),
        ];
        let tools = vec![Tool::respond_to_user()];
        let model = Model::chat("gpt-4o").with_options(
            ModelOptions::default()
                .with_temperature(0.2)
                .with_max_tokens(512)
                .with_seed(7),
        );

        let payload = offline().build_request(&model, &messages, &tools).unwrap();

        assert_eq!(payload["model"], "gpt-4o");
        assert!((payload["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
        assert_eq!(payload["max_tokens"], 512);
        assert_eq!(payload["seed"], 7);
        assert!(payload.get("top_p").is_none());
        assert!(payload.get("frequency_penalty").is_none());
        assert_eq!(payload["tools"][0]["function"]["name"], "respond_to_user");

        let wire = payload["messages"].as_array().unwrap();
        assert_eq!(wire.len(), 4);
        assert_eq!(wire[0]["role"], "system");
        assert!(wire[2]["content"].is_null());
        assert_eq!(
            wire[2]["tool_calls"][0]["function"]["arguments"],
            "{\"zipCode\":\"92021\"}"
        );
        assert_eq!(wire[3]["role"], "tool");
        assert_eq!(wire[3]["tool_call_id"], "call_1");
        assert!(wire[3].get("name").is_none());
    }

    #[test]
    fn test_build_request_without_tools_omits_field() {
        let payload = offline()
            .build_request(&Model::chat("gpt-4o"), &[], &[])
            .unwrap();
        assert!(payload.get("tools").is_none());
    }

    #[tokio::test]
    async fn test_send_posts_to_chat_completions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(reply(json!({"role": "assistant", "content": "Hi"}))),
            )
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter_for(&server.uri());
        let messages = vec![Message::user(Uuid::new_v4(), "Hello")];
        let payload = adapter
            .build_request(&Model::chat("gpt-4o"), &messages, &[])
            .unwrap();

        let raw = adapter.send(&payload).await.unwrap();
        assert_eq!(
            adapter.normalize(&raw).unwrap(),
            Reply::Final("Hi".to_string())
        );
    }
}
