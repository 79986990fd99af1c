use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde_json::Value;

use easyrag_client::BackendAdapter;
use easyrag_common::chat::{Conversation, Message};
use easyrag_common::client::{Model, ModelType, Reply};
use easyrag_common::tools::{RESPOND_TOOL_NAME, Tool, ToolCall};
use easyrag_tools::{ToolError, ToolImplementation, ToolRegistry};

use crate::error::{CoreError, Result};
use crate::events::{CoreEvent, EventCallback};

/// Default bound on tool-call round-trips per query.
pub const DEFAULT_MAX_TURNS: u32 = 20;

/// Default bound on consecutive inconclusive replies per payload.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Tool result recorded for calls that follow `respond_to_user` in a batch.
pub const SKIPPED_TOOL_NOTICE: &str = "Skipped: the turn ended with respond_to_user.";

/// Tool result recorded for calls left unrun after a tool aborted the batch.
pub const ABORTED_TOOL_NOTICE: &str = "Skipped: an earlier tool in this batch failed.";

/// A reply the loop can act on.
enum Usable {
    Final(String),
    ToolCalls(Vec<ToolCall>),
}

/// Per-query overrides.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Chat model to use instead of the first registered one.
    pub model: Option<String>,
    /// Restrict the catalogue to these registered tools.
    pub tools: Option<Vec<String>>,
}

impl QueryOptions {
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = Some(tools.into_iter().map(Into::into).collect());
        self
    }
}

/// Drives a conversation against one backend, running tools as the model asks.
pub struct Core<A: BackendAdapter> {
    pub adapter: A,
    pub conversation: Conversation,
    pub tools: ToolRegistry,
    models: Vec<Model>,
    /// Maximum tool-call round-trips per query
    pub max_turns: u32,
    /// Maximum consecutive resends of one payload after inconclusive replies
    pub max_retries: u32,
    /// Optional bound on each tool call
    pub tool_timeout: Option<Duration>,
    pub event_callback: Option<EventCallback>,
}

impl<A: BackendAdapter> std::fmt::Debug for Core<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("backend", &self.adapter.name())
            .field("conversation", &self.conversation.id)
            .field("tools", &self.tools)
            .field("models", &self.models)
            .field("max_turns", &self.max_turns)
            .field("max_retries", &self.max_retries)
            .field("tool_timeout", &self.tool_timeout)
            .finish_non_exhaustive()
    }
}

impl<A: BackendAdapter> Core<A> {
    pub fn new(adapter: A) -> Self {
        Self {
            adapter,
            conversation: Conversation::new(),
            tools: ToolRegistry::new(),
            models: Vec::new(),
            max_turns: DEFAULT_MAX_TURNS,
            max_retries: DEFAULT_MAX_RETRIES,
            tool_timeout: None,
            event_callback: None,
        }
    }

    #[must_use]
    pub fn with_conversation(mut self, conversation: Conversation) -> Self {
        self.conversation = conversation;
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: Model) -> Self {
        self.register_model(model);
        self
    }

    #[must_use]
    pub const fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub const fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_event_callback<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(CoreEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.event_callback = Some(Box::new(move |event| Box::pin(callback(event))));
        self
    }

    /// Adds a model, replacing any registered model with the same name.
    pub fn register_model(&mut self, model: Model) {
        match self.models.iter_mut().find(|m| m.name == model.name) {
            Some(existing) => *existing = model,
            None => self.models.push(model),
        }
    }

    /// Removes a model by name. Unknown names are ignored.
    pub fn unregister_model(&mut self, name: &str) -> Option<Model> {
        let index = self.models.iter().position(|m| m.name == name)?;
        Some(self.models.remove(index))
    }

    #[must_use]
    pub fn models(&self) -> &[Model] {
        &self.models
    }

    /// Finds the named model of `model_type`, or the first one registered.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingModel`] when nothing matches.
    pub fn get_model(&self, model_type: ModelType, name: Option<&str>) -> Result<&Model> {
        self.models
            .iter()
            .filter(|m| m.model_type == model_type)
            .find(|m| name.is_none_or(|n| m.name == n))
            .ok_or(CoreError::MissingModel(model_type))
    }

    pub fn register_tool<T: ToolImplementation + 'static>(&self, tool: T) {
        self.tools.register_tool(tool);
    }

    pub fn register_tool_arc(&self, tool: Arc<dyn ToolImplementation>) {
        self.tools.register(tool);
    }

    pub fn unregister_tool(&self, name: &str) -> Option<Arc<dyn ToolImplementation>> {
        self.tools.unregister(name)
    }

    async fn emit(&self, event: CoreEvent) {
        if let Some(callback) = &self.event_callback {
            callback(event).await;
        }
    }

    /// The tools offered to the model, terminal tool last.
    fn tool_catalogue(&self, selection: Option<&[String]>) -> Vec<Tool> {
        let mut tools = match selection {
            Some(names) => self.tools.definitions_for(names),
            None => self.tools.definitions(),
        };

        // respond_to_user is always the synthetic terminal tool
        tools.retain(|t| t.name() != RESPOND_TOOL_NAME);
        if !tools.is_empty() {
            tools.push(Tool::respond_to_user());
        }
        tools
    }

    /// Sends `payload` until the reply is usable, resending it verbatim on
    /// [`Reply::Retry`].
    async fn send_until_usable(&self, payload: &Value) -> Result<Usable> {
        let mut retries = 0;

        loop {
            self.emit(CoreEvent::RequestSent {
                backend: self.adapter.name(),
                attempt: retries + 1,
            })
            .await;

            let raw = self.adapter.send(payload).await?;
            debug!("Raw reply: {raw}");

            match self.adapter.normalize(&raw)? {
                Reply::Retry if retries >= self.max_retries => {
                    return Err(CoreError::ExhaustedAttempts {
                        attempts: retries + 1,
                    });
                }
                Reply::Retry => {
                    retries += 1;
                    warn!(
                        "Inconclusive reply from {}, retrying ({retries}/{})",
                        self.adapter.name(),
                        self.max_retries
                    );
                    self.emit(CoreEvent::Retrying {
                        attempt: retries,
                        max_retries: self.max_retries,
                    })
                    .await;
                }
                Reply::Final(answer) => return Ok(Usable::Final(answer)),
                Reply::ToolCalls(calls) => return Ok(Usable::ToolCalls(calls)),
            }
        }
    }

    fn append_tool_result(&mut self, call: &ToolCall, content: impl Into<String>) -> Result<()> {
        let message = self.conversation.tool_message(
            content,
            call.id.clone(),
            call.function.name.clone(),
        )?;
        self.conversation.add_message(message)?;
        Ok(())
    }

    /// Runs one non-terminal call and renders its outcome as tool-message content.
    async fn execute_tool(&self, call: &ToolCall) -> Result<String> {
        let name = call.function.name.as_str();
        debug!("Tool '{name}' (id: {}) arguments: {:?}", call.id, call.function.arguments);

        let run = self.tools.run(name, &call.function.arguments);
        let outcome = match self.tool_timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.unwrap_or_else(|_| {
                Err(ToolError::failed(name, format!("timed out after {limit:?}")))
            }),
            None => run.await,
        };

        let (content, success) = match outcome {
            Ok(result) => (result, true),
            Err(ToolError::MissingClient(tool)) => return Err(CoreError::MissingClient(tool)),
            Err(err @ ToolError::NotFound(_)) => {
                warn!("Model requested unregistered tool '{name}'");
                (err.to_string(), false)
            }
            Err(ToolError::ExecutionFailed { reason, .. }) => {
                (format!("Tool execution failed: {reason}"), false)
            }
        };
        debug!("Tool '{name}' result: {content}");

        self.emit(CoreEvent::ToolResult {
            name: name.to_string(),
            result: content.clone(),
            success,
        })
        .await;

        Ok(content)
    }

    fn skip_tool_calls(&mut self, calls: &[ToolCall], notice: &str) -> Result<()> {
        for call in calls {
            debug!("Skipping tool '{}' (id: {})", call.function.name, call.id);
            self.append_tool_result(call, notice)?;
        }
        Ok(())
    }

    async fn finish(&mut self, answer: String) -> Result<String> {
        let message = self.conversation.assistant_message(answer.clone());
        self.conversation.add_message(message)?;
        self.emit(CoreEvent::Final(answer.clone())).await;
        Ok(answer)
    }

    /// Sends `prompt` and drives the conversation until the model answers.
    ///
    /// Tool calls run sequentially in the order the model emitted them, and
    /// every result is appended to the conversation before the next call.
    /// A call to `respond_to_user` ends the turn with its `response` argument.
    ///
    /// # Errors
    ///
    /// - [`CoreError::MissingModel`] if no matching chat model is registered
    /// - [`CoreError::Client`] for transport failures and replies that break
    ///   the backend's protocol
    /// - [`CoreError::ExhaustedAttempts`] after too many inconclusive replies
    /// - [`CoreError::MaxTurnsExceeded`] after too many tool round-trips
    /// - [`CoreError::MissingClient`] if a tool surfaced a wiring error
    pub async fn query(&mut self, prompt: impl Into<String>, options: QueryOptions) -> Result<String> {
        let model = self
            .get_model(ModelType::Chat, options.model.as_deref())?
            .clone();
        let catalogue = self.tool_catalogue(options.tools.as_deref());

        let user_message = self.conversation.user_message(prompt);
        self.conversation.add_message(user_message)?;

        let start_time = Instant::now();
        let mut tool_rounds: u32 = 0;

        loop {
            info!(
                "Executing chat turn ({}/{}) with {} on {}",
                tool_rounds + 1,
                self.max_turns,
                model.name,
                self.adapter.name()
            );

            let messages = self.conversation.get_messages(None);
            let payload = self.adapter.build_request(&model, &messages, &catalogue)?;
            debug!("Chat request: {payload}");

            let calls = match self.send_until_usable(&payload).await? {
                Usable::Final(answer) => {
                    debug!(
                        "Answered after {} tool round(s) ({:.2?})",
                        tool_rounds,
                        start_time.elapsed()
                    );
                    return self.finish(answer).await;
                }
                Usable::ToolCalls(calls) => calls,
            };

            // a batch carrying respond_to_user always gets to answer
            let has_terminal = calls.iter().any(ToolCall::is_terminal);
            if !has_terminal && tool_rounds >= self.max_turns {
                return Err(CoreError::MaxTurnsExceeded {
                    turns: self.max_turns,
                });
            }

            let request_message =
                Message::assistant_tool_calls(self.conversation.id, calls.iter().cloned());
            self.conversation.add_message(request_message)?;

            for (index, call) in calls.iter().enumerate() {
                if call.is_terminal() {
                    let answer = render_response(call.function.arguments.get("response"));
                    self.append_tool_result(call, answer.clone())?;
                    self.skip_tool_calls(&calls[index + 1..], SKIPPED_TOOL_NOTICE)?;
                    return self.finish(answer).await;
                }

                match self.execute_tool(call).await {
                    Ok(content) => self.append_tool_result(call, content)?,
                    Err(err) => {
                        // keep every call id answered so the log stays sendable
                        self.append_tool_result(call, format!("Tool execution failed: {err}"))?;
                        self.skip_tool_calls(&calls[index + 1..], ABORTED_TOOL_NOTICE)?;
                        return Err(err);
                    }
                }
            }

            tool_rounds += 1;
            debug!(
                "Completed {} tool call(s), continuing conversation",
                calls.len()
            );
        }
    }
}

fn render_response(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}
