//! Conversation and message management for LLM interactions.
//!
//! This module provides the message log that the orchestration loop reads
//! from and appends to on every turn.
//!
//! # Overview
//!
//! - [`Message`]: a single role-tagged entry (system, user, assistant, tool)
//! - [`Conversation`]: the ordered message log, with default messages and an
//!   optional history-length policy configured through [`ConversationOptions`]
//!
//! # Tool Calling
//!
//! 1. Assistant messages request tools via [`Message::assistant_tool_calls`]
//! 2. Tool messages answer a request via [`Message::tool`], referencing the
//!    call id
//! 3. Tool calls are validated to ensure they only appear on assistant messages
//!
//! # Examples
//!
//! ```
//! use easyrag_common::chat::{Conversation, MessageRole, DEFAULT_SYSTEM_PROMPT};
//!
//! let mut conversation = Conversation::new();
//!
//! // A system message always anchors a fresh conversation
//! assert_eq!(conversation.messages()[0].role, MessageRole::System);
//! assert_eq!(conversation.messages()[0].content, DEFAULT_SYSTEM_PROMPT);
//!
//! let user_msg = conversation.user_message("What's on my schedule?");
//! conversation.add_message(user_msg).unwrap();
//!
//! let users = conversation.get_messages(Some(&[MessageRole::User]));
//! assert_eq!(users.len(), 1);
//! ```
//!
//! # Ownership
//!
//! A conversation is mutated only through `&mut` access. Callers that share
//! one across tasks must wrap it in their own lock; two turns must never write
//! to the same conversation at once.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use typed_builder::TypedBuilder;
use uuid::Uuid;

use crate::tools::ToolCall;

/// System prompt inserted when a conversation is created without one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

/// Represents the role of a message sender in a conversation.
///
/// # Serialization
///
/// Roles are serialized to lowercase strings matching the chat API formats:
/// - `System` → "system"
/// - `User` → "user"
/// - `Assistant` → "assistant"
/// - `Tool` → "tool"
///
/// # Examples
///
/// ```
/// use easyrag_common::chat::MessageRole;
///
/// let role = MessageRole::User;
/// let json = serde_json::to_string(&role).unwrap();
/// assert_eq!(json, "\"user\"");
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System-level instructions or context.
    System,
    /// Messages from the end user.
    User,
    /// Messages from the model, either final text or tool call requests.
    Assistant,
    /// Results from executing a tool, linked to the originating call by id.
    Tool,
}

/// A single message in a conversation.
///
/// # Creating Messages
///
/// ```
/// use easyrag_common::chat::Message;
/// use uuid::Uuid;
///
/// let conv_id = Uuid::new_v4();
///
/// let system = Message::system(conv_id, "You are a helpful assistant");
/// let user = Message::user(conv_id, "What is Rust?");
/// let assistant = Message::assistant(conv_id, "Rust is a systems programming language.");
/// let tool = Message::tool(
///     conv_id,
///     r#"{"temperature": 72}"#,
///     "call_123".to_string(),
///     "get_weather".to_string()
/// ).expect("Valid tool message");
/// ```
///
/// # Builder Pattern
///
/// ```
/// use easyrag_common::chat::{Message, MessageRole};
/// use uuid::Uuid;
///
/// let msg = Message::builder()
///     .conversation_id(Uuid::new_v4())
///     .role(MessageRole::User)
///     .content("Hello!".to_string())
///     .build();
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, TypedBuilder)]
pub struct Message {
    /// Unique identifier for this message.
    #[builder(default = Uuid::new_v4())]
    pub id: Uuid,

    /// ID of the conversation this message belongs to.
    ///
    /// Enforced by [`Conversation::add_message`].
    pub conversation_id: Uuid,

    /// The role of the message sender.
    pub role: MessageRole,

    /// The text content of the message.
    ///
    /// Empty for assistant messages that only carry tool calls.
    pub content: String,

    /// Additional metadata attached to this message.
    #[builder(default)]
    pub metadata: HashMap<String, serde_json::Value>,

    /// When this message was created.
    #[builder(default = Utc::now())]
    pub timestamp: DateTime<Utc>,

    /// Tool calls requested by this message (assistant messages only).
    ///
    /// Uses `SmallVec` to avoid heap allocation for ≤2 tool calls (the common case).
    #[builder(default)]
    pub tool_calls: SmallVec<[ToolCall; 2]>,

    /// Reference to the tool call this message answers (tool messages only).
    #[builder(default)]
    pub tool_call_id: Option<String>,

    /// Name of the tool that produced this result (tool messages only).
    #[builder(default)]
    pub name: Option<String>,
}

impl Message {
    /// Creates a new message with the specified role and content.
    pub fn new(conversation_id: Uuid, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            role,
            content: content.into(),
            metadata: HashMap::new(),
            timestamp: Utc::now(),
            tool_calls: SmallVec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    /// Creates a new system message.
    pub fn system(conversation_id: Uuid, content: impl Into<String>) -> Self {
        Self::new(conversation_id, MessageRole::System, content)
    }

    /// Creates a new user message.
    pub fn user(conversation_id: Uuid, content: impl Into<String>) -> Self {
        Self::new(conversation_id, MessageRole::User, content)
    }

    /// Creates a new assistant message.
    pub fn assistant(conversation_id: Uuid, content: impl Into<String>) -> Self {
        Self::new(conversation_id, MessageRole::Assistant, content)
    }

    /// Creates an assistant message that carries only tool call requests.
    pub fn assistant_tool_calls(
        conversation_id: Uuid,
        tool_calls: impl IntoIterator<Item = ToolCall>,
    ) -> Self {
        let mut msg = Self::new(conversation_id, MessageRole::Assistant, String::new());
        msg.tool_calls = tool_calls.into_iter().collect();
        msg
    }

    /// Creates a new tool result message.
    ///
    /// # Arguments
    ///
    /// * `conversation_id` - The conversation this message belongs to
    /// * `content` - The result/output from the tool execution
    /// * `tool_call_id` - The ID of the tool call this responds to
    /// * `function_name` - The name of the tool that was called
    ///
    /// # Errors
    ///
    /// Returns an error if the `tool_call_id` or the function name is empty.
    pub fn tool(
        conversation_id: Uuid,
        content: impl Into<String>,
        tool_call_id: String,
        function_name: String,
    ) -> anyhow::Result<Self> {
        if tool_call_id.is_empty() {
            anyhow::bail!("Tool call ID cannot be empty");
        }
        if function_name.is_empty() {
            anyhow::bail!("Function name cannot be empty for tool messages");
        }
        let mut msg = Self::new(conversation_id, MessageRole::Tool, content);
        msg.tool_call_id = Some(tool_call_id);
        msg.name = Some(function_name);
        Ok(msg)
    }

    /// Adds a metadata key-value pair to this message.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Sets the tool calls for this message.
    ///
    /// # Errors
    ///
    /// Returns an error if this message is not an assistant message.
    pub fn with_tool_calls(
        mut self,
        tool_calls: impl Into<SmallVec<[ToolCall; 2]>>,
    ) -> anyhow::Result<Self> {
        if self.role != MessageRole::Assistant {
            anyhow::bail!(
                "Tool calls can only be added to assistant messages, found {:?}",
                self.role
            );
        }
        self.tool_calls = tool_calls.into();
        Ok(self)
    }

    /// Whether this message counts against the history limit.
    ///
    /// User messages and assistant text replies are turn messages; system
    /// prompts, tool call requests and tool results are not.
    #[must_use]
    pub fn is_turn_message(&self) -> bool {
        match self.role {
            MessageRole::User => true,
            MessageRole::Assistant => self.tool_calls.is_empty(),
            MessageRole::System | MessageRole::Tool => false,
        }
    }
}

/// Construction options for a [`Conversation`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationOptions {
    /// Messages the log starts with and returns to on [`Conversation::reset`].
    #[serde(default)]
    pub default_messages: Vec<Message>,

    /// Advisory limit on the number of turn messages returned by
    /// [`Conversation::get_messages`]. `None` or zero disables trimming.
    #[serde(default)]
    pub chat_history_limit: Option<usize>,
}

impl ConversationOptions {
    /// Starts the conversation with a custom system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        // The conversation re-stamps ids when it is created.
        self.default_messages.push(Message::system(Uuid::nil(), prompt));
        self
    }

    /// Appends a default message.
    #[must_use]
    pub fn with_default_message(mut self, message: Message) -> Self {
        self.default_messages.push(message);
        self
    }

    /// Sets the advisory history limit.
    #[must_use]
    pub const fn with_chat_history_limit(mut self, limit: usize) -> Self {
        self.chat_history_limit = Some(limit);
        self
    }
}

/// The ordered message log of one conversation.
///
/// # Creating Conversations
///
/// ```
/// use easyrag_common::chat::{Conversation, ConversationOptions, MessageRole};
///
/// let conv = Conversation::with_options(
///     ConversationOptions::default()
///         .with_system_prompt("You answer in haiku.")
///         .with_chat_history_limit(10),
/// );
///
/// assert_eq!(conv.messages().len(), 1);
/// assert_eq!(conv.messages()[0].content, "You answer in haiku.");
/// ```
///
/// # Resetting
///
/// [`reset`](Conversation::reset) restores the configured default messages
/// exactly. A conversation built without defaults is emptied, including the
/// system message that was inserted at construction.
///
/// ```
/// use easyrag_common::chat::Conversation;
///
/// let mut conv = Conversation::new();
/// conv.add_message(conv.user_message("Hello")).unwrap();
/// conv.reset();
/// assert!(conv.messages().is_empty());
/// ```
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Conversation {
    /// Unique identifier for this conversation.
    pub id: Uuid,

    /// When this conversation was created.
    pub created_at: DateTime<Utc>,

    /// When this conversation was last modified.
    pub updated_at: DateTime<Utc>,

    options: ConversationOptions,

    messages: Vec<Message>,
}

impl Conversation {
    /// Creates a conversation holding only the default system prompt.
    pub fn new() -> Self {
        Self::with_options(ConversationOptions::default())
    }

    /// Creates a conversation from the given options.
    ///
    /// Default messages are copied into the log and re-stamped with this
    /// conversation's id. If none of them is a system message,
    /// [`DEFAULT_SYSTEM_PROMPT`] is inserted at index 0.
    pub fn with_options(options: ConversationOptions) -> Self {
        let now = Utc::now();
        let mut conversation = Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            options,
            messages: Vec::new(),
        };

        conversation.messages = conversation.default_messages();
        if !conversation
            .messages
            .iter()
            .any(|m| m.role == MessageRole::System)
        {
            let system = Message::system(conversation.id, DEFAULT_SYSTEM_PROMPT);
            conversation.messages.insert(0, system);
        }

        conversation
    }

    /// Returns the options this conversation was created with.
    pub const fn options(&self) -> &ConversationOptions {
        &self.options
    }

    /// Updates the `updated_at` timestamp to the current time.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Adds a message to the end of the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the message belongs to another conversation.
    pub fn add_message(&mut self, message: Message) -> anyhow::Result<()> {
        if message.conversation_id != self.id {
            anyhow::bail!(
                "Message conversation_id {} does not match conversation id {}",
                message.conversation_id,
                self.id
            );
        }
        self.messages.push(message);
        self.touch();
        Ok(())
    }

    /// Returns the full, untrimmed log.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the log, optionally filtered by role, in original order.
    ///
    /// When a history limit is configured only the most recent `limit` turn
    /// messages are kept (see [`Message::is_turn_message`]). Every other
    /// message passes through, so the trim is best effort and never removes
    /// system prompts or tool exchanges.
    pub fn get_messages(&self, filter: Option<&[MessageRole]>) -> Vec<Message> {
        let selected: Vec<&Message> = self
            .messages
            .iter()
            .filter(|m| filter.is_none_or(|roles| roles.contains(&m.role)))
            .collect();

        let Some(limit) = self.options.chat_history_limit.filter(|limit| *limit > 0) else {
            return selected.into_iter().cloned().collect();
        };

        let turns = selected.iter().filter(|m| m.is_turn_message()).count();
        let mut to_skip = turns.saturating_sub(limit);

        selected
            .into_iter()
            .filter(|m| {
                if to_skip > 0 && m.is_turn_message() {
                    to_skip -= 1;
                    false
                } else {
                    true
                }
            })
            .cloned()
            .collect()
    }

    /// Restores the configured default messages, or empties the log.
    pub fn reset(&mut self) {
        self.messages = self.default_messages();
        self.touch();
    }

    /// Creates a new user message for this conversation.
    pub fn user_message(&self, content: impl Into<String>) -> Message {
        Message::user(self.id, content)
    }

    /// Creates a new assistant message for this conversation.
    pub fn assistant_message(&self, content: impl Into<String>) -> Message {
        Message::assistant(self.id, content)
    }

    /// Creates a new system message for this conversation.
    pub fn system_message(&self, content: impl Into<String>) -> Message {
        Message::system(self.id, content)
    }

    /// Creates a new tool result message for this conversation.
    ///
    /// # Errors
    ///
    /// Returns an error if the call id or function name is empty.
    pub fn tool_message(
        &self,
        content: impl Into<String>,
        tool_call_id: String,
        function_name: String,
    ) -> anyhow::Result<Message> {
        Message::tool(self.id, content, tool_call_id, function_name)
    }

    fn default_messages(&self) -> Vec<Message> {
        self.options
            .default_messages
            .iter()
            .cloned()
            .map(|mut m| {
                m.conversation_id = self.id;
                m
            })
            .collect()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::tools::{Arguments, ToolCall};

    fn roles(messages: &[Message]) -> Vec<MessageRole> {
        messages.iter().map(|m| m.role).collect()
    }

    #[test]
    fn test_message_creation() {
        let conv_id = Uuid::new_v4();
        let msg = Message::user(conv_id, "Hello, world!");

        assert_eq!(msg.conversation_id, conv_id);
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.content, "Hello, world!");
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn test_default_system_message_inserted() {
        let conv = Conversation::new();

        assert_eq!(conv.messages().len(), 1);
        assert_eq!(conv.messages()[0].role, MessageRole::System);
        assert_eq!(conv.messages()[0].content, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(conv.messages()[0].conversation_id, conv.id);
    }

    #[test]
    fn test_system_message_prepended_to_defaults_without_one() {
        let options =
            ConversationOptions::default().with_default_message(Message::user(Uuid::nil(), "hi"));
        let conv = Conversation::with_options(options);

        assert_eq!(roles(conv.messages()), vec![MessageRole::System, MessageRole::User]);
        assert_eq!(conv.messages()[1].conversation_id, conv.id);
    }

    #[test]
    fn test_custom_system_prompt_is_kept() {
        let conv = Conversation::with_options(
            ConversationOptions::default().with_system_prompt("Be brief."),
        );

        assert_eq!(conv.messages().len(), 1);
        assert_eq!(conv.messages()[0].content, "Be brief.");
    }

    #[test]
    fn test_reset_restores_defaults() {
        let options = ConversationOptions::default()
            .with_system_prompt("Be brief.")
            .with_default_message(Message::assistant(Uuid::nil(), "Ready."));
        let mut conv = Conversation::with_options(options);

        conv.add_message(conv.user_message("one")).unwrap();
        conv.add_message(conv.assistant_message("two")).unwrap();
        conv.reset();

        let messages = conv.get_messages(None);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "Be brief.");
        assert_eq!(messages[1].content, "Ready.");
    }

    #[test]
    fn test_reset_without_defaults_empties_log() {
        let mut conv = Conversation::new();
        conv.add_message(conv.user_message("hello")).unwrap();

        conv.reset();

        assert!(conv.get_messages(None).is_empty());
    }

    #[test]
    fn test_role_filter_preserves_order() {
        let mut conv = Conversation::new();
        conv.add_message(conv.user_message("a")).unwrap();
        conv.add_message(conv.assistant_message("b")).unwrap();
        conv.add_message(conv.user_message("c")).unwrap();

        let users = conv.get_messages(Some(&[MessageRole::User]));
        let contents: Vec<&str> = users.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "c"]);
    }

    #[test]
    fn test_history_limit_keeps_recent_turns_and_metadata() {
        let mut conv =
            Conversation::with_options(ConversationOptions::default().with_chat_history_limit(2));
        let call = ToolCall::with_id("call_1", "schedule", Arguments::new());

        conv.add_message(conv.user_message("old question")).unwrap();
        conv.add_message(Message::assistant_tool_calls(conv.id, [call]))
            .unwrap();
        conv.add_message(
            conv.tool_message("Paint the garage", "call_1".into(), "schedule".into())
                .unwrap(),
        )
        .unwrap();
        conv.add_message(conv.assistant_message("old answer")).unwrap();
        conv.add_message(conv.user_message("new question")).unwrap();

        let trimmed = conv.get_messages(None);

        assert_eq!(
            roles(&trimmed),
            vec![
                MessageRole::System,
                MessageRole::Assistant,
                MessageRole::Tool,
                MessageRole::Assistant,
                MessageRole::User,
            ]
        );
        assert!(!trimmed[1].tool_calls.is_empty());
        assert_eq!(trimmed[3].content, "old answer");
        assert_eq!(trimmed[4].content, "new question");
        // The stored log is untouched.
        assert_eq!(conv.messages().len(), 6);
    }

    #[test]
    fn test_history_limit_zero_disables_trimming() {
        let mut conv =
            Conversation::with_options(ConversationOptions::default().with_chat_history_limit(0));
        for i in 0..5 {
            conv.add_message(conv.user_message(format!("q{i}"))).unwrap();
        }

        assert_eq!(conv.get_messages(None).len(), 6);
    }

    #[test]
    fn test_message_tool_call_validation() {
        let conv_id = Uuid::new_v4();
        let tool_call = ToolCall::new("get_weather", Arguments::new());

        let user_msg = Message::user(conv_id, "What's the weather?");
        assert!(user_msg.with_tool_calls(vec![tool_call.clone()]).is_err());

        let assistant_msg = Message::assistant(conv_id, "");
        assert!(assistant_msg.with_tool_calls(vec![tool_call]).is_ok());
    }

    #[test]
    fn test_tool_message_validation() {
        let conv_id = Uuid::new_v4();

        let result = Message::tool(conv_id, "Result", String::new(), "test_func".to_string());
        assert!(result.is_err());

        let result = Message::tool(conv_id, "Result", "call_123".to_string(), String::new());
        assert!(result.is_err());

        let msg = Message::tool(conv_id, "Result", "call_123".to_string(), "test_func".to_string())
            .unwrap();
        assert_eq!(msg.name, Some("test_func".to_string()));
        assert_eq!(msg.tool_call_id, Some("call_123".to_string()));
    }

    #[test]
    fn test_conversation_add_message_wrong_id() {
        let mut conv = Conversation::new();
        let msg = Message::user(Uuid::new_v4(), "Hello");

        assert!(conv.add_message(msg).is_err());
    }

    #[test]
    fn test_turn_message_classification() {
        let conv_id = Uuid::new_v4();
        let call = ToolCall::new("x", Arguments::new());

        assert!(Message::user(conv_id, "q").is_turn_message());
        assert!(Message::assistant(conv_id, "a").is_turn_message());
        assert!(!Message::assistant_tool_calls(conv_id, [call]).is_turn_message());
        assert!(!Message::system(conv_id, "s").is_turn_message());
    }
}
