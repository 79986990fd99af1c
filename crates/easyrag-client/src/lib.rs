//! # easyrag-client
//!
//! Backend adapters for LLM chat APIs.
//!
//! Each backend is a [`BackendAdapter`]: it builds the wire payload for a
//! conversation, sends it through a [`Transport`], and classifies the raw
//! reply into a [`Reply`]. Two adapters ship with the crate:
//! - [`OpenAIAdapter`]: OpenAI-style `/v1/chat/completions` with native function calling
//! - [`OllamaAdapter`]: Ollama-style `/api/chat`, which only guarantees JSON-shaped text
//!
//! ## Example
//!
//! ```no_run
//! use easyrag_client::{BackendAdapter, OllamaAdapter};
//! use easyrag_common::{BackendConfig, Message, Model};
//! use uuid::Uuid;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let adapter = OllamaAdapter::new(&BackendConfig::new())?;
//!
//! let messages = vec![Message::user(Uuid::new_v4(), "Hello, world!")];
//! let payload = adapter.build_request(&Model::chat("llama3.1"), &messages, &[])?;
//!
//! let raw = adapter.send(&payload).await?;
//! println!("{:?}", adapter.normalize(&raw)?);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde_json::Value;

use easyrag_common::{InvalidOption, Message, Model, ModelOptions, Reply, Tool};

pub mod error;
pub mod ollama;
pub mod openai;
pub mod transport;

pub use error::ClientError;
pub use ollama::OllamaAdapter;
pub use openai::OpenAIAdapter;
pub use transport::{HttpTransport, Transport};

/// A chat backend, as seen by the orchestration loop.
///
/// The loop builds one payload per round-trip, sends it, and acts on the
/// normalized [`Reply`]. A `Retry` reply resends the same payload.
#[must_use = "BackendAdapter must be used to make requests"]
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Short backend identifier used in logs.
    fn name(&self) -> &'static str;

    /// Builds the wire payload for `messages` with the given tool catalogue.
    ///
    /// `messages` is never modified; any prompt augmentation happens on a copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the model options are out of range or the payload
    /// cannot be serialized.
    fn build_request(
        &self,
        model: &Model,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<Value, ClientError>;

    /// Sends a payload built by [`build_request`](Self::build_request).
    ///
    /// # Errors
    ///
    /// Returns the transport's error.
    async fn send(&self, payload: &Value) -> Result<Value, ClientError>;

    /// Classifies one raw reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply breaks the backend's protocol in a way a
    /// resend cannot fix.
    fn normalize(&self, raw: &Value) -> Result<Reply, ClientError>;

    /// Validate model options.
    ///
    /// Defers to [`ModelOptions::out_of_range`] and maps the offending option
    /// onto a [`ClientError`].
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of range.
    fn validate_options(&self, options: &ModelOptions) -> Result<(), ClientError> {
        match options.out_of_range() {
            Some(InvalidOption::Temperature) => Err(ClientError::InvalidTemperature),
            Some(InvalidOption::TopP) => Err(ClientError::InvalidTopP),
            Some(InvalidOption::FrequencyPenalty) => Err(ClientError::InvalidFrequencyPenalty),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<T: BackendAdapter + ?Sized> BackendAdapter for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn build_request(
        &self,
        model: &Model,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<Value, ClientError> {
        (**self).build_request(model, messages, tools)
    }

    async fn send(&self, payload: &Value) -> Result<Value, ClientError> {
        (**self).send(payload).await
    }

    fn normalize(&self, raw: &Value) -> Result<Reply, ClientError> {
        (**self).normalize(raw)
    }

    fn validate_options(&self, options: &ModelOptions) -> Result<(), ClientError> {
        (**self).validate_options(options)
    }
}
