use std::fmt;
use std::ops::RangeInclusive;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::tools::ToolCall;

/// Configuration for retrying transient transport failures.
///
/// Implements exponential backoff between attempts. This only covers HTTP
/// level failures; malformed replies are retried by the orchestration loop.
///
/// # Examples
///
/// ```
/// use easyrag_common::RetryConfig;
/// use std::time::Duration;
///
/// let config = RetryConfig {
///     max_retries: 5,
///     initial_delay: Duration::from_millis(500),
///     max_delay: Duration::from_secs(60),
/// };
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts before failing.
    pub max_retries: u32,
    /// Initial delay before the first retry attempt.
    pub initial_delay: Duration,
    /// Maximum delay between retry attempts (caps exponential growth).
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Connection settings for one backend.
///
/// Immutable once an adapter has been built from it.
///
/// # Examples
///
/// ```
/// use easyrag_common::BackendConfig;
///
/// let config = BackendConfig::new()
///     .with_base_url("http://localhost:11434")
///     .with_timeout(120);
/// assert!(config.api_key.is_none());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL for API requests; adapters fall back to their own default.
    pub base_url: Option<String>,
    /// API key for authentication (stored securely).
    ///
    /// Will not be serialized to prevent accidental exposure.
    #[serde(skip_serializing, default)]
    pub api_key: Option<SecretString>,
    /// Request timeout in seconds.
    pub timeout_seconds: Option<u64>,
    /// Configuration for retry behavior with exponential backoff.
    #[serde(skip)]
    pub retry_config: RetryConfig,
}

impl BackendConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a custom base URL for API requests.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the API key for authentication.
    ///
    /// The key is stored securely using `SecretString`.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::new(api_key.into().into()));
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    /// Sets the retry configuration.
    #[must_use]
    pub const fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }
}

/// What a registered model is used for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    /// Chat completion with tool calling.
    Chat,
    /// Embedding generation.
    Embedding,
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat => write!(f, "chat"),
            Self::Embedding => write!(f, "embedding"),
        }
    }
}

/// Per-model inference options.
///
/// Only the options that are set are sent to a backend; each adapter maps
/// them to its own field names.
const TEMPERATURE_RANGE: RangeInclusive<f32> = 0.0..=2.0;
const TOP_P_RANGE: RangeInclusive<f32> = 0.0..=1.0;
const FREQUENCY_PENALTY_RANGE: RangeInclusive<f32> = -2.0..=2.0;

/// A sampling option outside its accepted range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidOption {
    Temperature,
    TopP,
    FrequencyPenalty,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelOptions {
    /// Sampling temperature (0.0 to 2.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Frequency penalty (-2.0 to 2.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    /// Maximum tokens to generate (context size on the loose backend).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Nucleus sampling threshold (0.0 to 1.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Sampling seed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

impl ModelOptions {
    /// Sets the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the frequency penalty.
    #[must_use]
    pub const fn with_frequency_penalty(mut self, frequency_penalty: f32) -> Self {
        self.frequency_penalty = Some(frequency_penalty);
        self
    }

    /// Sets the maximum tokens to generate.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sets the nucleus sampling threshold.
    #[must_use]
    pub const fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Sets the sampling seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Returns the first option outside its accepted range, if any.
    #[must_use]
    pub fn out_of_range(&self) -> Option<InvalidOption> {
        if self
            .temperature
            .is_some_and(|t| !TEMPERATURE_RANGE.contains(&t))
        {
            return Some(InvalidOption::Temperature);
        }
        if self.top_p.is_some_and(|p| !TOP_P_RANGE.contains(&p)) {
            return Some(InvalidOption::TopP);
        }
        if self
            .frequency_penalty
            .is_some_and(|f| !FREQUENCY_PENALTY_RANGE.contains(&f))
        {
            return Some(InvalidOption::FrequencyPenalty);
        }
        None
    }

    /// Validates the option ranges.
    ///
    /// # Errors
    ///
    /// Returns an error if any option is out of range:
    /// - `temperature` must be between 0.0 and 2.0
    /// - `top_p` must be between 0.0 and 1.0
    /// - `frequency_penalty` must be between -2.0 and 2.0
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.out_of_range() {
            Some(InvalidOption::Temperature) => anyhow::bail!(
                "Temperature must be between 0.0 and 2.0, got {:?}",
                self.temperature
            ),
            Some(InvalidOption::TopP) => {
                anyhow::bail!("top_p must be between 0.0 and 1.0, got {:?}", self.top_p)
            }
            Some(InvalidOption::FrequencyPenalty) => anyhow::bail!(
                "frequency_penalty must be between -2.0 and 2.0, got {:?}",
                self.frequency_penalty
            ),
            None => Ok(()),
        }
    }
}

/// A model registered with an orchestrating client.
///
/// # Examples
///
/// ```
/// use easyrag_common::{Model, ModelOptions, ModelType};
///
/// let model = Model::chat("llama3.1")
///     .with_options(ModelOptions::default().with_temperature(0.2));
///
/// assert_eq!(model.model_type, ModelType::Chat);
/// assert_eq!(model.options.temperature, Some(0.2));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// The backend's model identifier.
    pub name: String,
    /// What the model is used for.
    #[serde(rename = "type")]
    pub model_type: ModelType,
    /// Inference options sent with every request.
    #[serde(flatten)]
    pub options: ModelOptions,
}

impl Model {
    /// Creates a model with default options.
    pub fn new(name: impl Into<String>, model_type: ModelType) -> Self {
        Self {
            name: name.into(),
            model_type,
            options: ModelOptions::default(),
        }
    }

    /// Creates a chat model with default options.
    pub fn chat(name: impl Into<String>) -> Self {
        Self::new(name, ModelType::Chat)
    }

    /// Sets the inference options.
    #[must_use]
    pub fn with_options(mut self, options: ModelOptions) -> Self {
        self.options = options;
        self
    }
}

/// Classification of one raw backend reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Final text intended for the user.
    Final(String),
    /// One or more canonical tool call requests, in emitted order.
    ToolCalls(Vec<ToolCall>),
    /// The reply was inconclusive; resend the same request.
    Retry,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_backend_config_builders() {
        let config = BackendConfig::new()
            .with_base_url("https://api.openai.com")
            .with_api_key("sk-test")
            .with_timeout(30);

        assert_eq!(config.base_url.as_deref(), Some("https://api.openai.com"));
        assert_eq!(config.api_key.unwrap().expose_secret(), "sk-test");
        assert_eq!(config.timeout_seconds, Some(30));
        assert_eq!(config.retry_config.max_retries, 3);
    }

    #[test]
    fn test_api_key_not_serialized() {
        let config = BackendConfig::new().with_api_key("sk-secret");
        let json = serde_json::to_string(&config).unwrap();

        assert!(!json.contains("sk-secret"));
        assert!(!format!("{config:?}").contains("sk-secret"));
    }

    #[test]
    fn test_model_options_validation() {
        assert!(ModelOptions::default().validate().is_ok());
        assert!(
            ModelOptions::default()
                .with_temperature(0.7)
                .with_top_p(0.9)
                .with_frequency_penalty(-1.0)
                .validate()
                .is_ok()
        );
        assert!(ModelOptions::default().with_temperature(2.5).validate().is_err());
        assert!(ModelOptions::default().with_top_p(1.5).validate().is_err());
        assert!(
            ModelOptions::default()
                .with_frequency_penalty(3.0)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_out_of_range_reports_first_offender() {
        assert_eq!(ModelOptions::default().out_of_range(), None);
        assert_eq!(
            ModelOptions::default().with_temperature(2.0).with_top_p(1.0).out_of_range(),
            None
        );
        assert_eq!(
            ModelOptions::default()
                .with_temperature(-0.1)
                .with_top_p(7.0)
                .out_of_range(),
            Some(InvalidOption::Temperature)
        );
        assert_eq!(
            ModelOptions::default().with_frequency_penalty(-2.5).out_of_range(),
            Some(InvalidOption::FrequencyPenalty)
        );
    }

    #[test]
    fn test_model_options_skip_unset_fields() {
        let options = ModelOptions::default().with_seed(42);
        let json = serde_json::to_value(&options).unwrap();

        assert_eq!(json, serde_json::json!({"seed": 42}));
    }

    #[test]
    fn test_model_deserializes_flattened_options() {
        let model: Model = serde_json::from_value(serde_json::json!({
            "name": "gpt-4o",
            "type": "chat",
            "temperature": 0.5,
            "max_tokens": 256
        }))
        .unwrap();

        assert_eq!(model.model_type, ModelType::Chat);
        assert_eq!(model.options.temperature, Some(0.5));
        assert_eq!(model.options.max_tokens, Some(256));
        assert_eq!(model.options.top_p, None);
    }
}
