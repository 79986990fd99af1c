//! TOML configuration for building a ready-to-use [`Core`].
//!
//! ## Example Configuration
//!
//! ```toml
//! [backend]
//! kind = "openai"
//! api_key_env = "OPENAI_API_KEY"
//! timeout_seconds = 120
//!
//! [[models]]
//! name = "gpt-4o"
//! type = "chat"
//! temperature = 0.2
//!
//! [conversation]
//! system_prompt = "You are a terse assistant."
//! chat_history_limit = 20
//!
//! [settings]
//! max_turns = 10
//! tool_timeout_seconds = 30
//! ```

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use easyrag_client::{BackendAdapter, OllamaAdapter, OpenAIAdapter};
use easyrag_common::chat::{Conversation, ConversationOptions};
use easyrag_common::client::{BackendConfig, Model, RetryConfig};

use crate::core::{Core, DEFAULT_MAX_RETRIES, DEFAULT_MAX_TURNS};
use crate::error::{CoreError, Result};

/// Which adapter the configuration builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Ollama-style `/api/chat`
    Ollama,
    /// OpenAI-style `/v1/chat/completions`
    #[serde(rename = "openai")]
    OpenAI,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
            Self::OpenAI => write!(f, "openai"),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EasyRagConfig {
    pub backend: BackendSection,

    /// Registered models; the first chat model is the default
    #[serde(default)]
    pub models: Vec<Model>,

    #[serde(default)]
    pub conversation: ConversationSection,

    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSection {
    pub kind: BackendKind,

    /// Overrides the backend's default base URL
    #[serde(default)]
    pub base_url: Option<String>,

    /// Name of the environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Per-request timeout; unset means no timeout
    #[serde(default)]
    pub timeout_seconds: Option<u64>,

    /// Transport-level retries for transient HTTP failures (default: 3)
    #[serde(default)]
    pub http_max_retries: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationSection {
    /// Replaces the default system prompt
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Advisory limit on user/assistant messages sent per request
    #[serde(default)]
    pub chat_history_limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Maximum tool round-trips per query (default: 20)
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Maximum resends after inconclusive replies (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-tool timeout in seconds; unset means no timeout
    #[serde(default)]
    pub tool_timeout_seconds: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            max_retries: default_max_retries(),
            tool_timeout_seconds: None,
        }
    }
}

const fn default_max_turns() -> u32 {
    DEFAULT_MAX_TURNS
}

const fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl EasyRagConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or fails [`validate`](Self::validate).
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its contents are invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CoreError::Config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No models are defined
    /// - Duplicate model names are found
    /// - Model options are out of range
    /// - The openai backend has no `api_key_env`
    pub fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            return Err(CoreError::Config(
                "No models defined in configuration".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for model in &self.models {
            if !seen.insert(model.name.as_str()) {
                return Err(CoreError::Config(format!(
                    "Duplicate model name '{}'",
                    model.name
                )));
            }
            model.options.validate().map_err(|e| {
                CoreError::Config(format!("Invalid options for model '{}': {e}", model.name))
            })?;
        }

        if self.backend.kind == BackendKind::OpenAI && self.backend.api_key_env.is_none() {
            return Err(CoreError::Config(
                "The openai backend requires api_key_env".to_string(),
            ));
        }

        Ok(())
    }

    /// Backend settings, with the API key read from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `api_key_env` names an unset variable.
    pub fn backend_config(&self) -> Result<BackendConfig> {
        self.backend_config_with(|name| std::env::var(name).ok())
    }

    /// Like [`backend_config`](Self::backend_config) with a custom variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `api_key_env` names a variable `lookup` cannot resolve.
    pub fn backend_config_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<BackendConfig> {
        let mut config = BackendConfig::new();

        if let Some(base_url) = &self.backend.base_url {
            config = config.with_base_url(base_url);
        }
        if let Some(timeout) = self.backend.timeout_seconds {
            config = config.with_timeout(timeout);
        }
        if let Some(max_retries) = self.backend.http_max_retries {
            config = config.with_retry_config(RetryConfig {
                max_retries,
                ..RetryConfig::default()
            });
        }
        if let Some(var) = &self.backend.api_key_env {
            let key = lookup(var).ok_or_else(|| {
                CoreError::Config(format!("Environment variable '{var}' is not set"))
            })?;
            config = config.with_api_key(key);
        }

        Ok(config)
    }

    #[must_use]
    pub fn conversation_options(&self) -> ConversationOptions {
        let mut options = ConversationOptions::default();
        if let Some(prompt) = &self.conversation.system_prompt {
            options = options.with_system_prompt(prompt);
        }
        if let Some(limit) = self.conversation.chat_history_limit {
            options = options.with_chat_history_limit(limit);
        }
        options
    }

    /// Builds the configured adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend settings are unusable.
    pub fn build_adapter(&self, backend: &BackendConfig) -> Result<Box<dyn BackendAdapter>> {
        Ok(match self.backend.kind {
            BackendKind::Ollama => Box::new(OllamaAdapter::new(backend)?),
            BackendKind::OpenAI => Box::new(OpenAIAdapter::new(backend)?),
        })
    }
}

impl Core<Box<dyn BackendAdapter>> {
    /// Builds a core with the configured adapter, models, conversation and limits.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the adapter cannot
    /// be created.
    pub fn from_config(config: &EasyRagConfig) -> Result<Self> {
        Self::from_config_with(config, config.backend_config()?)
    }

    /// Like [`from_config`](Self::from_config) with already-resolved backend settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the adapter cannot
    /// be created.
    pub fn from_config_with(config: &EasyRagConfig, backend: BackendConfig) -> Result<Self> {
        config.validate()?;

        let mut core = Self::new(config.build_adapter(&backend)?)
            .with_conversation(Conversation::with_options(config.conversation_options()))
            .with_max_turns(config.settings.max_turns)
            .with_max_retries(config.settings.max_retries);

        if let Some(seconds) = config.settings.tool_timeout_seconds {
            core = core.with_tool_timeout(Duration::from_secs(seconds));
        }
        for model in &config.models {
            core.register_model(model.clone());
        }

        Ok(core)
    }
}
