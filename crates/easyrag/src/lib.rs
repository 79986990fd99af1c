//! # easyrag
//!
//! Multi-turn LLM conversations with developer-defined tools.
//!
//! [`Core`] owns a conversation, a model registry and a tool registry. Each
//! [`Core::query`] sends the conversation to the backend, runs whatever tools
//! the model asks for, feeds the results back, and repeats until the model
//! answers or calls the synthetic `respond_to_user` tool.
//!
//! ## Quick Start
//!
//! ```no_run
//! use easyrag::{Core, FunctionTool, Model, OllamaAdapter, BackendConfig, QueryOptions};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut core = Core::new(OllamaAdapter::new(&BackendConfig::new())?)
//!     .with_model(Model::chat("llama3.1"));
//!
//! core.register_tool(FunctionTool::new(
//!     "schedule",
//!     "Today's schedule for the user",
//!     vec![],
//!     |_args, _ctx| async { Ok("Paint the garage".to_string()) },
//! ));
//!
//! let answer = core.query("What do I need to do today?", QueryOptions::default()).await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Two backends, one loop**: strict OpenAI-style function calling and loose
//!   Ollama-style JSON replies are normalized into the same reply classes
//! - **Bounded**: tool round-trips and inconclusive-reply resends are capped
//! - **Validated tools**: arguments are checked against the declared schema
//! - **Configurable**: build everything from a TOML file with [`EasyRagConfig`]

pub mod config;
pub mod core;
pub mod error;
pub mod events;

pub use easyrag_client::*;
pub use easyrag_common::*;
pub use easyrag_tools::*;

pub use crate::config::EasyRagConfig;
pub use crate::core::{Core, QueryOptions};
pub use error::CoreError;
pub use events::{CoreEvent, EventCallback};
