//! # easyrag-tools
//!
//! Tool registration and execution for the easyrag orchestration loop.
//!
//! ## Core Components
//!
//! - [`ToolImplementation`]: Trait for defining tools with execution logic
//! - [`ToolRegistry`]: Thread-safe name → tool mapping that validates and runs calls
//! - [`ToolContext`]: Handle back to the owning registry, passed to every call
//! - [`FunctionTool`]: A tool backed by an async closure
//!
//! ## Example: Creating and Executing a Custom Tool
//!
//! ```rust
//! use easyrag_tools::{ToolContext, ToolImplementation, ToolRegistry};
//! use easyrag_common::tools::{Arguments, Tool, ToolParameter};
//! use async_trait::async_trait;
//! use anyhow::Result;
//! use serde_json::json;
//!
//! struct GreetingTool;
//!
//! #[async_trait]
//! impl ToolImplementation for GreetingTool {
//!     fn definition(&self) -> Tool {
//!         Tool::from_parameters(
//!             "greet",
//!             "Greet a person by name",
//!             &[ToolParameter::string("name", "The person's name").required()],
//!         )
//!     }
//!
//!     async fn execute(&self, args: &Arguments, _ctx: &ToolContext) -> Result<String> {
//!         let name = args["name"].as_str().unwrap_or("stranger");
//!         Ok(format!("Hello, {name}!"))
//!     }
//! }
//!
//! # async fn example() -> Result<()> {
//! let registry = ToolRegistry::new();
//! registry.register_tool(GreetingTool);
//!
//! let args = json!({"name": "Ada"}).as_object().cloned().unwrap_or_default();
//! assert_eq!(registry.run("greet", &args).await?, "Hello, Ada!");
//!
//! // Arguments are checked against the declared schema first
//! assert!(registry.run("greet", &Default::default()).await.is_err());
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Safety
//!
//! The [`ToolRegistry`] uses `DashMap` for concurrent access and is cheap to
//! clone; clones share the same tools.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use log::{debug, warn};

use easyrag_common::tools::{Arguments, Tool};

pub mod error;
mod function_tool;
pub mod validate;

pub use error::ToolError;
pub use function_tool::FunctionTool;
pub use validate::validate_arguments;

#[async_trait]
pub trait ToolImplementation: Send + Sync {
    /// The schema exported to backends. Its name is the registry key.
    fn definition(&self) -> Tool;

    /// Runs the tool with arguments that already passed schema validation.
    async fn execute(&self, args: &Arguments, ctx: &ToolContext) -> Result<String>;
}

/// What a running tool gets to see of the client that owns it.
#[derive(Clone, Debug)]
pub struct ToolContext {
    tool_name: String,
    registry: Option<ToolRegistry>,
}

impl ToolContext {
    /// A context with no owning client, for running a tool directly.
    pub fn detached(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            registry: None,
        }
    }

    fn attached(tool_name: impl Into<String>, registry: ToolRegistry) -> Self {
        Self {
            tool_name: tool_name.into(),
            registry: Some(registry),
        }
    }

    /// Name of the tool being run.
    #[must_use]
    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// The registry of the owning client.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::MissingClient`] when the tool runs detached.
    pub fn registry(&self) -> error::Result<&ToolRegistry> {
        self.registry
            .as_ref()
            .ok_or_else(|| ToolError::MissingClient(self.tool_name.clone()))
    }
}

#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Arc<DashMap<String, Arc<dyn ToolImplementation>>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tool_names())
            .finish()
    }
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool under its definition name, returning any tool it replaced.
    pub fn register(&self, tool: Arc<dyn ToolImplementation>) -> Option<Arc<dyn ToolImplementation>> {
        let name = tool.definition().function.name;
        debug!("Registering tool '{name}'");
        self.tools.insert(name, tool)
    }

    pub fn register_tool<T: ToolImplementation + 'static>(
        &self,
        tool: T,
    ) -> Option<Arc<dyn ToolImplementation>> {
        self.register(Arc::new(tool))
    }

    /// Removes a tool. Unknown names are ignored.
    pub fn unregister(&self, name: &str) -> Option<Arc<dyn ToolImplementation>> {
        self.tools.remove(name).map(|(_, tool)| tool)
    }

    /// Exact-match lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotFound`] when no tool has this name.
    pub fn get(&self, name: &str) -> error::Result<Arc<dyn ToolImplementation>> {
        self.tools
            .get(name)
            .map(|r| r.value().clone())
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn clear(&self) {
        self.tools.clear();
    }

    /// Registered tool names, sorted.
    #[must_use]
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.iter().map(|t| t.key().clone()).collect();
        names.sort();
        names
    }

    /// All tool schemas, sorted by name so payloads are deterministic.
    #[must_use]
    pub fn definitions(&self) -> Vec<Tool> {
        let mut tools: Vec<Tool> = self.tools.iter().map(|t| t.definition()).collect();
        tools.sort_by(|a, b| a.function.name.cmp(&b.function.name));
        tools
    }

    /// Schemas for the named tools, in the given order. Unknown names are skipped.
    #[must_use]
    pub fn definitions_for<S: AsRef<str>>(&self, names: &[S]) -> Vec<Tool> {
        names
            .iter()
            .filter_map(|name| {
                let name = name.as_ref();
                let tool = self.tools.get(name).map(|t| t.definition());
                if tool.is_none() {
                    warn!("Ignoring unknown tool '{name}' in tool selection");
                }
                tool
            })
            .collect()
    }

    /// Resolves, validates and executes one tool call.
    ///
    /// The tool receives a [`ToolContext`] attached to this registry.
    ///
    /// # Errors
    ///
    /// - [`ToolError::NotFound`] if the tool is not registered
    /// - [`ToolError::ExecutionFailed`] if the arguments do not match the
    ///   declared schema or the tool returns an error
    /// - [`ToolError::MissingClient`] if the tool surfaced one itself
    pub async fn run(&self, name: &str, args: &Arguments) -> error::Result<String> {
        let tool = self.get(name)?;
        let definition = tool.definition();

        validate_arguments(&definition.function.parameters, args)
            .map_err(|reason| ToolError::failed(name, reason))?;

        debug!("Running tool '{name}' with arguments {args:?}");
        let ctx = ToolContext::attached(name, self.clone());

        tool.execute(args, &ctx)
            .await
            .map_err(|e| match e.downcast::<ToolError>() {
                Ok(missing @ ToolError::MissingClient(_)) => missing,
                Ok(other) => ToolError::failed(name, other.to_string()),
                Err(e) => ToolError::failed(name, format!("{e:#}")),
            })
    }
}
