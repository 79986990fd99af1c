//! Error types for tool lookup and execution.

use thiserror::Error;

/// Errors raised while resolving or running a tool.
///
/// `NotFound` and `ExecutionFailed` are contained by the orchestration loop
/// and written into the conversation as tool results. `MissingClient` is a
/// wiring error and propagates to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// No tool with this name is registered.
    #[error("Tool \"{0}\" not found.")]
    NotFound(String),

    /// The arguments were rejected or the tool callback failed.
    #[error("Tool \"{name}\" failed: {reason}")]
    ExecutionFailed {
        /// Name of the failing tool.
        name: String,
        /// What went wrong.
        reason: String,
    },

    /// The tool needed its owning client but was run outside of one.
    #[error(
        "The client has not been initialized for tool \"{0}\". Register it with a client before running it."
    )]
    MissingClient(String),
}

impl ToolError {
    /// Shorthand for an [`ExecutionFailed`](Self::ExecutionFailed) error.
    pub fn failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias using `ToolError`.
pub type Result<T> = std::result::Result<T, ToolError>;
