//! Event types for Core orchestration
//!
//! Events are **observability**: fire-and-forget notifications about what the
//! loop is doing. The callback is async so it can do I/O, and Core awaits it,
//! but its result never changes control flow.

use std::future::Future;
use std::pin::Pin;

/// Events emitted by Core during a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    /// A payload was handed to the backend
    RequestSent {
        /// Backend identifier, e.g. "openai"
        backend: &'static str,
        /// 1-based attempt number for this payload
        attempt: u32,
    },

    /// The reply was inconclusive and the same payload will be resent
    Retrying {
        /// Number of retries so far for this payload
        attempt: u32,
        /// Configured retry limit
        max_retries: u32,
    },

    /// Tool execution completed with result
    ToolResult {
        /// Name of the tool that was executed
        name: String,
        /// Result or error message from execution
        result: String,
        /// Whether execution succeeded
        success: bool,
    },

    /// The turn finished with this answer
    Final(String),
}

/// Async callback for receiving Core events
pub type EventCallback =
    Box<dyn Fn(CoreEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;
