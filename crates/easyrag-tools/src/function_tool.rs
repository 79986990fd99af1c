use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;

use easyrag_common::tools::{Arguments, Tool, ToolParameter};

use crate::{ToolContext, ToolImplementation};

type Callback = dyn Fn(Arguments, ToolContext) -> BoxFuture<'static, Result<String>> + Send + Sync;

/// A tool backed by an async closure.
///
/// The closure receives the validated arguments and a [`ToolContext`] handle
/// to the registry that is running it.
///
/// ```rust
/// use easyrag_common::tools::ToolParameter;
/// use easyrag_tools::{FunctionTool, ToolRegistry};
/// use serde_json::json;
///
/// # async fn example() -> anyhow::Result<()> {
/// let weather = FunctionTool::new(
///     "weather",
///     "Current weather for a zip code",
///     vec![ToolParameter::string("zipCode", "US zip code").required()],
///     |args, _ctx| async move {
///         let zip = args["zipCode"].as_str().unwrap_or_default().to_string();
///         Ok(format!("Sunny in {zip}"))
///     },
/// );
///
/// let registry = ToolRegistry::new();
/// registry.register_tool(weather);
///
/// let args = json!({"zipCode": "92021"}).as_object().cloned().unwrap_or_default();
/// assert_eq!(registry.run("weather", &args).await?, "Sunny in 92021");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FunctionTool {
    definition: Tool,
    parameters: Vec<ToolParameter>,
    callback: Arc<Callback>,
}

impl FunctionTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Vec<ToolParameter>,
        callback: F,
    ) -> Self
    where
        F: Fn(Arguments, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        let definition = Tool::from_parameters(name, description, &parameters);
        Self {
            definition,
            parameters,
            callback: Arc::new(move |args, ctx| callback(args, ctx).boxed()),
        }
    }

    /// The declared parameters, in declaration order.
    #[must_use]
    pub fn parameters(&self) -> &[ToolParameter] {
        &self.parameters
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.definition.function.name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ToolImplementation for FunctionTool {
    fn definition(&self) -> Tool {
        self.definition.clone()
    }

    async fn execute(&self, args: &Arguments, ctx: &ToolContext) -> Result<String> {
        (self.callback)(args.clone(), ctx.clone()).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::ToolError;
    use serde_json::json;

    #[tokio::test]
    async fn test_callback_receives_arguments() {
        let tool = FunctionTool::new(
            "echo",
            "Echo the input",
            vec![ToolParameter::string("text", "Text").required()],
            |args, _ctx| async move { Ok(args["text"].as_str().unwrap_or_default().to_uppercase()) },
        );

        let args = json!({"text": "hi"}).as_object().cloned().unwrap();
        let result = tool
            .execute(&args, &ToolContext::detached("echo"))
            .await
            .unwrap();

        assert_eq!(result, "HI");
        assert_eq!(tool.definition().function.parameters.required, vec!["text"]);
        assert_eq!(tool.parameters().len(), 1);
    }

    #[tokio::test]
    async fn test_detached_context_reports_missing_client() {
        let tool = FunctionTool::new("needs_client", "Uses the registry", vec![], |_args, ctx| async move {
            let registry = ctx.registry()?;
            Ok(registry.tool_names().join(","))
        });

        let err = tool
            .execute(&Arguments::new(), &ToolContext::detached("needs_client"))
            .await
            .unwrap_err();

        assert_eq!(
            err.downcast::<ToolError>().unwrap(),
            ToolError::MissingClient("needs_client".to_string())
        );
    }
}
