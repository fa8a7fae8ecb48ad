//! Core tool traits.
//!
//! - [`Tool`] — the typed interface a concrete tool implements.
//! - [`ToolDyn`] — a type-erased, string-in/string-out wrapper so the registry can
//!   hold a heterogeneous collection of tools and dispatch on a call's JSON arguments.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use super::definition::ToolDefinition;
use super::errors::ToolError;

/// A future boxed for dynamic dispatch, matching the shape `ToolDyn` needs to be
/// object-safe.
pub type BoxedFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A single tool a model can call during planning, execution, or proofreading.
///
/// # Example
/// ```ignore
/// #[derive(serde::Deserialize, schemars::JsonSchema)]
/// struct SetTaxonomyArgs { categories: Vec<String> }
///
/// struct SetTaxonomy;
///
/// impl Tool for SetTaxonomy {
///     const NAME: &'static str = "agent.plan.set_taxonomy";
///     type Error = std::convert::Infallible;
///     type Args = SetTaxonomyArgs;
///     type Output = serde_json::Value;
///
///     async fn definition(&self) -> ToolDefinition { todo!() }
///     async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> { todo!() }
/// }
/// ```
pub trait Tool: Sized + Send + Sync {
    /// The tool's unique, dotted name (e.g. `"agent.plan.set_taxonomy"`).
    const NAME: &'static str;

    type Error: std::error::Error + Send + Sync + 'static;
    type Args: for<'a> Deserialize<'a> + Send + Sync;
    type Output: Serialize;

    #[inline]
    fn name(&self) -> String {
        Self::NAME.to_string()
    }

    /// The tool's registered metadata: schema, scope, idempotency, and QoS.
    fn definition(&self) -> impl Future<Output = ToolDefinition> + Send;

    /// Execute the tool. Arguments and output cross the model boundary as JSON, but
    /// implementors work with their own typed `Args`/`Output`.
    fn call(&self, args: Self::Args) -> impl Future<Output = Result<Self::Output, Self::Error>> + Send;
}

/// Type-erased [`Tool`] for dynamic dispatch, used by [`crate::tool::ToolRegistry`].
pub trait ToolDyn: Send + Sync {
    fn name(&self) -> String;

    fn definition(&self) -> BoxedFuture<'_, ToolDefinition>;

    fn call(&self, args: serde_json::Value) -> BoxedFuture<'_, Result<String, ToolError>>;
}

impl<T: Tool> ToolDyn for T {
    fn name(&self) -> String {
        Tool::name(self)
    }

    fn definition(&self) -> BoxedFuture<'_, ToolDefinition> {
        Box::pin(<Self as Tool>::definition(self))
    }

    fn call(&self, args: serde_json::Value) -> BoxedFuture<'_, Result<String, ToolError>> {
        Box::pin(async move {
            let typed: T::Args = serde_json::from_value(args)?;
            let output = <Self as Tool>::call(self, typed).await.map_err(|e| ToolError::ExecutionFailed {
                tool_name: Tool::name(self),
                message: e.to_string(),
            })?;
            serde_json::to_string(&output).map_err(ToolError::from)
        })
    }
}
