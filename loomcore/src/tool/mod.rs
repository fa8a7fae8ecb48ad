//! Tool definitions, the registry, and the execution engine that sits in front of it
//! (§4.2, §4.3).

pub mod builtin;
pub mod coalesce;
pub mod definition;
pub mod engine;
pub mod errors;
pub mod hash;
pub mod registry;
pub mod state;
pub mod trace;
pub mod traits;

pub use builtin::planning_tool_registry;
pub use definition::{Idempotency, IdempotencyMode, Qos, Scope, SideEffectCategory, ToolDefinition};
pub use engine::{ExecuteStatus, ExecuteToolCallRequest, ExecuteToolCallResult, ToolExecutionEngine};
pub use errors::ToolError;
pub use registry::{ToolRegistry, ToolRegistryBuilder};
pub use state::ToolState;
pub use trace::{ToolTraceRecord, TraceStatus};
pub use traits::{Tool, ToolDyn};
