//! Job runtime (lease/retry/watchdog), retry policy, metrics, and the scheduler
//! step that ties a [`crate::model::Job`] to the [`crate::agent::AgentRunner`] (§4.6).

pub mod error;
pub mod metrics;
pub mod retry_policy;
pub mod runtime;
pub mod scheduler;

pub use error::JobError;
pub use metrics::{MetricsSink, StepMetrics, TracingMetricsSink};
pub use retry_policy::{Disposition, RetryPolicy};
pub use runtime::JobRuntime;
pub use scheduler::{JobRunner, StepOutcome};
