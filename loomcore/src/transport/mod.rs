//! Remote executor transport: the boundary between the job runner and wherever
//! tool calls actually run, plus the fairness and recovery machinery around that
//! boundary (§4.5).

pub mod dispatch_queue;
pub mod errors;
pub mod executor;
pub mod sweeper;
pub mod worker_port;

pub use dispatch_queue::{DispatchDecision, DispatchLimits, DispatchQueue};
pub use errors::TransportError;
pub use executor::Executor;
pub use sweeper::{SweepReport, Sweeper};
pub use worker_port::{ChannelWorkerPort, ExecuteOutcome, ExecuteRequest, HttpWorkerPort, RequestStatus, WorkerPort};
