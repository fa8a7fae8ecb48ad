#![cfg_attr(docsrs, feature(doc_cfg))]
//! loomcore is the agent orchestration core for a browser-extension translation
//! engine: a tool-calling agent loop, the typed stores it persists through, the
//! job runner that schedules it, and the transport it dispatches tool execution
//! over.

pub mod agent;
pub mod cancel;
pub mod clock;
pub mod error;
pub mod job;
pub mod kv;
pub mod model;
pub mod settings;
pub mod shaper;
pub mod tool;
pub mod transport;

pub use cancel::CancellationToken;
pub use clock::{Clock, FakeClock, SystemClock};
pub use error::{Error, ErrorCode, HasErrorCode, Result};
