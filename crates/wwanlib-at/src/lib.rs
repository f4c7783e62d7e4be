//! wwanlib-at: the AT protocol engine.
//!
//! Everything between raw transport bytes and typed middleware operations
//! lives here:
//!
//! - [`protocol`] -- CR/LF line framing and final-token classification
//! - [`matcher`] -- the named response-pattern table with field extraction
//! - [`queue`] -- the background engine task: FIFO submission, one command
//!   in flight, per-command timeout/retry, cancellation
//! - [`dispatcher`] -- unsolicited result code classification and event
//!   translation, driven by the capability record
//!
//! The engine task owns its transport exclusively; all access from above
//! goes through a cloneable [`AtQueue`] handle.

pub mod dispatcher;
pub mod matcher;
pub mod protocol;
pub mod queue;

pub use dispatcher::Dispatcher;
pub use matcher::{Fields, ResponseTable, ANY, OK};
pub use queue::{
    spawn_engine, AtCommand, AtQueue, CommandOutcome, EngineHandle, PendingCommand,
    DEFAULT_TIMEOUT,
};
