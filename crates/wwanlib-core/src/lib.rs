//! wwanlib-core: Core traits, types, and error definitions for wwanlib.
//!
//! This crate defines the vendor-agnostic abstractions the rest of wwanlib
//! builds on. Connection managers and other applications depend on these
//! types without pulling in any specific vendor support or the protocol
//! engine.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-level communication channel to the modem port
//! - [`CapabilityRecord`] -- data-driven description of a modem family
//! - [`ModemEvent`] -- asynchronous state change notifications
//! - [`Error`] / [`Result`] -- error handling

pub mod caps;
pub mod encoding;
pub mod error;
pub mod events;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use wwanlib_core::*`.
pub use caps::{CapabilityRecord, ConnectHooks, SignalFn};
pub use error::{DeviceError, Error, Result};
pub use events::ModemEvent;
pub use transport::Transport;
pub use types::*;
