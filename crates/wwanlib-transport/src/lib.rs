//! Transport implementations for wwanlib.
//!
//! Concrete implementations of the [`Transport`](wwanlib_core::Transport)
//! trait from `wwanlib-core`. Modems speak AT over serial ports, so there
//! is exactly one:
//!
//! - [`SerialPortTransport`]: USB CDC-ACM and vendor-driver ttys

pub mod serial;

pub use serial::{FlowControl, SerialConfig, SerialPortTransport};
