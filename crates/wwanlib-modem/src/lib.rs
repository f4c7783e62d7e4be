//! wwanlib-modem: the middleware layer.
//!
//! Sits between the AT protocol engine and applications:
//!
//! - [`ModemWrapper`] exposes every modem capability as one typed async
//!   operation (identity, PIN, registration, signal, band/mode, APN,
//!   phonebook, SMS), built on the capability record's vendor tables
//! - [`statem`] holds the multi-step state machines: authentication,
//!   network registration, and the full connect sequence
//!
//! One wrapper owns one session; everything above it is `&self` and safe
//! to share, because the engine task serializes the wire underneath.

pub mod statem;
pub mod wrapper;

pub use statem::{AuthMachine, ConnectSettings, NetRegMachine, SimpleConnectMachine};
pub use wrapper::{HardwareInfo, ModemWrapper};
