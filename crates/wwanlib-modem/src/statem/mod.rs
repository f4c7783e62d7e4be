//! Device state machines.
//!
//! Multi-step interactions with ordering constraints and retry policy are
//! expressed as explicit state machines over the wrapper's operations:
//!
//! - [`auth`]: the PIN/PUK exchange, with SIM-busy retry and the
//!   post-unlock settle delay
//! - [`netreg`]: operator registration with bounded polling
//! - [`simple`]: the full connect sequence, from authentication to a live
//!   data session
//!
//! Each machine borrows the [`ModemWrapper`](crate::ModemWrapper) and
//! drives it to completion; the wrapper's status field tracks progress so
//! concurrent observers see where the session is.

pub mod auth;
pub mod netreg;
pub mod simple;

pub use auth::AuthMachine;
pub use netreg::NetRegMachine;
pub use simple::{ConnectSettings, SimpleConnectMachine};
