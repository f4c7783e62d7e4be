//! Asynchronous modem event types.
//!
//! Events are emitted by the protocol engine through a
//! [`tokio::sync::broadcast`] channel when the modem reports state changes,
//! mostly decoded from unsolicited result codes. Connection managers and
//! status UIs subscribe to these instead of polling.

use crate::types::{NetworkMode, RegistrationStatus};

/// An event emitted when modem state changes.
///
/// Delivered on a best-effort basis through a bounded broadcast channel;
/// slow consumers may miss events (e.g. rapid signal-quality reports while
/// driving).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModemEvent {
    /// Signal quality report.
    SignalQuality {
        /// RSSI in the 0..=31 scale of `+CSQ` (99 = unknown).
        rssi: u32,
    },

    /// Network registration state changed.
    RegistrationChanged {
        /// The new registration state.
        status: RegistrationStatus,
    },

    /// The access technology in use changed (e.g. UMTS -> HSDPA).
    NetworkModeChanged {
        /// The technology now in use.
        mode: NetworkMode,
    },

    /// A new SMS arrived and was stored on the SIM.
    SmsReceived {
        /// Storage index of the new message.
        index: u32,
    },

    /// An incoming voice call is ringing.
    CallReceived,

    /// Periodic data-session traffic statistics.
    DialStats {
        /// Bytes transmitted since the session started.
        bytes_tx: u64,
        /// Bytes received since the session started.
        bytes_rx: u64,
    },

    /// The engine attached to the modem and is processing commands.
    Connected,

    /// The transport failed; the session is dead.
    Disconnected,
}
