//! Generic 3GPP record.
//!
//! The fallback for modems without a vendor record: plain 27.007 command
//! set, no band or mode selection, no vendor notifications. The standard
//! notifications (`+CMTI`, `RING`, `+CREG`) are handled by the dispatcher
//! itself and need no entries here.

use std::time::Duration;

use wwanlib_core::caps::{CapabilityRecord, ConnectHooks};

/// Generic 3GPP modem definition.
pub fn generic() -> CapabilityRecord {
    CapabilityRecord {
        vendor: "Generic",
        model: "3GPP",
        usb_ids: &[],
        band_map: &[],
        set_band_cmd: None,
        get_band_cmd: None,
        mode_map: &[],
        mode_report_map: &[],
        set_mode_cmd: None,
        get_mode_cmd: None,
        get_signal_cmd: None,
        pattern_overrides: &[],
        // Matches vendor-shaped lines so idle chatter from unknown
        // firmware is logged and dropped instead of misread; the empty
        // translation map means nothing is ever stolen mid-command.
        async_grammar: r"^[*^](?P<signal>[A-Z][A-Z0-9]*):\s*(?P<args>.*)$",
        signal_translations: &[],
        sends_unsolicited_rssi: false,
        auth_settle_delay: Duration::from_secs(15),
        connect_hooks: ConnectHooks::EXTERNAL_DIALER,
    }
}
