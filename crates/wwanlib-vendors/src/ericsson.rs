//! Ericsson model definitions.
//!
//! The F3607gw family of embedded modules behaves differently from the
//! USB datacards: the data call is brought up in-band with `AT*ENAP`
//! instead of an external PPP dialer, session credentials go through
//! `AT*EIAAUW`, and mode preference rides on `AT+CFUN` power states
//! (1 auto, 5 GSM only, 6 WCDMA only). Signal quality comes from the
//! `+CIND` indicators rather than `+CSQ`, as 0..=5 bars.
//!
//! Some firmware revisions corrupt `+CGDCONT` parameters written while
//! the UCS2 charset is selected, hence the charset workaround hook.

use std::time::Duration;

use wwanlib_core::caps::{CapabilityRecord, ConnectHooks, SignalFn};
use wwanlib_core::events::ModemEvent;
use wwanlib_core::types::{AllowedMode, NetworkMode};

/// `*ERINFO: <mode>,<gsm>,<umts>` -- per-technology service levels.
/// gsm: 1 GSM, 2 EDGE; umts: 1 UMTS, 2 HSPA.
fn erinfo_report(args: &str) -> Option<ModemEvent> {
    let mut fields = args.trim().split(',').skip(1);
    let gsm = fields.next()?.trim();
    let umts = fields.next()?.trim();
    let mode = match (gsm, umts) {
        (_, "2") => NetworkMode::Hspa,
        (_, "1") => NetworkMode::Umts,
        ("2", _) => NetworkMode::Edge,
        ("1", _) => NetworkMode::Gprs,
        _ => return None,
    };
    Some(ModemEvent::NetworkModeChanged { mode })
}

/// `*E2NAP: <state>` -- data session state: 0 down, 1 up, 2 connecting.
fn e2nap_report(args: &str) -> Option<ModemEvent> {
    match args.trim() {
        "0" => Some(ModemEvent::Disconnected),
        "1" => Some(ModemEvent::Connected),
        _ => None,
    }
}

/// `+CIEV: <ind>,<value>` -- indicator 2 is signal strength in 0..=5
/// bars, scaled here to the 0..=31 range of `+CSQ`.
fn ciev_report(args: &str) -> Option<ModemEvent> {
    let mut fields = args.trim().split(',');
    if fields.next()?.trim() != "2" {
        return None;
    }
    let bars: u32 = fields.next()?.trim().parse().ok()?;
    Some(ModemEvent::SignalQuality {
        rssi: (bars * 6).min(31),
    })
}

/// Ericsson F3607gw embedded module definition.
pub fn f3607gw() -> CapabilityRecord {
    CapabilityRecord {
        vendor: "Ericsson",
        model: "F3607gw",
        usb_ids: &[(0x0bdb, 0x1900), (0x0bdb, 0x1904), (0x0bdb, 0x1906)],
        // No band selection command on this firmware.
        band_map: &[],
        set_band_cmd: None,
        get_band_cmd: None,
        mode_map: &[
            (AllowedMode::Any, "1"),
            (AllowedMode::TwoGOnly, "5"),
            (AllowedMode::ThreeGOnly, "6"),
        ],
        mode_report_map: &[
            ("1", NetworkMode::Any),
            ("5", NetworkMode::TwoGOnly),
            ("6", NetworkMode::ThreeGOnly),
        ],
        set_mode_cmd: Some("AT+CFUN={}"),
        get_mode_cmd: Some("AT+CFUN?"),
        get_signal_cmd: Some("AT+CIND?"),
        pattern_overrides: &[
            ("get_mode", r"\+CFUN:\s*(?P<mode>\d+)"),
            // Indicator order: battery, signal, ...
            ("get_signal_quality", r"\+CIND:\s*\d+,(?P<rssi>\d+)"),
        ],
        async_grammar: r"^[*+](?P<signal>[A-Z][A-Z0-9]*):\s*(?P<args>.*)$",
        signal_translations: &[
            ("ERINFO", Some(erinfo_report as SignalFn)),
            ("E2NAP", Some(e2nap_report as SignalFn)),
            ("CIEV", Some(ciev_report as SignalFn)),
            ("EMWI", None),
            ("ESTKSMENU", None),
        ],
        sends_unsolicited_rssi: true,
        auth_settle_delay: Duration::from_secs(5),
        connect_hooks: ConnectHooks {
            charset_workaround: true,
            session_auth_template: Some("AT*EIAAUW={},1,\"{}\",\"{}\""),
            dial_template: Some("AT*ENAP=1,{}"),
            hangup_template: Some("AT*ENAP=0"),
        },
    }
}
