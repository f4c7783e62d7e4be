//! ZTE model definitions.
//!
//! ZTE datacards (MF622/MF628/MF637 and friends) prefix vendor
//! notifications with `+Z` and fold band selection into the small
//! `AT+ZBANDI` code table. The fold is lossy: one code stands for a fixed
//! group of bands, so reading the band back can return more than was asked
//! for. Mode preference goes through `AT+ZSNT=<mode>,<netsel>,<acqorder>`.

use std::time::Duration;

use wwanlib_core::caps::{CapabilityRecord, ConnectHooks, SignalFn};
use wwanlib_core::events::ModemEvent;
use wwanlib_core::types::{AllowedMode, Band, NetworkMode};

/// `+ZPASR: "<tech>"` -- the access technology now in use.
fn pasr_report(args: &str) -> Option<ModemEvent> {
    let mode = match args.trim().trim_matches('"') {
        "GSM" | "GPRS" => NetworkMode::Gprs,
        "EDGE" => NetworkMode::Edge,
        "UMTS" => NetworkMode::Umts,
        "HSDPA" => NetworkMode::Hsdpa,
        "HSUPA" => NetworkMode::Hsupa,
        "HSPA" => NetworkMode::Hspa,
        // "No Service" / "Limited Service" carry no technology.
        _ => return None,
    };
    Some(ModemEvent::NetworkModeChanged { mode })
}

const EUROPE_2G: Band = Band(Band::EGSM.0 | Band::DCS.0);

/// ZTE MF-series datacard definition.
pub fn mf_series() -> CapabilityRecord {
    CapabilityRecord {
        vendor: "ZTE",
        model: "MF-series",
        usb_ids: &[(0x19d2, 0x0001), (0x19d2, 0x0031), (0x19d2, 0x0063)],
        // AT+ZBANDI codes; each code is a fixed regional group.
        band_map: &[
            (Band::ANY, "0"),
            (Band(Band::U850.0 | EUROPE_2G.0), "1"),
            (Band(Band::U2100.0 | EUROPE_2G.0), "2"),
            (Band(Band::U850.0 | Band::U2100.0 | EUROPE_2G.0), "3"),
            (
                Band(Band::U850.0 | Band::U1900.0 | Band::G850.0 | Band::PCS.0),
                "4",
            ),
        ],
        set_band_cmd: Some("AT+ZBANDI={}"),
        get_band_cmd: Some("AT+ZBANDI?"),
        // <mode>,<netsel>,<acqorder>: mode 0 auto, 1 GSM only, 2 WCDMA
        // only; acqorder 1 GSM first, 2 WCDMA first.
        mode_map: &[
            (AllowedMode::Any, "0,0,0"),
            (AllowedMode::TwoGOnly, "1,0,0"),
            (AllowedMode::ThreeGOnly, "2,0,0"),
            (AllowedMode::TwoGPreferred, "0,0,1"),
            (AllowedMode::ThreeGPreferred, "0,0,2"),
        ],
        mode_report_map: &[
            ("0,0,0", NetworkMode::Any),
            ("1,0,0", NetworkMode::TwoGOnly),
            ("2,0,0", NetworkMode::ThreeGOnly),
            ("0,0,1", NetworkMode::TwoGPreferred),
            ("0,0,2", NetworkMode::ThreeGPreferred),
        ],
        set_mode_cmd: Some("AT+ZSNT={}"),
        get_mode_cmd: Some("AT+ZSNT?"),
        get_signal_cmd: None,
        pattern_overrides: &[
            ("get_band", r"\+ZBANDI:\s*(?P<band>\d+)"),
            ("get_mode", r"\+ZSNT:\s*(?P<mode>\d+,\d+,\d+)"),
        ],
        async_grammar: r"^\+(?P<signal>Z[A-Z]+):\s*(?P<args>.*)$",
        signal_translations: &[
            ("ZPASR", Some(pasr_report as SignalFn)),
            ("ZDONR", None),
            ("ZUSIMR", None),
            ("ZPSTM", None),
            ("ZEND", None),
        ],
        sends_unsolicited_rssi: false,
        auth_settle_delay: Duration::from_secs(15),
        connect_hooks: ConnectHooks::EXTERNAL_DIALER,
    }
}
