//! Huawei model definitions.
//!
//! Huawei datacards prefix vendor notifications with a caret (`^RSSI:18`,
//! `^MODE:3,5`, `^DSFLOWRPT:...`) and multiplex band and mode selection
//! through `AT^SYSCFG`. The band argument is a hex mask; the mode is the
//! `<mode>,<acqorder>` pair at the front of the same command.
//!
//! The E-series cards (E160/E173/E220 and friends) all share this dialect;
//! they differ in radio bands fitted, not in protocol, so one record covers
//! the family.

use std::time::Duration;

use wwanlib_core::caps::{CapabilityRecord, ConnectHooks, SignalFn};
use wwanlib_core::events::ModemEvent;
use wwanlib_core::types::{AllowedMode, Band, NetworkMode};

/// `^RSSI:<n>` -- signal strength in +CSQ units. 99 means unknown.
fn rssi_report(args: &str) -> Option<ModemEvent> {
    let rssi: u32 = args.trim().parse().ok()?;
    if rssi == 99 {
        return None;
    }
    Some(ModemEvent::SignalQuality { rssi })
}

/// `^MODE:<sysmode>,<submode>` -- the submode names the access technology.
fn mode_report(args: &str) -> Option<ModemEvent> {
    let submode = args.trim().split(',').nth(1)?;
    let mode = match submode {
        "1" | "2" => NetworkMode::Gprs,
        "3" => NetworkMode::Edge,
        "4" => NetworkMode::Umts,
        "5" => NetworkMode::Hsdpa,
        "6" => NetworkMode::Hsupa,
        "7" => NetworkMode::Hspa,
        _ => return None,
    };
    Some(ModemEvent::NetworkModeChanged { mode })
}

/// `^DSFLOWRPT:<secs>,<txrate>,<rxrate>,<txbytes>,<rxbytes>,...`, all hex.
fn flow_report(args: &str) -> Option<ModemEvent> {
    let mut fields = args.trim().split(',');
    let bytes_tx = u64::from_str_radix(fields.nth(3)?, 16).ok()?;
    let bytes_rx = u64::from_str_radix(fields.next()?, 16).ok()?;
    Some(ModemEvent::DialStats { bytes_tx, bytes_rx })
}

const GSM900_1800: Band = Band(Band::EGSM.0 | Band::DCS.0);

/// Huawei E-series datacard definition.
pub fn e_series() -> CapabilityRecord {
    CapabilityRecord {
        vendor: "Huawei",
        model: "E-series",
        usb_ids: &[(0x12d1, 0x1001), (0x12d1, 0x1003), (0x12d1, 0x1436)],
        // ^SYSCFG band masks. The firmware accepts ORed masks, so the
        // common pairs get their own entries.
        band_map: &[
            (Band::ANY, "3FFFFFFF"),
            (GSM900_1800, "180"),
            (Band::DCS, "80"),
            (Band::EGSM, "100"),
            (Band::G850, "80000"),
            (Band::PCS, "200000"),
            (Band::U2100, "400000"),
        ],
        set_band_cmd: Some("AT^SYSCFG=16,3,{},2,4"),
        get_band_cmd: Some("AT^SYSCFG?"),
        // <mode>,<acqorder>: mode 2 auto, 13 GSM only, 14 WCDMA only;
        // acqorder 0 auto, 1 GSM first, 2 WCDMA first.
        mode_map: &[
            (AllowedMode::Any, "2,0"),
            (AllowedMode::TwoGOnly, "13,1"),
            (AllowedMode::ThreeGOnly, "14,2"),
            (AllowedMode::TwoGPreferred, "2,1"),
            (AllowedMode::ThreeGPreferred, "2,2"),
        ],
        mode_report_map: &[
            ("2,0", NetworkMode::Any),
            ("13,1", NetworkMode::TwoGOnly),
            ("14,2", NetworkMode::ThreeGOnly),
            ("2,1", NetworkMode::TwoGPreferred),
            ("2,2", NetworkMode::ThreeGPreferred),
        ],
        set_mode_cmd: Some("AT^SYSCFG={},40000000,2,4"),
        get_mode_cmd: Some("AT^SYSCFG?"),
        get_signal_cmd: None,
        pattern_overrides: &[
            ("get_band", r"\^SYSCFG:\s*\d+,\d+,(?P<band>[0-9A-Fa-f]+)"),
            ("get_mode", r"\^SYSCFG:\s*(?P<mode>\d+,\d+)"),
        ],
        async_grammar: r"^\^(?P<signal>[A-Z]+):\s*(?P<args>.*)$",
        signal_translations: &[
            ("RSSI", Some(rssi_report as SignalFn)),
            ("MODE", Some(mode_report as SignalFn)),
            ("DSFLOWRPT", Some(flow_report as SignalFn)),
            ("BOOT", None),
            ("SRVST", None),
            ("SIMST", None),
            ("CSNR", None),
        ],
        sends_unsolicited_rssi: true,
        auth_settle_delay: Duration::from_secs(15),
        connect_hooks: ConnectHooks::EXTERNAL_DIALER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_codes_round_trip_through_syscfg_masks() {
        let rec = e_series();
        assert_eq!(rec.band_to_vendor(Band::U2100), Some("400000"));
        assert_eq!(rec.band_to_vendor(Band::EGSM | Band::DCS), Some("180"));
        assert_eq!(rec.band_from_vendor("3FFFFFFF"), Some(Band::ANY));
        assert_eq!(rec.band_from_vendor("80"), Some(Band::DCS));
    }

    #[test]
    fn mode_preferences_map_to_syscfg_pairs() {
        let rec = e_series();
        assert_eq!(rec.mode_to_vendor(AllowedMode::ThreeGOnly), Some("14,2"));
        assert_eq!(rec.mode_from_vendor("2,1"), Some(NetworkMode::TwoGPreferred));
        assert_eq!(rec.supported_modes().len(), 5);
    }

    #[test]
    fn rssi_report_parses_and_drops_unknown() {
        assert_eq!(
            rssi_report("18"),
            Some(ModemEvent::SignalQuality { rssi: 18 })
        );
        assert_eq!(rssi_report("99"), None);
        assert_eq!(rssi_report("banana"), None);
    }

    #[test]
    fn mode_report_uses_submode() {
        assert_eq!(
            mode_report("3,5"),
            Some(ModemEvent::NetworkModeChanged {
                mode: NetworkMode::Hsdpa
            })
        );
        assert_eq!(mode_report("3,0"), None);
        assert_eq!(mode_report("3"), None);
    }

    #[test]
    fn flow_report_parses_hex_byte_counters() {
        assert_eq!(
            flow_report("00000012,000003E8,00000BB8,0000000000001F40,0000000000004E20,0003E800,0003E800"),
            Some(ModemEvent::DialStats {
                bytes_tx: 0x1F40,
                bytes_rx: 0x4E20,
            })
        );
        assert_eq!(flow_report("12,3E8"), None);
    }

    #[test]
    fn ignored_signals_are_declared() {
        let rec = e_series();
        for signal in ["BOOT", "SRVST", "SIMST", "CSNR"] {
            assert_eq!(rec.signal_translation(signal), Some(&None));
        }
    }
}
