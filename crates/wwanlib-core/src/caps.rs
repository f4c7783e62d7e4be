//! Per-model capability records.
//!
//! A [`CapabilityRecord`] is pure data describing how one modem family
//! diverges from the generic 3GPP command set: band and mode code tables,
//! response-pattern overrides, the unsolicited-line grammar and its signal
//! translations, and the connect-sequence hooks. The middleware selects one
//! record at attach time and consults it for every vendor-divergent
//! decision; there is no per-vendor code path above the record.

use std::time::Duration;

use crate::events::ModemEvent;
use crate::types::{AllowedMode, Band, NetworkMode};

/// Translates the argument text of a recognized unsolicited signal into a
/// [`ModemEvent`]. Returning `None` means the arguments did not parse;
/// the line is dropped.
pub type SignalFn = fn(&str) -> Option<ModemEvent>;

/// Vendor-divergent pieces of the simple-connect sequence.
///
/// Templates use `{}` placeholders filled positionally by the connect state
/// machine; `None` means the step does not apply to this model.
#[derive(Debug, Clone, Copy)]
pub struct ConnectHooks {
    /// Switch the charset to IRA before writing the APN and restore the
    /// previous charset afterwards. Some firmwares mangle `+CGDCONT`
    /// parameters while UCS2 is selected.
    pub charset_workaround: bool,
    /// Session authentication command, e.g. `AT*EIAAUW={},1,"{}","{}"`
    /// (context id, username, password). `None`: no in-band auth step.
    pub session_auth_template: Option<&'static str>,
    /// Data call bring-up command, e.g. `AT*ENAP=1,{}` (context id).
    /// `None`: the data call is established by an external dialer.
    pub dial_template: Option<&'static str>,
    /// Data call tear-down command, e.g. `AT*ENAP=0`.
    pub hangup_template: Option<&'static str>,
}

impl ConnectHooks {
    /// Hooks for models whose data call is owned by an external dialer.
    pub const EXTERNAL_DIALER: ConnectHooks = ConnectHooks {
        charset_workaround: false,
        session_auth_template: None,
        dial_template: None,
        hangup_template: None,
    };
}

/// Everything the middleware needs to know about one modem family.
///
/// Records are `'static` data built by factory functions in
/// `wwanlib-vendors`. Absent capabilities are declared, not discovered:
/// an empty `band_map` means band selection is unsupported and the wrapper
/// reports it as such without touching the device.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityRecord {
    /// Vendor name, e.g. "Huawei".
    pub vendor: &'static str,
    /// Model family, e.g. "E173".
    pub model: &'static str,
    /// USB (vendor id, product id) pairs this record matches.
    pub usb_ids: &'static [(u16, u16)],

    /// Uniform band mask to vendor band code. Folds are many-to-one and
    /// lossy; the reverse lookup returns the full uniform mask for the
    /// code, so get-after-set can legitimately return a superset.
    pub band_map: &'static [(Band, &'static str)],
    /// Command template for setting the band, `{}` = vendor code.
    pub set_band_cmd: Option<&'static str>,
    /// Command for querying the band; the response is parsed with the
    /// `get_band` pattern (usually a vendor override).
    pub get_band_cmd: Option<&'static str>,

    /// Allowed-mode preference to vendor mode argument.
    pub mode_map: &'static [(AllowedMode, &'static str)],
    /// Vendor report token to the access technology it denotes.
    pub mode_report_map: &'static [(&'static str, NetworkMode)],
    /// Command template for setting the mode preference, `{}` = vendor arg.
    pub set_mode_cmd: Option<&'static str>,
    /// Command for querying the current mode, parsed with `get_mode`.
    pub get_mode_cmd: Option<&'static str>,

    /// Alternate signal-quality query, parsed with `get_signal_quality`
    /// (usually overridden alongside). `None` means plain `AT+CSQ`.
    pub get_signal_cmd: Option<&'static str>,

    /// Response-pattern overrides applied on top of the default table.
    /// An override replaces the whole named entry, never merges with it.
    pub pattern_overrides: &'static [(&'static str, &'static str)],

    /// Regex classifying this vendor's unsolicited lines. Must expose
    /// `signal` and `args` named captures.
    pub async_grammar: &'static str,
    /// Signal name to translation. `Some(f)`: produce an event.
    /// `None`: recognized and deliberately ignored.
    pub signal_translations: &'static [(&'static str, Option<SignalFn>)],
    /// Whether the firmware pushes signal-quality reports unsolicited.
    /// When `false`, callers poll `get_signal_quality` instead.
    pub sends_unsolicited_rssi: bool,

    /// How long to wait after a successful PIN/PUK before the SIM is
    /// usable. Policy, not protocol; vendor-tuned.
    pub auth_settle_delay: Duration,

    /// Vendor-divergent connect-sequence steps.
    pub connect_hooks: ConnectHooks,
}

impl CapabilityRecord {
    /// Vendor code for a requested band.
    ///
    /// Prefers an exact table entry; otherwise picks the narrowest entry
    /// that covers the request. `None` when the table is empty or nothing
    /// covers the request.
    pub fn band_to_vendor(&self, band: Band) -> Option<&'static str> {
        if let Some((_, code)) = self.band_map.iter().find(|(b, _)| *b == band) {
            return Some(code);
        }
        self.band_map
            .iter()
            .filter(|(b, _)| b.contains(band))
            .min_by_key(|(b, _)| b.0.count_ones())
            .map(|(_, code)| *code)
    }

    /// Uniform mask for a vendor band code. Lossy folds mean the returned
    /// mask may cover more than was originally requested.
    pub fn band_from_vendor(&self, code: &str) -> Option<Band> {
        self.band_map
            .iter()
            .find(|(_, c)| *c == code)
            .map(|(b, _)| *b)
    }

    /// All bands this record can express, as the union of its table.
    pub fn supported_bands(&self) -> Band {
        self.band_map
            .iter()
            .fold(Band::EMPTY, |acc, (b, _)| acc | *b)
    }

    /// Vendor argument for a mode preference.
    pub fn mode_to_vendor(&self, mode: AllowedMode) -> Option<&'static str> {
        self.mode_map
            .iter()
            .find(|(m, _)| *m == mode)
            .map(|(_, arg)| *arg)
    }

    /// Access technology for a vendor report token.
    pub fn mode_from_vendor(&self, token: &str) -> Option<NetworkMode> {
        self.mode_report_map
            .iter()
            .find(|(t, _)| *t == token)
            .map(|(_, m)| *m)
    }

    /// All mode preferences this record can express.
    pub fn supported_modes(&self) -> Vec<AllowedMode> {
        self.mode_map.iter().map(|(m, _)| *m).collect()
    }

    /// Translation entry for an unsolicited signal name, if declared.
    pub fn signal_translation(&self, signal: &str) -> Option<&Option<SignalFn>> {
        self.signal_translations
            .iter()
            .find(|(name, _)| *name == signal)
            .map(|(_, f)| f)
    }
}
