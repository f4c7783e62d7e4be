//! Vendor-agnostic modem domain types.
//!
//! These types form the uniform vocabulary the middleware exposes: radio
//! bands, network access technologies, registration and PIN state, the
//! ordered modem lifecycle, and the SIM-resident data records (contacts,
//! messages). Vendor capability records translate between these and the
//! device-specific encodings.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// A set of radio frequency bands, represented as a bitmask.
///
/// Vendor firmwares select bands with coarse codes that often cover several
/// uniform bands at once; capability records map between the two. Because
/// those maps can fold many bands onto one code, reading the band back after
/// setting it may return a superset of what was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Band(pub u32);

impl Band {
    /// No bands selected.
    pub const EMPTY: Band = Band(0);
    /// GSM 900 (E-GSM).
    pub const EGSM: Band = Band(1 << 0);
    /// GSM 1800 (DCS).
    pub const DCS: Band = Band(1 << 1);
    /// GSM 1900 (PCS).
    pub const PCS: Band = Band(1 << 2);
    /// GSM 850.
    pub const G850: Band = Band(1 << 3);
    /// WCDMA 2100 (Band I).
    pub const U2100: Band = Band(1 << 4);
    /// WCDMA 1900 (Band II).
    pub const U1900: Band = Band(1 << 5);
    /// WCDMA 1700 (Band IV, AWS).
    pub const U1700: Band = Band(1 << 6);
    /// WCDMA 850 (Band V).
    pub const U850: Band = Band(1 << 7);
    /// WCDMA 900 (Band VIII).
    pub const U900: Band = Band(1 << 8);
    /// WCDMA 800 (Band VI).
    pub const U800: Band = Band(1 << 9);
    /// Any band the firmware supports.
    pub const ANY: Band = Band(u32::MAX);

    /// Returns `true` if every band in `other` is also in `self`.
    pub fn contains(&self, other: Band) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no bands are selected.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Band {
    type Output = Band;

    fn bitor(self, rhs: Band) -> Band {
        Band(self.0 | rhs.0)
    }
}

impl BitOrAssign for Band {
    fn bitor_assign(&mut self, rhs: Band) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Band {
    type Output = Band;

    fn bitand(self, rhs: Band) -> Band {
        Band(self.0 & rhs.0)
    }
}

/// Network access technology, both as a preference (set) and as a report
/// (what the modem is currently using).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkMode {
    /// No preference; firmware decides.
    Any,
    /// 2G (GSM/GPRS/EDGE) only.
    TwoGOnly,
    /// 3G (UMTS/HSPA) only.
    ThreeGOnly,
    /// Prefer 2G, fall back to 3G.
    TwoGPreferred,
    /// Prefer 3G, fall back to 2G.
    ThreeGPreferred,
    /// Currently attached via GPRS.
    Gprs,
    /// Currently attached via EDGE.
    Edge,
    /// Currently attached via UMTS.
    Umts,
    /// Currently attached via HSDPA.
    Hsdpa,
    /// Currently attached via HSUPA.
    Hsupa,
    /// Currently attached via HSPA (both directions).
    Hspa,
}

/// Access technology preference accepted by `set_network_mode`.
///
/// The settable subset of [`NetworkMode`]: report-only variants like
/// [`NetworkMode::Hsdpa`] are observations, not requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllowedMode {
    /// No preference.
    Any,
    /// 2G only.
    TwoGOnly,
    /// 3G only.
    ThreeGOnly,
    /// Prefer 2G.
    TwoGPreferred,
    /// Prefer 3G.
    ThreeGPreferred,
}

impl From<AllowedMode> for NetworkMode {
    fn from(mode: AllowedMode) -> NetworkMode {
        match mode {
            AllowedMode::Any => NetworkMode::Any,
            AllowedMode::TwoGOnly => NetworkMode::TwoGOnly,
            AllowedMode::ThreeGOnly => NetworkMode::ThreeGOnly,
            AllowedMode::TwoGPreferred => NetworkMode::TwoGPreferred,
            AllowedMode::ThreeGPreferred => NetworkMode::ThreeGPreferred,
        }
    }
}

/// Network registration state, decoded from the `+CREG` status digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationStatus {
    /// Not registered and not searching (+CREG: 0).
    Idle,
    /// Registered on the home network (+CREG: 1).
    Home,
    /// Not registered, searching for an operator (+CREG: 2).
    Searching,
    /// Registration denied by the network (+CREG: 3).
    Denied,
    /// State unknown (+CREG: 4).
    Unknown,
    /// Registered, roaming (+CREG: 5).
    Roaming,
}

impl RegistrationStatus {
    /// Decode the `+CREG` status digit. Out-of-range digits map to
    /// [`RegistrationStatus::Unknown`].
    pub fn from_creg(digit: u32) -> RegistrationStatus {
        match digit {
            0 => RegistrationStatus::Idle,
            1 => RegistrationStatus::Home,
            2 => RegistrationStatus::Searching,
            3 => RegistrationStatus::Denied,
            5 => RegistrationStatus::Roaming,
            _ => RegistrationStatus::Unknown,
        }
    }

    /// Returns `true` for the two registered states (home or roaming).
    pub fn is_registered(&self) -> bool {
        matches!(self, RegistrationStatus::Home | RegistrationStatus::Roaming)
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RegistrationStatus::Idle => "idle",
            RegistrationStatus::Home => "registered (home)",
            RegistrationStatus::Searching => "searching",
            RegistrationStatus::Denied => "denied",
            RegistrationStatus::Unknown => "unknown",
            RegistrationStatus::Roaming => "registered (roaming)",
        };
        write!(f, "{s}")
    }
}

/// SIM authentication state, decoded from `+CPIN` responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinStatus {
    /// SIM is unlocked and ready.
    Ready,
    /// SIM PIN must be sent before most commands will work.
    PinRequired,
    /// The PIN was entered wrong too many times; PUK required.
    PukRequired,
    /// PUK2 required (PIN2 blocked).
    Puk2Required,
}

/// Ordered modem lifecycle. Ordering is meaningful: a modem in state S has
/// completed every stage below S, so `status >= ModemStatus::Registered`
/// asks "is it at least registered".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModemStatus {
    /// Radio off or device just attached.
    Disabled,
    /// Auth state machine running (PIN/PUK exchange).
    Authenticating,
    /// SIM unlocked, radio not yet fully up.
    Authenticated,
    /// Radio on, not registered.
    Enabled,
    /// Registered with a network.
    Registered,
    /// Data session being established.
    Connecting,
    /// Data session up.
    Connected,
    /// Data session being torn down.
    Disconnecting,
}

/// A SIM phonebook entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    /// Storage index on the SIM; `None` for a contact not yet stored.
    pub index: Option<u16>,
    /// Contact name.
    pub name: String,
    /// Phone number, international format where the SIM stores it so.
    pub number: String,
}

/// Where a stored SMS lives and what state it is in, per the `+CMGL`
/// status values in PDU mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsStatus {
    /// Received, not yet read (0).
    ReceivedUnread,
    /// Received and read (1).
    ReceivedRead,
    /// Stored, not yet sent (2).
    StoredUnsent,
    /// Stored and sent (3).
    StoredSent,
}

impl SmsStatus {
    /// Decode the numeric `+CMGL`/`+CMGR` status value (PDU mode).
    pub fn from_stat(stat: u32) -> SmsStatus {
        match stat {
            0 => SmsStatus::ReceivedUnread,
            1 => SmsStatus::ReceivedRead,
            2 => SmsStatus::StoredUnsent,
            _ => SmsStatus::StoredSent,
        }
    }
}

/// An SMS as surfaced by the middleware: multipart deliveries are
/// reassembled before they reach this type, so `text` is always complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsMessage {
    /// Storage index of the message (first part for reassembled multipart).
    pub index: u32,
    /// Sender (received) or recipient (stored) number.
    pub number: String,
    /// Full message text.
    pub text: String,
    /// Storage status.
    pub status: SmsStatus,
    /// Service-centre timestamp as reported, when present.
    pub timestamp: Option<String>,
}

/// Operator information from `+COPS?`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkOperator {
    /// Operator name, decoded to UTF-8 (UCS-2 hex unpacked when the
    /// current charset is UCS2).
    pub name: String,
    /// MCC+MNC when the modem reports numeric format, if known.
    pub netid: Option<String>,
}

/// An APN profile from `+CGDCONT?`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApnProfile {
    /// PDP context id.
    pub context_id: u32,
    /// Access point name.
    pub apn: String,
}

/// Per-session SIM cache. Charset and phonebook size are queried once and
/// reused; the cache dies with the session.
#[derive(Debug, Clone, Default)]
pub struct SimState {
    /// Character set currently selected with `+CSCS` (e.g. "IRA", "UCS2").
    pub charset: Option<String>,
    /// Highest phonebook index, from the `+CPBR=?` range.
    pub phonebook_size: Option<u16>,
    /// PDP context id chosen by `set_apn`, reused by the connect sequence.
    pub apn_context_id: Option<u32>,
}
