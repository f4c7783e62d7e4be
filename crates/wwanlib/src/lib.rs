//! # wwanlib -- Mobile Broadband Modem Control
//!
//! `wwanlib` is an asynchronous Rust library for driving mobile broadband
//! modems (Huawei, ZTE, Ericsson, and generic 3GPP devices) over their
//! serial AT control port. It is designed for connection managers and
//! embedded provisioning tools that need reliable, typed access to SIM
//! authentication, network registration, data-session setup, phonebook,
//! and SMS.
//!
//! ## Quick Start
//!
//! ```no_run
//! use wwanlib::transport::SerialPortTransport;
//! use wwanlib::{ConnectSettings, SimpleConnectMachine};
//!
//! #[tokio::main]
//! async fn main() -> wwanlib::Result<()> {
//!     let port = SerialPortTransport::open("/dev/ttyUSB0", 115_200).await?;
//!     // USB ids from the device that enumerated the tty.
//!     let modem = wwanlib::attach(Box::new(port), 0x12d1, 0x1001)?;
//!
//!     let settings = ConnectSettings {
//!         apn: Some("internet".into()),
//!         pin: Some("1234".into()),
//!         ..Default::default()
//!     };
//!     SimpleConnectMachine::new(&modem, settings).run().await?;
//!
//!     println!("signal: {}", modem.get_signal_quality().await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized as a workspace of focused crates:
//!
//! | Crate                  | Purpose                                         |
//! |------------------------|-------------------------------------------------|
//! | `wwanlib-core`         | Transport trait, capability records, types, errors |
//! | `wwanlib-at`           | AT protocol engine: queue, matcher, URC dispatcher |
//! | `wwanlib-sms`          | SMS PDU encode/decode and multipart reassembly  |
//! | `wwanlib-vendors`      | Per-vendor capability records and USB id registry |
//! | `wwanlib-modem`        | Middleware wrapper and device state machines    |
//! | `wwanlib-transport`    | Serial port transport                           |
//! | **`wwanlib`**          | This facade crate -- re-exports everything      |
//!
//! Vendor divergence lives entirely in capability records (data, not
//! code): band and mode tables, command templates, the unsolicited-line
//! grammar, and connect hooks. Supporting a new modem family usually
//! means writing one record, not a driver.
//!
//! ## Event Subscription
//!
//! Every session emits [`ModemEvent`]s through a broadcast channel:
//! signal strength reports, access-technology changes, registration
//! changes, incoming SMS notifications.
//!
//! ```no_run
//! use wwanlib::ModemEvent;
//! # async fn example(modem: &wwanlib::ModemWrapper) {
//! let mut events = modem.events();
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         ModemEvent::SignalQuality { rssi } => println!("rssi {rssi}"),
//!         ModemEvent::SmsReceived { index } => println!("sms at {index}"),
//!         other => println!("{other:?}"),
//!     }
//! }
//! # }
//! ```

pub use wwanlib_core::*;

pub use wwanlib_modem::{
    AuthMachine, ConnectSettings, HardwareInfo, ModemWrapper, NetRegMachine,
    SimpleConnectMachine,
};

/// The AT protocol engine: command queue, response matcher, URC dispatcher.
pub mod at {
    pub use wwanlib_at::*;
}

/// SMS PDU encoding, decoding, and multipart reassembly.
pub mod sms {
    pub use wwanlib_sms::*;
}

/// Per-vendor capability records and the USB id registry.
pub mod vendors {
    pub use wwanlib_vendors::*;
}

/// Serial port transport.
pub mod transport {
    pub use wwanlib_transport::*;
}

/// Attach to a modem, selecting the capability record by USB ids.
///
/// Unrecognized hardware gets the generic 3GPP record: identity, PIN,
/// registration, SMS, and phonebook work everywhere; band and mode
/// selection report [`Error::Unsupported`].
pub fn attach(
    transport: Box<dyn Transport>,
    vendor_id: u16,
    product_id: u16,
) -> Result<ModemWrapper> {
    let record = wwanlib_vendors::select_record(vendor_id, product_id)
        .unwrap_or_else(wwanlib_vendors::generic::generic);
    ModemWrapper::new(transport, record)
}
