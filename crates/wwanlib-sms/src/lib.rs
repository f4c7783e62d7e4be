//! wwanlib-sms: SMS payload handling.
//!
//! - [`pdu`] -- SUBMIT encoding (GSM-7 and UCS-2, with multipart splitting
//!   and concatenation headers) and DELIVER decoding
//! - [`assembly`] -- session-scoped reassembly of concatenated deliveries
//!
//! Nothing here talks to a port; this crate turns text into PDU hex and
//! back, and the modem layer moves the hex over the wire.

pub mod assembly;
pub mod pdu;

pub use assembly::{AssembledSms, AssemblyLayer};
pub use pdu::{decode_deliver, encode_submit, ConcatInfo, Deliver, PduPart};
