//! AT response line framing and final-token classification.
//!
//! AT responses are CR/LF-framed ASCII lines. A command transaction looks
//! like:
//!
//! ```text
//! AT+CSQ\r\n          (written; may be echoed back verbatim)
//! \r\n+CSQ: 17,99\r\n  (zero or more data lines)
//! \r\nOK\r\n           (final result token)
//! ```
//!
//! The one exception to line framing is the PDU continuation prompt: after
//! `AT+CMGS=<len>` the modem emits `> ` with no terminator and waits for
//! the hex PDU followed by Ctrl-Z. The scanner recognizes the bare prompt
//! as its own frame.
//!
//! Final tokens (`OK`, `ERROR`, `+CME ERROR: n`, `+CMS ERROR: n`,
//! `NO CARRIER`, `BUSY`) terminate the in-flight transaction; every other
//! line is either data for that transaction or an unsolicited result code.

use bytes::BytesMut;

use wwanlib_core::error::DeviceError;

/// The PDU continuation prompt, sent without a line terminator.
pub const PROMPT: &[u8] = b"> ";

/// Ctrl-Z, terminates a PDU payload after the prompt.
pub const CTRL_Z: u8 = 0x1A;

/// One frame scanned out of the receive stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete line, with the CR/LF terminator stripped. Never empty;
    /// blank lines are swallowed by the scanner.
    Line(String),
    /// The bare `> ` PDU continuation prompt.
    Prompt,
}

/// Incremental line scanner over the raw receive stream.
///
/// Bytes go in via [`push_bytes`](LineScanner::push_bytes); complete frames
/// come out via [`next_frame`](LineScanner::next_frame). Incomplete data
/// stays buffered for the next read cycle.
#[derive(Debug, Default)]
pub struct LineScanner {
    buf: BytesMut,
}

impl LineScanner {
    /// Create an empty scanner.
    pub fn new() -> LineScanner {
        LineScanner {
            buf: BytesMut::with_capacity(256),
        }
    }

    /// Append raw bytes from the transport.
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Scan the next complete frame, or `None` if more data is needed.
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            let term = self.buf.iter().position(|&b| b == b'\r' || b == b'\n');
            match term {
                Some(pos) => {
                    let raw = self.buf.split_to(pos + 1);
                    let line = String::from_utf8_lossy(&raw[..pos]);
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    return Some(Frame::Line(line.to_string()));
                }
                None => {
                    // No terminator. The only unterminated frame we accept
                    // is the PDU prompt.
                    if self.buf.as_ref() == PROMPT {
                        self.buf.clear();
                        return Some(Frame::Prompt);
                    }
                    return None;
                }
            }
        }
    }
}

/// Classification of a final result token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalStatus {
    /// `OK` -- the command succeeded.
    Ok,
    /// `ERROR` or a vendor error token with no code.
    Error,
    /// `+CME ERROR: <code>` -- mobile equipment error.
    CmeError(u32),
    /// `+CMS ERROR: <code>` -- SMS service error.
    CmsError(u32),
    /// `NO CARRIER` -- the call or data session dropped.
    NoCarrier,
    /// `BUSY` -- the called party is busy.
    Busy,
}

impl FinalStatus {
    /// The device error this final token resolves to, or `None` for
    /// [`FinalStatus::Ok`].
    pub fn into_device_error(self) -> Option<DeviceError> {
        match self {
            FinalStatus::Ok => None,
            FinalStatus::Error => Some(DeviceError::Generic),
            FinalStatus::CmeError(code) => Some(DeviceError::from_cme(code)),
            FinalStatus::CmsError(code) => Some(DeviceError::from_cms(code)),
            FinalStatus::NoCarrier => Some(DeviceError::NoCarrier),
            FinalStatus::Busy => Some(DeviceError::Generic),
        }
    }
}

/// Classify a line as a final result token, or `None` for a data line.
///
/// Some firmwares report `+CME ERROR` with a text description instead of a
/// numeric code; those classify as [`FinalStatus::Error`].
pub fn classify_final(line: &str) -> Option<FinalStatus> {
    match line {
        "OK" => return Some(FinalStatus::Ok),
        "ERROR" | "COMMAND NOT SUPPORT" => return Some(FinalStatus::Error),
        "NO CARRIER" => return Some(FinalStatus::NoCarrier),
        "BUSY" => return Some(FinalStatus::Busy),
        _ => {}
    }
    if let Some(rest) = line.strip_prefix("+CME ERROR:") {
        return Some(match rest.trim().parse::<u32>() {
            Ok(code) => FinalStatus::CmeError(code),
            Err(_) => FinalStatus::Error,
        });
    }
    if let Some(rest) = line.strip_prefix("+CMS ERROR:") {
        return Some(match rest.trim().parse::<u32>() {
            Ok(code) => FinalStatus::CmsError(code),
            Err(_) => FinalStatus::Error,
        });
    }
    None
}
