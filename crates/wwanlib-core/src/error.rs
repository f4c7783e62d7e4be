//! Error types for wwanlib.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport failures, protocol errors,
//! device-reported AT error codes, and policy failures (retry exhaustion,
//! cancellation) are all captured here.

/// The error type for all wwanlib operations.
///
/// Variants cover the failure modes encountered when driving a mobile
/// broadband modem over a serial AT link: command timeouts, device-reported
/// `+CME`/`+CMS` error codes, unparseable responses, and transport loss.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No matching response arrived within the command's deadline.
    ///
    /// This typically indicates the modem is wedged, the port is wrong, or
    /// the command is not supported and the device stays silent.
    #[error("timeout waiting for response")]
    Timeout,

    /// The device reported an error code (`ERROR`, `+CME ERROR`, `+CMS ERROR`).
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// A response arrived but could not be parsed with the expected pattern.
    ///
    /// Treated like a device error by callers; the raw response text is
    /// carried for logging.
    #[error("malformed response: {raw:?}")]
    MalformedResponse {
        /// The raw response text that failed extraction.
        raw: String,
    },

    /// A transport-level failure (serial port gone, USB unplugged).
    ///
    /// Fatal for the session: every queued command fails with this error
    /// and the session must be torn down and recreated.
    #[error("transport error: {0}")]
    Transport(String),

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A bounded retry loop exceeded its attempt cap.
    #[error("retries exhausted: {0}")]
    RetryExhausted(String),

    /// The command was explicitly aborted by the caller.
    #[error("cancelled")]
    Cancelled,

    /// No connection to the modem has been established.
    #[error("not connected")]
    NotConnected,

    /// The operation is not supported by this modem model.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// An invalid parameter was passed to an operation.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// A device-reported AT error, decoded from a numeric `+CME ERROR` /
/// `+CMS ERROR` code or a bare `ERROR` final token.
///
/// Only the codes the middleware branches on get their own variant;
/// everything else is carried as [`DeviceError::Unknown`] with the raw code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// Bare `ERROR` final token with no code.
    #[error("generic device error")]
    Generic,

    /// Operation not allowed (CME 3).
    #[error("operation not allowed")]
    OperationNotAllowed,

    /// Operation not supported (CME 4).
    #[error("operation not supported")]
    OperationNotSupported,

    /// SIM not inserted (CME 10, CMS 310).
    #[error("SIM not inserted")]
    SimNotInserted,

    /// SIM PIN required (CME 11, CMS 311).
    #[error("SIM PIN required")]
    SimPinRequired,

    /// SIM PUK required (CME 12, CMS 316).
    #[error("SIM PUK required")]
    SimPukRequired,

    /// SIM failure (CME 13, CMS 313).
    #[error("SIM failure")]
    SimFailure,

    /// SIM busy (CME 14): the card is still initializing.
    #[error("SIM busy")]
    SimBusy,

    /// Incorrect password/PIN (CME 16).
    #[error("incorrect password")]
    IncorrectPassword,

    /// SIM PIN2 required (CME 17).
    #[error("SIM PIN2 required")]
    SimPin2Required,

    /// SIM PUK2 required (CME 18).
    #[error("SIM PUK2 required")]
    SimPuk2Required,

    /// Memory full (CME 20, CMS 322).
    #[error("memory full")]
    MemoryFull,

    /// Invalid index (CME 21, CMS 321).
    #[error("invalid index")]
    InvalidIndex,

    /// Not found (CME 22).
    #[error("not found")]
    NotFound,

    /// No network service (CME 30, CMS 331).
    #[error("no network service")]
    NoNetwork,

    /// The remote end dropped the carrier (`NO CARRIER` final token).
    #[error("no carrier")]
    NoCarrier,

    /// An error code without a dedicated variant.
    #[error("device error code {0}")]
    Unknown(u32),
}

impl DeviceError {
    /// Decode a `+CME ERROR: <code>` numeric code.
    pub fn from_cme(code: u32) -> DeviceError {
        match code {
            3 => DeviceError::OperationNotAllowed,
            4 => DeviceError::OperationNotSupported,
            10 => DeviceError::SimNotInserted,
            11 => DeviceError::SimPinRequired,
            12 => DeviceError::SimPukRequired,
            13 => DeviceError::SimFailure,
            14 => DeviceError::SimBusy,
            16 => DeviceError::IncorrectPassword,
            17 => DeviceError::SimPin2Required,
            18 => DeviceError::SimPuk2Required,
            20 => DeviceError::MemoryFull,
            21 => DeviceError::InvalidIndex,
            22 => DeviceError::NotFound,
            30 => DeviceError::NoNetwork,
            other => DeviceError::Unknown(other),
        }
    }

    /// Decode a `+CMS ERROR: <code>` numeric code (SMS service errors).
    pub fn from_cms(code: u32) -> DeviceError {
        match code {
            310 => DeviceError::SimNotInserted,
            311 => DeviceError::SimPinRequired,
            313 => DeviceError::SimFailure,
            314 => DeviceError::SimBusy,
            316 => DeviceError::SimPukRequired,
            321 => DeviceError::InvalidIndex,
            322 => DeviceError::MemoryFull,
            331 => DeviceError::NoNetwork,
            other => DeviceError::Unknown(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_timeout() {
        assert_eq!(Error::Timeout.to_string(), "timeout waiting for response");
    }

    #[test]
    fn error_display_transport() {
        let e = Error::Transport("port gone".into());
        assert_eq!(e.to_string(), "transport error: port gone");
    }

    #[test]
    fn error_display_device() {
        let e = Error::Device(DeviceError::SimPinRequired);
        assert_eq!(e.to_string(), "device error: SIM PIN required");
    }

    #[test]
    fn error_display_cancelled() {
        assert_eq!(Error::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn cme_codes_decode_to_typed_variants() {
        assert_eq!(DeviceError::from_cme(11), DeviceError::SimPinRequired);
        assert_eq!(DeviceError::from_cme(12), DeviceError::SimPukRequired);
        assert_eq!(DeviceError::from_cme(14), DeviceError::SimBusy);
        assert_eq!(DeviceError::from_cme(16), DeviceError::IncorrectPassword);
        assert_eq!(DeviceError::from_cme(21), DeviceError::InvalidIndex);
        assert_eq!(DeviceError::from_cme(22), DeviceError::NotFound);
        assert_eq!(DeviceError::from_cme(30), DeviceError::NoNetwork);
    }

    #[test]
    fn cme_unknown_code_is_carried() {
        assert_eq!(DeviceError::from_cme(99), DeviceError::Unknown(99));
    }

    #[test]
    fn cms_codes_decode_to_typed_variants() {
        assert_eq!(DeviceError::from_cms(311), DeviceError::SimPinRequired);
        assert_eq!(DeviceError::from_cms(322), DeviceError::MemoryFull);
        assert_eq!(DeviceError::from_cms(331), DeviceError::NoNetwork);
        assert_eq!(DeviceError::from_cms(500), DeviceError::Unknown(500));
    }

    #[test]
    fn device_error_converts_into_error() {
        let e: Error = DeviceError::NoNetwork.into();
        assert!(matches!(e, Error::Device(DeviceError::NoNetwork)));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
