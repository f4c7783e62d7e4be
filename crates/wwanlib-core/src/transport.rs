//! Transport trait for modem communication.
//!
//! The [`Transport`] trait abstracts over the physical link to a modem's
//! AT control port. Implementations exist for USB serial ports
//! (`wwanlib-transport`) and scripted mocks for testing
//! (`wwanlib-test-harness`).
//!
//! The protocol engine in `wwanlib-at` owns a boxed `Transport` and is its
//! sole reader and writer; everything above the engine works with typed
//! commands, never raw bytes.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to a modem.
///
/// Implementations handle buffering and error recovery at the physical
/// layer. Line framing, echo, and final-token classification are the
/// protocol engine's concern.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the modem.
    ///
    /// Implementations should not return until all bytes have been handed
    /// to the underlying port.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the modem into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Waits up to `timeout` for
    /// data; returns [`Error::Timeout`](crate::error::Error::Timeout) if
    /// nothing arrives within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport.
    ///
    /// After `close()`, subsequent `send()` and `receive()` calls return
    /// [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
