//! Mock transport for deterministic testing of the protocol engine.
//!
//! [`MockPort`] implements the [`Transport`] trait with pre-loaded
//! command/response pairs plus an injection channel for unsolicited lines.
//! This lets you test command framing, response parsing, retry policy, and
//! URC dispatch without real hardware.
//!
//! The port is cheaply cloneable and all clones share state: hand one clone
//! to the engine and keep another to script responses and inspect the sent
//! log mid-test.
//!
//! # Example
//!
//! ```
//! use wwanlib_test_harness::MockPort;
//!
//! let port = MockPort::new();
//! // Pre-load: when the engine sends this command, return this response.
//! port.expect_at("AT+CSQ", "\r\n+CSQ: 17,99\r\n\r\nOK\r\n");
//! // Push an unsolicited line the engine will pick up on an idle read.
//! port.inject(b"\r\n+CMTI: \"SM\",4\r\n");
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use wwanlib_core::error::{Error, Result};
use wwanlib_core::transport::Transport;

/// A pre-loaded command/response pair.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent.
    request: Vec<u8>,
    /// The bytes queued for reading when the matching request arrives.
    response: Vec<u8>,
}

#[derive(Debug, Default)]
struct Inner {
    expectations: VecDeque<Expectation>,
    read_queue: VecDeque<u8>,
    sent_log: Vec<Vec<u8>>,
    connected: bool,
}

/// A mock [`Transport`] for testing the protocol engine without hardware.
///
/// Expectations are consumed in order. When `send()` is called, the data is
/// recorded and matched against the next expectation; its scripted response
/// is appended to the read queue. A send with an empty expectation queue
/// succeeds and queues nothing, which is how tests script commands that get
/// no reply (timeout and cancellation paths). A send that does not match
/// the next expectation is an error.
#[derive(Debug, Clone)]
pub struct MockPort {
    inner: Arc<Mutex<Inner>>,
}

impl MockPort {
    /// Create a new mock port in the connected state.
    pub fn new() -> MockPort {
        MockPort {
            inner: Arc::new(Mutex::new(Inner {
                expectations: VecDeque::new(),
                read_queue: VecDeque::new(),
                sent_log: Vec::new(),
                connected: true,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicked test thread may poison the lock; the data is still
        // usable for the assertions that follow.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Add an expected raw request/response pair.
    pub fn expect(&self, request: &[u8], response: &[u8]) {
        self.lock().expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// Add an expected AT command (CR/LF appended, as the engine writes it)
    /// and the raw bytes the modem answers with.
    pub fn expect_at(&self, command: &str, response: &str) {
        let mut request = command.as_bytes().to_vec();
        request.extend_from_slice(b"\r\n");
        self.expect(&request, response.as_bytes());
    }

    /// Queue bytes for reading without any triggering send: unsolicited
    /// result codes, noise, late responses.
    pub fn inject(&self, data: &[u8]) {
        self.lock().read_queue.extend(data.iter().copied());
    }

    /// All data sent through this port, one element per `send()` call.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.lock().sent_log.clone()
    }

    /// The sent log as trimmed UTF-8 lines, for command-order assertions.
    pub fn sent_lines(&self) -> Vec<String> {
        self.lock()
            .sent_log
            .iter()
            .map(|bytes| String::from_utf8_lossy(bytes).trim_end().to_string())
            .collect()
    }

    /// The number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.lock().expectations.len()
    }

    /// Set the connected state. When `false`, subsequent `send()` and
    /// `receive()` calls return [`Error::NotConnected`].
    pub fn set_connected(&self, connected: bool) {
        self.lock().connected = connected;
    }
}

impl Default for MockPort {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockPort {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut inner = self.lock();
        if !inner.connected {
            return Err(Error::NotConnected);
        }
        inner.sent_log.push(data.to_vec());

        // No script left means: accept silently, reply with nothing. That
        // is how tests exercise the timeout and cancellation paths.
        if let Some(expectation) = inner.expectations.front() {
            if expectation.request != data {
                return Err(Error::Transport(format!(
                    "unexpected send: expected {:?}, got {:?}",
                    String::from_utf8_lossy(&expectation.request),
                    String::from_utf8_lossy(data)
                )));
            }
            if let Some(matched) = inner.expectations.pop_front() {
                inner.read_queue.extend(matched.response);
            }
        }
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        let mut inner = self.lock();
        if !inner.connected {
            return Err(Error::NotConnected);
        }
        if inner.read_queue.is_empty() {
            return Err(Error::Timeout);
        }
        let mut n = 0;
        while n < buf.len() {
            match inner.read_queue.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        let mut inner = self.lock();
        inner.connected = false;
        inner.read_queue.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn basic_send_receive() {
        let port = MockPort::new();
        port.expect_at("AT+CSQ", "\r\n+CSQ: 17,99\r\n\r\nOK\r\n");

        let mut handle = port.clone();
        handle.send(b"AT+CSQ\r\n").await.unwrap();

        let mut buf = [0u8; 64];
        let n = handle
            .receive(&mut buf, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"\r\n+CSQ: 17,99\r\n\r\nOK\r\n");
    }

    #[tokio::test]
    async fn tracks_sent_lines() {
        let port = MockPort::new();
        port.expect_at("ATZ", "\r\nOK\r\n");
        port.expect_at("ATE0", "\r\nOK\r\n");

        let mut handle = port.clone();
        handle.send(b"ATZ\r\n").await.unwrap();
        handle.send(b"ATE0\r\n").await.unwrap();

        assert_eq!(port.sent_lines(), vec!["ATZ", "ATE0"]);
        assert_eq!(port.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn wrong_data_errors() {
        let port = MockPort::new();
        port.expect_at("AT+CSQ", "\r\nOK\r\n");

        let mut handle = port.clone();
        let result = handle.send(b"AT+CPIN?\r\n").await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn unscripted_send_accepted_silently() {
        let port = MockPort::new();
        let mut handle = port.clone();
        handle.send(b"AT+CSQ\r\n").await.unwrap();

        let mut buf = [0u8; 8];
        let result = handle.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn inject_is_readable_without_send() {
        let port = MockPort::new();
        port.inject(b"\r\nRING\r\n");

        let mut handle = port.clone();
        let mut buf = [0u8; 16];
        let n = handle
            .receive(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"\r\nRING\r\n");
    }

    #[tokio::test]
    async fn partial_reads() {
        let port = MockPort::new();
        port.inject(b"ABCD");

        let mut handle = port.clone();
        let mut buf = [0u8; 2];
        let n = handle
            .receive(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"AB");
        let n = handle
            .receive(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"CD");
    }

    #[tokio::test]
    async fn disconnect_fails_io() {
        let port = MockPort::new();
        port.set_connected(false);
        assert!(!port.is_connected());

        let mut handle = port.clone();
        assert!(matches!(
            handle.send(b"AT\r\n").await,
            Err(Error::NotConnected)
        ));
        let mut buf = [0u8; 8];
        assert!(matches!(
            handle.receive(&mut buf, Duration::from_millis(10)).await,
            Err(Error::NotConnected)
        ));
    }
}
