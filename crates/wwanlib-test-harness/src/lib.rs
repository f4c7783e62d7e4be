//! wwanlib-test-harness: Mock transports and fixtures for testing wwanlib
//! without modem hardware.
//!
//! The main export is [`MockPort`], a scripted [`Transport`]
//! (wwanlib_core::Transport) with expectation matching, a sent log, and an
//! injection channel for unsolicited lines.

pub mod mock_port;

pub use mock_port::MockPort;
