//! Network registration state machine.
//!
//! Issues the `+COPS` registration request and polls `+CREG` until the
//! modem reaches a registered state. Registration is asynchronous on the
//! device side; the machine bounds how long it is willing to wait and
//! treats an explicit denial as final.

use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use wwanlib_core::error::{DeviceError, Error, Result};
use wwanlib_core::types::{ModemStatus, RegistrationStatus};

use crate::wrapper::ModemWrapper;

/// Default number of `+CREG` polls before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
/// Default delay between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

enum State {
    Register,
    Poll { attempts: u32 },
}

/// Drives one modem to network registration.
pub struct NetRegMachine<'a> {
    modem: &'a ModemWrapper,
    netid: Option<String>,
    max_attempts: u32,
    poll_interval: Duration,
}

impl<'a> NetRegMachine<'a> {
    /// Automatic registration, or a specific operator when `netid`
    /// carries an MCC+MNC string.
    pub fn new(modem: &'a ModemWrapper, netid: Option<String>) -> Self {
        NetRegMachine {
            modem,
            netid,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the polling budget.
    pub fn with_polling(mut self, max_attempts: u32, poll_interval: Duration) -> Self {
        self.max_attempts = max_attempts;
        self.poll_interval = poll_interval;
        self
    }

    /// Run to a registered state. Returns the final status (home or
    /// roaming); denial and poll exhaustion are errors.
    pub async fn run(&self) -> Result<RegistrationStatus> {
        let mut state = State::Register;
        loop {
            state = match state {
                State::Register => {
                    self.modem
                        .register_with_netid(self.netid.as_deref())
                        .await?;
                    State::Poll { attempts: 0 }
                }
                State::Poll { attempts } => {
                    let status = self.modem.get_netreg_status().await?;
                    if status.is_registered() {
                        debug!(%status, attempts, "network registration complete");
                        self.modem.set_status(ModemStatus::Registered);
                        return Ok(status);
                    }
                    if status == RegistrationStatus::Denied {
                        return Err(Error::Device(DeviceError::NoNetwork));
                    }
                    let attempts = attempts + 1;
                    if attempts >= self.max_attempts {
                        return Err(Error::RetryExhausted(format!(
                            "not registered after {attempts} polls (last status: {status})"
                        )));
                    }
                    sleep(self.poll_interval).await;
                    State::Poll { attempts }
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wwanlib_test_harness::MockPort;
    use wwanlib_vendors::generic;

    fn attach(port: &MockPort) -> ModemWrapper {
        ModemWrapper::new(Box::new(port.clone()), generic::generic()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn registers_within_poll_budget() {
        let port = MockPort::new();
        port.expect_at("AT+COPS=0", "\r\nOK\r\n");
        port.expect_at("AT+CREG?", "\r\n+CREG: 0,2\r\n\r\nOK\r\n");
        port.expect_at("AT+CREG?", "\r\n+CREG: 0,2\r\n\r\nOK\r\n");
        port.expect_at("AT+CREG?", "\r\n+CREG: 0,1\r\n\r\nOK\r\n");
        let modem = attach(&port);

        let status = NetRegMachine::new(&modem, None)
            .with_polling(3, Duration::from_secs(3))
            .run()
            .await
            .unwrap();
        assert_eq!(status, RegistrationStatus::Home);
        assert_eq!(modem.status(), ModemStatus::Registered);
        assert_eq!(port.remaining_expectations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn specific_operator_uses_manual_selection() {
        let port = MockPort::new();
        port.expect_at("AT+COPS=1,2,\"21401\"", "\r\nOK\r\n");
        port.expect_at("AT+CREG?", "\r\n+CREG: 0,5\r\n\r\nOK\r\n");
        let modem = attach(&port);

        let status = NetRegMachine::new(&modem, Some("21401".into()))
            .run()
            .await
            .unwrap();
        assert_eq!(status, RegistrationStatus::Roaming);
    }

    #[tokio::test(start_paused = true)]
    async fn denial_is_final() {
        let port = MockPort::new();
        port.expect_at("AT+COPS=0", "\r\nOK\r\n");
        port.expect_at("AT+CREG?", "\r\n+CREG: 0,3\r\n\r\nOK\r\n");
        let modem = attach(&port);

        match NetRegMachine::new(&modem, None).run().await {
            Err(Error::Device(DeviceError::NoNetwork)) => {}
            other => panic!("expected NoNetwork, got {other:?}"),
        }
        // No further polls after the denial.
        assert_eq!(port.remaining_expectations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_budget_exhaustion_reports_last_status() {
        let port = MockPort::new();
        port.expect_at("AT+COPS=0", "\r\nOK\r\n");
        for _ in 0..3 {
            port.expect_at("AT+CREG?", "\r\n+CREG: 0,2\r\n\r\nOK\r\n");
        }
        let modem = attach(&port);

        match NetRegMachine::new(&modem, None)
            .with_polling(3, Duration::from_secs(3))
            .run()
            .await
        {
            Err(Error::RetryExhausted(msg)) => assert!(msg.contains("searching")),
            other => panic!("expected RetryExhausted, got {other:?}"),
        }
        assert_eq!(port.remaining_expectations(), 0);
    }
}
