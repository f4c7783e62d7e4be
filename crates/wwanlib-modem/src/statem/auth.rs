//! SIM authentication state machine.
//!
//! Drives the `+CPIN` exchange to the READY state: query the lock state,
//! supply the PIN or PUK when one is required, and wait out the firmware's
//! post-unlock settle window before anything else touches the SIM. A SIM
//! that answers "busy" right after power-on is polled with bounded retry.

use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use wwanlib_core::error::{DeviceError, Error, Result};
use wwanlib_core::types::{ModemStatus, PinStatus};

use crate::wrapper::ModemWrapper;

/// How many times to re-query a busy SIM before giving up.
const SIM_BUSY_ATTEMPTS: u32 = 5;
/// Delay between busy retries.
const SIM_BUSY_DELAY: Duration = Duration::from_secs(2);

enum State {
    CheckPin { busy_attempts: u32 },
    Settle,
    Done,
}

/// Runs the PIN/PUK exchange against one modem.
pub struct AuthMachine<'a> {
    modem: &'a ModemWrapper,
    pin: Option<String>,
    puk: Option<String>,
}

impl<'a> AuthMachine<'a> {
    pub fn new(modem: &'a ModemWrapper, pin: Option<String>, puk: Option<String>) -> Self {
        AuthMachine { modem, pin, puk }
    }

    /// Run to completion. On success the SIM is unlocked and the settle
    /// window has elapsed; the wrapper status is `Authenticated`.
    ///
    /// A required credential that was not supplied resolves the matching
    /// device error, so callers can prompt and retry.
    pub async fn run(&self) -> Result<()> {
        self.modem.set_status(ModemStatus::Authenticating);

        let mut state = State::CheckPin { busy_attempts: 0 };
        loop {
            state = match state {
                State::CheckPin { busy_attempts } => match self.modem.check_pin().await {
                    Ok(PinStatus::Ready) => State::Done,
                    Ok(PinStatus::PinRequired) => {
                        let pin = self
                            .pin
                            .as_deref()
                            .ok_or(Error::Device(DeviceError::SimPinRequired))?;
                        self.modem.send_pin(pin).await?;
                        State::Settle
                    }
                    Ok(PinStatus::PukRequired) => {
                        let (Some(puk), Some(pin)) = (self.puk.as_deref(), self.pin.as_deref())
                        else {
                            return Err(Error::Device(DeviceError::SimPukRequired));
                        };
                        // The PUK exchange sets the supplied PIN as the new one.
                        self.modem.send_puk(puk, pin).await?;
                        State::Settle
                    }
                    Ok(PinStatus::Puk2Required) => {
                        return Err(Error::Device(DeviceError::SimPuk2Required));
                    }
                    Err(Error::Device(DeviceError::SimBusy)) => {
                        if busy_attempts >= SIM_BUSY_ATTEMPTS {
                            return Err(Error::RetryExhausted(
                                "SIM stayed busy during authentication".into(),
                            ));
                        }
                        debug!(busy_attempts, "SIM busy, waiting before PIN re-query");
                        sleep(SIM_BUSY_DELAY).await;
                        State::CheckPin {
                            busy_attempts: busy_attempts + 1,
                        }
                    }
                    Err(e) => return Err(e),
                },
                State::Settle => {
                    // Firmwares accept the PIN and then spend seconds
                    // bringing the SIM application up; commands sent in
                    // that window fail or wedge the device.
                    let delay = self.modem.capabilities().auth_settle_delay;
                    debug!(?delay, "PIN accepted, waiting for SIM to settle");
                    sleep(delay).await;
                    State::Done
                }
                State::Done => {
                    self.modem.set_status(ModemStatus::Authenticated);
                    return Ok(());
                }
            };
        }
    }
}
