//! The simple-connect state machine.
//!
//! One call takes a modem from freshly attached to a live data session:
//! authenticate, select the UCS2 charset, bring the radio up, apply band
//! and mode preferences, provision the APN, register, and bring the call
//! up through the record's connect hooks. Records without a dial hook
//! stop at a provisioned, registered modem and leave the call itself to
//! an external PPP dialer.

use std::time::Duration;

use tracing::debug;

use wwanlib_core::error::Result;
use wwanlib_core::types::{AllowedMode, Band, ModemStatus};

use crate::statem::{AuthMachine, NetRegMachine};
use crate::wrapper::{fill, ModemWrapper};

/// Deadline for the session-auth and dial commands.
const DIAL_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything a connect attempt may need. All fields optional; defaults
/// mean "automatic" or "not configured".
#[derive(Debug, Clone, Default)]
pub struct ConnectSettings {
    /// Access point name. Skipped when absent (already provisioned).
    pub apn: Option<String>,
    /// Session credentials, for records with a session-auth hook.
    pub username: Option<String>,
    pub password: Option<String>,
    /// SIM credentials.
    pub pin: Option<String>,
    pub puk: Option<String>,
    /// Specific operator (MCC+MNC); automatic selection when absent.
    pub network_id: Option<String>,
    /// Band preference to apply before registering.
    pub band: Option<Band>,
    /// Mode preference to apply before registering.
    pub mode: Option<AllowedMode>,
}

enum State {
    Authenticate,
    SetCharset,
    ApplyRadioSettings,
    SetApn,
    WaitForRegistration,
    AuthenticateSession,
    BringUpCall,
    Done,
}

/// Drives the whole connect sequence against one modem.
pub struct SimpleConnectMachine<'a> {
    modem: &'a ModemWrapper,
    settings: ConnectSettings,
}

impl<'a> SimpleConnectMachine<'a> {
    pub fn new(modem: &'a ModemWrapper, settings: ConnectSettings) -> Self {
        SimpleConnectMachine { modem, settings }
    }

    /// Run to a connected (or externally dialable) state.
    pub async fn run(&self) -> Result<()> {
        let hooks = self.modem.capabilities().connect_hooks;
        let mut state = State::Authenticate;
        loop {
            state = match state {
                State::Authenticate => {
                    AuthMachine::new(
                        self.modem,
                        self.settings.pin.clone(),
                        self.settings.puk.clone(),
                    )
                    .run()
                    .await?;
                    State::SetCharset
                }
                State::SetCharset => {
                    // UCS2 for the whole session so operator and contact
                    // names survive non-Latin alphabets.
                    self.modem.set_charset("UCS2").await?;
                    State::ApplyRadioSettings
                }
                State::ApplyRadioSettings => {
                    self.modem.enable_radio(true).await?;
                    if let Some(band) = self.settings.band {
                        self.modem.set_band(band).await?;
                    }
                    if let Some(mode) = self.settings.mode {
                        self.modem.set_network_mode(mode).await?;
                    }
                    self.modem.set_status(ModemStatus::Enabled);
                    State::SetApn
                }
                State::SetApn => {
                    if let Some(apn) = self.settings.apn.as_deref() {
                        if hooks.charset_workaround {
                            // Firmwares that store the APN in the current
                            // charset would UCS2-mangle it; write it in IRA
                            // and restore the session charset afterwards.
                            let previous = self.modem.get_charset().await?;
                            self.modem.set_charset("IRA").await?;
                            let written = self.modem.set_apn(apn).await;
                            self.modem.set_charset(&previous).await?;
                            written?;
                        } else {
                            self.modem.set_apn(apn).await?;
                        }
                    }
                    State::WaitForRegistration
                }
                State::WaitForRegistration => {
                    NetRegMachine::new(self.modem, self.settings.network_id.clone())
                        .run()
                        .await?;
                    State::AuthenticateSession
                }
                State::AuthenticateSession => {
                    let credentials = self.settings.username.is_some()
                        || self.settings.password.is_some();
                    if let (Some(template), true) = (hooks.session_auth_template, credentials) {
                        let context = self.context_id().await;
                        let cmd = fill(
                            template,
                            &[
                                &context,
                                self.settings.username.as_deref().unwrap_or(""),
                                self.settings.password.as_deref().unwrap_or(""),
                            ],
                        );
                        self.modem.submit_ok(cmd, DIAL_TIMEOUT).await?;
                    }
                    State::BringUpCall
                }
                State::BringUpCall => {
                    self.modem.set_status(ModemStatus::Connecting);
                    match hooks.dial_template {
                        Some(template) => {
                            let context = self.context_id().await;
                            self.modem
                                .submit_ok(fill(template, &[&context]), DIAL_TIMEOUT)
                                .await?;
                            self.modem.set_status(ModemStatus::Connected);
                        }
                        None => {
                            // Provisioned and registered; the PPP dialer
                            // owns the call from here.
                            debug!("no dial hook, leaving the data call to an external dialer");
                            self.modem.set_status(ModemStatus::Registered);
                        }
                    }
                    State::Done
                }
                State::Done => return Ok(()),
            };
        }
    }

    /// The PDP context the connect hooks refer to: whatever `set_apn`
    /// chose this session, context 1 otherwise.
    async fn context_id(&self) -> String {
        self.modem.cached_context_id().await.unwrap_or(1).to_string()
    }
}
