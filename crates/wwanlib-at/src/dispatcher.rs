//! Unsolicited result code (URC) dispatcher.
//!
//! Modems push state changes as unsolicited lines: standard 3GPP codes
//! (`+CMTI`, `RING`, `+CREG`) and vendor-prefixed ones (`^RSSI:18`,
//! `+ZPASR: "UMTS"`, `*ERINFO: 0,0,1`). The dispatcher classifies a line
//! with the capability record's grammar, looks the signal name up in the
//! record's translation map, and emits the translated [`ModemEvent`].
//!
//! A `None` translation means the signal is recognized and deliberately
//! ignored; an unknown signal is logged at debug and dropped. Neither is
//! an error: which notifications a model sends is declared capability
//! data, not something to discover at runtime.

use std::collections::HashMap;

use regex::Regex;
use tokio::sync::broadcast;
use tracing::debug;

use wwanlib_core::caps::{CapabilityRecord, SignalFn};
use wwanlib_core::error::{Error, Result};
use wwanlib_core::events::ModemEvent;
use wwanlib_core::types::RegistrationStatus;

/// Classifies idle lines and translates recognized signals into events.
pub struct Dispatcher {
    grammar: Regex,
    translations: HashMap<&'static str, Option<SignalFn>>,
    creg_urc: Regex,
    cmti_urc: Regex,
    event_tx: broadcast::Sender<ModemEvent>,
}

impl Dispatcher {
    /// Build a dispatcher for one capability record.
    ///
    /// Fails if the record's grammar does not compile or lacks the
    /// `signal`/`args` captures.
    pub fn new(
        caps: &CapabilityRecord,
        event_tx: broadcast::Sender<ModemEvent>,
    ) -> Result<Dispatcher> {
        let grammar = Regex::new(caps.async_grammar).map_err(|e| {
            Error::InvalidParameter(format!(
                "async grammar for {} {} does not compile: {e}",
                caps.vendor, caps.model
            ))
        })?;
        let has = |name| grammar.capture_names().flatten().any(|n| n == name);
        if !has("signal") || !has("args") {
            return Err(Error::InvalidParameter(format!(
                "async grammar for {} {} must capture 'signal' and 'args'",
                caps.vendor, caps.model
            )));
        }
        Ok(Dispatcher {
            grammar,
            translations: caps.signal_translations.iter().copied().collect(),
            // URC form of +CREG has a single status digit; the solicited
            // reply has a mode digit first and never matches this.
            creg_urc: Regex::new(r"^\+CREG:\s*(\d+)\s*$").map_err(bad_builtin)?,
            cmti_urc: Regex::new(r#"^\+CMTI:\s*"?\w*"?\s*,\s*(\d+)"#).map_err(bad_builtin)?,
            event_tx,
        })
    }

    /// Would this line be consumed as a notification?
    ///
    /// Used by the engine while a command is in flight: only recognized
    /// notifications are pulled out of the response stream, everything
    /// else accumulates as response data.
    pub fn recognizes(&self, line: &str) -> bool {
        if self.cmti_urc.is_match(line) || line == "RING" || line.starts_with("+CRING") {
            return true;
        }
        if let Some(caps) = self.grammar.captures(line) {
            if let Some(signal) = caps.name("signal") {
                return self.translations.contains_key(signal.as_str());
            }
        }
        false
    }

    /// Offer a line for classification. Returns `true` if it was consumed
    /// as a notification (whether translated, ignored, or unknown-vendor),
    /// `false` if it is not a notification at all.
    pub fn offer(&self, line: &str) -> bool {
        // Standard 3GPP notifications first.
        if let Some(caps) = self.cmti_urc.captures(line) {
            if let Some(index) = caps.get(1).and_then(|m| m.as_str().parse().ok()) {
                debug!(index, "new SMS notification");
                let _ = self.event_tx.send(ModemEvent::SmsReceived { index });
            }
            return true;
        }
        if line == "RING" || line.starts_with("+CRING") {
            debug!("incoming call notification");
            let _ = self.event_tx.send(ModemEvent::CallReceived);
            return true;
        }
        if let Some(caps) = self.creg_urc.captures(line) {
            if let Some(digit) = caps.get(1).and_then(|m| m.as_str().parse().ok()) {
                let status = RegistrationStatus::from_creg(digit);
                debug!(%status, "registration notification");
                let _ = self
                    .event_tx
                    .send(ModemEvent::RegistrationChanged { status });
            }
            return true;
        }

        // Vendor notifications, per the capability record.
        let Some(caps) = self.grammar.captures(line) else {
            return false;
        };
        let (Some(signal), Some(args)) = (caps.name("signal"), caps.name("args")) else {
            return false;
        };
        match self.translations.get(signal.as_str()) {
            Some(Some(translate)) => match translate(args.as_str()) {
                Some(event) => {
                    debug!(signal = signal.as_str(), "translated notification");
                    let _ = self.event_tx.send(event);
                }
                None => {
                    debug!(
                        signal = signal.as_str(),
                        args = args.as_str(),
                        "notification arguments did not parse"
                    );
                }
            },
            Some(None) => {
                debug!(signal = signal.as_str(), "ignoring declared notification");
            }
            None => {
                debug!(
                    signal = signal.as_str(),
                    args = args.as_str(),
                    "unknown notification, dropping"
                );
            }
        }
        true
    }
}

fn bad_builtin(e: regex::Error) -> Error {
    Error::InvalidParameter(format!("built-in notification pattern broken: {e}"))
}
