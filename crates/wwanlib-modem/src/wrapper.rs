//! The middleware wrapper: one typed operation per modem capability.
//!
//! [`ModemWrapper`] owns a session: it builds the response table (defaults
//! plus the record's overrides), spawns the protocol engine, and exposes
//! the device as async methods that build the AT string, submit it with the
//! expected-response name, and decode the fields into typed results.
//! Vendor divergence is resolved through the capability record's tables;
//! an absent table means the operation returns [`Error::Unsupported`]
//! without touching the device.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::sync::Mutex as SyncMutex;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::time::sleep;
use tracing::{debug, warn};

use wwanlib_at::protocol::CTRL_Z;
use wwanlib_at::{spawn_engine, AtCommand, AtQueue, Dispatcher, ResponseTable, ANY, OK};
use wwanlib_core::encoding::{looks_like_ucs2, pack_ucs2, unpack_ucs2};
use wwanlib_core::error::{DeviceError, Error, Result};
use wwanlib_core::events::ModemEvent;
use wwanlib_core::transport::Transport;
use wwanlib_core::types::{
    AllowedMode, ApnProfile, Band, Contact, ModemStatus, NetworkMode, NetworkOperator, PinStatus,
    RegistrationStatus, SimState, SmsMessage, SmsStatus,
};
use wwanlib_core::CapabilityRecord;
use wwanlib_sms::{decode_deliver, encode_submit, AssembledSms, AssemblyLayer};

/// Deadline for commands that hit the radio or the network.
const NETWORK_TIMEOUT: Duration = Duration::from_secs(30);
/// Deadline for a network scan, which can take minutes on a busy band.
const SCAN_TIMEOUT: Duration = Duration::from_secs(90);
/// How often to re-ask for the phonebook size while the SIM initializes.
const SIM_BUSY_DELAY: Duration = Duration::from_secs(2);
/// How many extra times to re-ask before giving up.
const SIM_BUSY_RETRIES: u32 = 3;

/// Identity strings reported by the firmware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareInfo {
    pub manufacturer: String,
    pub model: String,
    pub version: String,
}

/// A live modem session.
pub struct ModemWrapper {
    queue: AtQueue,
    table: Arc<ResponseTable>,
    caps: CapabilityRecord,
    event_tx: broadcast::Sender<ModemEvent>,
    sim: Mutex<SimState>,
    assembly: Mutex<AssemblyLayer>,
    status: SyncMutex<ModemStatus>,
    concat_ref: AtomicU8,
}

impl ModemWrapper {
    /// Attach to a modem: build the pattern table with the record's
    /// overrides, spawn the engine task, and hand back the wrapper.
    pub fn new(transport: Box<dyn Transport>, caps: CapabilityRecord) -> Result<ModemWrapper> {
        let mut table = ResponseTable::with_defaults();
        for (name, pattern) in caps.pattern_overrides {
            table.register(name, pattern)?;
        }
        let table = Arc::new(table);

        let (event_tx, _) = broadcast::channel(64);
        let dispatcher = Dispatcher::new(&caps, event_tx.clone())?;
        let engine = spawn_engine(transport, table.clone(), dispatcher, event_tx.clone());

        Ok(ModemWrapper {
            queue: engine.queue,
            table,
            caps,
            event_tx,
            sim: Mutex::new(SimState::default()),
            assembly: Mutex::new(AssemblyLayer::new()),
            status: SyncMutex::new(ModemStatus::Disabled),
            concat_ref: AtomicU8::new(1),
        })
    }

    /// Subscribe to the session's event stream.
    pub fn events(&self) -> broadcast::Receiver<ModemEvent> {
        self.event_tx.subscribe()
    }

    /// The capability record this session was attached with.
    pub fn capabilities(&self) -> &CapabilityRecord {
        &self.caps
    }

    /// Current lifecycle state.
    pub fn status(&self) -> ModemStatus {
        *self
            .status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn set_status(&self, status: ModemStatus) {
        let mut guard = self
            .status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = status;
    }

    pub(crate) async fn cached_context_id(&self) -> Option<u32> {
        self.sim.lock().await.apn_context_id
    }

    /// Submit a plain set command and require the empty `OK` response.
    pub(crate) async fn submit_ok(&self, text: String, timeout: Duration) -> Result<()> {
        self.queue
            .submit(AtCommand::new(text, OK).with_timeout(timeout))
            .await?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Identity
    // ---------------------------------------------------------------------

    pub async fn get_imei(&self) -> Result<String> {
        let outcome = self.queue.submit(AtCommand::new("AT+CGSN", "get_imei")).await?;
        Ok(outcome.fields.require("imei")?.to_string())
    }

    pub async fn get_imsi(&self) -> Result<String> {
        let outcome = self.queue.submit(AtCommand::new("AT+CIMI", "get_imsi")).await?;
        Ok(outcome.fields.require("imsi")?.to_string())
    }

    pub async fn get_manufacturer(&self) -> Result<String> {
        let outcome = self
            .queue
            .submit(AtCommand::new("AT+GMI", "get_manufacturer"))
            .await?;
        Ok(outcome.fields.require("manufacturer")?.to_string())
    }

    pub async fn get_model(&self) -> Result<String> {
        let outcome = self.queue.submit(AtCommand::new("AT+GMM", "get_model")).await?;
        Ok(outcome.fields.require("model")?.to_string())
    }

    pub async fn get_version(&self) -> Result<String> {
        let outcome = self.queue.submit(AtCommand::new("AT+GMR", "get_version")).await?;
        Ok(outcome.fields.require("version")?.to_string())
    }

    pub async fn get_hardware_info(&self) -> Result<HardwareInfo> {
        Ok(HardwareInfo {
            manufacturer: self.get_manufacturer().await?,
            model: self.get_model().await?,
            version: self.get_version().await?,
        })
    }

    // ---------------------------------------------------------------------
    // Charset
    // ---------------------------------------------------------------------

    pub async fn get_charset(&self) -> Result<String> {
        let outcome = self
            .queue
            .submit(AtCommand::new("AT+CSCS?", "get_charset"))
            .await?;
        let charset = outcome.fields.require("charset")?.to_string();
        self.sim.lock().await.charset = Some(charset.clone());
        Ok(charset)
    }

    pub async fn get_charsets(&self) -> Result<Vec<String>> {
        let outcome = self.queue.submit(AtCommand::new("AT+CSCS=?", ANY)).await?;
        Ok(self
            .table
            .match_each("get_charsets", &outcome.raw)
            .iter()
            .filter_map(|f| f.get("charset").map(str::to_string))
            .collect())
    }

    pub async fn set_charset(&self, charset: &str) -> Result<()> {
        self.submit_ok(format!("AT+CSCS=\"{charset}\""), wwanlib_at::DEFAULT_TIMEOUT)
            .await?;
        self.sim.lock().await.charset = Some(charset.to_string());
        Ok(())
    }

    // ---------------------------------------------------------------------
    // PIN
    // ---------------------------------------------------------------------

    /// Query the SIM authentication state. PIN-required device errors are
    /// states here, not failures.
    pub async fn check_pin(&self) -> Result<PinStatus> {
        match self.queue.submit(AtCommand::new("AT+CPIN?", "check_pin")).await {
            Ok(outcome) => match outcome.fields.require("status")? {
                "READY" => Ok(PinStatus::Ready),
                "SIM PIN" => Ok(PinStatus::PinRequired),
                "SIM PUK" => Ok(PinStatus::PukRequired),
                "SIM PUK2" => Ok(PinStatus::Puk2Required),
                other => Err(Error::MalformedResponse {
                    raw: format!("+CPIN: {other}"),
                }),
            },
            Err(Error::Device(DeviceError::SimPinRequired)) => Ok(PinStatus::PinRequired),
            Err(Error::Device(DeviceError::SimPukRequired)) => Ok(PinStatus::PukRequired),
            Err(Error::Device(DeviceError::SimPuk2Required)) => Ok(PinStatus::Puk2Required),
            Err(e) => Err(e),
        }
    }

    pub async fn send_pin(&self, pin: &str) -> Result<()> {
        self.submit_ok(format!("AT+CPIN=\"{pin}\""), NETWORK_TIMEOUT).await
    }

    pub async fn send_puk(&self, puk: &str, new_pin: &str) -> Result<()> {
        self.submit_ok(format!("AT+CPIN=\"{puk}\",\"{new_pin}\""), NETWORK_TIMEOUT)
            .await
    }

    pub async fn enable_pin(&self, pin: &str, enable: bool) -> Result<()> {
        let flag = u8::from(enable);
        self.submit_ok(
            format!("AT+CLCK=\"SC\",{flag},\"{pin}\""),
            NETWORK_TIMEOUT,
        )
        .await
    }

    pub async fn change_pin(&self, old_pin: &str, new_pin: &str) -> Result<()> {
        self.submit_ok(
            format!("AT+CPWD=\"SC\",\"{old_pin}\",\"{new_pin}\""),
            NETWORK_TIMEOUT,
        )
        .await
    }

    /// Whether the PIN lock is enabled.
    pub async fn get_pin_status(&self) -> Result<bool> {
        let outcome = self
            .queue
            .submit(AtCommand::new("AT+CLCK=\"SC\",2", "get_pin_status"))
            .await?;
        Ok(outcome.fields.get_u32("enabled")? == 1)
    }

    // ---------------------------------------------------------------------
    // Radio & echo
    // ---------------------------------------------------------------------

    /// The raw `+CFUN` functionality level.
    pub async fn get_radio_status(&self) -> Result<u32> {
        let outcome = self
            .queue
            .submit(AtCommand::new("AT+CFUN?", "get_radio_status"))
            .await?;
        outcome.fields.get_u32("status")
    }

    /// Turn the radio on or off, skipping the command when the device is
    /// already in the requested state (some firmwares reset on a redundant
    /// `+CFUN` write).
    pub async fn enable_radio(&self, enable: bool) -> Result<()> {
        let desired: u32 = if enable { 1 } else { 0 };
        if self.get_radio_status().await? == desired {
            debug!(desired, "radio already in requested state");
            return Ok(());
        }
        self.submit_ok(format!("AT+CFUN={desired}"), NETWORK_TIMEOUT).await
    }

    pub async fn disable_echo(&self) -> Result<()> {
        self.submit_ok("ATE0".to_string(), wwanlib_at::DEFAULT_TIMEOUT).await
    }

    pub async fn enable_echo(&self) -> Result<()> {
        self.submit_ok("ATE1".to_string(), wwanlib_at::DEFAULT_TIMEOUT).await
    }

    // ---------------------------------------------------------------------
    // Registration
    // ---------------------------------------------------------------------

    pub async fn get_netreg_status(&self) -> Result<RegistrationStatus> {
        let outcome = self
            .queue
            .submit(AtCommand::new("AT+CREG?", "get_netreg_status"))
            .await?;
        Ok(RegistrationStatus::from_creg(
            outcome.fields.get_u32("status")?,
        ))
    }

    /// Register with a specific operator (MCC+MNC), or automatically when
    /// `netid` is `None`.
    pub async fn register_with_netid(&self, netid: Option<&str>) -> Result<()> {
        let cmd = match netid {
            Some(id) => format!("AT+COPS=1,2,\"{id}\""),
            None => "AT+COPS=0".to_string(),
        };
        self.submit_ok(cmd, NETWORK_TIMEOUT).await
    }

    /// The operator currently serving the modem.
    pub async fn get_network_info(&self) -> Result<NetworkOperator> {
        let outcome = self
            .queue
            .submit(AtCommand::new("AT+COPS?", "get_network_info"))
            .await?;
        let Some(raw) = outcome.fields.get("operator") else {
            return Err(Error::Device(DeviceError::NoNetwork));
        };
        let name = decode_operator(raw);
        if name.is_empty() || name == "Limited Service" {
            return Err(Error::Device(DeviceError::NoNetwork));
        }
        let numeric = outcome
            .fields
            .get("format")
            .map(|f| f == "2")
            .unwrap_or(false);
        Ok(NetworkOperator {
            netid: numeric.then(|| name.clone()),
            name,
        })
    }

    /// Registration status plus the serving operator when registered.
    pub async fn get_netreg_info(
        &self,
    ) -> Result<(RegistrationStatus, Option<NetworkOperator>)> {
        let status = self.get_netreg_status().await?;
        if !status.is_registered() {
            return Ok((status, None));
        }
        match self.get_network_info().await {
            Ok(operator) => Ok((status, Some(operator))),
            Err(Error::Device(DeviceError::NoNetwork)) => Ok((status, None)),
            Err(e) => Err(e),
        }
    }

    /// Scan for visible operators. Slow; the deadline is generous.
    pub async fn get_network_names(&self) -> Result<Vec<NetworkOperator>> {
        let outcome = self
            .queue
            .submit(AtCommand::new("AT+COPS=?", ANY).with_timeout(SCAN_TIMEOUT))
            .await?;
        let mut operators = Vec::new();
        for entry in self.table.match_each("get_network_names", &outcome.raw) {
            operators.push(NetworkOperator {
                name: decode_operator(entry.require("long")?),
                netid: entry.get("netid").map(str::to_string),
            });
        }
        Ok(operators)
    }

    // ---------------------------------------------------------------------
    // Signal
    // ---------------------------------------------------------------------

    /// Signal strength in the scale the record's query reports (`+CSQ`
    /// units unless the record overrides the query).
    pub async fn get_signal_quality(&self) -> Result<u32> {
        let cmd = self.caps.get_signal_cmd.unwrap_or("AT+CSQ");
        let outcome = self
            .queue
            .submit(AtCommand::new(cmd, "get_signal_quality"))
            .await?;
        outcome.fields.get_u32("rssi")
    }

    // ---------------------------------------------------------------------
    // Band & mode, through the capability record's tables
    // ---------------------------------------------------------------------

    /// All bands the record can express.
    pub fn get_bands(&self) -> Result<Band> {
        let bands = self.caps.supported_bands();
        if bands.is_empty() {
            return Err(Error::Unsupported("band selection".into()));
        }
        Ok(bands)
    }

    pub async fn get_band(&self) -> Result<Band> {
        let cmd = self
            .caps
            .get_band_cmd
            .ok_or_else(|| Error::Unsupported("band selection".into()))?;
        let outcome = self.queue.submit(AtCommand::new(cmd, "get_band")).await?;
        let code = outcome.fields.require("band")?;
        self.caps
            .band_from_vendor(code)
            .ok_or_else(|| Error::MalformedResponse {
                raw: format!("unknown band code {code:?}"),
            })
    }

    pub async fn set_band(&self, band: Band) -> Result<()> {
        let template = self
            .caps
            .set_band_cmd
            .ok_or_else(|| Error::Unsupported("band selection".into()))?;
        let code = self
            .caps
            .band_to_vendor(band)
            .ok_or_else(|| Error::InvalidParameter(format!("band {band:?} not expressible")))?;
        self.submit_ok(fill(template, &[code]), NETWORK_TIMEOUT).await
    }

    /// All mode preferences the record can express.
    pub fn get_network_modes(&self) -> Result<Vec<AllowedMode>> {
        let modes = self.caps.supported_modes();
        if modes.is_empty() {
            return Err(Error::Unsupported("mode selection".into()));
        }
        Ok(modes)
    }

    pub async fn get_network_mode(&self) -> Result<NetworkMode> {
        let cmd = self
            .caps
            .get_mode_cmd
            .ok_or_else(|| Error::Unsupported("mode selection".into()))?;
        let outcome = self.queue.submit(AtCommand::new(cmd, "get_mode")).await?;
        let token = outcome.fields.require("mode")?;
        self.caps
            .mode_from_vendor(token)
            .ok_or_else(|| Error::MalformedResponse {
                raw: format!("unknown mode report {token:?}"),
            })
    }

    pub async fn set_network_mode(&self, mode: AllowedMode) -> Result<()> {
        let template = self
            .caps
            .set_mode_cmd
            .ok_or_else(|| Error::Unsupported("mode selection".into()))?;
        let arg = self
            .caps
            .mode_to_vendor(mode)
            .ok_or_else(|| Error::InvalidParameter(format!("mode {mode:?} not expressible")))?;
        self.submit_ok(fill(template, &[arg]), NETWORK_TIMEOUT).await
    }

    // ---------------------------------------------------------------------
    // APN profiles
    // ---------------------------------------------------------------------

    pub async fn get_apns(&self) -> Result<Vec<ApnProfile>> {
        let outcome = self.queue.submit(AtCommand::new("AT+CGDCONT?", ANY)).await?;
        let mut profiles = Vec::new();
        for entry in self.table.match_each("get_apns", &outcome.raw) {
            profiles.push(ApnProfile {
                context_id: entry.get_u32("context")?,
                apn: entry.require("apn")?.to_string(),
            });
        }
        Ok(profiles)
    }

    /// Configure the APN, reusing an existing context when the APN is
    /// already provisioned. Returns the context id and caches it for the
    /// connect sequence.
    pub async fn set_apn(&self, apn: &str) -> Result<u32> {
        let profiles = self.get_apns().await?;
        if let Some(existing) = profiles.iter().find(|p| p.apn == apn) {
            debug!(context = existing.context_id, "reusing provisioned APN context");
            self.sim.lock().await.apn_context_id = Some(existing.context_id);
            return Ok(existing.context_id);
        }
        let context = profiles.iter().map(|p| p.context_id).max().unwrap_or(0) + 1;
        self.submit_ok(
            format!("AT+CGDCONT={context},\"IP\",\"{apn}\""),
            wwanlib_at::DEFAULT_TIMEOUT,
        )
        .await?;
        self.sim.lock().await.apn_context_id = Some(context);
        Ok(context)
    }

    // ---------------------------------------------------------------------
    // Contacts
    // ---------------------------------------------------------------------

    /// Highest phonebook index, cached per session. Freshly powered SIMs
    /// answer "SIM busy" for a while; bounded retry covers that window.
    pub async fn get_phonebook_size(&self) -> Result<u16> {
        if let Some(size) = self.sim.lock().await.phonebook_size {
            return Ok(size);
        }
        let mut attempts = 0;
        loop {
            match self
                .queue
                .submit(AtCommand::new("AT+CPBR=?", "get_phonebook_size"))
                .await
            {
                Ok(outcome) => {
                    let size = outcome.fields.get_u32("size")?;
                    let size = u16::try_from(size).map_err(|_| Error::MalformedResponse {
                        raw: format!("phonebook size {size} out of range"),
                    })?;
                    self.sim.lock().await.phonebook_size = Some(size);
                    return Ok(size);
                }
                Err(Error::Device(DeviceError::SimBusy)) if attempts < SIM_BUSY_RETRIES => {
                    attempts += 1;
                    debug!(attempts, "SIM busy, retrying phonebook size query");
                    sleep(SIM_BUSY_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn list_contacts(&self) -> Result<Vec<Contact>> {
        let size = self.get_phonebook_size().await?;
        let outcome = self
            .queue
            .submit(AtCommand::new(format!("AT+CPBR=1,{size}"), ANY).with_timeout(NETWORK_TIMEOUT))
            .await?;
        self.table
            .match_each("list_contacts", &outcome.raw)
            .iter()
            .map(contact_from_entry)
            .collect()
    }

    pub async fn get_contact(&self, index: u16) -> Result<Contact> {
        let outcome = self
            .queue
            .submit(AtCommand::new(format!("AT+CPBR={index}"), ANY))
            .await?;
        match self.table.match_response("list_contacts", &outcome.raw) {
            Some(entry) => contact_from_entry(&entry),
            None => Err(Error::Device(DeviceError::NotFound)),
        }
    }

    /// Store a contact. An explicit index overwrites that slot; without
    /// one, the lowest free index is allocated from the listing.
    pub async fn add_contact(&self, contact: &Contact) -> Result<u16> {
        let index = match contact.index {
            Some(index) => index,
            None => {
                let size = self.get_phonebook_size().await?;
                let used: Vec<u16> = self
                    .list_contacts()
                    .await?
                    .iter()
                    .filter_map(|c| c.index)
                    .collect();
                (1..=size)
                    .find(|i| !used.contains(i))
                    .ok_or(Error::Device(DeviceError::MemoryFull))?
            }
        };
        let category = if contact.number.starts_with('+') { 145 } else { 129 };
        let name = self.encode_text(&contact.name).await;
        self.submit_ok(
            format!(
                "AT+CPBW={index},\"{}\",{category},\"{name}\"",
                contact.number
            ),
            NETWORK_TIMEOUT,
        )
        .await?;
        Ok(index)
    }

    pub async fn delete_contact(&self, index: u16) -> Result<()> {
        self.submit_ok(format!("AT+CPBW={index}"), NETWORK_TIMEOUT).await
    }

    pub async fn find_contacts(&self, pattern: &str) -> Result<Vec<Contact>> {
        let pattern = self.encode_text(pattern).await;
        let outcome = self
            .queue
            .submit(
                AtCommand::new(format!("AT+CPBF=\"{pattern}\""), ANY)
                    .with_timeout(NETWORK_TIMEOUT),
            )
            .await?;
        self.table
            .match_each("find_contacts", &outcome.raw)
            .iter()
            .map(contact_from_entry)
            .collect()
    }

    /// Encode text for the wire when the session charset is UCS2.
    async fn encode_text(&self, text: &str) -> String {
        match self.sim.lock().await.charset.as_deref() {
            Some("UCS2") => pack_ucs2(text),
            _ => text.to_string(),
        }
    }

    // ---------------------------------------------------------------------
    // SMSC & SMS
    // ---------------------------------------------------------------------

    pub async fn get_smsc(&self) -> Result<String> {
        let outcome = self.queue.submit(AtCommand::new("AT+CSCA?", "get_smsc")).await?;
        Ok(outcome.fields.require("smsc")?.to_string())
    }

    pub async fn set_smsc(&self, smsc: &str) -> Result<()> {
        self.submit_ok(format!("AT+CSCA=\"{smsc}\""), wwanlib_at::DEFAULT_TIMEOUT)
            .await
    }

    /// The `+CMGF` message format (0 = PDU, 1 = text).
    pub async fn get_sms_format(&self) -> Result<u32> {
        let outcome = self
            .queue
            .submit(AtCommand::new("AT+CMGF?", "get_sms_format"))
            .await?;
        outcome.fields.get_u32("format")
    }

    pub async fn set_sms_format(&self, format: u32) -> Result<()> {
        self.submit_ok(format!("AT+CMGF={format}"), wwanlib_at::DEFAULT_TIMEOUT)
            .await
    }

    /// Send an SMS, splitting into concatenated parts as needed. Parts go
    /// out in order; a failed part aborts the rest. Returns the message
    /// reference of each sent part.
    pub async fn send_sms(&self, recipient: &str, text: &str) -> Result<Vec<u32>> {
        self.submit_pdus(recipient, text, "AT+CMGS", "send_sms").await
    }

    /// Store an SMS without sending. Returns the storage index of each
    /// part.
    pub async fn save_sms(&self, recipient: &str, text: &str) -> Result<Vec<u32>> {
        self.submit_pdus(recipient, text, "AT+CMGW", "save_sms").await
    }

    async fn submit_pdus(
        &self,
        recipient: &str,
        text: &str,
        command: &str,
        expected: &'static str,
    ) -> Result<Vec<u32>> {
        let reference = self.concat_ref.fetch_add(1, Ordering::Relaxed);
        let parts = encode_submit(recipient, text, reference)?;
        let mut results = Vec::with_capacity(parts.len());
        for part in parts {
            let mut payload = part.hex.into_bytes();
            payload.push(CTRL_Z);
            let outcome = self
                .queue
                .submit(
                    AtCommand::new(format!("{command}={}", part.len), expected)
                        .with_timeout(NETWORK_TIMEOUT)
                        .with_payload(payload),
                )
                .await?;
            results.push(outcome.fields.get_u32("index")?);
        }
        Ok(results)
    }

    pub async fn send_sms_from_storage(&self, index: u32) -> Result<u32> {
        let outcome = self
            .queue
            .submit(
                AtCommand::new(format!("AT+CMSS={index}"), "send_sms_from_storage")
                    .with_timeout(NETWORK_TIMEOUT),
            )
            .await?;
        outcome.fields.get_u32("index")
    }

    pub async fn delete_sms(&self, index: u32) -> Result<()> {
        self.submit_ok(format!("AT+CMGD={index}"), wwanlib_at::DEFAULT_TIMEOUT)
            .await
    }

    /// List stored messages. Concatenated deliveries are reassembled into
    /// one message; fragments whose siblings are not in storage are
    /// surfaced individually. Entries that do not decode as DELIVER PDUs
    /// (e.g. stored submissions) are skipped with a warning.
    pub async fn list_sms(&self) -> Result<Vec<SmsMessage>> {
        let outcome = self
            .queue
            .submit(AtCommand::new("AT+CMGL=4", ANY).with_timeout(NETWORK_TIMEOUT))
            .await?;
        let mut layer = AssemblyLayer::new();
        let mut statuses = std::collections::HashMap::new();
        let mut messages = Vec::new();
        for entry in self.table.match_each("list_sms", &outcome.raw) {
            let index = entry.get_u32("index")?;
            let status = SmsStatus::from_stat(entry.get_u32("status")?);
            statuses.insert(index, status);
            let deliver = match decode_deliver(entry.require("pdu")?) {
                Ok(deliver) => deliver,
                Err(e) => {
                    warn!(index, error = %e, "skipping undecodable stored PDU");
                    continue;
                }
            };
            if let Some(assembled) = layer.push(index, deliver) {
                messages.push(message_from(assembled, &statuses, status));
            }
        }
        for (index, part) in layer.drain() {
            let status = statuses
                .get(&index)
                .copied()
                .unwrap_or(SmsStatus::ReceivedRead);
            messages.push(SmsMessage {
                index,
                number: part.sender,
                text: part.text,
                status,
                timestamp: Some(part.scts),
            });
        }
        Ok(messages)
    }

    /// Read one stored message. A concatenated part is buffered in the
    /// session assembly layer; `None` means the part is waiting for its
    /// siblings and the complete message will surface once the last part
    /// is read.
    pub async fn get_sms(&self, index: u32) -> Result<Option<SmsMessage>> {
        let outcome = self
            .queue
            .submit(AtCommand::new(format!("AT+CMGR={index}"), ANY))
            .await?;
        let entry = self
            .table
            .match_response("get_sms", &outcome.raw)
            .ok_or(Error::Device(DeviceError::NotFound))?;
        let status = SmsStatus::from_stat(entry.get_u32("status")?);
        let deliver = decode_deliver(entry.require("pdu")?)?;
        let mut layer = self.assembly.lock().await;
        Ok(layer.push(index, deliver).map(|assembled| SmsMessage {
            index: assembled.indices[0],
            number: assembled.sender,
            text: assembled.text,
            status,
            timestamp: Some(assembled.scts),
        }))
    }

    // ---------------------------------------------------------------------
    // Session teardown & raw access
    // ---------------------------------------------------------------------

    /// Tear the data call down through the record's hangup hook.
    pub async fn disconnect(&self) -> Result<()> {
        let Some(template) = self.caps.connect_hooks.hangup_template else {
            return Err(Error::Unsupported(
                "data call is owned by an external dialer".into(),
            ));
        };
        self.set_status(ModemStatus::Disconnecting);
        self.submit_ok(template.to_string(), NETWORK_TIMEOUT).await?;
        self.assembly.lock().await.clear();
        self.set_status(ModemStatus::Registered);
        Ok(())
    }

    /// Escape hatch: submit a raw AT command and return the data lines.
    pub async fn send_at(&self, command: &str) -> Result<String> {
        let outcome = self.queue.submit(AtCommand::new(command, ANY)).await?;
        Ok(outcome.raw)
    }
}

/// Fill a command template's `{}` placeholders positionally.
pub(crate) fn fill(template: &str, args: &[&str]) -> String {
    let mut out = template.to_string();
    for arg in args {
        out = out.replacen("{}", arg, 1);
    }
    out
}

fn decode_operator(raw: &str) -> String {
    if looks_like_ucs2(raw) {
        unpack_ucs2(raw).unwrap_or_else(|_| raw.to_string())
    } else {
        raw.to_string()
    }
}

fn contact_from_entry(entry: &wwanlib_at::Fields) -> Result<Contact> {
    let index = entry.get_u32("index")?;
    let index = u16::try_from(index).map_err(|_| Error::MalformedResponse {
        raw: format!("contact index {index} out of range"),
    })?;
    let name = entry.require("name")?;
    Ok(Contact {
        index: Some(index),
        name: decode_operator(name),
        number: entry.require("number")?.to_string(),
    })
}

fn message_from(
    assembled: AssembledSms,
    statuses: &std::collections::HashMap<u32, SmsStatus>,
    fallback: SmsStatus,
) -> SmsMessage {
    let status = statuses
        .get(&assembled.indices[0])
        .copied()
        .unwrap_or(fallback);
    SmsMessage {
        index: assembled.indices[0],
        number: assembled.sender,
        text: assembled.text,
        status,
        timestamp: Some(assembled.scts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wwanlib_test_harness::MockPort;
    use wwanlib_vendors::{generic, zte};

    fn attach(port: &MockPort) -> ModemWrapper {
        ModemWrapper::new(Box::new(port.clone()), generic::generic()).unwrap()
    }

    fn attach_zte(port: &MockPort) -> ModemWrapper {
        ModemWrapper::new(Box::new(port.clone()), zte::mf_series()).unwrap()
    }

    // ---------------------------------------------------------------
    // Identity & charset
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn imei_round_trip() {
        let port = MockPort::new();
        port.expect_at("AT+CGSN", "\r\n357123456789012\r\n\r\nOK\r\n");
        let modem = attach(&port);
        assert_eq!(modem.get_imei().await.unwrap(), "357123456789012");
    }

    #[tokio::test]
    async fn charsets_list() {
        let port = MockPort::new();
        port.expect_at(
            "AT+CSCS=?",
            "\r\n+CSCS: (\"IRA\",\"GSM\",\"UCS2\")\r\n\r\nOK\r\n",
        );
        let modem = attach(&port);
        assert_eq!(modem.get_charsets().await.unwrap(), ["IRA", "GSM", "UCS2"]);
    }

    // ---------------------------------------------------------------
    // PIN
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn check_pin_ready() {
        let port = MockPort::new();
        port.expect_at("AT+CPIN?", "\r\n+CPIN: READY\r\n\r\nOK\r\n");
        let modem = attach(&port);
        assert_eq!(modem.check_pin().await.unwrap(), PinStatus::Ready);
    }

    #[tokio::test]
    async fn check_pin_converts_device_error_to_state() {
        let port = MockPort::new();
        port.expect_at("AT+CPIN?", "\r\n+CME ERROR: 11\r\n");
        let modem = attach(&port);
        assert_eq!(modem.check_pin().await.unwrap(), PinStatus::PinRequired);
    }

    #[tokio::test]
    async fn check_pin_propagates_other_errors() {
        let port = MockPort::new();
        port.expect_at("AT+CPIN?", "\r\n+CME ERROR: 10\r\n");
        let modem = attach(&port);
        match modem.check_pin().await {
            Err(Error::Device(DeviceError::SimNotInserted)) => {}
            other => panic!("expected SimNotInserted, got {other:?}"),
        }
    }

    // ---------------------------------------------------------------
    // Radio
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn enable_radio_skips_when_already_on() {
        let port = MockPort::new();
        port.expect_at("AT+CFUN?", "\r\n+CFUN: 1\r\n\r\nOK\r\n");
        let modem = attach(&port);
        modem.enable_radio(true).await.unwrap();
        assert_eq!(port.sent_lines(), ["AT+CFUN?"]);
    }

    #[tokio::test]
    async fn enable_radio_turns_on_when_off() {
        let port = MockPort::new();
        port.expect_at("AT+CFUN?", "\r\n+CFUN: 0\r\n\r\nOK\r\n");
        port.expect_at("AT+CFUN=1", "\r\nOK\r\n");
        let modem = attach(&port);
        modem.enable_radio(true).await.unwrap();
        assert_eq!(port.remaining_expectations(), 0);
    }

    // ---------------------------------------------------------------
    // Registration & operator
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn ucs2_operator_name_is_normalized() {
        let port = MockPort::new();
        port.expect_at(
            "AT+COPS?",
            "\r\n+COPS: 0,0,\"0056006F006400610066006F006E0065\",2\r\n\r\nOK\r\n",
        );
        let modem = attach(&port);
        let operator = modem.get_network_info().await.unwrap();
        assert_eq!(operator.name, "Vodafone");
        assert_eq!(operator.netid, None);
    }

    #[tokio::test]
    async fn numeric_operator_reports_netid() {
        let port = MockPort::new();
        port.expect_at("AT+COPS?", "\r\n+COPS: 0,2,\"21401\",2\r\n\r\nOK\r\n");
        let modem = attach(&port);
        let operator = modem.get_network_info().await.unwrap();
        assert_eq!(operator.netid.as_deref(), Some("21401"));
    }

    #[tokio::test]
    async fn unregistered_operator_is_no_network() {
        let port = MockPort::new();
        port.expect_at("AT+COPS?", "\r\n+COPS: 0\r\n\r\nOK\r\n");
        let modem = attach(&port);
        match modem.get_network_info().await {
            Err(Error::Device(DeviceError::NoNetwork)) => {}
            other => panic!("expected NoNetwork, got {other:?}"),
        }
    }

    // ---------------------------------------------------------------
    // Band & mode through the record
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn band_get_after_set_is_superset_consistent() {
        let port = MockPort::new();
        port.expect_at("AT+ZBANDI=2", "\r\nOK\r\n");
        port.expect_at("AT+ZBANDI?", "\r\n+ZBANDI: 2\r\n\r\nOK\r\n");
        let modem = attach_zte(&port);

        modem.set_band(Band::U2100).await.unwrap();
        let readback = modem.get_band().await.unwrap();
        // The fold is lossy: the readback covers the request but is wider.
        assert!(readback.contains(Band::U2100));
        assert_ne!(readback, Band::U2100);
    }

    #[tokio::test]
    async fn band_ops_unsupported_without_a_table() {
        let port = MockPort::new();
        let modem = attach(&port);
        assert!(matches!(modem.get_bands(), Err(Error::Unsupported(_))));
        assert!(matches!(
            modem.set_band(Band::EGSM).await,
            Err(Error::Unsupported(_))
        ));
        assert!(port.sent_lines().is_empty());
    }

    #[tokio::test]
    async fn mode_set_uses_record_argument() {
        let port = MockPort::new();
        port.expect_at("AT+ZSNT=2,0,0", "\r\nOK\r\n");
        let modem = attach_zte(&port);
        modem.set_network_mode(AllowedMode::ThreeGOnly).await.unwrap();
        assert_eq!(port.remaining_expectations(), 0);
    }

    // ---------------------------------------------------------------
    // APN
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn set_apn_reuses_existing_context() {
        let port = MockPort::new();
        port.expect_at(
            "AT+CGDCONT?",
            "\r\n+CGDCONT: 1,\"IP\",\"other\",\"\",0,0\r\n+CGDCONT: 2,\"IP\",\"internet\",\"\",0,0\r\n\r\nOK\r\n",
        );
        let modem = attach(&port);
        assert_eq!(modem.set_apn("internet").await.unwrap(), 2);
        assert_eq!(port.sent_lines(), ["AT+CGDCONT?"]);
    }

    #[tokio::test]
    async fn set_apn_allocates_next_context() {
        let port = MockPort::new();
        port.expect_at(
            "AT+CGDCONT?",
            "\r\n+CGDCONT: 2,\"IP\",\"other\",\"\",0,0\r\n\r\nOK\r\n",
        );
        port.expect_at("AT+CGDCONT=3,\"IP\",\"internet\"", "\r\nOK\r\n");
        let modem = attach(&port);
        assert_eq!(modem.set_apn("internet").await.unwrap(), 3);
        assert_eq!(port.remaining_expectations(), 0);
    }

    // ---------------------------------------------------------------
    // Contacts
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn add_contact_takes_lowest_free_index() {
        let port = MockPort::new();
        port.expect_at("AT+CPBR=?", "\r\n+CPBR: (1-5),40,24\r\n\r\nOK\r\n");
        port.expect_at(
            "AT+CPBR=1,5",
            "\r\n+CPBR: 1,\"+34654123456\",145,\"Juan\"\r\n+CPBR: 2,\"666777888\",129,\"Eva\"\r\n+CPBR: 4,\"699112233\",129,\"Luz\"\r\n\r\nOK\r\n",
        );
        port.expect_at("AT+CPBW=3,\"666111222\",129,\"Ana\"", "\r\nOK\r\n");
        let modem = attach(&port);

        let index = modem
            .add_contact(&Contact {
                index: None,
                name: "Ana".into(),
                number: "666111222".into(),
            })
            .await
            .unwrap();
        assert_eq!(index, 3);
        assert_eq!(port.remaining_expectations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn phonebook_size_retries_while_sim_busy() {
        let port = MockPort::new();
        port.expect_at("AT+CPBR=?", "\r\n+CME ERROR: 14\r\n");
        port.expect_at("AT+CPBR=?", "\r\n+CME ERROR: 14\r\n");
        port.expect_at("AT+CPBR=?", "\r\n+CPBR: (1-250),40,24\r\n\r\nOK\r\n");
        let modem = attach(&port);
        assert_eq!(modem.get_phonebook_size().await.unwrap(), 250);
        // Cached: no further commands.
        assert_eq!(modem.get_phonebook_size().await.unwrap(), 250);
        assert_eq!(port.remaining_expectations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn phonebook_size_retry_exhaustion_propagates_sim_busy() {
        let port = MockPort::new();
        for _ in 0..4 {
            port.expect_at("AT+CPBR=?", "\r\n+CME ERROR: 14\r\n");
        }
        let modem = attach(&port);
        match modem.get_phonebook_size().await {
            Err(Error::Device(DeviceError::SimBusy)) => {}
            other => panic!("expected SimBusy, got {other:?}"),
        }
        assert_eq!(port.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn add_contact_encodes_name_when_charset_is_ucs2() {
        let port = MockPort::new();
        port.expect_at("AT+CSCS=\"UCS2\"", "\r\nOK\r\n");
        port.expect_at(
            "AT+CPBW=7,\"666111222\",129,\"0041006E0061\"",
            "\r\nOK\r\n",
        );
        let modem = attach(&port);
        modem.set_charset("UCS2").await.unwrap();
        let index = modem
            .add_contact(&Contact {
                index: Some(7),
                name: "Ana".into(),
                number: "666111222".into(),
            })
            .await
            .unwrap();
        assert_eq!(index, 7);
        assert_eq!(port.remaining_expectations(), 0);
    }

    // ---------------------------------------------------------------
    // SMS
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn multipart_send_returns_refs_in_order() {
        let text = "a".repeat(320); // 3 GSM-7 parts at 153 per part
        let parts = encode_submit("+34654123456", &text, 1).unwrap();
        assert_eq!(parts.len(), 3);

        let port = MockPort::new();
        for (i, part) in parts.iter().enumerate() {
            port.expect_at(&format!("AT+CMGS={}", part.len), "\r\n> ");
            let mut payload = part.hex.clone().into_bytes();
            payload.push(CTRL_Z);
            let response = format!("\r\n+CMGS: {}\r\n\r\nOK\r\n", i + 1);
            port.expect(&payload, response.as_bytes());
        }

        let modem = attach(&port);
        let refs = modem.send_sms("+34654123456", &text).await.unwrap();
        assert_eq!(refs, [1, 2, 3]);
        assert_eq!(port.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn multipart_send_aborts_on_part_failure() {
        let text = "a".repeat(320);
        let parts = encode_submit("+34654123456", &text, 1).unwrap();

        let port = MockPort::new();
        port.expect_at(&format!("AT+CMGS={}", parts[0].len), "\r\n> ");
        let mut payload = parts[0].hex.clone().into_bytes();
        payload.push(CTRL_Z);
        port.expect(&payload, b"\r\n+CMGS: 1\r\n\r\nOK\r\n");
        port.expect_at(&format!("AT+CMGS={}", parts[1].len), "\r\n+CMS ERROR: 500\r\n");

        let modem = attach(&port);
        assert!(modem.send_sms("+34654123456", &text).await.is_err());
        // The third part was never written.
        assert_eq!(port.remaining_expectations(), 0);
        assert_eq!(
            port.sent_lines()
                .iter()
                .filter(|l| l.starts_with("AT+CMGS"))
                .count(),
            2
        );
    }

    // "hola" as a plain DELIVER and as the first part of a 2-part set
    // (concat reference 0x2A); same sender and timestamp.
    const SINGLE: &str = "07914306073011F0040B914316709807F200007020312154328004E8373B0C";
    const FRAGMENT: &str =
        "07914306073011F0440B914316709807F20000702031215432800B0500032A0201D06F7618";

    #[tokio::test]
    async fn list_sms_surfaces_singles_and_orphan_fragments() {
        let port = MockPort::new();
        port.expect_at(
            "AT+CMGL=4",
            &format!(
                "\r\n+CMGL: 1,1,,{}\r\n{}\r\n+CMGL: 3,0,,{}\r\n{}\r\n\r\nOK\r\n",
                FRAGMENT.len() / 2 - 8,
                FRAGMENT,
                SINGLE.len() / 2 - 8,
                SINGLE
            ),
        );
        let modem = attach(&port);
        let messages = modem.list_sms().await.unwrap();
        // The single decodes complete; the fragment with no sibling in
        // storage surfaces alone instead of disappearing.
        assert_eq!(messages.len(), 2);
        let single = messages.iter().find(|m| m.index == 3).unwrap();
        assert_eq!(single.text, "hola");
        assert_eq!(single.number, "+34610789702");
        assert_eq!(single.status, SmsStatus::ReceivedUnread);
        let orphan = messages.iter().find(|m| m.index == 1).unwrap();
        assert_eq!(orphan.text, "hola");
        assert_eq!(orphan.status, SmsStatus::ReceivedRead);
    }

    #[tokio::test]
    async fn get_sms_buffers_fragment_until_siblings_arrive() {
        let port = MockPort::new();
        port.expect_at(
            "AT+CMGR=5",
            &format!(
                "\r\n+CMGR: 1,,{}\r\n{}\r\n\r\nOK\r\n",
                FRAGMENT.len() / 2 - 8,
                FRAGMENT
            ),
        );
        let modem = attach(&port);
        assert_eq!(modem.get_sms(5).await.unwrap(), None);
    }

    // ---------------------------------------------------------------
    // Raw access
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn send_at_returns_raw_lines() {
        let port = MockPort::new();
        port.expect_at("AT+XDATACHANNEL?", "\r\n+XDATACHANNEL: 1,2\r\n\r\nOK\r\n");
        let modem = attach(&port);
        assert_eq!(
            modem.send_at("AT+XDATACHANNEL?").await.unwrap(),
            "+XDATACHANNEL: 1,2"
        );
    }
}
