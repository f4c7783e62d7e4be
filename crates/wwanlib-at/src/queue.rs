//! The AT transaction engine.
//!
//! A modem's control port is a single shared channel: interleaving two
//! commands corrupts both. The engine serializes everything through one
//! background task that owns the transport exclusively. Commands arrive
//! over an `mpsc` channel and queue FIFO; at most one is in flight, and the
//! next is written only after the previous one resolves. Completions come
//! back over per-command `oneshot` channels; unsolicited lines go to the
//! [`Dispatcher`] and out the event broadcast channel.
//!
//! Per-command policy (deadline, bounded retry, PDU payload) rides along in
//! [`AtCommand`]; the engine enforces it in one place so callers never
//! implement their own timeouts.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use wwanlib_core::error::{Error, Result};
use wwanlib_core::events::ModemEvent;
use wwanlib_core::transport::Transport;

use crate::dispatcher::Dispatcher;
use crate::matcher::{Fields, ResponseTable};
use crate::protocol::{classify_final, Frame, LineScanner};

/// Default per-command deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// One AT command with its completion policy.
#[derive(Debug, Clone)]
pub struct AtCommand {
    /// The command text, without line terminator (e.g. `AT+CSQ`).
    pub text: String,
    /// Name of the response pattern that must match on `OK`.
    pub expected: &'static str,
    /// Deadline per attempt.
    pub timeout: Duration,
    /// How many times to retry in place after a timeout.
    pub max_retries: u32,
    /// Bytes written when the modem answers with the `> ` prompt
    /// (hex PDU + Ctrl-Z for `+CMGS`/`+CMGW`).
    pub payload: Option<Vec<u8>>,
}

impl AtCommand {
    /// A command with the default timeout, no retries, no payload.
    pub fn new(text: impl Into<String>, expected: &'static str) -> AtCommand {
        AtCommand {
            text: text.into(),
            expected,
            timeout: DEFAULT_TIMEOUT,
            max_retries: 0,
            payload: None,
        }
    }

    /// Override the per-attempt deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> AtCommand {
        self.timeout = timeout;
        self
    }

    /// Allow `retries` extra attempts after a timeout.
    pub fn with_retries(mut self, retries: u32) -> AtCommand {
        self.max_retries = retries;
        self
    }

    /// Attach a prompt payload.
    pub fn with_payload(mut self, payload: Vec<u8>) -> AtCommand {
        self.payload = Some(payload);
        self
    }
}

/// A resolved command: the extracted fields plus the raw data lines (joined
/// with `\n`) for callers that post-process list responses.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// Captures from the expected pattern.
    pub fields: Fields,
    /// The accumulated data lines, exactly as received.
    pub raw: String,
}

enum EngineMsg {
    Submit {
        id: u64,
        cmd: AtCommand,
        reply: oneshot::Sender<Result<CommandOutcome>>,
    },
    Cancel {
        id: u64,
    },
}

/// Cloneable handle to the engine task. All wrapper operations, state
/// machines, and pollers for one session share one `AtQueue`.
#[derive(Clone)]
pub struct AtQueue {
    msg_tx: mpsc::Sender<EngineMsg>,
    next_id: Arc<AtomicU64>,
}

/// An enqueued command that has not resolved yet. Hold it to cancel by id;
/// await [`wait`](PendingCommand::wait) for the outcome.
pub struct PendingCommand {
    id: u64,
    rx: oneshot::Receiver<Result<CommandOutcome>>,
}

impl PendingCommand {
    /// The id accepted by [`AtQueue::cancel`].
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the command to resolve.
    pub async fn wait(self) -> Result<CommandOutcome> {
        self.rx.await.unwrap_or(Err(Error::NotConnected))
    }
}

impl AtQueue {
    /// Queue a command without waiting for it.
    pub async fn enqueue(&self, cmd: AtCommand) -> Result<PendingCommand> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, rx) = oneshot::channel();
        self.msg_tx
            .send(EngineMsg::Submit { id, cmd, reply })
            .await
            .map_err(|_| Error::NotConnected)?;
        Ok(PendingCommand { id, rx })
    }

    /// Queue a command and wait for its outcome.
    pub async fn submit(&self, cmd: AtCommand) -> Result<CommandOutcome> {
        self.enqueue(cmd).await?.wait().await
    }

    /// Cancel a command by id.
    ///
    /// A queued command is removed (the order of the rest is untouched);
    /// an in-flight command resolves [`Error::Cancelled`] and the next
    /// queued command is written immediately. Unknown ids are ignored.
    pub async fn cancel(&self, id: u64) -> Result<()> {
        self.msg_tx
            .send(EngineMsg::Cancel { id })
            .await
            .map_err(|_| Error::NotConnected)
    }
}

/// Handle to the spawned engine.
pub struct EngineHandle {
    /// Submission handle, cloneable.
    pub queue: AtQueue,
    /// The engine task, for shutdown joins.
    pub task: JoinHandle<()>,
}

/// Spawn the engine task. The task owns the transport exclusively and runs
/// until every `AtQueue` clone is dropped or the transport fails.
pub fn spawn_engine(
    transport: Box<dyn Transport>,
    table: Arc<ResponseTable>,
    dispatcher: Dispatcher,
    event_tx: broadcast::Sender<ModemEvent>,
) -> EngineHandle {
    let (msg_tx, msg_rx) = mpsc::channel(32);
    let task = tokio::spawn(engine_loop(transport, table, dispatcher, event_tx, msg_rx));
    EngineHandle {
        queue: AtQueue {
            msg_tx,
            next_id: Arc::new(AtomicU64::new(1)),
        },
        task,
    }
}

struct Pending {
    id: u64,
    cmd: AtCommand,
    reply: Option<oneshot::Sender<Result<CommandOutcome>>>,
    /// Extra attempts consumed so far.
    attempts: u32,
    /// Accumulated data lines for this transaction.
    response: String,
    /// Whether this attempt's command bytes have been written.
    written: bool,
    payload_sent: bool,
    deadline: Instant,
}

impl Pending {
    fn new(id: u64, cmd: AtCommand, reply: oneshot::Sender<Result<CommandOutcome>>) -> Pending {
        Pending {
            id,
            cmd,
            reply: Some(reply),
            attempts: 0,
            response: String::new(),
            written: false,
            payload_sent: false,
            deadline: Instant::now(),
        }
    }

    fn resolve(&mut self, result: Result<CommandOutcome>) {
        if let Some(reply) = self.reply.take() {
            let _ = reply.send(result);
        }
    }
}

async fn engine_loop(
    mut transport: Box<dyn Transport>,
    table: Arc<ResponseTable>,
    dispatcher: Dispatcher,
    event_tx: broadcast::Sender<ModemEvent>,
    mut msg_rx: mpsc::Receiver<EngineMsg>,
) {
    let mut scanner = LineScanner::new();
    let mut queue: VecDeque<Pending> = VecDeque::new();

    let _ = event_tx.send(ModemEvent::Connected);

    loop {
        // Write the front command if this attempt has not been sent yet.
        // Everything behind it waits: one in flight, FIFO.
        if let Some(front) = queue.front_mut() {
            if !front.written {
                let mut bytes = front.cmd.text.clone().into_bytes();
                bytes.extend_from_slice(b"\r\n");
                debug!(
                    id = front.id,
                    cmd = %front.cmd.text,
                    attempt = front.attempts,
                    "writing command"
                );
                if let Err(e) = transport.send(&bytes).await {
                    fail_all(&mut queue, &e);
                    let _ = event_tx.send(ModemEvent::Disconnected);
                    break;
                }
                front.written = true;
                front.deadline = Instant::now() + front.cmd.timeout;
            }
        }

        let deadline = queue
            .front()
            .and_then(|p| p.written.then_some(p.deadline));

        tokio::select! {
            biased;

            msg = msg_rx.recv() => {
                match msg {
                    Some(EngineMsg::Submit { id, cmd, reply }) => {
                        debug!(id, cmd = %cmd.text, queued = queue.len(), "command queued");
                        queue.push_back(Pending::new(id, cmd, reply));
                    }
                    Some(EngineMsg::Cancel { id }) => {
                        cancel_command(&mut queue, id);
                    }
                    None => {
                        debug!("command channel closed, engine exiting");
                        break;
                    }
                }
            }

            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                if deadline.is_some() =>
            {
                if let Some(front) = queue.front_mut() {
                    if front.attempts < front.cmd.max_retries {
                        front.attempts += 1;
                        debug!(id = front.id, attempt = front.attempts, "command timed out, retrying");
                        front.response.clear();
                        front.written = false;
                        front.payload_sent = false;
                    } else if let Some(mut expired) = queue.pop_front() {
                        debug!(id = expired.id, "command timed out");
                        expired.resolve(Err(Error::Timeout));
                    }
                }
            }

            read = read_chunk(&mut *transport) => {
                match read {
                    Ok(data) => {
                        scanner.push_bytes(&data);
                        if let Err(e) =
                            process_frames(&mut *transport, &mut scanner, &mut queue, &table, &dispatcher).await
                        {
                            fail_all(&mut queue, &e);
                            let _ = event_tx.send(ModemEvent::Disconnected);
                            break;
                        }
                    }
                    Err(Error::Timeout) => {
                        // Idle; back off briefly so the select loop does not spin.
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                    Err(e) => {
                        warn!(error = %e, "transport failed, failing all pending commands");
                        fail_all(&mut queue, &e);
                        let _ = event_tx.send(ModemEvent::Disconnected);
                        break;
                    }
                }
            }
        }
    }
}

async fn read_chunk(transport: &mut dyn Transport) -> Result<Vec<u8>> {
    let mut buf = [0u8; 256];
    let n = transport.receive(&mut buf, Duration::from_millis(100)).await?;
    Ok(buf[..n].to_vec())
}

/// Drain complete frames out of the scanner, routing each line to the
/// in-flight transaction or the dispatcher. A transport error while
/// writing a prompt payload propagates up and kills the session.
async fn process_frames(
    transport: &mut dyn Transport,
    scanner: &mut LineScanner,
    queue: &mut VecDeque<Pending>,
    table: &ResponseTable,
    dispatcher: &Dispatcher,
) -> Result<()> {
    while let Some(frame) = scanner.next_frame() {
        match frame {
            Frame::Prompt => {
                let payload = queue.front_mut().and_then(|front| {
                    if front.written && !front.payload_sent {
                        front.payload_sent = true;
                        front.cmd.payload.clone()
                    } else {
                        None
                    }
                });
                match payload {
                    Some(bytes) => transport.send(&bytes).await?,
                    None => debug!("unexpected PDU prompt, ignoring"),
                }
            }
            Frame::Line(line) => handle_line(line, queue, table, dispatcher),
        }
    }
    Ok(())
}

fn handle_line(
    line: String,
    queue: &mut VecDeque<Pending>,
    table: &ResponseTable,
    dispatcher: &Dispatcher,
) {
    let in_flight = queue.front().map(|p| p.written).unwrap_or(false);
    if !in_flight {
        if !dispatcher.offer(&line) {
            debug!(%line, "unclassified line in idle read");
        }
        return;
    }

    if let Some(status) = classify_final(&line) {
        if let Some(mut done) = queue.pop_front() {
            match status.into_device_error() {
                None => {
                    let raw = std::mem::take(&mut done.response);
                    match table.match_response(done.cmd.expected, &raw) {
                        Some(fields) => {
                            debug!(id = done.id, "command resolved");
                            done.resolve(Ok(CommandOutcome { fields, raw }));
                        }
                        None => {
                            warn!(
                                id = done.id,
                                pattern = done.cmd.expected,
                                raw = %raw,
                                "response did not match expected pattern"
                            );
                            done.resolve(Err(Error::MalformedResponse { raw }));
                        }
                    }
                }
                Some(device_error) => {
                    debug!(id = done.id, error = %device_error, "command failed");
                    done.resolve(Err(Error::Device(device_error)));
                }
            }
        }
        return;
    }

    if let Some(front) = queue.front_mut() {
        // Command echo comes back verbatim when ATE0 has not run yet.
        if line == front.cmd.text {
            debug!(id = front.id, "echo consumed");
            return;
        }
        // Notifications interleave freely with response data; only lines
        // the capability record declares get pulled out of the stream.
        if dispatcher.recognizes(&line) {
            dispatcher.offer(&line);
            return;
        }
        if !front.response.is_empty() {
            front.response.push('\n');
        }
        front.response.push_str(&line);
    }
}

fn cancel_command(queue: &mut VecDeque<Pending>, id: u64) {
    if let Some(pos) = queue.iter().position(|p| p.id == id) {
        if let Some(mut cancelled) = queue.remove(pos) {
            debug!(id, in_flight = pos == 0, "command cancelled");
            cancelled.resolve(Err(Error::Cancelled));
        }
    } else {
        debug!(id, "cancel for unknown or already-resolved command");
    }
}

fn fail_all(queue: &mut VecDeque<Pending>, cause: &Error) {
    while let Some(mut pending) = queue.pop_front() {
        pending.resolve(Err(Error::Transport(cause.to_string())));
    }
}
