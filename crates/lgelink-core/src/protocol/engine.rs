//! Engine
//!
//! Owns the command queue, the reply parser and the single pending deadline,
//! and moves one command at a time through send, acknowledge and settle.
//!
//! ```text
//!            dispatch                 OK, value matches
//!   Idle ─────────────▶ AwaitingReply ───────────────────▶ Idle (next entry)
//!                          │  ▲    │
//!      OK, value differs   │  │    │ NG / deadline passed
//!                          ▼  │    ▼
//!                 SettlePause─┘   Idle (queue discarded)
//!                    (resend on expiry)
//! ```

use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace};

use super::{
    channel::{LineChannel, SerialChannel},
    commands::{CommandIndex, Mnemonic},
    queue::{parse_codes, CommandQueue, QueueEntry},
    reply::{Progress, Reply, ReplyParser},
    serial::open_with_retry,
    telegram::Telegram,
    ProtocolError, INTER_BYTE_TIMEOUT, QUEUE_CAPACITY, READ_CHUNK, REPLY_START_TIMEOUT,
    STATUS_QUERY,
};
use crate::config::LineConfig;
use crate::reactor::Reactor;

/// How a command with a settle pause is confirmed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Resend after each settle pause until the device echoes the requested value
    #[default]
    PollUntilMatch,
    /// Send the real command once after the settle pause and move on when it is acknowledged
    SingleShot,
}

/// What the engine is currently waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing in flight
    Idle,
    /// A telegram was sent; waiting for (the rest of) its reply
    AwaitingReply { deadline: Instant },
    /// The device accepted a command and is still transitioning
    SettlePause { deadline: Instant },
}

/// Which telegram of a command is on the line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Status query sent to check whether the command is needed at all
    Probe,
    /// The requested value was sent
    Apply,
}

/// The command currently being worked on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    pub index: CommandIndex,
    pub value: u8,
    pub stage: Stage,
}

impl InFlight {
    fn mnemonic(&self) -> Mnemonic {
        self.index.entry().mnemonic
    }

    fn telegram(&self) -> Telegram {
        let value = match self.stage {
            Stage::Probe => STATUS_QUERY,
            Stage::Apply => self.value,
        };
        Telegram::new(self.mnemonic(), value)
    }
}

/// Result of one engine call that did not hit an I/O failure
#[derive(Debug)]
pub enum Outcome {
    /// A command is in flight or settling
    Pending,
    /// Nothing in flight and nothing queued
    Idle,
    /// The command was rejected or timed out; the queue was discarded
    Failed(ProtocolError),
    /// The shutdown sentinel was reached; the caller should stop its loop
    Shutdown,
}

/// Display control engine driven by an external event loop
pub struct Engine<C = SerialChannel> {
    /// Serial line handle, `None` once closed
    line: Option<C>,
    /// Pending requests
    queue: CommandQueue,
    /// Reply state machine
    parser: ReplyParser,
    /// Current wait and its deadline
    phase: Phase,
    /// Command on the line or settling
    in_flight: Option<InFlight>,
    /// Confirmation policy for settling commands
    policy: RetryPolicy,
}

impl Engine<SerialChannel> {
    /// Open the configured serial line and register it with the reactor
    pub fn open(reactor: &mut dyn Reactor, config: &LineConfig) -> Result<Self, ProtocolError> {
        let channel = open_with_retry(config)?;
        Ok(Self::attach(reactor, channel)?.with_policy(config.retry_policy))
    }
}

impl<C: LineChannel> Engine<C> {
    /// Flush stale bytes from an already-open line and register it with the reactor
    pub fn attach(reactor: &mut dyn Reactor, mut line: C) -> Result<Self, ProtocolError> {
        line.clear_buffers()?;
        reactor.register(line.as_raw_fd())?;
        Ok(Self {
            line: Some(line),
            queue: CommandQueue::new(),
            parser: ReplyParser::new(),
            phase: Phase::Idle,
            in_flight: None,
            policy: RetryPolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Deregister and close the line, abandoning anything in flight.
    ///
    /// Calling this on a closed engine does nothing.
    pub fn close(&mut self, reactor: &mut dyn Reactor) -> Result<(), ProtocolError> {
        let Some(line) = self.line.as_ref() else {
            return Ok(());
        };
        reactor.deregister(line.as_raw_fd())?;

        if let Some(line) = self.line.take() {
            info!(port = line.name(), "serial line closed");
        }
        self.abandon();
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.line.is_some()
    }

    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Deadline of the current wait, if any
    pub fn deadline(&self) -> Option<Instant> {
        match self.phase {
            Phase::Idle => None,
            Phase::AwaitingReply { deadline } | Phase::SettlePause { deadline } => Some(deadline),
        }
    }

    pub fn in_flight(&self) -> Option<&InFlight> {
        self.in_flight.as_ref()
    }

    /// Number of queued entries not yet dispatched
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Queue one entry and dispatch it if nothing is in flight
    pub fn enqueue(
        &mut self,
        reactor: &mut dyn Reactor,
        entry: QueueEntry,
        now: Option<Instant>,
    ) -> Result<Outcome, ProtocolError> {
        self.queue_batch(&[entry])?;
        self.dispatch_next(reactor, now)
    }

    /// Queue a packed code (index in the high byte, value in the low byte)
    pub fn push(
        &mut self,
        reactor: &mut dyn Reactor,
        code: u16,
    ) -> Result<Outcome, ProtocolError> {
        let entry = QueueEntry::from_code(code).inspect_err(|e| {
            error!(code, error = %e, "illegal command code");
        })?;
        self.enqueue(reactor, entry, None)
    }

    /// Queue a textual code sequence.
    ///
    /// The whole sequence is validated first; nothing is queued if any code
    /// is malformed or unassigned, or if the queue cannot take all of it.
    pub fn send(
        &mut self,
        reactor: &mut dyn Reactor,
        text: &str,
        now: Option<Instant>,
    ) -> Result<Outcome, ProtocolError> {
        let entries = parse_codes(text).inspect_err(|e| {
            error!(codes = text, error = %e, "illegal command sequence");
        })?;
        self.queue_batch(&entries)?;
        self.dispatch_next(reactor, now)
    }

    /// Queue a textual code sequence followed by the shutdown sentinel.
    ///
    /// Only legal while idle; the sentinel is reported once every code of
    /// the sequence has been acknowledged.
    pub fn send_and_shutdown(
        &mut self,
        reactor: &mut dyn Reactor,
        text: &str,
        now: Option<Instant>,
    ) -> Result<Outcome, ProtocolError> {
        let mut entries = parse_codes(text).inspect_err(|e| {
            error!(codes = text, error = %e, "illegal command sequence");
        })?;
        entries.push(QueueEntry::Shutdown);
        self.queue_batch(&entries)?;
        self.dispatch_next(reactor, now)
    }

    /// Send the configured power-on sequence, if any
    pub fn switch_on(
        &mut self,
        reactor: &mut dyn Reactor,
        config: &LineConfig,
    ) -> Result<Outcome, ProtocolError> {
        match config.on_codes.as_deref() {
            Some(codes) => self.send(reactor, codes, None),
            None => Ok(self.status()),
        }
    }

    /// Send the configured power-off sequence and then report shutdown
    pub fn switch_off(
        &mut self,
        reactor: &mut dyn Reactor,
        config: &LineConfig,
    ) -> Result<Outcome, ProtocolError> {
        self.send_and_shutdown(reactor, config.off_codes.as_deref().unwrap_or(""), None)
    }

    /// Event loop callback: `ready` when the line is readable, otherwise the
    /// armed deadline expired.
    ///
    /// Only I/O failures are returned as errors; they leave the line unusable.
    pub fn handle(
        &mut self,
        reactor: &mut dyn Reactor,
        ready: bool,
        now: Instant,
    ) -> Result<Outcome, ProtocolError> {
        if !ready {
            return self.on_timeout(reactor, now);
        }

        let line = self.line.as_mut().ok_or(ProtocolError::NotOpen)?;
        let mut buf = [0u8; READ_CHUNK];
        let n = match line.read(&mut buf) {
            Ok(n) => n,
            Err(e) if is_transient(&e) => 0,
            Err(e) => {
                error!(port = line.name(), error = %e, "reading from serial line failed");
                return Err(e.into());
            }
        };
        debug!(data = ?String::from_utf8_lossy(&buf[..n]), "read reply data");

        self.on_io_ready(reactor, &buf[..n], now)
    }

    /// Feed received bytes to the reply parser
    pub fn on_io_ready(
        &mut self,
        reactor: &mut dyn Reactor,
        bytes: &[u8],
        now: Instant,
    ) -> Result<Outcome, ProtocolError> {
        if !matches!(self.phase, Phase::AwaitingReply { .. }) {
            trace!(len = bytes.len(), "ignoring unsolicited data");
            return Ok(self.status());
        }
        if bytes.is_empty() {
            self.rearm_remaining(reactor, now)?;
            return Ok(Outcome::Pending);
        }

        let (progress, used) = self.parser.feed_slice(bytes);
        if used < bytes.len() {
            trace!(len = bytes.len() - used, "discarding data after reply");
        }

        match progress {
            Progress::Complete(reply) => self.on_reply(reactor, reply, now),
            Progress::Pending | Progress::Idle => {
                trace!(position = self.parser.position(), "partial reply");
                self.wait_for_reply(reactor, now, INTER_BYTE_TIMEOUT)?;
                Ok(Outcome::Pending)
            }
        }
    }

    /// Handle an expired (or early) timer
    pub fn on_timeout(
        &mut self,
        reactor: &mut dyn Reactor,
        now: Instant,
    ) -> Result<Outcome, ProtocolError> {
        match self.phase {
            Phase::Idle => Ok(self.status()),
            Phase::AwaitingReply { deadline } | Phase::SettlePause { deadline }
                if now < deadline =>
            {
                self.rearm_remaining(reactor, now)?;
                Ok(Outcome::Pending)
            }
            Phase::AwaitingReply { .. } => {
                let Some(flight) = self.in_flight else {
                    self.abandon();
                    return Ok(self.status());
                };
                error!(command = %flight.mnemonic(), value = flight.value, "command timeout");
                self.abandon();
                Ok(Outcome::Failed(ProtocolError::Timeout {
                    mnemonic: flight.mnemonic(),
                }))
            }
            Phase::SettlePause { .. } => {
                if let Some(flight) = self.in_flight.as_mut() {
                    flight.stage = Stage::Apply;
                }
                self.transmit(reactor, now)?;
                Ok(Outcome::Pending)
            }
        }
    }

    /// Start the next queued entry if nothing is in flight
    pub fn dispatch_next(
        &mut self,
        reactor: &mut dyn Reactor,
        now: Option<Instant>,
    ) -> Result<Outcome, ProtocolError> {
        if !self.is_idle() {
            return Ok(Outcome::Pending);
        }

        match self.queue.pop() {
            None => Ok(Outcome::Idle),
            Some(QueueEntry::Shutdown) => {
                debug!("shutdown sentinel reached");
                Ok(Outcome::Shutdown)
            }
            Some(entry @ QueueEntry::Command { index, value }) => {
                debug!(entry = %entry, pending = self.queue.len(), "dispatching");
                let stage = if index.entry().needs_settle() && value != STATUS_QUERY {
                    Stage::Probe
                } else {
                    Stage::Apply
                };
                self.in_flight = Some(InFlight {
                    index,
                    value,
                    stage,
                });
                let now = now.unwrap_or_else(|| reactor.now());
                self.transmit(reactor, now)?;
                Ok(Outcome::Pending)
            }
        }
    }

    fn on_reply(
        &mut self,
        reactor: &mut dyn Reactor,
        reply: Reply,
        now: Instant,
    ) -> Result<Outcome, ProtocolError> {
        let Some(flight) = self.in_flight else {
            self.phase = Phase::Idle;
            return self.dispatch_next(reactor, Some(now));
        };

        if !reply.accepted {
            error!(
                command = %flight.mnemonic(),
                value = flight.value,
                "command rejected by device"
            );
            self.abandon();
            return Ok(Outcome::Failed(ProtocolError::Rejected {
                mnemonic: flight.mnemonic(),
                value: flight.value,
            }));
        }

        debug!(
            command = %flight.mnemonic(),
            value = reply.value,
            "command acknowledged"
        );

        let entry = flight.index.entry();
        let done = match flight.stage {
            Stage::Probe => reply.value == flight.value,
            Stage::Apply if entry.needs_settle() && flight.value != STATUS_QUERY => {
                self.policy == RetryPolicy::SingleShot || reply.value == flight.value
            }
            Stage::Apply => true,
        };

        if !done {
            self.wait_for_settle(reactor, now, entry.settle_pause)?;
            return Ok(Outcome::Pending);
        }

        self.in_flight = None;
        self.phase = Phase::Idle;
        self.dispatch_next(reactor, Some(now))
    }

    // Validate that the whole batch fits, then queue it.
    fn queue_batch(&mut self, entries: &[QueueEntry]) -> Result<(), ProtocolError> {
        if self.line.is_none() {
            return Err(ProtocolError::NotOpen);
        }
        if entries.contains(&QueueEntry::Shutdown) && !self.is_idle() {
            error!("illegal shutdown sentinel while a command is in flight");
            return Err(ProtocolError::IllegalSentinel);
        }
        if self.queue.iter().any(|queued| *queued == QueueEntry::Shutdown) {
            error!("shutdown already queued, refusing further entries");
            return Err(ProtocolError::IllegalSentinel);
        }
        if self.queue.len() + entries.len() > QUEUE_CAPACITY {
            error!(
                pending = self.queue.len(),
                requested = entries.len(),
                "command queue overflow"
            );
            return Err(ProtocolError::QueueOverflow);
        }
        for entry in entries {
            self.queue.push(*entry)?;
        }
        Ok(())
    }

    fn transmit(&mut self, reactor: &mut dyn Reactor, now: Instant) -> Result<(), ProtocolError> {
        let Some(flight) = self.in_flight else {
            return Ok(());
        };
        let telegram = flight.telegram();

        let line = self.line.as_mut().ok_or(ProtocolError::NotOpen)?;
        if let Err(e) = line.write_all(telegram.as_bytes()) {
            error!(port = line.name(), error = %e, "writing to serial line failed");
            self.abandon();
            return Err(e.into());
        }
        debug!(telegram = %telegram, "sent telegram");

        self.parser.begin(flight.mnemonic().second());
        self.wait_for_reply(reactor, now, REPLY_START_TIMEOUT)
    }

    fn wait_for_reply(
        &mut self,
        reactor: &mut dyn Reactor,
        now: Instant,
        after: Duration,
    ) -> Result<(), ProtocolError> {
        self.phase = Phase::AwaitingReply {
            deadline: now + after,
        };
        self.arm_timeout(reactor, after)
    }

    fn wait_for_settle(
        &mut self,
        reactor: &mut dyn Reactor,
        now: Instant,
        after: Duration,
    ) -> Result<(), ProtocolError> {
        self.phase = Phase::SettlePause {
            deadline: now + after,
        };
        self.arm_timeout(reactor, after)
    }

    fn rearm_remaining(
        &self,
        reactor: &mut dyn Reactor,
        now: Instant,
    ) -> Result<(), ProtocolError> {
        match self.deadline() {
            Some(deadline) => self.arm_timeout(reactor, deadline.saturating_duration_since(now)),
            None => Ok(()),
        }
    }

    fn arm_timeout(
        &self,
        reactor: &mut dyn Reactor,
        after: Duration,
    ) -> Result<(), ProtocolError> {
        let line = self.line.as_ref().ok_or(ProtocolError::NotOpen)?;
        reactor.arm_timeout(line.as_raw_fd(), after);
        debug!(timeout_ms = after.as_millis() as u64, "armed deadline");
        Ok(())
    }

    fn status(&self) -> Outcome {
        if self.is_idle() {
            Outcome::Idle
        } else {
            Outcome::Pending
        }
    }

    // Drop the in-flight command and everything queued behind it
    fn abandon(&mut self) {
        self.parser.reset();
        self.queue.clear();
        self.in_flight = None;
        self.phase = Phase::Idle;
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
