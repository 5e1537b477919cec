//! Exchange correlator and clock-offset engine.
//!
//! Frames are fed in any order through [`Correlator::handle`]. The
//! correlator joins them into exchanges, computes offset and delay once
//! T1..T4 are present, and reports the result to its sink.
//!
//! All exchange state lives behind one mutex. The sink is always invoked
//! after the lock has been released.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use super::exchange::{Exchange, Measurement, SlotWrite, Stage};
use super::frame::{Frame, MessageType};
use super::sink::ReportSink;
use super::timestamp::Timestamp;
use crate::error::{PtpError, Result};
use crate::types::CorrelatorConfig;

/// Maps an externally numbered `Delay_Req` sequence to the Sync sequence
/// of the exchange it belongs to.
type DelayPairing = dyn Fn(u16) -> u16 + Send + Sync;

/// What a single call to [`Correlator::handle`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// A Sync opened a new exchange.
    Created,
    /// A timestamp was recorded on a live exchange.
    Updated,
    /// T4 arrived before T3 and was held on the exchange.
    Buffered,
    /// The slot this frame fills was already populated; first value kept.
    Duplicate,
    /// The frame completed an exchange; the measurement was reported.
    Completed(Measurement),
    /// No live exchange matched the frame; dropped.
    Unmatched,
    /// Unknown message type; dropped.
    Ignored,
}

/// Snapshot of correlator counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CorrelatorStats {
    /// Frames passed to `handle`.
    pub frames: u64,
    /// Exchanges opened by a Sync.
    pub created: u64,
    /// Exchanges completed and reported.
    pub completed: u64,
    /// Exchanges discarded at their deadline.
    pub expired: u64,
    /// Exchanges evicted to respect the live cap.
    pub evicted: u64,
    /// Frames for an already populated slot.
    pub duplicates: u64,
    /// Frames with no matching live exchange.
    pub unmatched: u64,
    /// Frames with an unknown message type.
    pub ignored: u64,
    /// Completed measurements with a negative delay.
    pub negative_delay: u64,
}

/// Wrapping generator for locally originated `Delay_Req` sequences.
#[derive(Debug, Clone, Default)]
pub struct SequenceIdGenerator {
    next: u16,
}

impl SequenceIdGenerator {
    /// Start at `first`.
    #[must_use]
    pub fn starting_at(first: u16) -> Self {
        Self { next: first }
    }

    /// Return the next sequence, wrapping at `u16::MAX`.
    pub fn generate(&mut self) -> u16 {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        id
    }
}

#[derive(Debug, Default)]
struct CorrelatorState {
    next_id: u64,
    /// Keyed by creation order, so the first entry is the oldest.
    exchanges: BTreeMap<u64, Exchange>,
    sync_index: HashMap<u16, u64>,
    delay_index: HashMap<u16, u64>,
    expiry: BTreeSet<(Timestamp, u64)>,
    delay_sequence: SequenceIdGenerator,
    stats: CorrelatorStats,
}

impl CorrelatorState {
    fn exchange_mut(&mut self, id: u64) -> Result<&mut Exchange> {
        self.exchanges
            .get_mut(&id)
            .ok_or_else(|| PtpError::invariant(format!("index points at missing exchange {id}")))
    }

    fn retire(&mut self, id: u64) -> Option<Exchange> {
        let exchange = self.exchanges.remove(&id)?;
        if self.sync_index.get(&exchange.sync_sequence) == Some(&id) {
            self.sync_index.remove(&exchange.sync_sequence);
        }
        if let Some(seq) = exchange.delay_sequence {
            if self.delay_index.get(&seq) == Some(&id) {
                self.delay_index.remove(&seq);
            }
        }
        self.expiry.remove(&(exchange.deadline, id));
        Some(exchange)
    }

    fn sweep(&mut self, now: Timestamp) -> Result<usize> {
        let mut expired = 0;
        while let Some(&(deadline, id)) = self.expiry.first() {
            if deadline > now {
                break;
            }
            self.expiry.pop_first();
            let Some(mut exchange) = self.retire(id) else {
                return Err(PtpError::invariant(format!(
                    "expiry queue points at missing exchange {id}"
                )));
            };
            exchange.advance(Stage::Expired)?;
            self.stats.expired += 1;
            expired += 1;
            let reason = PtpError::ExchangeExpired {
                sequence: exchange.sync_sequence,
            };
            tracing::debug!(
                %reason,
                t1 = exchange.t1.is_some(),
                t3 = exchange.t3.is_some(),
                t4 = exchange.t4.is_some(),
                "PTP: discarding incomplete exchange"
            );
        }
        Ok(expired)
    }

    fn evict_oldest(&mut self) {
        let Some(&id) = self.exchanges.keys().next() else {
            return;
        };
        if let Some(exchange) = self.retire(id) {
            self.stats.evicted += 1;
            tracing::warn!(
                sequence = exchange.sync_sequence,
                stage = %exchange.stage,
                "PTP: live exchange cap reached, evicting oldest"
            );
        }
    }

    /// Bind `delay_sequence` to the live exchange opened by Sync
    /// `sync_sequence`. Returns the exchange id, or `None` if there is no
    /// such exchange, it already has a delay leg, or the delay sequence
    /// belongs to another live exchange.
    fn bind(&mut self, sync_sequence: u16, delay_sequence: u16) -> Result<Option<u64>> {
        if self.delay_index.contains_key(&delay_sequence) {
            return Ok(None);
        }
        let Some(&id) = self.sync_index.get(&sync_sequence) else {
            return Ok(None);
        };
        let exchange = self.exchange_mut(id)?;
        if exchange.has_delay_leg() || exchange.stage.is_terminal() {
            return Ok(None);
        }
        exchange.bind_delay(delay_sequence)?;
        self.delay_index.insert(delay_sequence, id);
        tracing::debug!(sync_sequence, delay_sequence, "PTP: delay leg bound");
        Ok(Some(id))
    }

    /// Exchange owning `delay_sequence`, binding it through `pairing` if
    /// the sequence is not bound yet.
    fn delay_exchange(
        &mut self,
        delay_sequence: u16,
        pairing: Option<&DelayPairing>,
    ) -> Result<Option<u64>> {
        if let Some(&id) = self.delay_index.get(&delay_sequence) {
            return Ok(Some(id));
        }
        match pairing {
            Some(pair) => self.bind(pair(delay_sequence), delay_sequence),
            None => Ok(None),
        }
    }

    fn unmatched(&mut self, frame: Frame) -> HandleOutcome {
        self.stats.unmatched += 1;
        let reason = PtpError::UnmatchedFrame {
            message_type: frame.message_type,
            sequence: frame.sequence,
        };
        tracing::debug!(%reason, "PTP: dropping stray frame");
        HandleOutcome::Unmatched
    }

    fn duplicate(&mut self, frame: Frame) -> HandleOutcome {
        self.stats.duplicates += 1;
        tracing::debug!(
            message_type = %frame.message_type,
            sequence = frame.sequence,
            "PTP: duplicate frame, keeping first value"
        );
        HandleOutcome::Duplicate
    }

    /// Complete and retire the exchange if all four timestamps are known.
    fn try_complete(&mut self, id: u64) -> Result<Option<Measurement>> {
        let exchange = self.exchange_mut(id)?;
        let Some(measurement) = exchange.measurement() else {
            return Ok(None);
        };
        exchange.advance(Stage::Complete)?;
        self.retire(id);
        self.stats.completed += 1;

        if !measurement.is_nominal() {
            self.stats.negative_delay += 1;
            tracing::warn!(
                sync_sequence = measurement.sync_sequence,
                delay_ns = measurement.delay_ns,
                offset_ns = measurement.offset_ns,
                "PTP: negative path delay, clock skew exceeds model"
            );
        }
        Ok(Some(measurement))
    }

    fn stored_outcome(&mut self, id: u64) -> Result<HandleOutcome> {
        Ok(match self.try_complete(id)? {
            Some(m) => HandleOutcome::Completed(m),
            None => HandleOutcome::Updated,
        })
    }

    fn on_sync(
        &mut self,
        frame: Frame,
        local_time: Timestamp,
        config: &CorrelatorConfig,
    ) -> HandleOutcome {
        if self.sync_index.contains_key(&frame.sequence) {
            return self.duplicate(frame);
        }
        while self.exchanges.len() >= config.max_live_exchanges {
            self.evict_oldest();
        }

        let id = self.next_id;
        self.next_id += 1;
        let deadline = local_time.saturating_add(config.exchange_timeout);
        self.exchanges
            .insert(id, Exchange::new(id, frame.sequence, local_time, deadline));
        self.sync_index.insert(frame.sequence, id);
        self.expiry.insert((deadline, id));
        self.stats.created += 1;

        tracing::debug!(
            sequence = frame.sequence,
            t2 = %local_time,
            "PTP: exchange opened"
        );
        HandleOutcome::Created
    }

    fn on_follow_up(&mut self, frame: Frame) -> Result<HandleOutcome> {
        let Some(&id) = self.sync_index.get(&frame.sequence) else {
            return Ok(self.unmatched(frame));
        };
        let t1 = Timestamp::from_nanos(frame.timestamp);
        let write = self.exchange_mut(id)?.record_t1(t1)?;
        match write {
            SlotWrite::Duplicate => Ok(self.duplicate(frame)),
            SlotWrite::Stored => {
                tracing::debug!(sequence = frame.sequence, t1 = %t1, "PTP: T1 recorded");
                self.stored_outcome(id)
            }
        }
    }

    fn on_delay_req(
        &mut self,
        frame: Frame,
        local_time: Timestamp,
        pairing: Option<&DelayPairing>,
    ) -> Result<HandleOutcome> {
        let Some(id) = self.delay_exchange(frame.sequence, pairing)? else {
            return Ok(self.unmatched(frame));
        };

        let write = self.exchange_mut(id)?.record_t3(local_time);
        match write {
            SlotWrite::Duplicate => Ok(self.duplicate(frame)),
            SlotWrite::Stored => {
                tracing::debug!(
                    delay_sequence = frame.sequence,
                    t3 = %local_time,
                    "PTP: T3 recorded"
                );
                self.stored_outcome(id)
            }
        }
    }

    fn on_delay_resp(
        &mut self,
        frame: Frame,
        pairing: Option<&DelayPairing>,
    ) -> Result<HandleOutcome> {
        let Some(id) = self.delay_exchange(frame.sequence, pairing)? else {
            return Ok(self.unmatched(frame));
        };
        let t4 = Timestamp::from_nanos(frame.timestamp);
        let exchange = self.exchange_mut(id)?;
        let write = exchange.record_t4(t4);
        let has_t3 = exchange.t3.is_some();
        match write {
            SlotWrite::Duplicate => Ok(self.duplicate(frame)),
            SlotWrite::Stored if !has_t3 => {
                tracing::debug!(
                    delay_sequence = frame.sequence,
                    t4 = %t4,
                    "PTP: T4 buffered until T3 is known"
                );
                Ok(HandleOutcome::Buffered)
            }
            SlotWrite::Stored => {
                tracing::debug!(delay_sequence = frame.sequence, t4 = %t4, "PTP: T4 recorded");
                self.stored_outcome(id)
            }
        }
    }

    fn issue_delay_req(&mut self, sync_sequence: u16) -> Result<Option<Frame>> {
        let Some(&id) = self.sync_index.get(&sync_sequence) else {
            return Ok(None);
        };
        if self.exchange_mut(id)?.has_delay_leg() {
            return Ok(None);
        }
        // The index never holds more entries than there are live exchanges,
        // so a free sequence is always found.
        let mut sequence = self.delay_sequence.generate();
        while self.delay_index.contains_key(&sequence) {
            sequence = self.delay_sequence.generate();
        }
        match self.bind(sync_sequence, sequence)? {
            Some(_) => Ok(Some(Frame::delay_req(sequence))),
            None => Err(PtpError::invariant(format!(
                "free delay sequence {sequence} could not be bound to sync seq={sync_sequence}"
            ))),
        }
    }
}

/// Two-step PTP exchange correlator.
///
/// Safe to share across threads and tasks; every method takes `&self`.
pub struct Correlator {
    config: CorrelatorConfig,
    state: Mutex<CorrelatorState>,
    sink: Box<dyn ReportSink>,
    pairing: Option<Box<DelayPairing>>,
}

impl Correlator {
    /// Create a correlator reporting to `sink`.
    ///
    /// # Errors
    ///
    /// Returns `PtpError::InvalidConfig` if `config` fails validation.
    pub fn new(config: CorrelatorConfig, sink: impl ReportSink + 'static) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: Mutex::new(CorrelatorState::default()),
            sink: Box::new(sink),
            pairing: None,
        })
    }

    /// Create a correlator with the default configuration.
    #[must_use]
    pub fn with_sink(sink: impl ReportSink + 'static) -> Self {
        Self {
            config: CorrelatorConfig::default(),
            state: Mutex::new(CorrelatorState::default()),
            sink: Box::new(sink),
            pairing: None,
        }
    }

    /// Seed the `Delay_Req` sequence generator.
    #[must_use]
    pub fn with_first_delay_sequence(mut self, first: u16) -> Self {
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .delay_sequence = SequenceIdGenerator::starting_at(first);
        self
    }

    /// Pair externally numbered delay legs with their Sync.
    ///
    /// For stacks that number their own `Delay_Req` frames instead of
    /// calling [`issue_delay_req`](Self::issue_delay_req). When a
    /// `Delay_Req` or `Delay_Resp` arrives with an unbound sequence `d`,
    /// it is bound to the live exchange opened by Sync `pairing(d)`.
    /// Without a pairing such frames are unmatched.
    #[must_use]
    pub fn with_delay_pairing<F>(mut self, pairing: F) -> Self
    where
        F: Fn(u16) -> u16 + Send + Sync + 'static,
    {
        self.pairing = Some(Box::new(pairing));
        self
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &CorrelatorConfig {
        &self.config
    }

    fn lock(&self) -> Result<MutexGuard<'_, CorrelatorState>> {
        self.state
            .lock()
            .map_err(|_| PtpError::invariant("correlator state lock poisoned"))
    }

    /// Feed one frame observed at `local_time`.
    ///
    /// `local_time` is the receive time for Sync (T2) and the send time
    /// for a locally originated `Delay_Req` (T3). Expired exchanges are
    /// swept against it before the frame is applied.
    ///
    /// At most one measurement is reported per call, after the internal
    /// lock is released.
    ///
    /// # Errors
    ///
    /// Returns `PtpError::InvariantViolation` only on an internal
    /// consistency failure. Stray, duplicate, or late frames are
    /// reported through [`HandleOutcome`].
    pub fn handle(&self, frame: Frame, local_time: Timestamp) -> Result<HandleOutcome> {
        let outcome = {
            let mut state = self.lock()?;
            state.stats.frames += 1;
            state.sweep(local_time)?;

            match frame.message_type {
                MessageType::Sync => state.on_sync(frame, local_time, &self.config),
                MessageType::FollowUp => state.on_follow_up(frame)?,
                MessageType::DelayReq => {
                    state.on_delay_req(frame, local_time, self.pairing.as_deref())?
                }
                MessageType::DelayResp => state.on_delay_resp(frame, self.pairing.as_deref())?,
                MessageType::Unknown(byte) => {
                    state.stats.ignored += 1;
                    tracing::debug!(
                        type_byte = byte,
                        sequence = frame.sequence,
                        "PTP: ignoring unknown message type"
                    );
                    HandleOutcome::Ignored
                }
            }
        };

        if let HandleOutcome::Completed(measurement) = outcome {
            self.sink.report(measurement);
        }
        Ok(outcome)
    }

    /// Allocate the next `Delay_Req` sequence and bind it to the live
    /// exchange opened by Sync `sync_sequence`.
    ///
    /// Returns the frame for the transport to send, or `None` if that
    /// exchange is not live or already has a delay leg. Report the actual
    /// send time by passing the frame back to [`handle`](Self::handle)
    /// with `local_time = T3`.
    ///
    /// # Errors
    ///
    /// Returns `PtpError::InvariantViolation` on internal inconsistency.
    pub fn issue_delay_req(&self, sync_sequence: u16) -> Result<Option<Frame>> {
        let frame = self.lock()?.issue_delay_req(sync_sequence)?;
        if let Some(frame) = &frame {
            tracing::debug!(
                sync_sequence,
                delay_sequence = frame.sequence,
                "PTP: Delay_Req issued"
            );
        }
        Ok(frame)
    }

    /// Bind an externally numbered `Delay_Req` sequence to the live
    /// exchange opened by Sync `sync_sequence`.
    ///
    /// Call before sending the request so an early `Delay_Resp` is held
    /// on the exchange. Returns `false` if the exchange is not live,
    /// already has a delay leg, or `delay_sequence` is bound elsewhere.
    ///
    /// # Errors
    ///
    /// Returns `PtpError::InvariantViolation` on internal inconsistency.
    pub fn bind_delay_sequence(&self, sync_sequence: u16, delay_sequence: u16) -> Result<bool> {
        Ok(self.lock()?.bind(sync_sequence, delay_sequence)?.is_some())
    }

    /// Discard every exchange whose deadline is at or before `now`.
    ///
    /// Returns the number of exchanges expired.
    ///
    /// # Errors
    ///
    /// Returns `PtpError::InvariantViolation` on internal inconsistency.
    pub fn sweep_expired(&self, now: Timestamp) -> Result<usize> {
        self.lock()?.sweep(now)
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> CorrelatorStats {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stats
    }

    /// Number of exchanges currently in flight.
    #[must_use]
    pub fn live_exchanges(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .exchanges
            .len()
    }

    /// Stage of the live exchange opened by Sync `sequence`, if any.
    #[must_use]
    pub fn stage_of(&self, sync_sequence: u16) -> Option<Stage> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let id = state.sync_index.get(&sync_sequence)?;
        state.exchanges.get(id).map(|e| e.stage)
    }

    /// Earliest pending deadline, if any exchange is live.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .expiry
            .first()
            .map(|&(deadline, _)| deadline)
    }
}

impl std::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correlator")
            .field("config", &self.config)
            .field("live_exchanges", &self.live_exchanges())
            .field("stats", &self.stats())
            .field("delay_pairing", &self.pairing.is_some())
            .finish_non_exhaustive()
    }
}
