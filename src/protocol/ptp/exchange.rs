//! Exchange records and offset/delay measurement.
//!
//! An exchange joins the Sync/`Follow_Up` leg (keyed by the master's
//! sequence) with the `Delay_Req`/`Delay_Resp` leg (keyed by the slave's
//! own sequence) into one record holding T1..T4.

use serde::{Deserialize, Serialize};

use super::timestamp::{Timestamp, saturate_i64};
use crate::error::{PtpError, Result};

/// Progress of one exchange. Ordering follows the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Sync received (T2 known), waiting for `Follow_Up`.
    AwaitingFollowUp,
    /// T1 and T2 known, delay leg not started.
    SyncComplete,
    /// `Delay_Req` sequence bound, waiting for `Delay_Resp`.
    AwaitingDelayResp,
    /// All four timestamps present.
    Complete,
    /// Deadline elapsed before completion.
    Expired,
}

impl Stage {
    /// Whether no further transitions are possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Expired)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AwaitingFollowUp => "awaiting-follow-up",
            Self::SyncComplete => "sync-complete",
            Self::AwaitingDelayResp => "awaiting-delay-resp",
            Self::Complete => "complete",
            Self::Expired => "expired",
        };
        f.write_str(name)
    }
}

/// Data-quality classification attached to a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataQuality {
    /// Values are within model assumptions.
    #[default]
    Nominal,
    /// Computed path delay is negative; clock skew exceeds the symmetric
    /// path model. Values are reported unclamped.
    NegativeDelay,
}

/// Result of one completed exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    /// Sequence of the master's Sync/`Follow_Up`.
    pub sync_sequence: u16,
    /// Sequence of the slave's `Delay_Req`/`Delay_Resp`.
    pub delay_sequence: u16,
    /// T1: master Sync send time.
    pub t1: Timestamp,
    /// T2: local Sync receive time.
    pub t2: Timestamp,
    /// T3: local `Delay_Req` send time.
    pub t3: Timestamp,
    /// T4: master `Delay_Req` receive time.
    pub t4: Timestamp,
    /// Slave minus master, nanoseconds.
    pub offset_ns: i64,
    /// One-way path delay, nanoseconds.
    pub delay_ns: i64,
    /// Data-quality flag.
    pub quality: DataQuality,
}

impl Measurement {
    /// Compute offset and delay from the four exchange timestamps.
    ///
    /// ```text
    /// offset = ((t2 - t1) - (t4 - t3)) / 2
    /// delay  = ((t2 - t1) + (t4 - t3)) / 2
    /// ```
    ///
    /// Division truncates toward zero.
    #[must_use]
    pub fn calculate(
        sync_sequence: u16,
        delay_sequence: u16,
        t1: Timestamp,
        t2: Timestamp,
        t3: Timestamp,
        t4: Timestamp,
    ) -> Self {
        let master_to_slave = t2.diff_nanos(&t1);
        let slave_to_master = t4.diff_nanos(&t3);
        let offset_ns = saturate_i64((master_to_slave - slave_to_master) / 2);
        let delay_ns = saturate_i64((master_to_slave + slave_to_master) / 2);

        let quality = if delay_ns < 0 {
            DataQuality::NegativeDelay
        } else {
            DataQuality::Nominal
        };

        Self {
            sync_sequence,
            delay_sequence,
            t1,
            t2,
            t3,
            t4,
            offset_ns,
            delay_ns,
            quality,
        }
    }

    /// Round-trip time excluding slave residence: `(t4 - t1) - (t3 - t2)`.
    #[must_use]
    pub fn round_trip_ns(&self) -> i64 {
        saturate_i64(self.t4.diff_nanos(&self.t1) - self.t3.diff_nanos(&self.t2))
    }

    /// Whether the measurement carries a data-quality warning.
    #[must_use]
    pub fn is_nominal(&self) -> bool {
        self.quality == DataQuality::Nominal
    }
}

impl std::fmt::Display for Measurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sync={} delay_seq={} offset={}ns delay={}ns",
            self.sync_sequence, self.delay_sequence, self.offset_ns, self.delay_ns
        )
    }
}

/// Outcome of writing a timestamp slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotWrite {
    /// Slot was empty and now holds the value.
    Stored,
    /// Slot was already populated; the first value is kept.
    Duplicate,
}

fn write_once(slot: &mut Option<Timestamp>, value: Timestamp) -> SlotWrite {
    if slot.is_some() {
        SlotWrite::Duplicate
    } else {
        *slot = Some(value);
        SlotWrite::Stored
    }
}

/// Mutable state of one in-flight exchange. Owned by the correlator.
#[derive(Debug, Clone)]
pub(crate) struct Exchange {
    pub(crate) id: u64,
    pub(crate) sync_sequence: u16,
    pub(crate) delay_sequence: Option<u16>,
    pub(crate) t1: Option<Timestamp>,
    pub(crate) t2: Timestamp,
    pub(crate) t3: Option<Timestamp>,
    pub(crate) t4: Option<Timestamp>,
    pub(crate) stage: Stage,
    pub(crate) deadline: Timestamp,
}

impl Exchange {
    pub(crate) fn new(id: u64, sync_sequence: u16, t2: Timestamp, deadline: Timestamp) -> Self {
        Self {
            id,
            sync_sequence,
            delay_sequence: None,
            t1: None,
            t2,
            t3: None,
            t4: None,
            stage: Stage::AwaitingFollowUp,
            deadline,
        }
    }

    /// Move to `next`, refusing to go backwards or leave a terminal stage.
    pub(crate) fn advance(&mut self, next: Stage) -> Result<()> {
        if self.stage.is_terminal() || next < self.stage {
            return Err(PtpError::invariant(format!(
                "exchange seq={} cannot move from {} to {}",
                self.sync_sequence, self.stage, next
            )));
        }
        self.stage = next;
        Ok(())
    }

    /// Record T1. The stage only moves forward if still waiting for it.
    pub(crate) fn record_t1(&mut self, t1: Timestamp) -> Result<SlotWrite> {
        let write = write_once(&mut self.t1, t1);
        if write == SlotWrite::Stored && self.stage == Stage::AwaitingFollowUp {
            self.advance(Stage::SyncComplete)?;
        }
        Ok(write)
    }

    /// Bind the delay leg to this exchange.
    pub(crate) fn bind_delay(&mut self, sequence: u16) -> Result<()> {
        if self.delay_sequence.is_some() {
            return Err(PtpError::invariant(format!(
                "exchange seq={} already has a delay leg",
                self.sync_sequence
            )));
        }
        self.delay_sequence = Some(sequence);
        self.advance(Stage::AwaitingDelayResp)
    }

    pub(crate) fn record_t3(&mut self, t3: Timestamp) -> SlotWrite {
        write_once(&mut self.t3, t3)
    }

    pub(crate) fn record_t4(&mut self, t4: Timestamp) -> SlotWrite {
        write_once(&mut self.t4, t4)
    }

    pub(crate) fn has_delay_leg(&self) -> bool {
        self.delay_sequence.is_some()
    }

    /// Build the measurement once T1..T4 and the delay sequence are known.
    pub(crate) fn measurement(&self) -> Option<Measurement> {
        Some(Measurement::calculate(
            self.sync_sequence,
            self.delay_sequence?,
            self.t1?,
            self.t2,
            self.t3?,
            self.t4?,
        ))
    }
}
