//! Test doubles for frame sources and report sinks.

pub mod network_sim;
#[cfg(test)]
/// Unit tests for the test doubles.
pub mod tests;

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::{PtpError, Result};
use crate::protocol::ptp::{Frame, FrameSource, Measurement, ReportSink, Timestamp};

pub use network_sim::NetworkSimulator;

/// One scripted delivery: a frame and the local time it is seen at.
pub type ScriptedFrame = (Frame, Timestamp);

/// Frame source replaying a fixed script.
///
/// Once the script is exhausted it reports `SourceClosed`, or pends
/// forever if built with [`hold_open`](Self::hold_open).
#[derive(Debug, Default)]
pub struct ScriptedFrameSource {
    items: VecDeque<Result<ScriptedFrame>>,
    hold_open: bool,
}

impl ScriptedFrameSource {
    /// Create a source replaying `frames` in order.
    #[must_use]
    pub fn new(frames: impl IntoIterator<Item = ScriptedFrame>) -> Self {
        Self {
            items: frames.into_iter().map(Ok).collect(),
            hold_open: false,
        }
    }

    /// Append a frame to the script.
    #[must_use]
    pub fn then_frame(mut self, frame: Frame, local_time: Timestamp) -> Self {
        self.items.push_back(Ok((frame, local_time)));
        self
    }

    /// Append an error to the script.
    #[must_use]
    pub fn then_error(mut self, error: PtpError) -> Self {
        self.items.push_back(Err(error));
        self
    }

    /// Pend instead of closing when the script runs out.
    #[must_use]
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// Scripted items not yet delivered.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.items.len()
    }
}

#[async_trait]
impl FrameSource for ScriptedFrameSource {
    async fn read_frame(&mut self) -> Result<ScriptedFrame> {
        match self.items.pop_front() {
            Some(item) => item,
            None if self.hold_open => std::future::pending().await,
            None => Err(PtpError::SourceClosed),
        }
    }
}

/// Sink recording every measurement it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<Measurement>>,
}

impl RecordingSink {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all measurements received so far.
    #[must_use]
    pub fn measurements(&self) -> Vec<Measurement> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of measurements received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReportSink for RecordingSink {
    fn report(&self, measurement: Measurement) {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(measurement);
    }
}

/// Frames and local times for one complete exchange.
///
/// The slave clock runs `offset_ns` ahead of the master and the path
/// delay is `delay_ns` each way. The Sync is sent at master time `t1`
/// and the `Delay_Req` leaves `turnaround_ns` after T2. The `Delay_Req`
/// frame uses `delay_sequence`, which the correlator only accepts once it
/// is bound to `sync_sequence`. Bind it with
/// [`Correlator::bind_delay_sequence`] or build the correlator with
/// [`Correlator::with_delay_pairing`].
///
/// [`Correlator::bind_delay_sequence`]: crate::protocol::ptp::Correlator::bind_delay_sequence
/// [`Correlator::with_delay_pairing`]: crate::protocol::ptp::Correlator::with_delay_pairing
#[must_use]
pub fn exchange_script(
    sync_sequence: u16,
    delay_sequence: u16,
    t1: u64,
    offset_ns: u64,
    delay_ns: u64,
    turnaround_ns: u64,
) -> Vec<ScriptedFrame> {
    let t2 = t1 + delay_ns + offset_ns;
    let t3 = t2 + turnaround_ns;
    let t4 = t3 + delay_ns - offset_ns;
    vec![
        (Frame::sync(sync_sequence), Timestamp::from_nanos(t2)),
        (Frame::follow_up(sync_sequence, t1), Timestamp::from_nanos(t2 + 10)),
        (Frame::delay_req(delay_sequence), Timestamp::from_nanos(t3)),
        (
            Frame::delay_resp(delay_sequence, t4),
            Timestamp::from_nanos(t3 + 2 * delay_ns),
        ),
    ]
}
