//! Async ingestion loop and background expiry sweeper.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::correlator::{Correlator, HandleOutcome};
use super::source::FrameSource;
use super::timestamp::Timestamp;
use crate::error::{PtpError, Result};

/// Why the ingestion loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StopReason {
    /// The shutdown signal was raised or its sender dropped.
    #[default]
    Shutdown,
    /// The frame source reached end of stream.
    SourceClosed,
}

/// Counters for one run of [`run_ingest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IngestSummary {
    /// Frames handed to the correlator.
    pub frames: u64,
    /// Inputs skipped as malformed.
    pub malformed: u64,
    /// Exchanges completed by frames from this source.
    pub completed: u64,
    /// Frames dropped as stray.
    pub unmatched: u64,
    /// Frames dropped as duplicates.
    pub duplicates: u64,
    /// Frames with an unknown message type.
    pub ignored: u64,
    /// How the loop ended.
    pub stop: StopReason,
}

impl IngestSummary {
    fn record(&mut self, outcome: HandleOutcome) {
        self.frames += 1;
        match outcome {
            HandleOutcome::Completed(_) => self.completed += 1,
            HandleOutcome::Unmatched => self.unmatched += 1,
            HandleOutcome::Duplicate => self.duplicates += 1,
            HandleOutcome::Ignored => self.ignored += 1,
            HandleOutcome::Created | HandleOutcome::Updated | HandleOutcome::Buffered => {}
        }
    }
}

/// Pump frames from `source` into `correlator` until shutdown or end of stream.
///
/// Malformed input is logged and skipped. End of stream stops the loop
/// cleanly.
///
/// # Errors
///
/// Any other source error, or an invariant violation from the
/// correlator, ends the loop and is returned.
pub async fn run_ingest<S>(
    source: &mut S,
    correlator: &Correlator,
    mut shutdown: watch::Receiver<bool>,
) -> Result<IngestSummary>
where
    S: FrameSource + ?Sized,
{
    let mut summary = IngestSummary::default();
    if *shutdown.borrow() {
        return Ok(summary);
    }

    tracing::info!("PTP: ingestion loop starting");

    loop {
        tokio::select! {
            result = source.read_frame() => match result {
                Ok((frame, received)) => {
                    let outcome = correlator.handle(frame, received)?;
                    summary.record(outcome);
                }
                Err(PtpError::MalformedFrame { needed, have }) => {
                    summary.malformed += 1;
                    tracing::warn!(needed, have, "PTP: skipping malformed frame");
                }
                Err(PtpError::SourceClosed) => {
                    tracing::info!("PTP: frame source closed");
                    summary.stop = StopReason::SourceClosed;
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "PTP: frame source failed");
                    return Err(e);
                }
            },

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::info!("PTP: ingestion loop shutting down");
                    summary.stop = StopReason::Shutdown;
                    break;
                }
            }
        }
    }

    tracing::debug!(?summary, "PTP: ingestion loop finished");
    Ok(summary)
}

/// Shortest period the expiry sweeper ticks at.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Spawn a task expiring stale exchanges every `interval` against the
/// system clock.
///
/// An interval shorter than [`MIN_SWEEP_INTERVAL`] is raised to it.
pub fn spawn_expiry_sweeper(
    correlator: Arc<Correlator>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    spawn_expiry_sweeper_with_clock(correlator, interval, Timestamp::now, shutdown)
}

/// Like [`spawn_expiry_sweeper`], reading the current time from `clock`.
///
/// An interval shorter than [`MIN_SWEEP_INTERVAL`] is raised to it.
pub fn spawn_expiry_sweeper_with_clock<C>(
    correlator: Arc<Correlator>,
    interval: Duration,
    clock: C,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    C: Fn() -> Timestamp + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(MIN_SWEEP_INTERVAL));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match correlator.sweep_expired(clock()) {
                        Ok(0) => {}
                        Ok(expired) => {
                            tracing::debug!(expired, "PTP: sweeper discarded exchanges");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "PTP: sweeper stopping");
                            break;
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}
