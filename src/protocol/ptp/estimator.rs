//! Filtered clock offset and drift estimation.
//!
//! [`OffsetEstimator`] is a [`ReportSink`] that keeps a sliding window of
//! recent measurements and exposes a median-filtered offset, a median
//! path delay and a two-point drift estimate. It can translate master
//! timestamps to the local timescale and back.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::exchange::Measurement;
use super::sink::ReportSink;
use super::timestamp::Timestamp;

#[derive(Debug, Default)]
struct EstimatorState {
    samples: VecDeque<Measurement>,
    offset_ns: i64,
    delay_ns: i64,
    drift_ppm: f64,
    rejected: u64,
}

/// Median-filtered offset estimator fed by completed measurements.
#[derive(Debug)]
pub struct OffsetEstimator {
    window: usize,
    min_samples: usize,
    max_delay: Duration,
    state: Mutex<EstimatorState>,
}

impl Default for OffsetEstimator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}

impl OffsetEstimator {
    /// Default number of measurements kept.
    pub const DEFAULT_WINDOW: usize = 8;

    /// Default largest path delay accepted.
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(100);

    /// Create an estimator keeping `window` samples (at least one).
    #[must_use]
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            min_samples: 1,
            max_delay: Self::DEFAULT_MAX_DELAY,
            state: Mutex::new(EstimatorState::default()),
        }
    }

    /// Require `min` samples before reporting as synchronized.
    #[must_use]
    pub fn with_min_samples(mut self, min: usize) -> Self {
        self.min_samples = min.max(1);
        self
    }

    /// Reject measurements whose path delay exceeds `max_delay`.
    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    fn lock(&self) -> MutexGuard<'_, EstimatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one measurement. Returns `true` if it was accepted.
    ///
    /// Negative-delay and over-limit measurements are rejected.
    pub fn observe(&self, m: Measurement) -> bool {
        let limit = i64::try_from(self.max_delay.as_nanos()).unwrap_or(i64::MAX);
        if !m.is_nominal() || m.delay_ns > limit {
            tracing::debug!(
                sync_sequence = m.sync_sequence,
                delay_ns = m.delay_ns,
                "PTP: estimator rejecting measurement"
            );
            self.lock().rejected += 1;
            return false;
        }

        let mut state = self.lock();
        state.samples.push_back(m);
        while state.samples.len() > self.window {
            state.samples.pop_front();
        }

        state.offset_ns = median(state.samples.iter().map(|s| s.offset_ns));
        state.delay_ns = median(state.samples.iter().map(|s| s.delay_ns));
        state.drift_ppm = drift_ppm(&state.samples).unwrap_or(state.drift_ppm);
        true
    }

    /// Median offset in nanoseconds (slave minus master), if any samples.
    #[must_use]
    pub fn offset_nanos(&self) -> Option<i64> {
        let state = self.lock();
        (!state.samples.is_empty()).then_some(state.offset_ns)
    }

    /// Median path delay in nanoseconds, if any samples.
    #[must_use]
    pub fn delay_nanos(&self) -> Option<i64> {
        let state = self.lock();
        (!state.samples.is_empty()).then_some(state.delay_ns)
    }

    /// Drift rate in parts-per-million.
    #[must_use]
    pub fn drift_ppm(&self) -> f64 {
        self.lock().drift_ppm
    }

    /// Whether enough samples have been accepted.
    #[must_use]
    pub fn is_synchronized(&self) -> bool {
        self.lock().samples.len() >= self.min_samples
    }

    /// Samples currently in the window.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.lock().samples.len()
    }

    /// Measurements rejected so far.
    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.lock().rejected
    }

    /// Translate a master timestamp to local time (`local = master + offset`).
    #[must_use]
    pub fn master_to_local(&self, master: Timestamp) -> Timestamp {
        shift(master, i128::from(self.offset_nanos().unwrap_or(0)))
    }

    /// Translate a local timestamp to master time (`master = local - offset`).
    #[must_use]
    pub fn local_to_master(&self, local: Timestamp) -> Timestamp {
        shift(local, -i128::from(self.offset_nanos().unwrap_or(0)))
    }

    /// Clear all samples and estimates.
    pub fn reset(&self) {
        *self.lock() = EstimatorState::default();
    }
}

impl ReportSink for OffsetEstimator {
    fn report(&self, measurement: Measurement) {
        self.observe(measurement);
    }
}

fn median(values: impl Iterator<Item = i64>) -> i64 {
    let mut values: Vec<i64> = values.collect();
    if values.is_empty() {
        return 0;
    }
    values.sort_unstable();
    values[values.len() / 2]
}

/// Two-point drift between the oldest and newest sample, using T2 as the
/// local timebase. `None` if less than 100ms separates them.
fn drift_ppm(samples: &VecDeque<Measurement>) -> Option<f64> {
    let first = samples.front()?;
    let last = samples.back()?;
    let elapsed_ns = last.t2.diff_nanos(&first.t2);
    if elapsed_ns < 100_000_000 {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let ppm = (last.offset_ns as f64 - first.offset_ns as f64) / elapsed_ns as f64 * 1e6;
    Some(ppm)
}

fn shift(ts: Timestamp, by: i128) -> Timestamp {
    let shifted = i128::from(ts.as_nanos()) + by;
    Timestamp::from_nanos(u64::try_from(shifted.max(0)).unwrap_or(u64::MAX))
}
