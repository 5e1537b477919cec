//! Network condition simulation for frame scripts

use rand::Rng;
use std::time::Duration;

use super::ScriptedFrame;

/// Network condition simulator
///
/// Applies loss, duplication, reordering and receive-time jitter to a
/// script of `(frame, local time)` pairs before it is replayed.
#[derive(Clone, Debug)]
pub struct NetworkSimulator {
    /// Frame loss probability (0.0 to 1.0)
    pub loss_rate: f64,
    /// Probability a frame is delivered twice
    pub duplicate_rate: f64,
    /// Probability a frame is swapped with its successor
    pub reorder_rate: f64,
    /// Maximum jitter added to local receive times
    pub jitter: Duration,
}

impl NetworkSimulator {
    /// Perfect network (no issues)
    #[must_use]
    pub fn perfect() -> Self {
        Self {
            loss_rate: 0.0,
            duplicate_rate: 0.0,
            reorder_rate: 0.0,
            jitter: Duration::ZERO,
        }
    }

    /// Lightly impaired LAN
    #[must_use]
    pub fn lossy_lan() -> Self {
        Self {
            loss_rate: 0.01,
            duplicate_rate: 0.01,
            reorder_rate: 0.01,
            jitter: Duration::from_micros(50),
        }
    }

    /// Very poor conditions (stress test)
    #[must_use]
    pub fn stress_test() -> Self {
        Self {
            loss_rate: 0.10,
            duplicate_rate: 0.10,
            reorder_rate: 0.10,
            jitter: Duration::from_millis(1),
        }
    }

    /// Should this frame be dropped?
    pub fn should_drop<R: Rng>(&self, rng: &mut R) -> bool {
        self.loss_rate > 0.0 && rng.gen_bool(self.loss_rate.min(1.0))
    }

    /// Should this frame be delivered twice?
    pub fn should_duplicate<R: Rng>(&self, rng: &mut R) -> bool {
        self.duplicate_rate > 0.0 && rng.gen_bool(self.duplicate_rate.min(1.0))
    }

    /// Should this frame be reordered?
    pub fn should_reorder<R: Rng>(&self, rng: &mut R) -> bool {
        self.reorder_rate > 0.0 && rng.gen_bool(self.reorder_rate.min(1.0))
    }

    /// Jitter for one frame
    pub fn get_jitter<R: Rng>(&self, rng: &mut R) -> Duration {
        let max = u64::try_from(self.jitter.as_nanos()).unwrap_or(u64::MAX);
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(rng.gen_range(0..max))
    }

    /// Apply the configured impairments to `script`
    pub fn apply<R: Rng>(&self, script: Vec<ScriptedFrame>, rng: &mut R) -> Vec<ScriptedFrame> {
        let mut out = Vec::with_capacity(script.len());
        for (frame, local_time) in script {
            if self.should_drop(rng) {
                continue;
            }
            let local_time = local_time.saturating_add(self.get_jitter(rng));
            out.push((frame, local_time));
            if self.should_duplicate(rng) {
                out.push((frame, local_time));
            }
        }

        let mut i = 0;
        while i + 1 < out.len() {
            if self.should_reorder(rng) {
                out.swap(i, i + 1);
                i += 2;
            } else {
                i += 1;
            }
        }
        out
    }
}
