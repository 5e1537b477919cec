//! Nanosecond timestamps and signed PTP time arithmetic.
//!
//! Wire timestamps are unsigned 64-bit nanosecond counts. For offset and
//! delay arithmetic they are reinterpreted as signed 64-bit values and
//! differences are taken in widened precision, so a skewed or hostile
//! peer can never overflow the computation.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A point in time as nanoseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Nanoseconds per second.
    pub const NANOS_PER_SEC: u64 = 1_000_000_000;

    /// Zero timestamp.
    pub const ZERO: Self = Self(0);

    /// Latest representable timestamp.
    pub const MAX: Self = Self(u64::MAX);

    /// Create from nanoseconds since epoch.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Create a timestamp from the current system time.
    #[must_use]
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Convert a `SystemTime`; times before the epoch clamp to zero and
    /// times past `u64::MAX` nanoseconds clamp to [`Timestamp::MAX`].
    #[must_use]
    pub fn from_system_time(time: SystemTime) -> Self {
        let dur = time.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        Self(u64::try_from(dur.as_nanos()).unwrap_or(u64::MAX))
    }

    /// Total nanoseconds since epoch.
    #[must_use]
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    /// The same bit pattern read as a signed nanosecond count.
    #[must_use]
    #[allow(
        clippy::cast_possible_wrap,
        reason = "PTP arithmetic treats wire timestamps as signed 64-bit values"
    )]
    pub const fn as_signed(&self) -> i64 {
        self.0 as i64
    }

    /// Signed difference in nanoseconds: `self - other`, widened.
    #[must_use]
    pub fn diff_nanos(&self, other: &Self) -> i128 {
        i128::from(self.as_signed()) - i128::from(other.as_signed())
    }

    /// Add a duration, returning `None` on overflow.
    #[must_use]
    pub fn checked_add(&self, d: Duration) -> Option<Self> {
        let nanos = u64::try_from(d.as_nanos()).ok()?;
        self.0.checked_add(nanos).map(Self)
    }

    /// Add a duration, saturating at [`Timestamp::MAX`].
    #[must_use]
    pub fn saturating_add(&self, d: Duration) -> Self {
        self.checked_add(d).unwrap_or(Self::MAX)
    }

    /// Elapsed time from `earlier` to `self`, zero if `earlier` is later.
    #[must_use]
    pub fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{:09}",
            self.0 / Self::NANOS_PER_SEC,
            self.0 % Self::NANOS_PER_SEC
        )
    }
}

impl From<u64> for Timestamp {
    fn from(nanos: u64) -> Self {
        Self(nanos)
    }
}

impl From<Timestamp> for u64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        Self::from_system_time(time)
    }
}

/// Narrow a widened nanosecond value to `i64`, saturating at the bounds.
#[must_use]
pub(crate) fn saturate_i64(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value.is_negative() {
        i64::MIN
    } else {
        i64::MAX
    })
}
