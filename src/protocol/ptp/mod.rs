//! Precision Time Protocol (PTPv2, two-step profile) timing core.
//!
//! Correlates Sync, `Follow_Up`, `Delay_Req` and `Delay_Resp` frames into
//! exchanges and computes clock offset and path delay between one master
//! and this slave.
//!
//! ## Exchange Flow
//!
//! ```text
//! Master                          Slave
//!   |--- Sync ---------------------->|  (slave records T2)
//!   |--- Follow_Up (precise T1) ---->|
//!   |                                |
//!   |<---- Delay_Req --------------- |  (slave records T3)
//!   |---- Delay_Resp (T4) --------->|
//!   |                                |
//!   |  offset = ((T2-T1)-(T4-T3))/2 |
//!   |  delay  = ((T2-T1)+(T4-T3))/2 |
//! ```
//!
//! Sync and `Follow_Up` share the master's sequence number. The delay leg
//! uses the slave's own, independently incrementing sequence, allocated
//! for a named Sync by [`Correlator::issue_delay_req`]. Sequences numbered
//! elsewhere are tied to their Sync with
//! [`Correlator::bind_delay_sequence`] or [`Correlator::with_delay_pairing`].
//! An unbound delay leg is never matched.
//!
//! ## Wire Format
//!
//! Every frame is 11 bytes, big-endian: type (1), sequence (2),
//! timestamp in nanoseconds (8). See [`Frame`].

pub mod correlator;
pub mod estimator;
pub mod exchange;
pub mod frame;
pub mod sink;
pub mod source;
pub mod timestamp;

#[cfg(feature = "tokio-runtime")]
pub mod codec;
#[cfg(feature = "tokio-runtime")]
pub mod ingest;

#[cfg(test)]
mod tests;

// Re-exports for convenient access.
#[cfg(feature = "tokio-runtime")]
pub use codec::FrameCodec;
pub use correlator::{Correlator, CorrelatorStats, HandleOutcome, SequenceIdGenerator};
pub use estimator::OffsetEstimator;
pub use exchange::{DataQuality, Measurement, Stage};
pub use frame::{Frame, MessageType};
#[cfg(feature = "tokio-runtime")]
pub use ingest::{
    IngestSummary, MIN_SWEEP_INTERVAL, StopReason, run_ingest, spawn_expiry_sweeper,
    spawn_expiry_sweeper_with_clock,
};
#[cfg(feature = "tokio-runtime")]
pub use sink::ChannelSink;
pub use sink::{FanoutSink, FnSink, ReportSink, TracingSink};
pub use source::{FrameSource, LocalClock};
#[cfg(feature = "tokio-runtime")]
pub use source::{StreamFrameSource, UdpFrameSource};
pub use timestamp::Timestamp;
