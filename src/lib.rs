//! # ptp2
//!
//! Timing core of a two-step PTPv2 (IEEE 1588) slave.
//!
//! ## Features
//!
//! - Fixed-layout 11-byte frame codec
//! - Concurrent exchange correlator matching Sync, `Follow_Up`,
//!   `Delay_Req` and `Delay_Resp` by sequence number
//! - Offset and path-delay computation with data-quality flagging
//! - Deadline-based expiry and a bounded live-exchange table
//! - Pluggable report sinks, UDP and byte-stream frame sources
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use ptp2::protocol::ptp::{Correlator, Frame, HandleOutcome, Timestamp};
//! use ptp2::testing::RecordingSink;
//!
//! # fn main() -> Result<(), ptp2::PtpError> {
//! let sink = Arc::new(RecordingSink::new());
//! let correlator = Correlator::with_sink(Arc::clone(&sink));
//!
//! correlator.handle(Frame::sync(1), Timestamp::from_nanos(1_050))?;
//! correlator.handle(Frame::follow_up(1, 1_000), Timestamp::from_nanos(1_060))?;
//!
//! let delay_req = correlator.issue_delay_req(1)?.expect("exchange waiting");
//! correlator.handle(delay_req, Timestamp::from_nanos(2_000))?;
//!
//! let outcome = correlator.handle(
//!     Frame::delay_resp(delay_req.sequence, 2_040),
//!     Timestamp::from_nanos(2_100),
//! )?;
//!
//! if let HandleOutcome::Completed(m) = outcome {
//!     assert_eq!(m.offset_ns, 5);
//!     assert_eq!(m.delay_ns, 45);
//! }
//! assert_eq!(sink.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Frames**: `Frame` encode/decode, `FrameCodec` for byte streams
//! - **Correlation**: `Correlator` owns all exchange state behind one lock
//! - **Edges**: `FrameSource` in, `ReportSink` out, `run_ingest` between

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
/// Error types
pub mod error;
/// Core types
pub mod types;

/// Testing utilities
pub mod testing;

pub mod protocol;

// Re-exports
pub use error::PtpError;
pub use protocol::ptp::{
    Correlator, CorrelatorStats, Frame, HandleOutcome, Measurement, MessageType, ReportSink,
    Timestamp,
};
pub use types::CorrelatorConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
///
/// Convenient re-exports
pub mod prelude {
    pub use crate::protocol::ptp::{
        DataQuality, FrameSource, OffsetEstimator, TracingSink,
    };
    #[cfg(feature = "tokio-runtime")]
    pub use crate::protocol::ptp::{ChannelSink, UdpFrameSource, run_ingest};
    pub use crate::{
        Correlator, CorrelatorConfig, Frame, HandleOutcome, Measurement, MessageType, PtpError,
        ReportSink, Timestamp,
    };
}
