use std::io;
use thiserror::Error;

use crate::protocol::ptp::frame::MessageType;

/// Errors that can occur while decoding, correlating or ingesting PTP frames
#[derive(Debug, Error)]
pub enum PtpError {
    // ===== Frame Errors =====
    /// Buffer too short to hold a frame
    #[error("malformed frame: need {needed} bytes, have {have}")]
    MalformedFrame {
        /// Bytes required for one frame
        needed: usize,
        /// Bytes actually available
        have: usize,
    },

    // ===== Correlation Errors =====
    /// A correlation-bearing frame with no live exchange for its sequence
    #[error("unmatched {message_type} frame, seq={sequence}")]
    UnmatchedFrame {
        /// Type of the stray frame
        message_type: MessageType,
        /// Sequence number carried by the frame
        sequence: u16,
    },

    /// An exchange passed its deadline before completing
    #[error("exchange for sync seq={sequence} expired")]
    ExchangeExpired {
        /// Sync sequence that keyed the exchange
        sequence: u16,
    },

    /// Internal consistency check failed; indicates a defect, not bad input
    #[error("invariant violation: {message}")]
    InvariantViolation {
        /// Description of the broken invariant
        message: String,
    },

    // ===== Configuration Errors =====
    /// Correlator configuration rejected
    #[error("invalid config: {field} - {message}")]
    InvalidConfig {
        /// The offending field
        field: &'static str,
        /// Why it was rejected
        message: String,
    },

    // ===== I/O Errors =====
    /// Transport I/O error from a frame source
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Frame source reached end of stream
    #[error("frame source closed")]
    SourceClosed,
}

impl PtpError {
    /// Create an invariant violation error
    #[must_use]
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    /// Check if processing can continue past this error
    ///
    /// Recoverable errors concern a single frame or exchange; everything
    /// else ends the ingestion loop.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MalformedFrame { .. } | Self::UnmatchedFrame { .. } | Self::ExchangeExpired { .. }
        )
    }
}

/// Result type alias for PTP operations
pub type Result<T> = std::result::Result<T, PtpError>;
