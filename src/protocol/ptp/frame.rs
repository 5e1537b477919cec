//! PTP frame model and fixed-layout wire encoding.
//!
//! Every frame is exactly 11 bytes on the wire, big-endian:
//!
//! ```text
//! 0      1               3                               11
//! +------+---------------+-------------------------------+
//! | type |   sequence    |     timestamp (ns, u64)       |
//! +------+---------------+-------------------------------+
//! ```
//!
//! The codec performs no validation beyond length: unknown type bytes
//! decode to [`MessageType::Unknown`] and are rejected later by the
//! correlator.

use serde::{Deserialize, Serialize};

use crate::error::{PtpError, Result};

/// Message type identifiers carried in the first byte of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// Sync (master → slave). Receipt time is T2.
    Sync,
    /// Follow-up (master → slave), carries precise T1.
    FollowUp,
    /// Delay request (slave → master), sent at T3.
    DelayReq,
    /// Delay response (master → slave), carries T4.
    DelayResp,
    /// Any other type byte, preserved verbatim.
    Unknown(u8),
}

impl MessageType {
    /// Map a wire byte to a message type. Never fails.
    #[must_use]
    pub fn from_byte(value: u8) -> Self {
        match value {
            0 => Self::Sync,
            1 => Self::FollowUp,
            2 => Self::DelayReq,
            3 => Self::DelayResp,
            other => Self::Unknown(other),
        }
    }

    /// Wire byte for this message type.
    #[must_use]
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Sync => 0,
            Self::FollowUp => 1,
            Self::DelayReq => 2,
            Self::DelayResp => 3,
            Self::Unknown(other) => other,
        }
    }

    /// Whether the frame's timestamp field carries a master time (T1 or T4).
    #[must_use]
    pub fn carries_timestamp(self) -> bool {
        matches!(self, Self::FollowUp | Self::DelayResp)
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sync => write!(f, "Sync"),
            Self::FollowUp => write!(f, "Follow_Up"),
            Self::DelayReq => write!(f, "Delay_Req"),
            Self::DelayResp => write!(f, "Delay_Resp"),
            Self::Unknown(b) => write!(f, "Unknown(0x{b:02X})"),
        }
    }
}

/// One PTP message as seen by the correlator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frame {
    /// Message type.
    pub message_type: MessageType,
    /// Sequence ID used to match messages of one exchange leg.
    pub sequence: u16,
    /// Nanosecond timestamp; T1 for `Follow_Up`, T4 for `Delay_Resp`,
    /// reserved otherwise.
    pub timestamp: u64,
}

impl Frame {
    /// Wire size in bytes.
    pub const SIZE: usize = 11;

    /// Create a new frame.
    #[must_use]
    pub fn new(message_type: MessageType, sequence: u16, timestamp: u64) -> Self {
        Self {
            message_type,
            sequence,
            timestamp,
        }
    }

    /// Create a Sync frame (timestamp reserved).
    #[must_use]
    pub fn sync(sequence: u16) -> Self {
        Self::new(MessageType::Sync, sequence, 0)
    }

    /// Create a `Follow_Up` frame carrying the precise T1.
    #[must_use]
    pub fn follow_up(sequence: u16, t1: u64) -> Self {
        Self::new(MessageType::FollowUp, sequence, t1)
    }

    /// Create a `Delay_Req` frame (timestamp reserved).
    #[must_use]
    pub fn delay_req(sequence: u16) -> Self {
        Self::new(MessageType::DelayReq, sequence, 0)
    }

    /// Create a `Delay_Resp` frame carrying T4.
    #[must_use]
    pub fn delay_resp(sequence: u16, t4: u64) -> Self {
        Self::new(MessageType::DelayResp, sequence, t4)
    }

    /// Encode to the fixed 11-byte layout.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = self.message_type.as_byte();
        buf[1..3].copy_from_slice(&self.sequence.to_be_bytes());
        buf[3..11].copy_from_slice(&self.timestamp.to_be_bytes());
        buf
    }

    /// Decode from bytes. Trailing bytes beyond the first 11 are ignored.
    ///
    /// # Errors
    /// Returns `PtpError::MalformedFrame` if fewer than 11 bytes are given.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(PtpError::MalformedFrame {
                needed: Self::SIZE,
                have: data.len(),
            });
        }
        Ok(Self {
            message_type: MessageType::from_byte(data[0]),
            sequence: u16::from_be_bytes([data[1], data[2]]),
            timestamp: u64::from_be_bytes([
                data[3], data[4], data[5], data[6], data[7], data[8], data[9], data[10],
            ]),
        })
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} seq={} ts={}",
            self.message_type, self.sequence, self.timestamp
        )
    }
}
