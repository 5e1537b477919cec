//! Protocol module

pub mod ptp;
