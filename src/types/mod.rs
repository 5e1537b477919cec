//! Core types module

mod config;


pub use config::{CorrelatorConfig, CorrelatorConfigBuilder};
