use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PtpError, Result};

/// Configuration for the exchange correlator and its helpers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelatorConfig {
    /// Lifetime of an incomplete exchange, measured from its Sync (default: 4 seconds)
    pub exchange_timeout: Duration,

    /// Maximum number of live exchanges before the oldest is evicted (default: 64)
    pub max_live_exchanges: usize,

    /// Period of the background expiry sweeper (default: 1 second)
    pub sweep_interval: Duration,

    /// Capacity of the bounded queue behind `ChannelSink` (default: 32)
    pub report_queue_depth: usize,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            exchange_timeout: Duration::from_secs(4),
            max_live_exchanges: 64,
            sweep_interval: Duration::from_secs(1),
            report_queue_depth: 32,
        }
    }
}

impl CorrelatorConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> CorrelatorConfigBuilder {
        CorrelatorConfigBuilder::default()
    }

    /// Check that every field is usable
    ///
    /// # Errors
    ///
    /// Returns `PtpError::InvalidConfig` naming the first rejected field.
    pub fn validate(&self) -> Result<()> {
        if self.exchange_timeout.is_zero() {
            return Err(PtpError::InvalidConfig {
                field: "exchange_timeout",
                message: "must be greater than zero".to_string(),
            });
        }
        if u64::try_from(self.exchange_timeout.as_nanos()).is_err() {
            return Err(PtpError::InvalidConfig {
                field: "exchange_timeout",
                message: "does not fit in 64-bit nanoseconds".to_string(),
            });
        }
        if self.max_live_exchanges == 0 {
            return Err(PtpError::InvalidConfig {
                field: "max_live_exchanges",
                message: "must be at least 1".to_string(),
            });
        }
        if self.sweep_interval.is_zero() {
            return Err(PtpError::InvalidConfig {
                field: "sweep_interval",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.report_queue_depth == 0 {
            return Err(PtpError::InvalidConfig {
                field: "report_queue_depth",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for `CorrelatorConfig`
#[derive(Debug, Clone, Default)]
pub struct CorrelatorConfigBuilder {
    config: CorrelatorConfig,
}

impl CorrelatorConfigBuilder {
    /// Set exchange timeout
    #[must_use]
    pub fn exchange_timeout(mut self, timeout: Duration) -> Self {
        self.config.exchange_timeout = timeout;
        self
    }

    /// Set the live exchange cap
    #[must_use]
    pub fn max_live_exchanges(mut self, max: usize) -> Self {
        self.config.max_live_exchanges = max;
        self
    }

    /// Set background sweep interval
    #[must_use]
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Set report queue depth
    #[must_use]
    pub fn report_queue_depth(mut self, depth: usize) -> Self {
        self.config.report_queue_depth = depth;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `PtpError::InvalidConfig` if a field is out of range.
    pub fn build(self) -> Result<CorrelatorConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
