//! Report sinks receiving completed measurements.
//!
//! The correlator calls [`ReportSink::report`] once per completed
//! exchange, after releasing its internal lock. Sinks must not block:
//! anything slow should hand off through [`ChannelSink`].

use std::sync::Arc;
#[cfg(feature = "tokio-runtime")]
use std::sync::atomic::{AtomicU64, Ordering};

use super::exchange::Measurement;

/// Consumer of completed offset/delay measurements.
pub trait ReportSink: Send + Sync {
    /// Accept one measurement. Fire-and-forget.
    fn report(&self, measurement: Measurement);
}

impl<T: ReportSink + ?Sized> ReportSink for Arc<T> {
    fn report(&self, measurement: Measurement) {
        (**self).report(measurement);
    }
}

impl<T: ReportSink + ?Sized> ReportSink for Box<T> {
    fn report(&self, measurement: Measurement) {
        (**self).report(measurement);
    }
}

/// Sink that logs every measurement through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn report(&self, m: Measurement) {
        tracing::info!(
            sync_sequence = m.sync_sequence,
            delay_sequence = m.delay_sequence,
            offset_ns = m.offset_ns,
            delay_ns = m.delay_ns,
            quality = ?m.quality,
            "PTP: measurement"
        );
    }
}

/// Sink adapter for a closure.
pub struct FnSink<F>(F);

impl<F> FnSink<F>
where
    F: Fn(Measurement) + Send + Sync,
{
    /// Wrap a closure.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> ReportSink for FnSink<F>
where
    F: Fn(Measurement) + Send + Sync,
{
    fn report(&self, measurement: Measurement) {
        (self.0)(measurement);
    }
}

impl<F> std::fmt::Debug for FnSink<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSink").finish_non_exhaustive()
    }
}

/// Sink forwarding every report to several others, in order.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn ReportSink>>,
}

impl FanoutSink {
    /// Create an empty fan-out.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a downstream sink.
    #[must_use]
    pub fn with(mut self, sink: impl ReportSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Number of downstream sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether no downstream sinks are attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ReportSink for FanoutSink {
    fn report(&self, measurement: Measurement) {
        for sink in &self.sinks {
            sink.report(measurement);
        }
    }
}

impl std::fmt::Debug for FanoutSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

/// Non-blocking hand-off to an async consumer over a bounded queue.
///
/// Reports that do not fit are dropped and counted.
#[cfg(feature = "tokio-runtime")]
#[derive(Debug)]
pub struct ChannelSink {
    tx: tokio::sync::mpsc::Sender<Measurement>,
    dropped: AtomicU64,
}

#[cfg(feature = "tokio-runtime")]
impl ChannelSink {
    /// Create a sink and its receiving end with room for `depth` reports.
    ///
    /// A depth of zero is raised to one.
    #[must_use]
    pub fn new(depth: usize) -> (Self, tokio::sync::mpsc::Receiver<Measurement>) {
        let (tx, rx) = tokio::sync::mpsc::channel(depth.max(1));
        (
            Self {
                tx,
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// Create a sink sized by `config.report_queue_depth`.
    #[must_use]
    pub fn from_config(
        config: &crate::types::CorrelatorConfig,
    ) -> (Self, tokio::sync::mpsc::Receiver<Measurement>) {
        Self::new(config.report_queue_depth)
    }

    /// Reports dropped because the queue was full or closed.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(feature = "tokio-runtime")]
impl ReportSink for ChannelSink {
    fn report(&self, measurement: Measurement) {
        use tokio::sync::mpsc::error::TrySendError;

        match self.tx.try_send(measurement) {
            Ok(()) => {}
            Err(TrySendError::Full(m)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    sync_sequence = m.sync_sequence,
                    "PTP: report queue full, dropping measurement"
                );
            }
            Err(TrySendError::Closed(m)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    sync_sequence = m.sync_sequence,
                    "PTP: report receiver closed"
                );
            }
        }
    }
}
