use crate::protocol::ptp::correlator::Correlator;
use crate::protocol::ptp::exchange::Measurement;
use crate::protocol::ptp::frame::Frame;
use crate::protocol::ptp::sink::{FanoutSink, FnSink, ReportSink, TracingSink};
use crate::protocol::ptp::timestamp::Timestamp;
use crate::testing::RecordingSink;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

fn sample(sync_sequence: u16) -> Measurement {
    Measurement::calculate(
        sync_sequence,
        0,
        Timestamp::from_nanos(1000),
        Timestamp::from_nanos(1050),
        Timestamp::from_nanos(2000),
        Timestamp::from_nanos(2040),
    )
}

#[test]
fn test_fn_sink_invokes_closure() {
    let seen = Arc::new(AtomicI64::new(0));
    let seen_clone = Arc::clone(&seen);
    let sink = FnSink::new(move |m: Measurement| {
        seen_clone.store(m.offset_ns, Ordering::SeqCst);
    });

    sink.report(sample(1));
    assert_eq!(seen.load(Ordering::SeqCst), 5);
}

#[test]
fn test_tracing_sink_accepts_reports() {
    // No subscriber required
    TracingSink.report(sample(1));
}

#[test]
fn test_arc_and_box_forward() {
    let inner = Arc::new(RecordingSink::new());
    let boxed: Box<dyn ReportSink> = Box::new(Arc::clone(&inner));

    boxed.report(sample(1));
    Arc::clone(&inner).report(sample(2));

    assert_eq!(inner.len(), 2);
}

#[test]
fn test_fanout_reaches_every_sink_in_order() {
    let first = Arc::new(RecordingSink::new());
    let second = Arc::new(RecordingSink::new());
    let fanout = FanoutSink::new()
        .with(Arc::clone(&first))
        .with(Arc::clone(&second));

    assert_eq!(fanout.len(), 2);
    fanout.report(sample(3));
    fanout.report(sample(4));

    assert_eq!(first.measurements(), second.measurements());
    assert_eq!(first.measurements()[1].sync_sequence, 4);
}

#[test]
fn test_empty_fanout() {
    let fanout = FanoutSink::new();
    assert!(fanout.is_empty());
    fanout.report(sample(1));
}

#[test]
fn test_sink_called_outside_lock() {
    // A sink that re-enters the correlator would deadlock if called under
    // the state lock.
    let correlator = Arc::new(std::sync::OnceLock::<Arc<Correlator>>::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let handle = Arc::clone(&correlator);
    let counter = Arc::clone(&calls);
    let sink = FnSink::new(move |_m: Measurement| {
        if let Some(c) = handle.get() {
            let _ = c.live_exchanges();
            let _ = c.stats();
        }
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let c = Arc::new(Correlator::with_sink(sink));
    assert!(correlator.set(Arc::clone(&c)).is_ok());

    c.handle(Frame::sync(1), Timestamp::from_nanos(1050))
        .unwrap();
    c.handle(Frame::follow_up(1, 1000), Timestamp::from_nanos(1060))
        .unwrap();
    let req = c.issue_delay_req(1).unwrap().unwrap();
    c.handle(req, Timestamp::from_nanos(2000)).unwrap();
    c.handle(Frame::delay_resp(req.sequence, 2040), Timestamp::from_nanos(2100))
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[cfg(feature = "tokio-runtime")]
mod channel {
    use super::sample;
    use crate::protocol::ptp::sink::{ChannelSink, ReportSink};
    use crate::types::CorrelatorConfig;

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::new(4);
        sink.report(sample(1));
        sink.report(sample(2));

        assert_eq!(rx.recv().await.unwrap().sync_sequence, 1);
        assert_eq!(rx.recv().await.unwrap().sync_sequence, 2);
        assert_eq!(sink.dropped(), 0);
    }

    #[tokio::test]
    async fn test_channel_sink_drops_when_full() {
        let (sink, mut rx) = ChannelSink::new(2);
        for seq in 0..5 {
            sink.report(sample(seq));
        }

        assert_eq!(sink.dropped(), 3);
        assert_eq!(rx.recv().await.unwrap().sync_sequence, 0);
        assert_eq!(rx.recv().await.unwrap().sync_sequence, 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_sink_counts_closed_receiver() {
        let (sink, rx) = ChannelSink::new(2);
        drop(rx);
        sink.report(sample(1));
        assert_eq!(sink.dropped(), 1);
    }

    #[test]
    fn test_channel_sink_from_config() {
        let config = CorrelatorConfig::builder()
            .report_queue_depth(1)
            .build()
            .unwrap();
        let (sink, _rx) = ChannelSink::from_config(&config);
        sink.report(sample(1));
        sink.report(sample(2));
        assert_eq!(sink.dropped(), 1);
    }
}
