use super::*;
use crate::protocol::ptp::{Correlator, HandleOutcome, MessageType};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_scripted_source_replays_in_order() {
    let mut source = ScriptedFrameSource::new(vec![
        (Frame::sync(1), Timestamp::from_nanos(100)),
        (Frame::follow_up(1, 50), Timestamp::from_nanos(110)),
    ]);

    let (frame, at) = source.read_frame().await.unwrap();
    assert_eq!(frame, Frame::sync(1));
    assert_eq!(at, Timestamp::from_nanos(100));

    let (frame, _) = source.read_frame().await.unwrap();
    assert_eq!(frame.message_type, MessageType::FollowUp);

    assert!(matches!(
        source.read_frame().await,
        Err(PtpError::SourceClosed)
    ));
}

#[tokio::test]
async fn test_scripted_source_yields_errors() {
    let mut source = ScriptedFrameSource::default()
        .then_error(PtpError::MalformedFrame {
            needed: 11,
            have: 4,
        })
        .then_frame(Frame::sync(9), Timestamp::ZERO);

    assert_eq!(source.remaining(), 2);
    assert!(matches!(
        source.read_frame().await,
        Err(PtpError::MalformedFrame { have: 4, .. })
    ));
    assert!(source.read_frame().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_scripted_source_hold_open_pends() {
    let mut source = ScriptedFrameSource::default().hold_open();
    let result = tokio::time::timeout(Duration::from_secs(1), source.read_frame()).await;
    assert!(result.is_err(), "held-open source should pend");
}

#[test]
fn test_recording_sink_collects() {
    let sink = Arc::new(RecordingSink::new());
    let correlator = Correlator::with_sink(Arc::clone(&sink))
        .with_delay_pairing(|seq| seq);

    for (frame, at) in exchange_script(1, 1, 1_000_000, 300, 2_000, 5_000) {
        correlator.handle(frame, at).unwrap();
    }

    assert_eq!(sink.len(), 1);
    let m = sink.measurements()[0];
    assert_eq!(m.offset_ns, 300);
    assert_eq!(m.delay_ns, 2_000);
}

#[test]
fn test_exchange_script_completes_last_frame() {
    let sink = Arc::new(RecordingSink::new());
    let correlator = Correlator::with_sink(Arc::clone(&sink));
    let mut script = exchange_script(5, 6, 10_000, 0, 100, 0).into_iter();

    let (sync, t2) = script.next().unwrap();
    assert_eq!(correlator.handle(sync, t2).unwrap(), HandleOutcome::Created);
    assert!(correlator.bind_delay_sequence(5, 6).unwrap());

    let outcomes: Vec<_> = script
        .map(|(f, at)| correlator.handle(f, at).unwrap())
        .collect();

    assert_eq!(outcomes[0], HandleOutcome::Updated);
    assert_eq!(outcomes[1], HandleOutcome::Updated);
    assert!(matches!(outcomes[2], HandleOutcome::Completed(_)));
    assert_eq!(sink.measurements()[0].delay_sequence, 6);
}

// ===== NetworkSimulator =====

#[test]
fn test_perfect_network_is_identity() {
    let sim = NetworkSimulator::perfect();
    let mut rng = StdRng::seed_from_u64(7);
    let script = exchange_script(1, 1, 1_000, 0, 10, 10);

    assert_eq!(sim.apply(script.clone(), &mut rng), script);
}

#[test]
fn test_total_loss_drops_everything() {
    let sim = NetworkSimulator {
        loss_rate: 1.0,
        ..NetworkSimulator::perfect()
    };
    let mut rng = StdRng::seed_from_u64(7);
    assert!(
        sim.apply(exchange_script(1, 1, 1_000, 0, 10, 10), &mut rng)
            .is_empty()
    );
}

#[test]
fn test_full_duplication_doubles_script() {
    let sim = NetworkSimulator {
        duplicate_rate: 1.0,
        ..NetworkSimulator::perfect()
    };
    let mut rng = StdRng::seed_from_u64(7);
    let out = sim.apply(exchange_script(1, 1, 1_000, 0, 10, 10), &mut rng);

    assert_eq!(out.len(), 8);
    assert_eq!(out[0], out[1]);
}

#[test]
fn test_jitter_only_delays() {
    let sim = NetworkSimulator {
        jitter: Duration::from_micros(10),
        ..NetworkSimulator::perfect()
    };
    let mut rng = StdRng::seed_from_u64(42);
    let script = exchange_script(1, 1, 1_000_000, 0, 10, 10);
    let out = sim.apply(script.clone(), &mut rng);

    for ((f_in, t_in), (f_out, t_out)) in script.iter().zip(out.iter()) {
        assert_eq!(f_in, f_out);
        assert!(t_out >= t_in);
        assert!(t_out.as_nanos() - t_in.as_nanos() < 10_000);
    }
}

#[test]
fn test_stress_preset_keeps_frames_intact() {
    let sim = NetworkSimulator::stress_test();
    let mut rng = StdRng::seed_from_u64(1);
    let script: Vec<_> = (0..50u16)
        .flat_map(|i| exchange_script(i, i, 1_000_000 * u64::from(i + 1), 0, 10, 10))
        .collect();

    let out = sim.apply(script.clone(), &mut rng);
    for (frame, _) in &out {
        assert!(script.iter().any(|(f, _)| f == frame));
    }
}
