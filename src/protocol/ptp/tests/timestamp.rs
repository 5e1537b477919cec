use crate::protocol::ptp::timestamp::{Timestamp, saturate_i64};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// ===== Construction =====

#[test]
fn test_zero_constant() {
    assert_eq!(Timestamp::ZERO.as_nanos(), 0);
    assert_eq!(Timestamp::default(), Timestamp::ZERO);
}

#[test]
fn test_now_returns_reasonable_value() {
    let ts = Timestamp::now();
    // After 2020-01-01
    assert!(
        ts.as_nanos() > 1_577_836_800 * Timestamp::NANOS_PER_SEC,
        "Timestamp too old: {ts}"
    );
}

#[test]
fn test_from_system_time() {
    let time = UNIX_EPOCH + Duration::new(5, 250);
    assert_eq!(
        Timestamp::from_system_time(time).as_nanos(),
        5_000_000_250
    );
}

#[test]
fn test_from_system_time_before_epoch_clamps() {
    let time = UNIX_EPOCH - Duration::from_secs(1);
    assert_eq!(Timestamp::from(time), Timestamp::ZERO);
}

#[test]
fn test_u64_conversions() {
    let ts = Timestamp::from(42u64);
    assert_eq!(u64::from(ts), 42);
}

// ===== Signed arithmetic =====

#[test]
fn test_as_signed_reinterprets_high_bit() {
    assert_eq!(Timestamp::from_nanos(5).as_signed(), 5);
    assert_eq!(Timestamp::MAX.as_signed(), -1);
    assert_eq!(Timestamp::from_nanos(1 << 63).as_signed(), i64::MIN);
}

#[test]
fn test_diff_nanos_positive() {
    let a = Timestamp::from_nanos(1_050);
    let b = Timestamp::from_nanos(1_000);
    assert_eq!(a.diff_nanos(&b), 50);
}

#[test]
fn test_diff_nanos_negative() {
    let a = Timestamp::from_nanos(1_000);
    let b = Timestamp::from_nanos(1_050);
    assert_eq!(a.diff_nanos(&b), -50);
}

#[test]
fn test_diff_nanos_extremes_do_not_overflow() {
    let max_signed = Timestamp::from_nanos(i64::MAX as u64);
    let min_signed = Timestamp::from_nanos(1 << 63);
    assert_eq!(
        max_signed.diff_nanos(&min_signed),
        i128::from(i64::MAX) - i128::from(i64::MIN)
    );
}

#[test]
fn test_saturate_i64() {
    assert_eq!(saturate_i64(7), 7);
    assert_eq!(saturate_i64(i128::from(i64::MAX) + 1), i64::MAX);
    assert_eq!(saturate_i64(i128::from(i64::MIN) - 1), i64::MIN);
}

// ===== Duration arithmetic =====

#[test]
fn test_checked_add() {
    let ts = Timestamp::from_nanos(1_000);
    assert_eq!(
        ts.checked_add(Duration::from_micros(1)),
        Some(Timestamp::from_nanos(2_000))
    );
    assert_eq!(Timestamp::MAX.checked_add(Duration::from_nanos(1)), None);
}

#[test]
fn test_saturating_add() {
    assert_eq!(
        Timestamp::MAX.saturating_add(Duration::from_secs(4)),
        Timestamp::MAX
    );
    assert_eq!(
        Timestamp::ZERO.saturating_add(Duration::from_secs(4)),
        Timestamp::from_nanos(4_000_000_000)
    );
}

#[test]
fn test_saturating_duration_since() {
    let early = Timestamp::from_nanos(1_000);
    let late = Timestamp::from_nanos(3_500);
    assert_eq!(late.saturating_duration_since(early), Duration::from_nanos(2_500));
    assert_eq!(early.saturating_duration_since(late), Duration::ZERO);
}

// ===== Display / ordering =====

#[test]
fn test_display_pads_nanoseconds() {
    assert_eq!(Timestamp::from_nanos(5_000_000_042).to_string(), "5.000000042");
    assert_eq!(Timestamp::ZERO.to_string(), "0.000000000");
}

#[test]
fn test_ordering() {
    assert!(Timestamp::from_nanos(1) < Timestamp::from_nanos(2));
    assert!(Timestamp::now() > Timestamp::from_system_time(SystemTime::UNIX_EPOCH));
}
