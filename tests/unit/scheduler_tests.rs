use std::time::Duration;

use lineup::orchestrator::scheduler::{retry_delay, MAX_RETRY_DELAY};

#[test]
fn delay_doubles_per_attempt() {
    let base = Duration::from_secs(5);
    assert_eq!(retry_delay(base, 1), Duration::from_secs(5));
    assert_eq!(retry_delay(base, 2), Duration::from_secs(10));
    assert_eq!(retry_delay(base, 4), Duration::from_secs(40));
}

#[test]
fn delay_is_capped() {
    let base = Duration::from_secs(5);
    assert_eq!(retry_delay(base, 20), MAX_RETRY_DELAY);
    assert_eq!(retry_delay(base, u32::MAX), MAX_RETRY_DELAY);
}

#[test]
fn attempt_zero_uses_base() {
    assert_eq!(retry_delay(Duration::from_secs(3), 0), Duration::from_secs(3));
}
