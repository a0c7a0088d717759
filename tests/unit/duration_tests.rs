use std::time::Duration;

use lineup::intent::duration::{format_duration_literal, parse_duration};
use lineup::AppError;

#[test]
fn parses_compound_literals() {
    assert_eq!(parse_duration("45m").unwrap(), Duration::from_secs(45 * 60));
    assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
    assert_eq!(parse_duration("2d").unwrap(), Duration::from_secs(2 * 86_400));
    assert_eq!(parse_duration("1d2h3m4s").unwrap(), Duration::from_secs(93_784));
    assert_eq!(parse_duration(" 90M ").unwrap(), Duration::from_secs(5400));
}

#[test]
fn rejects_garbage() {
    for raw in ["", "abc", "30", "m", "1x", "1h 30m", "-5m"] {
        assert!(
            matches!(parse_duration(raw), Err(AppError::Validation(_))),
            "`{raw}` should be rejected"
        );
    }
}

#[test]
fn formats_canonical_literal() {
    assert_eq!(format_duration_literal(Duration::from_secs(5400)), "1h30m");
    assert_eq!(format_duration_literal(Duration::from_secs(86_400)), "1d");
    assert_eq!(format_duration_literal(Duration::from_secs(15 * 60)), "15m");
    assert_eq!(format_duration_literal(Duration::ZERO), "0m");
}

#[test]
fn formatted_literal_parses_back() {
    for secs in [60, 900, 3600, 5400, 86_400, 93_784] {
        let duration = Duration::from_secs(secs);
        assert_eq!(parse_duration(&format_duration_literal(duration)).unwrap(), duration);
    }
}

#[test]
fn parsing_is_shared_across_threads() {
    std::thread::scope(|scope| {
        let handles: Vec<_> = (1..=8_u64)
            .map(|hours| scope.spawn(move || parse_duration(&format!("{hours}h15m"))))
            .collect();
        for (hours, handle) in (1..=8_u64).zip(handles) {
            assert_eq!(
                handle.join().unwrap().unwrap(),
                Duration::from_secs(hours * 3_600 + 900)
            );
        }
    });
}
