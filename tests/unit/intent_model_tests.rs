use std::time::Duration;

use chrono::{TimeZone, Utc};
use lineup::display::DisplayZone;
use lineup::models::intent::PollIntent;
use lineup::models::poll::Schedule;
use lineup::AppError;

#[test]
fn duration_becomes_relative_schedule() {
    let intent = PollIntent {
        topic: "Math".into(),
        duration: Some("45m".into()),
        ..PollIntent::default()
    };
    let spec = intent.into_spec(&DisplayZone::moscow()).unwrap();
    assert_eq!(spec.topic, "Math");
    assert_eq!(spec.schedule, Schedule::After(Duration::from_secs(45 * 60)));
    assert!(spec.answers.is_none());
}

#[test]
fn end_time_wins_over_duration() {
    let intent = PollIntent {
        topic: "Lab".into(),
        duration: Some("45m".into()),
        end_time: Some("2030-01-15T13:48:00+03:00".into()),
        ..PollIntent::default()
    };
    let spec = intent.into_spec(&DisplayZone::moscow()).unwrap();
    let expected = Utc.with_ymd_and_hms(2030, 1, 15, 10, 48, 0).unwrap();
    assert_eq!(spec.schedule, Schedule::At(expected));
}

#[test]
fn empty_answers_fall_back_to_defaults() {
    let intent = PollIntent {
        topic: "Lab".into(),
        duration: Some("1h".into()),
        answers: Some(Vec::new()),
        ..PollIntent::default()
    };
    assert!(intent.into_spec(&DisplayZone::moscow()).unwrap().answers.is_none());
}

#[test]
fn missing_schedule_is_rejected() {
    let intent = PollIntent {
        topic: "Lab".into(),
        ..PollIntent::default()
    };
    assert!(matches!(
        intent.into_spec(&DisplayZone::moscow()),
        Err(AppError::Validation(_))
    ));
}

#[test]
fn deserializes_sparse_json() {
    let intent: PollIntent = serde_json::from_str(r#"{"topic":"Math","duration":"30m"}"#).unwrap();
    assert_eq!(intent.duration.as_deref(), Some("30m"));
    assert!(intent.end_time.is_none());
    assert!(intent.coming_answer_index.is_none());
}
