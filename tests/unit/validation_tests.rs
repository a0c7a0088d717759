use std::time::Duration;

use chrono::Utc;
use lineup::models::poll::{PollSpec, Schedule, DEFAULT_ANSWERS};
use lineup::orchestrator::lifecycle::validate_spec;
use lineup::AppError;

#[test]
fn default_answers_and_index() {
    let now = Utc::now();
    let spec = validate_spec(PollSpec::with_duration("  Math ", Duration::from_secs(2700)), now)
        .unwrap();
    assert_eq!(spec.topic, "Math");
    assert_eq!(spec.answers, DEFAULT_ANSWERS.map(str::to_owned).to_vec());
    assert_eq!(spec.coming_answer_index, 0);
    assert_eq!(spec.started_at, now);
    assert_eq!(spec.ends_at, now + chrono::Duration::seconds(2700));
}

#[test]
fn absolute_end_resolves_duration() {
    let now = Utc::now();
    let spec = PollSpec {
        topic: "Lab".into(),
        schedule: Schedule::At(now + chrono::Duration::minutes(90)),
        answers: None,
        coming_answer_index: None,
    };
    let validated = validate_spec(spec, now).unwrap();
    assert_eq!(validated.duration, Duration::from_secs(5400));
}

#[test]
fn past_or_zero_schedule_is_rejected() {
    let now = Utc::now();
    let past = PollSpec {
        topic: "Lab".into(),
        schedule: Schedule::At(now - chrono::Duration::minutes(1)),
        answers: None,
        coming_answer_index: None,
    };
    assert!(matches!(validate_spec(past, now), Err(AppError::InvalidSchedule(_))));

    let zero = PollSpec::with_duration("Lab", Duration::ZERO);
    assert!(matches!(validate_spec(zero, now), Err(AppError::InvalidSchedule(_))));
}

#[test]
fn empty_topic_is_rejected() {
    let spec = PollSpec::with_duration("   ", Duration::from_secs(60));
    assert!(matches!(validate_spec(spec, Utc::now()), Err(AppError::Validation(_))));
}

#[test]
fn custom_answers_need_mapping() {
    let mut spec = PollSpec::with_duration("Lab", Duration::from_secs(60));
    spec.answers = Some(vec!["Yes".into(), "No".into(), "Maybe".into()]);
    assert!(matches!(
        validate_spec(spec.clone(), Utc::now()),
        Err(AppError::InvalidAnswerMapping(_))
    ));

    spec.coming_answer_index = Some(3);
    assert!(matches!(
        validate_spec(spec.clone(), Utc::now()),
        Err(AppError::InvalidAnswerMapping(_))
    ));

    spec.coming_answer_index = Some(2);
    let validated = validate_spec(spec, Utc::now()).unwrap();
    assert_eq!(validated.coming_answer_index, 2);
    assert_eq!(validated.answers.len(), 3);
}

#[test]
fn blank_custom_answer_is_rejected() {
    let mut spec = PollSpec::with_duration("Lab", Duration::from_secs(60));
    spec.answers = Some(vec!["Yes".into(), " ".into()]);
    spec.coming_answer_index = Some(0);
    assert!(matches!(validate_spec(spec, Utc::now()), Err(AppError::Validation(_))));
}

#[test]
fn default_answers_reject_out_of_range_index() {
    let mut spec = PollSpec::with_duration("Lab", Duration::from_secs(60));
    spec.coming_answer_index = Some(5);
    assert!(matches!(
        validate_spec(spec, Utc::now()),
        Err(AppError::InvalidAnswerMapping(_))
    ));
}
