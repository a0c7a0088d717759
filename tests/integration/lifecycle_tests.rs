use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::{SubsecRound, Utc};
use lineup::models::poll::{PollSpec, PollStatus, Schedule};
use lineup::models::task::{TaskStatus, FINALIZE_POLL};
use lineup::persistence::task_repo::TaskRepo;
use lineup::slack::handlers::poll_command::creator;
use lineup::AppError;

use super::test_helpers::{test_state, user};

#[tokio::test]
async fn create_renders_stores_and_schedules() {
    let (state, transport) = test_state().await;
    let lead = user("U0", "lead");

    let before = Utc::now().trunc_subsecs(3);
    let poll = state
        .lifecycle
        .create_poll(
            "C1",
            PollSpec::with_duration("Standup", Duration::from_secs(45 * 60)),
            creator(&lead),
        )
        .await
        .unwrap();

    let polls = transport.polls.lock().unwrap().clone();
    assert_eq!(polls.len(), 1);
    let (native, request) = &polls[0];
    assert_eq!(native.poll_id, poll.poll_id);
    assert_eq!(request.options, vec!["Иду".to_owned(), "Не иду".to_owned()]);
    assert!(request.single_answer);
    assert!(!request.anonymous);
    assert!(request.question.starts_with("Standup (until "));

    let stored = state.polls.get(&poll.poll_id).await.unwrap().unwrap();
    assert_eq!(stored.status, PollStatus::Active);
    assert_eq!(stored.message_id, native.message_id);
    assert_eq!(stored.creator.user_id, "U0");
    assert!(stored.ends_at >= before + chrono::Duration::minutes(45));

    let tasks = TaskRepo::new(state.db.clone());
    let task = tasks
        .get_by_key(FINALIZE_POLL, &poll.poll_id)
        .await
        .unwrap()
        .expect("finalize task scheduled");
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.run_at.timestamp_millis(), poll.ends_at.timestamp_millis());
    assert!(task.payload.contains(&poll.poll_id));
}

#[tokio::test]
async fn returned_poll_matches_stored_row() {
    let (state, _) = test_state().await;
    let lead = user("U0", "lead");
    let at = Utc::now() + chrono::Duration::nanoseconds(90 * 60 * 1_000_000_000 + 123_456_789);

    for spec in [
        PollSpec::with_duration("Standup", Duration::from_secs(30 * 60)),
        PollSpec {
            topic: "Lab".into(),
            schedule: Schedule::At(at),
            answers: None,
            coming_answer_index: None,
        },
    ] {
        let poll = state
            .lifecycle
            .create_poll("C1", spec, creator(&lead))
            .await
            .unwrap();
        let stored = state.polls.get(&poll.poll_id).await.unwrap().unwrap();
        assert_eq!(stored.started_at, poll.started_at);
        assert_eq!(stored.ends_at, poll.ends_at);
    }
}

#[tokio::test]
async fn invalid_spec_touches_nothing() {
    let (state, transport) = test_state().await;
    let spec = PollSpec {
        topic: "Lab".into(),
        schedule: Schedule::At(Utc::now() - chrono::Duration::minutes(5)),
        answers: None,
        coming_answer_index: None,
    };
    let err = state
        .lifecycle
        .create_poll("C1", spec, Default::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidSchedule(_)));
    assert!(transport.polls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn transport_failure_stores_nothing() {
    let (state, transport) = test_state().await;
    transport.fail_create.store(true, Ordering::SeqCst);

    let err = state
        .lifecycle
        .create_poll(
            "C1",
            PollSpec::with_duration("Lab", Duration::from_secs(600)),
            Default::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Slack(_)));
    assert!(state
        .polls
        .find_expired_active_polls(Utc::now() + chrono::Duration::days(1))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn custom_answers_keep_their_mapping() {
    let (state, transport) = test_state().await;
    let spec = PollSpec {
        topic: "Lab".into(),
        schedule: Schedule::After(Duration::from_secs(600)),
        answers: Some(vec!["Не приду".into(), "Приду".into()]),
        coming_answer_index: Some(1),
    };
    let poll = state
        .lifecycle
        .create_poll("C1", spec, Default::default())
        .await
        .unwrap();
    assert_eq!(poll.coming_answer_index, 1);
    assert_eq!(
        transport.polls.lock().unwrap()[0].1.options,
        vec!["Не приду".to_owned(), "Приду".to_owned()]
    );
    assert_eq!(state.polls.get_coming_answer_index(&poll.poll_id).await.unwrap(), 1);
}
