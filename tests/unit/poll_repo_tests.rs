use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lineup::models::poll::{Creator, Poll, PollStatus};
use lineup::persistence::db;
use lineup::persistence::poll_repo::PollRepo;
use lineup::AppError;

fn sample_poll(poll_id: &str, ends_at: DateTime<Utc>) -> Poll {
    Poll {
        poll_id: poll_id.to_owned(),
        chat_id: "C1".to_owned(),
        message_id: format!("msg-{poll_id}"),
        topic: "Math".to_owned(),
        creator: Creator {
            user_id: "U0".to_owned(),
            username: Some("curator".to_owned()),
            name: None,
        },
        started_at: ends_at - chrono::Duration::minutes(45),
        duration: Duration::from_secs(45 * 60),
        ends_at,
        answers: vec!["Иду".to_owned(), "Не иду".to_owned()],
        coming_answer_index: 0,
        status: PollStatus::Active,
        results_message_id: None,
        queue_user_ids: None,
    }
}

async fn repo() -> PollRepo {
    PollRepo::new(Arc::new(db::connect_memory().await.expect("db")))
}

#[tokio::test]
async fn insert_and_get_round_trip() {
    let repo = repo().await;
    let poll = sample_poll("P1", Utc::now() + chrono::Duration::minutes(45));
    assert!(repo.insert_poll(&poll).await.unwrap());

    let stored = repo.get("P1").await.unwrap().expect("stored");
    assert_eq!(stored.topic, "Math");
    assert_eq!(stored.creator.username.as_deref(), Some("curator"));
    assert_eq!(stored.answers, poll.answers);
    assert_eq!(stored.duration, poll.duration);
    assert_eq!(stored.status, PollStatus::Active);
    assert_eq!(stored.ends_at.timestamp_millis(), poll.ends_at.timestamp_millis());
    assert!(repo.get("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_insert_is_a_no_op() {
    let repo = repo().await;
    let poll = sample_poll("P1", Utc::now());
    assert!(repo.insert_poll(&poll).await.unwrap());

    let mut changed = poll.clone();
    changed.topic = "Physics".to_owned();
    assert!(!repo.insert_poll(&changed).await.unwrap());
    assert_eq!(repo.get("P1").await.unwrap().unwrap().topic, "Math");
}

#[tokio::test]
async fn expired_and_overdue_queries() {
    let repo = repo().await;
    let now = Utc::now();
    repo.insert_poll(&sample_poll("old", now - chrono::Duration::minutes(10)))
        .await
        .unwrap();
    repo.insert_poll(&sample_poll("recent", now - chrono::Duration::seconds(5)))
        .await
        .unwrap();
    repo.insert_poll(&sample_poll("future", now + chrono::Duration::minutes(10)))
        .await
        .unwrap();

    let expired: Vec<String> = repo
        .find_expired_active_polls(now)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.poll_id)
        .collect();
    assert_eq!(expired.len(), 2);
    assert!(expired.contains(&"old".to_owned()));

    let overdue = repo
        .list_due_active(now, Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].poll_id, "old");
}

#[tokio::test]
async fn mark_processed_happens_once() {
    let repo = repo().await;
    repo.insert_poll(&sample_poll("P1", Utc::now())).await.unwrap();

    let queue = vec!["U1".to_owned(), "U2".to_owned()];
    assert!(repo.mark_processed("P1", "R1", &queue, "text").await.unwrap());
    assert!(!repo.mark_processed("P1", "R2", &[], "other").await.unwrap());

    let poll = repo.get("P1").await.unwrap().unwrap();
    assert!(poll.is_processed());
    assert_eq!(poll.results_message_id.as_deref(), Some("R1"));
    assert_eq!(poll.queue_user_ids, Some(queue.clone()));
    assert_eq!(repo.get_queue_user_ids("P1").await.unwrap(), Some(queue));
    assert_eq!(
        repo.find_by_results_message_id("C1", "R1")
            .await
            .unwrap()
            .map(|p| p.poll_id),
        Some("P1".to_owned())
    );
    assert!(repo.find_by_results_message_id("C2", "R1").await.unwrap().is_none());
}

#[tokio::test]
async fn coming_index_and_context() {
    let repo = repo().await;
    let mut poll = sample_poll("P1", Utc::now());
    poll.answers = vec!["No".into(), "Maybe".into(), "Yes".into()];
    poll.coming_answer_index = 2;
    repo.insert_poll(&poll).await.unwrap();

    assert_eq!(repo.get_coming_answer_index("P1").await.unwrap(), 2);
    assert!(matches!(
        repo.get_coming_answer_index("nope").await,
        Err(AppError::NotFound(_))
    ));

    let context = repo.get_queue_context("P1").await.unwrap();
    assert_eq!(context.chat_id, "C1");
    assert_eq!(context.topic, "Math");
    assert!(context.results_message_id.is_none());
}

#[tokio::test]
async fn queue_mutation_requires_finalization() {
    let repo = repo().await;
    repo.insert_poll(&sample_poll("P1", Utc::now())).await.unwrap();

    let result = repo.mutate_queue("P1", |q| {
        q.push("U9".into());
        Ok(())
    });
    assert!(matches!(result.await, Err(AppError::QueueNotReady(_))));
    assert!(matches!(
        repo.mutate_queue("nope", |_| Ok(())).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn rejected_mutation_writes_nothing() {
    let repo = repo().await;
    repo.insert_poll(&sample_poll("P1", Utc::now())).await.unwrap();
    repo.mark_processed("P1", "R1", &["U1".to_owned()], "t").await.unwrap();

    let result = repo
        .mutate_queue("P1", |q| {
            q.push("U2".into());
            Err(AppError::AlreadyInQueue("U2".into()))
        })
        .await;
    assert!(matches!(result, Err(AppError::AlreadyInQueue(_))));
    assert_eq!(repo.get_queue_user_ids("P1").await.unwrap(), Some(vec!["U1".to_owned()]));

    let queue = repo
        .mutate_queue("P1", |q| {
            q.push("U2".into());
            Ok(())
        })
        .await
        .unwrap();
    assert_eq!(queue, vec!["U1".to_owned(), "U2".to_owned()]);
}

#[tokio::test]
async fn set_queue_on_unknown_poll_fails() {
    let repo = repo().await;
    assert!(matches!(
        repo.set_queue_user_ids("nope", &[]).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn finalization_lease_excludes_second_claim() {
    let repo = repo().await;
    repo.insert_poll(&sample_poll("P1", Utc::now())).await.unwrap();
    let now = Utc::now();
    let lease = Duration::from_secs(60);

    assert!(repo.try_claim_finalization("P1", now, lease).await.unwrap());
    assert!(!repo.try_claim_finalization("P1", now, lease).await.unwrap());
    // Expired lease can be taken over.
    let later = now + chrono::Duration::seconds(61);
    assert!(repo.try_claim_finalization("P1", later, lease).await.unwrap());

    repo.release_finalization("P1").await.unwrap();
    assert!(repo.try_claim_finalization("P1", later, lease).await.unwrap());

    repo.mark_processed("P1", "R1", &[], "t").await.unwrap();
    let much_later = later + chrono::Duration::hours(1);
    assert!(!repo.try_claim_finalization("P1", much_later, lease).await.unwrap());
}
