use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use lineup::models::task::{TaskStatus, FINALIZE_POLL};
use lineup::persistence::db;
use lineup::persistence::task_repo::TaskRepo;

const LEASE: Duration = Duration::from_secs(60);

async fn repo() -> TaskRepo {
    TaskRepo::new(Arc::new(db::connect_memory().await.expect("db")))
}

#[tokio::test]
async fn schedule_is_deduplicated_by_key() {
    let repo = repo().await;
    let when = Utc::now();
    assert!(repo.schedule_at(FINALIZE_POLL, "P1", "{}", when).await.unwrap());
    assert!(!repo
        .schedule_at(FINALIZE_POLL, "P1", "{}", when + chrono::Duration::hours(1))
        .await
        .unwrap());
    assert!(repo.schedule_at("other", "P1", "{}", when).await.unwrap());

    let task = repo.get_by_key(FINALIZE_POLL, "P1").await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.run_at.timestamp_millis(), when.timestamp_millis());
}

#[tokio::test]
async fn only_due_tasks_are_claimed() {
    let repo = repo().await;
    let now = Utc::now();
    repo.schedule_at(FINALIZE_POLL, "due", "{}", now - chrono::Duration::seconds(1))
        .await
        .unwrap();
    repo.schedule_at(FINALIZE_POLL, "later", "{}", now + chrono::Duration::minutes(5))
        .await
        .unwrap();

    let claimed = repo.claim_due(now, LEASE, 10).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].dedupe_key, "due");
    assert_eq!(claimed[0].attempts, 1);
    assert_eq!(claimed[0].status, TaskStatus::Running);

    // Leased tasks are invisible until the lease expires.
    assert!(repo.claim_due(now, LEASE, 10).await.unwrap().is_empty());
    let redelivered = repo
        .claim_due(now + chrono::Duration::seconds(61), LEASE, 10)
        .await
        .unwrap();
    assert_eq!(redelivered.len(), 1);
    assert_eq!(redelivered[0].attempts, 2);
}

#[tokio::test]
async fn done_tasks_are_never_claimed_again() {
    let repo = repo().await;
    let now = Utc::now();
    repo.schedule_at(FINALIZE_POLL, "P1", "{}", now).await.unwrap();
    let task = repo.claim_due(now, LEASE, 10).await.unwrap().remove(0);
    repo.mark_done(&task.id).await.unwrap();

    let later = now + chrono::Duration::hours(2);
    assert!(repo.claim_due(later, LEASE, 10).await.unwrap().is_empty());
    assert_eq!(
        repo.get_by_key(FINALIZE_POLL, "P1").await.unwrap().unwrap().status,
        TaskStatus::Done
    );
}

#[tokio::test]
async fn reschedule_and_fail_record_errors() {
    let repo = repo().await;
    let now = Utc::now();
    repo.schedule_at(FINALIZE_POLL, "P1", "{}", now).await.unwrap();
    let task = repo.claim_due(now, LEASE, 10).await.unwrap().remove(0);

    let retry_at = now + chrono::Duration::seconds(30);
    repo.reschedule(&task.id, retry_at, "slack down").await.unwrap();
    let stored = repo.get_by_key(FINALIZE_POLL, "P1").await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Pending);
    assert_eq!(stored.last_error.as_deref(), Some("slack down"));
    assert!(repo.claim_due(now, LEASE, 10).await.unwrap().is_empty());

    let task = repo.claim_due(retry_at, LEASE, 10).await.unwrap().remove(0);
    repo.mark_failed(&task.id, "gave up").await.unwrap();
    let stored = repo.get_by_key(FINALIZE_POLL, "P1").await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    assert_eq!(stored.attempts, 2);
}

#[tokio::test]
async fn rearm_resets_finished_tasks_only() {
    let repo = repo().await;
    let now = Utc::now();

    // Missing task is inserted.
    assert!(repo.rearm(FINALIZE_POLL, "P1", "{}", now).await.unwrap());
    // Pending task is left alone.
    assert!(!repo.rearm(FINALIZE_POLL, "P1", "{}", now).await.unwrap());

    let task = repo.claim_due(now, LEASE, 10).await.unwrap().remove(0);
    // Running task is left alone.
    assert!(!repo.rearm(FINALIZE_POLL, "P1", "{}", now).await.unwrap());

    repo.mark_failed(&task.id, "boom").await.unwrap();
    assert!(repo.rearm(FINALIZE_POLL, "P1", "{}", now).await.unwrap());
    let stored = repo.get_by_key(FINALIZE_POLL, "P1").await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Pending);
    assert_eq!(stored.attempts, 0);
}

#[tokio::test]
async fn claim_respects_limit() {
    let repo = repo().await;
    let now = Utc::now();
    for key in ["a", "b", "c"] {
        repo.schedule_at(FINALIZE_POLL, key, "{}", now).await.unwrap();
    }
    assert_eq!(repo.claim_due(now, LEASE, 2).await.unwrap().len(), 2);
    assert_eq!(repo.claim_due(now, LEASE, 2).await.unwrap().len(), 1);
}
