use std::collections::BTreeSet;
use std::sync::atomic::Ordering;

use chrono::Utc;
use lineup::orchestrator::finalizer::FinalizeOutcome;
use lineup::state::AppState;
use lineup::AppError;

use super::test_helpers::{insert_poll, test_state, user};

async fn finalized_with(state: &AppState, voters: &[&str]) -> String {
    insert_poll(state, "P1", Utc::now()).await;
    for id in voters {
        state
            .votes
            .upsert_vote("P1", &user(id, &id.to_lowercase()), &BTreeSet::from([0]))
            .await
            .unwrap();
    }
    match state.finalizer.finalize("P1").await.unwrap() {
        FinalizeOutcome::Finalized {
            results_message_id, ..
        } => results_message_id,
        other => panic!("expected finalized, got {other:?}"),
    }
}

#[tokio::test]
async fn join_appends_and_rerenders_in_place() {
    let (state, transport) = test_state().await;
    let results_id = finalized_with(&state, &["UA", "UB"]).await;

    let queue = state.queue.join_queue("P1", &user("UZ", "zed")).await.unwrap();
    assert_eq!(queue.len(), 3);
    assert_eq!(queue[2], "UZ");

    let edits = transport.edited_messages();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].0, results_id);
    assert!(edits[0].1.text.ends_with("3. @zed"));
    assert_eq!(edits[0].1.buttons.len(), 2);
}

#[tokio::test]
async fn double_join_is_rejected_without_changes() {
    let (state, transport) = test_state().await;
    finalized_with(&state, &["UA"]).await;

    let err = state.queue.join_queue("P1", &user("UA", "ua")).await.unwrap_err();
    assert!(matches!(err, AppError::AlreadyInQueue(_)));
    assert_eq!(
        state.polls.get_queue_user_ids("P1").await.unwrap(),
        Some(vec!["UA".to_owned()])
    );
    assert!(transport.edited_messages().is_empty());
}

#[tokio::test]
async fn leave_preserves_relative_order() {
    let (state, transport) = test_state().await;
    finalized_with(&state, &[]).await;
    for id in ["U1", "U2", "U3"] {
        state.queue.join_queue("P1", &user(id, id)).await.unwrap();
    }

    let queue = state.queue.leave_queue("P1", "U2").await.unwrap();
    assert_eq!(queue, vec!["U1".to_owned(), "U3".to_owned()]);
    assert_eq!(
        transport.last_edit_text().unwrap(),
        "*Results for: Standup*\n\n1. @U1\n2. @U3"
    );

    let err = state.queue.leave_queue("P1", "U2").await.unwrap_err();
    assert!(matches!(err, AppError::NotInQueue(_)));
}

#[tokio::test]
async fn last_leave_shows_empty_queue() {
    let (state, transport) = test_state().await;
    finalized_with(&state, &["UA"]).await;
    state.queue.leave_queue("P1", "UA").await.unwrap();
    assert!(transport.last_edit_text().unwrap().ends_with("No one is in the queue."));
}

#[tokio::test]
async fn queue_is_closed_until_finalization() {
    let (state, _) = test_state().await;
    insert_poll(&state, "P1", Utc::now()).await;
    let err = state.queue.join_queue("P1", &user("UA", "ua")).await.unwrap_err();
    assert!(matches!(err, AppError::QueueNotReady(_)));
    let err = state.queue.join_queue("ghost", &user("UA", "ua")).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn rerender_failure_keeps_mutation() {
    let (state, transport) = test_state().await;
    finalized_with(&state, &[]).await;
    transport.fail_edit.store(true, Ordering::SeqCst);

    let queue = state.queue.join_queue("P1", &user("UA", "ua")).await.unwrap();
    assert_eq!(queue, vec!["UA".to_owned()]);
    assert_eq!(state.polls.get_queue_user_ids("P1").await.unwrap(), Some(queue));
}

#[tokio::test]
async fn concurrent_joins_are_all_kept() {
    let (state, _) = test_state().await;
    finalized_with(&state, &[]).await;

    let mut handles = Vec::new();
    for n in 0..10 {
        let state = std::sync::Arc::clone(&state);
        handles.push(tokio::spawn(async move {
            let id = format!("U{n}");
            state.queue.join_queue("P1", &user(&id, &id)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let queue = state.polls.get_queue_user_ids("P1").await.unwrap().unwrap();
    assert_eq!(queue.len(), 10);
    let unique: std::collections::HashSet<_> = queue.iter().collect();
    assert_eq!(unique.len(), 10);
}
