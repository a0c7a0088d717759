use std::sync::Arc;

use chrono::Utc;
use lineup::models::poll::PollSpec;
use lineup::slack::handlers::{poll_command, queue, vote};
use lineup::AppError;

use super::test_helpers::{test_state, user};

#[tokio::test]
async fn standup_from_request_to_queue() {
    let (state, transport) = test_state().await;

    let poll = poll_command::create_from_text(&state, "C1", &user("U0", "lead"), "Standup 45m")
        .await
        .unwrap();

    let ann = user("UA", "ann");
    let bob = user("UB", "bob");
    let cat = user("UC", "cat");
    vote::handle_vote(&state, &poll.poll_id, 0, &ann).await.unwrap();
    vote::handle_vote(&state, &poll.poll_id, 0, &bob).await.unwrap();
    vote::handle_vote(&state, &poll.poll_id, 1, &cat).await.unwrap();
    // Bob changes his mind.
    vote::handle_vote(&state, &poll.poll_id, 1, &bob).await.unwrap();

    let runner = Arc::new(state.task_runner());
    assert_eq!(runner.run_due_once(Utc::now()).await.unwrap(), 0);
    let after_end = poll.ends_at + chrono::Duration::seconds(1);
    assert_eq!(runner.run_due_once(after_end).await.unwrap(), 1);

    let sent = transport.sent_messages();
    assert_eq!(sent.len(), 1);
    let (results_id, results) = &sent[0];
    assert_eq!(results.text, "*Results for: Standup*\n\n1. @ann");
    assert_eq!(*transport.stopped.lock().unwrap(), vec![poll.message_id.clone()]);

    // Late votes are refused once the poll is closed.
    assert!(vote::handle_vote(&state, &poll.poll_id, 0, &cat).await.is_err());

    queue::handle_thread_reply(&state, "C1", results_id, &cat, "+")
        .await
        .unwrap();
    queue::handle_queue_button(&state, &poll.poll_id, "queue_leave", &ann)
        .await
        .unwrap();

    assert_eq!(
        state.polls.get_queue_user_ids(&poll.poll_id).await.unwrap(),
        Some(vec!["UC".to_owned()])
    );
    assert_eq!(
        transport.last_edit_text().unwrap(),
        "*Results for: Standup*\n\n1. @cat"
    );
}

#[tokio::test]
async fn late_voter_joins_after_finalization() {
    let (state, _) = test_state().await;
    let poll = state
        .lifecycle
        .create_poll(
            "C1",
            PollSpec::with_duration("Standup", std::time::Duration::from_secs(30 * 60)),
            poll_command::creator(&user("U0", "lead")),
        )
        .await
        .unwrap();
    assert_eq!(poll.answers, vec!["Иду".to_owned(), "Не иду".to_owned()]);

    for (id, name) in [("U1", "ann"), ("U2", "bob"), ("U3", "cat")] {
        vote::handle_vote(&state, &poll.poll_id, 0, &user(id, name)).await.unwrap();
    }
    let dan = user("U4", "dan");
    vote::handle_vote(&state, &poll.poll_id, 1, &dan).await.unwrap();

    let err = state.queue.join_queue(&poll.poll_id, &dan).await.unwrap_err();
    assert!(matches!(err, AppError::QueueNotReady(_)));

    let runner = Arc::new(state.task_runner());
    runner
        .run_due_once(poll.ends_at + chrono::Duration::seconds(1))
        .await
        .unwrap();

    let stored = state.polls.get(&poll.poll_id).await.unwrap().unwrap();
    assert!(stored.is_processed());
    assert!(stored.results_message_id.is_some());
    let mut queue = stored.queue_user_ids.unwrap();
    assert_eq!(queue.len(), 3);
    queue.sort();
    assert_eq!(queue, vec!["U1".to_owned(), "U2".to_owned(), "U3".to_owned()]);

    let queue = state.queue.join_queue(&poll.poll_id, &dan).await.unwrap();
    assert_eq!(queue.len(), 4);
    assert_eq!(queue[3], "U4");
}
