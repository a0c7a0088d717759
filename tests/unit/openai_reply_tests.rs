use lineup::intent::openai::{interpret_poll_reply, interpret_queue_reply};
use lineup::models::intent::QueueAction;
use lineup::AppError;

#[test]
fn accepts_duration_reply() {
    let intent = interpret_poll_reply(r#"{"topic":" Math ","duration":"45m"}"#).unwrap();
    assert_eq!(intent.topic, "Math");
    assert_eq!(intent.duration.as_deref(), Some("45m"));
}

#[test]
fn prose_reply_becomes_the_reason() {
    let err = interpret_poll_reply("Please tell me how long the poll should run.").unwrap_err();
    assert!(matches!(err, AppError::Intent(msg) if msg.starts_with("Please tell me")));
}

#[test]
fn missing_schedule_is_rejected() {
    assert!(matches!(
        interpret_poll_reply(r#"{"topic":"Math"}"#),
        Err(AppError::Intent(_))
    ));
}

#[test]
fn custom_answers_need_a_valid_index() {
    assert!(interpret_poll_reply(
        r#"{"topic":"Lab","duration":"1h","answers":["Yes","No"],"coming_answer_index":0}"#
    )
    .is_ok());
    assert!(interpret_poll_reply(
        r#"{"topic":"Lab","duration":"1h","answers":["Yes","No"],"coming_answer_index":2}"#
    )
    .is_err());
    assert!(
        interpret_poll_reply(r#"{"topic":"Lab","duration":"1h","answers":["Yes","No"]}"#)
            .is_err()
    );
}

#[test]
fn empty_answer_list_means_defaults() {
    let intent =
        interpret_poll_reply(r#"{"topic":"Lab","duration":"1h","answers":[],"coming_answer_index":3}"#)
            .unwrap();
    assert!(intent.answers.is_none());
    assert!(intent.coming_answer_index.is_none());
}

#[test]
fn queue_reply_actions() {
    assert_eq!(interpret_queue_reply(r#"{"action":"join"}"#).unwrap(), QueueAction::Join);
    assert_eq!(interpret_queue_reply(r#"{"action":"Leave"}"#).unwrap(), QueueAction::Leave);
    assert!(interpret_queue_reply(r#"{"action":"dance"}"#).is_err());
    assert!(interpret_queue_reply("join").is_err());
}
