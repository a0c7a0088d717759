use lineup::errors::USAGE_EXAMPLE;
use lineup::AppError;

#[test]
fn display_prefixes_category() {
    assert_eq!(AppError::Db("boom".into()).to_string(), "db: boom");
    assert_eq!(
        AppError::InvalidSchedule("past".into()).to_string(),
        "invalid schedule: past"
    );
    assert_eq!(
        AppError::AlreadyInQueue("U1".into()).to_string(),
        "already in queue: U1"
    );
}

#[test]
fn validation_messages_carry_usage() {
    let message = AppError::Validation("poll topic is empty".into()).user_message();
    assert!(message.contains("poll topic is empty"));
    assert!(message.contains(USAGE_EXAMPLE));
}

#[test]
fn internal_errors_are_not_leaked() {
    let err = AppError::Db("UNIQUE constraint failed: poll.poll_id".into());
    assert!(!err.is_user_facing());
    assert!(!err.user_message().contains("UNIQUE"));
}

#[test]
fn queue_errors_are_user_facing() {
    assert!(AppError::AlreadyInQueue("U1".into()).is_user_facing());
    assert!(AppError::NotInQueue("U1".into()).is_user_facing());
    assert!(AppError::QueueNotReady("P1".into()).is_user_facing());
    assert!(!AppError::Conflict("P1".into()).is_user_facing());
}

#[test]
fn sqlx_errors_map_to_db() {
    let err: AppError = sqlx::Error::RowNotFound.into();
    assert!(matches!(err, AppError::Db(_)));
}
