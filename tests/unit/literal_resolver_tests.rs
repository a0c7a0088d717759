use lineup::intent::literal::LiteralResolver;
use lineup::intent::{FallbackResolver, IntentFuture, IntentResolver};
use lineup::models::intent::{PollIntent, QueueAction};
use lineup::AppError;
use std::sync::Arc;

#[test]
fn pipe_syntax_with_duration() {
    let intent = LiteralResolver::parse_poll("Math | 45m").unwrap();
    assert_eq!(intent.topic, "Math");
    assert_eq!(intent.duration.as_deref(), Some("45m"));
    assert!(intent.end_time.is_none());
}

#[test]
fn pipe_syntax_with_end_time() {
    let intent = LiteralResolver::parse_poll("Physics lab | 2030-01-15T13:48").unwrap();
    assert_eq!(intent.topic, "Physics lab");
    assert_eq!(intent.end_time.as_deref(), Some("2030-01-15T13:48"));
}

#[test]
fn trailing_duration_without_pipe() {
    let intent = LiteralResolver::parse_poll("Daily standup 1h30m").unwrap();
    assert_eq!(intent.topic, "Daily standup");
    assert_eq!(intent.duration.as_deref(), Some("1h30m"));
}

#[test]
fn rejects_text_without_schedule() {
    assert!(matches!(
        LiteralResolver::parse_poll("Standup tomorrow"),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        LiteralResolver::parse_poll("Standup"),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        LiteralResolver::parse_poll(" | 45m"),
        Err(AppError::Validation(_))
    ));
}

#[test]
fn queue_keywords() {
    assert_eq!(LiteralResolver::parse_queue("+").unwrap(), QueueAction::Join);
    assert_eq!(LiteralResolver::parse_queue("Хочу в очередь").unwrap(), QueueAction::Join);
    assert_eq!(LiteralResolver::parse_queue("add me please").unwrap(), QueueAction::Join);
    assert_eq!(LiteralResolver::parse_queue("-").unwrap(), QueueAction::Leave);
    assert_eq!(LiteralResolver::parse_queue("убери меня").unwrap(), QueueAction::Leave);
    assert_eq!(LiteralResolver::parse_queue("я не иду").unwrap(), QueueAction::Leave);
    assert!(matches!(
        LiteralResolver::parse_queue("what time is it"),
        Err(AppError::Intent(_))
    ));
}

struct Failing;

impl IntentResolver for Failing {
    fn resolve_poll_intent(&self, _text: &str) -> IntentFuture<'_, PollIntent> {
        Box::pin(async { Err(AppError::Intent("the poll topic is missing".into())) })
    }

    fn resolve_queue_intent(&self, _text: &str) -> IntentFuture<'_, QueueAction> {
        Box::pin(async { Err(AppError::Intent("unavailable".into())) })
    }
}

#[tokio::test]
async fn fallback_uses_literal_when_primary_fails() {
    let resolver = FallbackResolver::new(Some(Arc::new(Failing)), Arc::new(LiteralResolver));
    let intent = resolver.resolve_poll_intent("Math | 45m").await.unwrap();
    assert_eq!(intent.topic, "Math");
}

#[tokio::test]
async fn fallback_reports_primary_error_when_both_fail() {
    let resolver = FallbackResolver::new(Some(Arc::new(Failing)), Arc::new(LiteralResolver));
    let err = resolver.resolve_poll_intent("no schedule").await.unwrap_err();
    assert!(matches!(err, AppError::Intent(msg) if msg.contains("topic is missing")));
}

#[tokio::test]
async fn queue_keywords_skip_primary() {
    let resolver = FallbackResolver::new(Some(Arc::new(Failing)), Arc::new(LiteralResolver));
    assert_eq!(resolver.resolve_queue_intent("+").await.unwrap(), QueueAction::Join);
    assert!(resolver.resolve_queue_intent("hmm").await.is_err());
}
