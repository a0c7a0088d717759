use std::time::Duration;

use lineup::health::serve_on;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn healthz_answers_until_cancelled() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let ct = CancellationToken::new();
    let server = tokio::spawn(serve_on(listener, ct.clone()));

    let response = reqwest::get(format!("http://{addr}/healthz")).await.unwrap();
    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "ok");

    let missing = reqwest::get(format!("http://{addr}/nope")).await.unwrap();
    assert_eq!(missing.status().as_u16(), 404);

    ct.cancel();
    let stopped = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server stops after cancel")
        .unwrap();
    assert!(stopped.is_ok());
}
