//! HTTP boundary tests against a real listener.

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::json;
use taskq::config::{ExecutorConfig, Mode};
use taskq::engine::Dispatcher;
use taskq::model::TaskId;
use taskq::oracle::ScriptedOracle;
use taskq::store::{CompletionStore, MemoryStore};

/// Start a server on an ephemeral port. Returns its `/task` URL.
async fn spawn_server(dispatcher: Arc<Dispatcher>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(taskq::http::serve(
        listener,
        dispatcher,
        std::future::pending::<()>(),
    ));
    format!("http://{addr}/task")
}

fn started(mode: Mode, threshold: u8, store: Arc<MemoryStore>) -> Arc<Dispatcher> {
    let oracle = if threshold == 100 {
        ScriptedOracle::always_fail()
    } else {
        ScriptedOracle::always_pass()
    };
    let d = Dispatcher::new(ExecutorConfig::new(mode, threshold), store, Arc::new(oracle));
    d.start().unwrap();
    Arc::new(d)
}

#[tokio::test]
async fn successful_task_returns_200() {
    let store = Arc::new(MemoryStore::new());
    let url = spawn_server(started(Mode::Sequential, 0, store.clone())).await;

    let resp = reqwest::Client::new()
        .post(&url)
        .json(&json!({"request_id": "12"}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "Task 12 completed successfully\n");
    assert!(store.exists(TaskId(12)).await.unwrap());
}

#[tokio::test]
async fn failed_task_returns_500() {
    let store = Arc::new(MemoryStore::new());
    let url = spawn_server(started(Mode::Concurrent, 100, store)).await;

    let resp = reqwest::Client::new()
        .post(&url)
        .json(&json!({"request_id": "3"}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.text().await.unwrap(), "Task 3 failed\n");
}

#[tokio::test]
async fn completed_task_resubmission_returns_503() {
    let store = Arc::new(MemoryStore::with_completed([TaskId(5)]));
    let url = spawn_server(started(Mode::Concurrent, 0, store)).await;

    let resp = reqwest::Client::new()
        .post(&url)
        .json(&json!({"request_id": "5"}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(resp.text().await.unwrap().contains("already completed"));
}

#[tokio::test]
async fn full_queue_returns_503() {
    // Never started, capacity one: the second request finds the queue full.
    let d = Arc::new(Dispatcher::new(
        ExecutorConfig::new(Mode::Concurrent, 0).queue_capacity(1),
        Arc::new(MemoryStore::new()),
        Arc::new(ScriptedOracle::always_pass()),
    ));
    let url = spawn_server(Arc::clone(&d)).await;
    let client = reqwest::Client::new();

    // The first request parks on its result; don't wait for it.
    let first = tokio::spawn({
        let client = client.clone();
        let url = url.clone();
        async move {
            client
                .post(&url)
                .json(&json!({"request_id": "1"}))
                .send()
                .await
        }
    });
    while d.in_flight() == 0 {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    let resp = client
        .post(&url)
        .json(&json!({"request_id": "2"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        resp.text().await.unwrap(),
        "Task 2 is not accepted due to queue full\n"
    );
    first.abort();
}

#[tokio::test]
async fn malformed_requests_return_400() {
    let url = spawn_server(started(Mode::Sequential, 0, Arc::new(MemoryStore::new()))).await;
    let client = reqwest::Client::new();

    let resp = client.post(&url).body("{not json").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.text().await.unwrap(), "Bad request\n");

    let resp = client
        .post(&url)
        .json(&json!({"request_id": "abc"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.text().await.unwrap(), "Invalid TaskID\n");
}

#[tokio::test]
async fn non_post_returns_405() {
    let url = spawn_server(started(Mode::Sequential, 0, Arc::new(MemoryStore::new()))).await;

    let resp = reqwest::get(&url).await.unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}
