//! HTTP boundary: `POST /task` turns a JSON body into a task, submits it,
//! and holds the request open until the task reaches a terminal outcome.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::engine::Dispatcher;
use crate::error::{Error, Result};
use crate::model::{Task, TaskId, TaskOutcome};

#[derive(Debug, Deserialize)]
struct TaskRequest {
    request_id: String,
}

/// Build the router. Methods other than POST on `/task` get 405.
pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/task", post(submit_task))
        .route("/health", get(health))
        .with_state(dispatcher)
}

/// Serve until `shutdown` resolves, then drain open requests.
pub async fn serve<F>(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(%addr, mode = %dispatcher.mode(), "listening");
    axum::serve(listener, router(dispatcher))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn health(State(dispatcher): State<Arc<Dispatcher>>) -> (StatusCode, &'static str) {
    if dispatcher.is_stopped() {
        (StatusCode::SERVICE_UNAVAILABLE, "stopped")
    } else {
        (StatusCode::OK, "ok")
    }
}

/// POST /task - submit and wait for the terminal outcome.
async fn submit_task(
    State(dispatcher): State<Arc<Dispatcher>>,
    body: Bytes,
) -> (StatusCode, String) {
    let Ok(request) = serde_json::from_slice::<TaskRequest>(&body) else {
        return (StatusCode::BAD_REQUEST, "Bad request\n".to_string());
    };
    let Ok(id) = request.request_id.parse::<TaskId>() else {
        return (StatusCode::BAD_REQUEST, "Invalid TaskID\n".to_string());
    };

    let (task, rx) = Task::new(id);
    if let Err(e) = dispatcher.submit(task).await {
        let body = match e {
            Error::QueueSaturated(_) => format!("Task {id} is not accepted due to queue full\n"),
            other => format!("{other}\n"),
        };
        return (StatusCode::SERVICE_UNAVAILABLE, body);
    }

    match rx.await {
        Ok(TaskOutcome::Completed) => (
            StatusCode::OK,
            format!("Task {id} completed successfully\n"),
        ),
        Ok(TaskOutcome::Failed) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Task {id} failed\n"),
        ),
        Err(_) => {
            debug!(task_id = %id, "result sink closed without an outcome");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Task {id} returned an unknown result\n"),
            )
        }
    }
}
