use crate::executor::ProcessExecutor;
use crate::scheduler_runtime::{self, SchedulerRuntime, SharedState, StateCallbacks};
use crate::shutdown;
use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use gpupipe::config::Config;
use gpupipe::core::completion::CompletionMultiplexer;
use gpupipe::core::executor::Executor;
use gpupipe::core::gpu::{self, GpuSnapshotSource};
use gpupipe::core::info::{ErrorResponse, SubmitResponse};
use gpupipe::core::job::JobSpec;
use gpupipe::core::scheduler::{SchedulerBuilder, SchedulerError};
use gpupipe::core::{watcher, JobId};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

pub async fn run(config: Config) -> anyhow::Result<()> {
    let scheduler = SchedulerBuilder::new()
        .with_max_queue_size(config.scheduler.max_queue_size)
        .with_default_watermark(config.scheduler.memory_watermark)
        .with_policy(config.scheduler.policy.build())
        .build();
    let executor: Arc<dyn Executor> = Arc::new(ProcessExecutor);
    let exit_policy = config.scheduler.exit_policy;
    let state = SchedulerRuntime::new(scheduler, executor, exit_policy).into_shared();

    let (multiplexer, completions) =
        CompletionMultiplexer::new(StateCallbacks(Arc::clone(&state)), exit_policy);
    tokio::spawn(multiplexer.run());

    // Capacity 1: the watcher waits while a tick is still running.
    let (snapshot_tx, snapshot_rx) = mpsc::channel(1);
    let source: Arc<dyn GpuSnapshotSource> = Arc::from(gpu::detect_source());
    let watcher_task = tokio::spawn(watcher::run(
        config.scheduler.poll_interval(),
        source,
        snapshot_tx,
    ));

    tokio::spawn(scheduler_runtime::run(
        Arc::clone(&state),
        snapshot_rx,
        completions,
    ));
    tracing::info!(
        policy = %config.scheduler.policy,
        exit_policy = %exit_policy,
        max_queue_size = config.scheduler.max_queue_size,
        "Scheduler started"
    );

    let addr = format!("{}:{}", config.daemon.host, config.daemon.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Listening on: {addr}");

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let app = router(Arc::clone(&state));
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    tokio::select! {
        signal = shutdown::wait_for_signal() => signal?,
        result = &mut server => {
            result.context("Server task panicked")??;
            return Ok(());
        }
    }

    // Stop sampling and admitting, then stop the jobs before the transport
    // goes away. A launch already in flight is terminated when its pid is recorded.
    watcher_task.abort();
    state.write().await.terminate_all();
    let _ = stop_tx.send(());

    match tokio::time::timeout(config.daemon.shutdown_grace(), server).await {
        Ok(result) => result.context("Server task panicked")??,
        Err(_) => tracing::warn!(
            "Server did not stop within {:?}, exiting anyway",
            config.daemon.shutdown_grace()
        ),
    }
    tracing::info!("Daemon stopped");
    Ok(())
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/jobs", get(list_jobs).post(create_job))
        .route("/jobs/{id}", delete(delete_job))
        .route("/info", get(info))
        .route("/health", get(get_health))
        .with_state(state)
}

fn error_response(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

#[axum::debug_handler]
async fn create_job(State(state): State<SharedState>, Json(spec): Json<JobSpec>) -> Response {
    let result = state.write().await.submit_job(spec);
    match result {
        Ok(id) => (StatusCode::CREATED, Json(SubmitResponse { id })).into_response(),
        Err(e @ SchedulerError::QueueFull { .. }) => {
            tracing::warn!("Job submission rejected: {e}");
            error_response(StatusCode::TOO_MANY_REQUESTS, e)
        }
        Err(e @ SchedulerError::EmptyCommand) => error_response(StatusCode::BAD_REQUEST, e),
    }
}

#[axum::debug_handler]
async fn list_jobs(State(state): State<SharedState>) -> impl IntoResponse {
    let state = state.read().await;
    (StatusCode::OK, Json(state.jobs().to_vec()))
}

#[axum::debug_handler]
async fn delete_job(State(state): State<SharedState>, Path(id): Path<JobId>) -> Response {
    let mut state = state.write().await;
    if state.delete_job(id) {
        (StatusCode::OK, Json(())).into_response()
    } else {
        error_response(StatusCode::NOT_FOUND, format!("Job {id} not found"))
    }
}

#[axum::debug_handler]
async fn info(State(state): State<SharedState>) -> impl IntoResponse {
    let state = state.read().await;
    (StatusCode::OK, Json(state.info()))
}

#[axum::debug_handler]
async fn get_health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use gpupipe::core::executor::{ExitPolicy, LaunchHandle};
    use gpupipe::core::info::SchedulerInfo;
    use gpupipe::core::job::{Job, JobState};
    use tower::ServiceExt;

    struct NoopExecutor;

    impl Executor for NoopExecutor {
        fn launch(&self, job: &Job) -> LaunchHandle {
            LaunchHandle::start_failed(job.id, "not launched in tests")
        }

        fn terminate(&self, _pid: u32) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn test_state(capacity: usize) -> SharedState {
        let scheduler = SchedulerBuilder::new().with_max_queue_size(capacity).build();
        SchedulerRuntime::new(scheduler, Arc::new(NoopExecutor), ExitPolicy::AnyExit).into_shared()
    }

    async fn send(app: Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, Vec<u8>) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => request
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    fn job_body() -> serde_json::Value {
        serde_json::json!({
            "run_dir": "/tmp",
            "command": ["python", "train.py"],
            "gpu_ids": [0]
        })
    }

    #[tokio::test]
    async fn test_publish_then_list() {
        let state = test_state(4);
        let (status, body) = send(router(state.clone()), Method::POST, "/jobs", Some(job_body())).await;
        assert_eq!(status, StatusCode::CREATED);
        let submitted: SubmitResponse = serde_json::from_slice(&body).unwrap();

        let (status, body) = send(router(state), Method::GET, "/jobs", None).await;
        assert_eq!(status, StatusCode::OK);
        let jobs: Vec<Job> = serde_json::from_slice(&body).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, submitted.id);
        assert_eq!(jobs[0].state, JobState::Pending);
        assert_eq!(jobs[0].command, vec!["python", "train.py"]);
    }

    #[tokio::test]
    async fn test_full_queue_is_rejected() {
        let state = test_state(1);
        let (status, _) = send(router(state.clone()), Method::POST, "/jobs", Some(job_body())).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(router(state), Method::POST, "/jobs", Some(job_body())).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(error.error.contains("full"));
    }

    #[tokio::test]
    async fn test_empty_command_is_bad_request() {
        let body = serde_json::json!({ "run_dir": "/tmp", "command": [] });
        let (status, _) = send(router(test_state(4)), Method::POST, "/jobs", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_known_and_unknown() {
        let state = test_state(4);
        let id = state
            .write()
            .await
            .submit_job(Job::builder().command(["true"]).build())
            .unwrap();

        let (status, _) = send(router(state.clone()), Method::DELETE, &format!("/jobs/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(router(state.clone()), Method::DELETE, &format!("/jobs/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(router(state), Method::DELETE, "/jobs/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_info_and_health() {
        let state = test_state(3);
        let (status, body) = send(router(state.clone()), Method::GET, "/info", None).await;
        assert_eq!(status, StatusCode::OK);
        let info: SchedulerInfo = serde_json::from_slice(&body).unwrap();
        assert_eq!(info.max_queue_size, 3);
        assert_eq!(info.queue_len, 0);
        assert_eq!(info.policy, "greedy");
        assert_eq!(info.exit_policy, "any-exit");

        let (status, body) = send(router(state), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(&body).unwrap(),
            serde_json::json!({ "status": "ok" })
        );
    }
}
