//! HTTP control and observation surface for a running [`FramePacer`].
//!
//! Observers poll `/snapshot` or long-poll `/snapshot/next`; controllers
//! start, stop and retune the pacer with `POST` requests. Start and stop block
//! on the pacer's run lock, so they are moved off the async workers.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use log::info;
use serde::{Deserialize, Serialize};

use telemetrylab_core::{FramePacer, PerformanceSnapshot};

/// Upper bound on a single long-poll.
const MAX_LONG_POLL_MS: u64 = 30_000;
const DEFAULT_LONG_POLL_MS: u64 = 1_000;

/// Shared server state.
struct AppState {
    pacer: Arc<FramePacer>,
}

#[derive(Deserialize)]
struct NextParams {
    /// How long to wait for a new snapshot before answering with the current one.
    timeout_ms: Option<u64>,
}

#[derive(Deserialize)]
struct LoadParams {
    level: i64,
}

#[derive(Serialize)]
struct NextResponse {
    /// False if the wait timed out and `snapshot` is the unchanged current value.
    changed: bool,
    snapshot: PerformanceSnapshot,
}

#[derive(Serialize)]
struct ControlResponse {
    success: bool,
    is_running: bool,
    compute_load: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct LoadResponse {
    requested: i64,
    compute_load: u8,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    is_running: bool,
    frame_counter: u64,
    subscribers: usize,
}

impl ControlResponse {
    /// Reads the published snapshot only, so a response never waits on a
    /// `stop()` that is still joining the loop thread.
    fn from_pacer(pacer: &FramePacer, error: Option<String>) -> Self {
        let snapshot = pacer.snapshot();
        Self {
            success: error.is_none(),
            is_running: snapshot.is_running,
            compute_load: snapshot.compute_load.get(),
            error,
        }
    }
}

async fn handle_snapshot(State(state): State<Arc<AppState>>) -> Json<PerformanceSnapshot> {
    Json(state.pacer.snapshot())
}

async fn handle_next(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NextParams>,
) -> Json<NextResponse> {
    let wait = params
        .timeout_ms
        .unwrap_or(DEFAULT_LONG_POLL_MS)
        .min(MAX_LONG_POLL_MS);
    let mut sub = state.pacer.subscribe();

    match tokio::time::timeout(Duration::from_millis(wait), sub.changed()).await {
        Ok(Some(snapshot)) => Json(NextResponse {
            changed: true,
            snapshot,
        }),
        _ => Json(NextResponse {
            changed: false,
            snapshot: sub.latest(),
        }),
    }
}

async fn handle_start(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ControlResponse>) {
    let pacer = Arc::clone(&state.pacer);
    let result = tokio::task::spawn_blocking(move || pacer.start()).await;
    let error = match result {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(format!("failed to start pacer: {e}")),
        Err(e) => Some(format!("start task failed: {e}")),
    };
    let status = if error.is_some() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    (status, Json(ControlResponse::from_pacer(&state.pacer, error)))
}

async fn handle_stop(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ControlResponse>) {
    let pacer = Arc::clone(&state.pacer);
    match tokio::task::spawn_blocking(move || pacer.stop()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ControlResponse::from_pacer(&state.pacer, None)),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ControlResponse::from_pacer(
                &state.pacer,
                Some(format!("stop task failed: {e}")),
            )),
        ),
    }
}

async fn handle_load(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LoadParams>,
) -> Json<LoadResponse> {
    let applied = state.pacer.set_compute_load(params.level);
    Json(LoadResponse {
        requested: params.level,
        compute_load: applied.get(),
    })
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let snap = state.pacer.snapshot();
    Json(HealthResponse {
        status: if snap.is_running { "running" } else { "idle" }.to_string(),
        is_running: snap.is_running,
        frame_counter: snap.frame_counter,
        subscribers: state.pacer.channel().subscriber_count(),
    })
}

async fn handle_index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let config = state.pacer.config();
    Json(serde_json::json!({
        "name": "Telemetry Lab Server",
        "version": telemetrylab_core::VERSION,
        "power_signal": state.pacer.power_signal_name(),
        "config": config,
        "endpoints": {
            "/": "This API index",
            "/health": "Run state and frame count",
            "/snapshot": "Latest published performance snapshot",
            "/snapshot/next": {
                "method": "GET",
                "description": "Wait for the next published snapshot",
                "params": {
                    "timeout_ms": format!("Max wait (default {DEFAULT_LONG_POLL_MS}, capped at {MAX_LONG_POLL_MS})"),
                }
            },
            "/start": "POST: start a fresh run (no-op if running)",
            "/stop": "POST: stop the current run (no-op if idle)",
            "/load": {
                "method": "POST",
                "description": "Set the compute load",
                "params": { "level": "Integer, clamped to 1-5" }
            },
        },
    }))
}

/// Build the axum router.
fn build_router(pacer: Arc<FramePacer>) -> Router {
    let state = Arc::new(AppState { pacer });

    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/snapshot", get(handle_snapshot))
        .route("/snapshot/next", get(handle_next))
        .route("/start", post(handle_start))
        .route("/stop", post(handle_stop))
        .route("/load", post(handle_load))
        .with_state(state)
}

/// Serve the pacer over HTTP until Ctrl-C.
pub async fn run_server(pacer: Arc<FramePacer>, host: &str, port: u16) -> std::io::Result<()> {
    let app = build_router(pacer);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
