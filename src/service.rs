//! HTTP service mode.
//!
//! Axum server exposing the orchestrator as a job API. Each accepted idea
//! becomes a background automation run identified by a UUID; the job table
//! mirrors the run's event stream so clients can poll progress. Finished
//! records stay queryable for the configured retention window, then expire.
//!
//! Endpoints:
//!   GET  /health
//!   POST /process
//!   GET  /status/{job_id}
//!   GET  /jobs
//!   POST /cancel/{job_id}

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::events::AutomationEvent;
use crate::idea::IdeaInput;
use crate::orchestrator::{AutomationResult, Orchestrator};
use crate::status::{AutomationStatus, ProgressUpdate};

// ─── Job table ───────────────────────────────────────────────────────────────

/// One automation job as seen by API clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub job_id: String,
    pub status: AutomationStatus,
    pub progress: Option<ProgressUpdate>,
    pub errors: Vec<String>,
    pub result: Option<AutomationResult>,
    pub created_at: DateTime<Utc>,
}

impl JobRecord {
    fn new(job_id: String) -> Self {
        Self {
            job_id,
            status: AutomationStatus::Idle,
            progress: None,
            errors: Vec::new(),
            result: None,
            created_at: Utc::now(),
        }
    }
}

pub struct AppContext {
    pub config: Arc<Config>,
    jobs: RwLock<HashMap<String, JobRecord>>,
}

impl AppContext {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            jobs: RwLock::new(HashMap::new()),
        }
    }
}

// ─── Server ──────────────────────────────────────────────────────────────────

pub async fn serve(ctx: Arc<AppContext>) -> Result<()> {
    let addr: SocketAddr = ([127, 0, 0, 1], ctx.config.port).into();
    let router = build_router(ctx);

    info!("automation service listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/process", post(process_idea))
        .route("/status/{job_id}", get(job_status))
        .route("/jobs", get(list_jobs))
        .route("/cancel/{job_id}", post(cancel_job))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

// ─── Handlers ────────────────────────────────────────────────────────────────

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "autoforge",
        "timestamp": Utc::now(),
    }))
}

#[derive(Debug, Deserialize)]
struct ProcessRequest {
    idea: Option<IdeaInput>,
}

/// Accept an idea and start a background run for it. Replies immediately
/// with the job id; progress is polled through `/status/{job_id}`.
async fn process_idea(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<ProcessRequest>,
) -> (StatusCode, Json<Value>) {
    let Some(input) = request.idea else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "request body must contain an \"idea\" object" })),
        );
    };

    let job_id = Uuid::new_v4().to_string();
    ctx.jobs
        .write()
        .await
        .insert(job_id.clone(), JobRecord::new(job_id.clone()));
    info!(%job_id, "automation job accepted");

    tokio::spawn(run_job(Arc::clone(&ctx), job_id.clone(), input));

    (
        StatusCode::ACCEPTED,
        Json(json!({ "jobId": job_id, "status": "accepted" })),
    )
}

async fn job_status(
    State(ctx): State<Arc<AppContext>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobRecord>, (StatusCode, Json<Value>)> {
    match ctx.jobs.read().await.get(&job_id) {
        Some(record) => Ok(Json(record.clone())),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown job: {job_id}") })),
        )),
    }
}

async fn list_jobs(State(ctx): State<Arc<AppContext>>) -> Json<Vec<JobRecord>> {
    let jobs = ctx.jobs.read().await;
    let mut records: Vec<JobRecord> = jobs.values().cloned().collect();
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Json(records)
}

/// Cancellation is acknowledged but not enforced; the run continues to its
/// own terminal state.
async fn cancel_job(
    State(ctx): State<Arc<AppContext>>,
    Path(job_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    if !ctx.jobs.read().await.contains_key(&job_id) {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown job: {job_id}") })),
        );
    }
    warn!(%job_id, "cancellation requested but not supported; job will run to completion");
    (
        StatusCode::ACCEPTED,
        Json(json!({
            "jobId": job_id,
            "status": "cancel_requested",
            "note": "cancellation is not supported; the job will run to completion",
        })),
    )
}

// ─── Job execution ───────────────────────────────────────────────────────────

/// Drive one run and mirror its event stream into the job table. The record
/// is dropped after the retention window so the table cannot grow unbounded.
async fn run_job(ctx: Arc<AppContext>, job_id: String, input: IdeaInput) {
    let orchestrator = Orchestrator::new(Arc::clone(&ctx.config));
    let events = orchestrator.events().subscribe();
    let mirror = tokio::spawn(mirror_events(Arc::clone(&ctx), job_id.clone(), events));

    let result = orchestrator.run(input).await;
    info!(%job_id, status = %result.status, "automation job finished");

    // The broadcaster closes when the orchestrator drops; wait for the
    // mirror to drain so the final record is consistent.
    drop(orchestrator);
    let _ = mirror.await;

    {
        let mut jobs = ctx.jobs.write().await;
        if let Some(record) = jobs.get_mut(&job_id) {
            record.status = result.status;
            record.errors = result.errors.clone();
            record.result = Some(result);
        }
    }

    tokio::time::sleep(ctx.config.timeouts.job_retention).await;
    if ctx.jobs.write().await.remove(&job_id).is_some() {
        info!(%job_id, "expired finished job record");
    }
}

async fn mirror_events(
    ctx: Arc<AppContext>,
    job_id: String,
    mut rx: tokio::sync::broadcast::Receiver<AutomationEvent>,
) {
    use tokio::sync::broadcast::error::RecvError;
    loop {
        match rx.recv().await {
            Ok(event) => {
                let mut jobs = ctx.jobs.write().await;
                let Some(record) = jobs.get_mut(&job_id) else {
                    break;
                };
                match event {
                    AutomationEvent::StatusChanged { status } => record.status = status,
                    AutomationEvent::Progress(update) => record.progress = Some(update),
                    AutomationEvent::Error { message } => record.errors.push(message),
                }
            }
            Err(RecvError::Lagged(missed)) => {
                warn!(%job_id, missed, "job event mirror lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
