use axum::{Json, Router, http::StatusCode, routing::post};
use log::info;
use serde::Deserialize;

use crate::data::Snapshot;
use crate::error::SchedulerError;
use crate::scheduler::{Scheduler, SchedulerConfig, TimetableReport};
use crate::store::InMemoryStore;

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveRequest {
    pub snapshot: Snapshot,
    #[serde(default)]
    pub config: SchedulerConfig,
}

async fn solve_handler(
    Json(request): Json<SolveRequest>,
) -> Result<Json<TimetableReport>, (StatusCode, String)> {
    // the search is CPU bound and may run for the whole time budget
    let result = tokio::task::spawn_blocking(move || {
        let mut scheduler = Scheduler::new(InMemoryStore::new(request.snapshot), request.config);
        scheduler.run()
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    match result {
        Ok(report) => Ok(Json(report)),
        Err(e) => Err((status_for(&e), e.to_string())),
    }
}

fn status_for(error: &SchedulerError) -> StatusCode {
    match error {
        SchedulerError::Input(_) => StatusCode::BAD_REQUEST,
        SchedulerError::Unsatisfiable { .. } | SchedulerError::LimitExceeded { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        SchedulerError::ConflictOnSave(_) | SchedulerError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub fn router() -> Router {
    Router::new().route("/v1/timetable/solve", post(solve_handler))
}

/// Serves the router on `TIMETABLE_ADDR`, or 127.0.0.1:8080 when unset.
pub async fn run_server() -> std::io::Result<()> {
    let addr = std::env::var("TIMETABLE_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, router()).await
}
