use crate::error::{EngineError, TaskError};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

use super::{AppState, CreateTaskBody, HoldQuery, TaskIdQuery};

/// Maps task errors onto HTTP status codes with a JSON `{"error": ...}` body.
pub(super) struct ApiError(TaskError);

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            TaskError::NotFound(_) => StatusCode::NOT_FOUND,
            TaskError::Conflict(_) => StatusCode::CONFLICT,
            TaskError::InvalidSchedule { .. }
            | TaskError::InvalidId(_)
            | TaskError::Engine(EngineError::InvalidSchedule(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "task request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// GET /health — component health for this instance
pub(super) async fn handle_health() -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "ok",
        "runtime": crate::diagnostics::health::snapshot_json(),
    });
    Json(body)
}

/// POST /task/create
pub(super) async fn handle_create(
    State(state): State<AppState>,
    Json(body): Json<CreateTaskBody>,
) -> ApiResult<&'static str> {
    state.service.create_task(&body.task_id, &body.cron).await?;
    Ok("Task created successfully")
}

/// POST /task/hold
pub(super) async fn handle_hold(
    State(state): State<AppState>,
    Query(query): Query<HoldQuery>,
) -> ApiResult<&'static str> {
    state
        .service
        .pause_or_resume(&query.task_id, query.on_hold, query.only_db)
        .await?;
    Ok("Task put on hold successfully")
}

/// DELETE /task/delete
pub(super) async fn handle_delete(
    State(state): State<AppState>,
    Query(query): Query<TaskIdQuery>,
) -> ApiResult<&'static str> {
    state.service.delete_task(&query.task_id).await?;
    Ok("Task deleted successfully")
}

/// GET /task — task plus its execution record
pub(super) async fn handle_get_task(
    State(state): State<AppState>,
    Query(query): Query<TaskIdQuery>,
) -> ApiResult<Response> {
    let view = state.service.inspect_task(&query.task_id).await?;
    Ok(Json(view).into_response())
}

/// GET /tasks
pub(super) async fn handle_list(State(state): State<AppState>) -> ApiResult<Response> {
    let tasks = state.service.list_tasks().await?;
    Ok(Json(tasks).into_response())
}
