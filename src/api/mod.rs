use axum::Json;
use axum::extract::Path;
use axum::routing::post;
use axum::{Router, extract::State, http::StatusCode, routing::get};

use crate::db::repository;
use crate::error::AppError;
use crate::models::{AbsentRequest, AttendanceRecord, RosterStudent, SubmitRequest, SubmitResponse};
use crate::state::AppState;
use crate::store::AttendanceStore;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/attendance/time-in", post(time_in))
        .route("/api/attendance/time-out", post(time_out))
        .route("/api/attendance/absent", post(mark_absent).delete(cancel_absent))
        .route("/api/roster/{teacher_id}", get(roster))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn time_in(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, AppError> {
    let store = AttendanceStore::new(state.db.clone(), state.notifier.clone());
    let resp = store.submit_time_in(&req).await?;
    Ok(Json(resp))
}

async fn time_out(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, AppError> {
    let store = AttendanceStore::new(state.db.clone(), state.notifier.clone());
    let resp = store.submit_time_out(&req).await?;
    Ok(Json(resp))
}

async fn roster(
    State(state): State<AppState>,
    Path(teacher_id): Path<String>,
) -> Result<Json<Vec<RosterStudent>>, AppError> {
    let teacher = repository::find_teacher(&state.db, &teacher_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let students = repository::roster_for_teacher(&state.db, &teacher).await?;
    let roster = students
        .into_iter()
        .map(|s| RosterStudent {
            id: s.id,
            full_name: s.full_name,
        })
        .collect();
    Ok(Json(roster))
}

async fn mark_absent(
    State(state): State<AppState>,
    Json(req): Json<AbsentRequest>,
) -> Result<Json<AttendanceRecord>, AppError> {
    let store = AttendanceStore::new(state.db.clone(), state.notifier.clone());
    let record = store.mark_absent(&req.student_id, req.date).await?;
    Ok(Json(record))
}

async fn cancel_absent(
    State(state): State<AppState>,
    Json(req): Json<AbsentRequest>,
) -> Result<StatusCode, AppError> {
    let store = AttendanceStore::new(state.db.clone(), state.notifier.clone());
    store.cancel_absent(&req.student_id, req.date).await?;
    Ok(StatusCode::NO_CONTENT)
}
