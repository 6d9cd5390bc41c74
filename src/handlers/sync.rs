// src/handlers/sync.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use validator::Validate;

use crate::{error::AppError, handlers::quiz::CourseQuery, state::AppState};

/// Sends the answers kept on the device for a quiz to the site.
pub async fn sync_quiz(
    State(state): State<AppState>,
    Path(quiz_id): Path<i64>,
    Query(query): Query<CourseQuery>,
) -> Result<impl IntoResponse, AppError> {
    query
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let quiz = state.api.get_quiz(query.course_id, quiz_id).await?;
    let result = state.sync.sync_quiz(quiz).await?;

    Ok(Json(result))
}
