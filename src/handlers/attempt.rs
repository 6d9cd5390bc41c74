// src/handlers/attempt.rs

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    error::AppError,
    models::{access::PreflightData, attempt::Attempt},
    services::preflight::PrefilledPrompt,
    site::quiz_api::AttemptStatus,
    state::AppState,
    utils::layout::pages_from_layout,
};

#[derive(Debug, Deserialize, Validate)]
pub struct OpenAttemptRequest {
    #[validate(range(min = 1, message = "course_id must be a positive id."))]
    pub course_id: i64,
    /// Attempt to continue; a new one is started when absent.
    #[validate(range(min = 1))]
    pub attempt_id: Option<i64>,
    /// What the user typed into the preflight form, if it was shown.
    pub preflight_data: Option<PreflightData>,
    #[serde(default)]
    pub offline: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct OfflineAnswersRequest {
    #[validate(range(min = 1, message = "course_id must be a positive id."))]
    pub course_id: i64,
    #[serde(default)]
    pub answers: BTreeMap<String, String>,
    #[validate(range(min = 0))]
    pub page: Option<i64>,
    #[serde(default)]
    pub finish: bool,
}

async fn find_unfinished_attempt(
    state: &AppState,
    quiz_id: i64,
    attempt_id: i64,
) -> Result<Attempt, AppError> {
    state
        .api
        .get_user_attempts(quiz_id, state.api.user_id(), AttemptStatus::Unfinished, true)
        .await?
        .into_iter()
        .find(|a| a.id == attempt_id)
        .ok_or_else(|| AppError::NotFound(format!("Attempt {} not found", attempt_id)))
}

/// Starts a new attempt or continues an existing one.
///
/// Runs the preflight flow with the submitted preflight data. Returns 201
/// and the new attempt, or 200 and the continued one. When the site rejects
/// the data the rejection is returned, since it cannot be asked for again.
pub async fn open_attempt(
    State(state): State<AppState>,
    Path(quiz_id): Path<i64>,
    Json(req): Json<OpenAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let quiz = state.api.get_quiz(req.course_id, quiz_id).await?;
    let access = state.api.get_quiz_access_information(quiz_id).await?;

    let attempt = match req.attempt_id {
        Some(attempt_id) => {
            let mut attempt = find_unfinished_attempt(&state, quiz_id, attempt_id).await?;
            if req.offline {
                attempt.finishedoffline = state
                    .sync
                    .get_attempt_offline(attempt_id)
                    .await?
                    .is_some_and(|stored| stored.finishedoffline);
            }
            Some(attempt)
        }
        None => None,
    };
    let is_new = attempt.is_none();

    let prompt = PrefilledPrompt::new(req.preflight_data);
    let result = state
        .preflight
        .run(
            &quiz,
            &access,
            PreflightData::new(),
            attempt,
            req.offline,
            false,
            &prompt,
        )
        .await;

    let attempt = match result {
        Ok(attempt) => attempt,
        Err(AppError::Cancelled) => return Err(prompt.take_rejection().unwrap_or(AppError::Cancelled)),
        Err(e) => return Err(e),
    };

    tracing::info!("Attempt {} of quiz {} opened", attempt.id, quiz_id);

    let status = if is_new { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(attempt)))
}

/// Keeps answers of an attempt on the device until the next sync.
pub async fn save_offline(
    State(state): State<AppState>,
    Path((quiz_id, attempt_id)): Path<(i64, i64)>,
    Json(req): Json<OfflineAnswersRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let quiz = state.api.get_quiz(req.course_id, quiz_id).await?;
    if !quiz.is_offline(state.config.offline_disabled) {
        return Err(AppError::Validation(format!(
            "Quiz {} cannot be attempted offline",
            quiz_id
        )));
    }

    let mut attempt = find_unfinished_attempt(&state, quiz_id, attempt_id).await?;
    if let Some(page) = req.page {
        if !pages_from_layout(&attempt.layout).contains(&page) {
            return Err(AppError::Validation(format!(
                "Attempt {} has no page {}",
                attempt_id, page
            )));
        }
        attempt.currentpage = page;
    }

    if req.finish {
        state
            .sync
            .finish_attempt_offline(&quiz, &attempt, req.answers)
            .await?;
    } else {
        state
            .sync
            .save_offline_answers(&quiz, &attempt, req.answers)
            .await?;
    }

    if let Some(page) = req.page {
        state.sync.set_current_page(attempt_id, page).await?;
    }

    let stored = state
        .sync
        .get_attempt_offline(attempt_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Offline attempt {} not found", attempt_id)))?;

    Ok(Json(stored))
}
