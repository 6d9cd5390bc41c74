// src/handlers/quiz.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    error::AppError,
    models::display::{DisplayOptions, MarksVisibility},
    services::review,
    site::quiz_api::AttemptStatus,
    state::AppState,
    utils::{grade::formatted_quiz_grade, time::now_secs},
};

/// Query string shared by the quiz routes.
#[derive(Debug, Deserialize, Validate)]
pub struct CourseQuery {
    #[validate(range(min = 1, message = "course_id must be a positive id."))]
    pub course_id: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewQuery {
    #[validate(range(min = 1, message = "course_id must be a positive id."))]
    pub course_id: i64,
    /// Owner of the attempt, when reviewing somebody else's.
    #[validate(range(min = 1))]
    pub user_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct QuizAccessResponse {
    pub quiz_id: i64,
    pub unsupported_rules: Vec<String>,
    pub preflight_required: bool,
    pub offline: bool,
    pub has_data_to_sync: bool,
    pub reasons: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub can_review: bool,
    /// Attempt state as shown in attempt lists.
    pub state: &'static str,
    /// Why the review is not available, or when it will be.
    pub message: String,
    pub options: DisplayOptions,
    /// Attempt grade out of the quiz grade, when marks may be shown.
    pub grade: Option<String>,
}

/// What the viewer needs to know before opening a quiz.
///
/// Reports rules this client cannot enforce, whether starting an attempt
/// will ask for preflight data, and whether offline answers are waiting.
pub async fn get_access(
    State(state): State<AppState>,
    Path(quiz_id): Path<i64>,
    Query(query): Query<CourseQuery>,
) -> Result<impl IntoResponse, AppError> {
    query
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let quiz = state.api.get_quiz(query.course_id, quiz_id).await?;
    let access = state.api.get_quiz_access_information(quiz_id).await?;

    let unsupported_rules = state.registry.unsupported_rules(&access.activerulenames);
    let preflight_required = unsupported_rules.is_empty()
        && state
            .registry
            .is_preflight_check_required(&access.activerulenames, &quiz, None, false)
            .await;

    let mut reasons = access.preventaccessreasons.clone();
    reasons.extend(access.preventnewattemptreasons.iter().cloned());

    Ok(Json(QuizAccessResponse {
        quiz_id,
        unsupported_rules,
        preflight_required,
        offline: quiz.is_offline(state.config.offline_disabled),
        has_data_to_sync: state.sync.has_data_to_sync(quiz_id).await?,
        reasons,
    }))
}

/// Whether the viewer may review an attempt, with the display options that
/// would apply.
pub async fn get_review(
    State(state): State<AppState>,
    Path((quiz_id, attempt_id)): Path<(i64, i64)>,
    Query(query): Query<ReviewQuery>,
) -> Result<impl IntoResponse, AppError> {
    query
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let owner_id = query.user_id.unwrap_or_else(|| state.api.user_id());
    let quiz = state.api.get_quiz(query.course_id, quiz_id).await?;
    let access = state.api.get_quiz_access_information(quiz_id).await?;

    let attempt = state
        .api
        .get_user_attempts(quiz_id, owner_id, AttemptStatus::All, true)
        .await?
        .into_iter()
        .find(|a| a.id == attempt_id)
        .ok_or_else(|| AppError::NotFound(format!("Attempt {} not found", attempt_id)))?;

    let now = now_secs();
    let can_review = review::can_review_attempt(
        &quiz,
        &access,
        &attempt,
        state.api.user_id(),
        now,
        state.groups.as_ref(),
    )
    .await;

    let message = if can_review {
        String::new()
    } else {
        review::cannot_review_message(&quiz, &attempt, false, now)
    };

    let display_state = review::attempt_state_display_option(&quiz, &attempt, now);
    let options = review::display_options_for_quiz(&quiz, display_state);

    let grade = (can_review && options.marks == MarksVisibility::MarkAndMax).then(|| {
        format!(
            "{} / {}",
            formatted_quiz_grade(attempt.sumgrades, &quiz),
            formatted_quiz_grade(quiz.sumgrades, &quiz)
        )
    });

    Ok(Json(ReviewResponse {
        can_review,
        state: attempt.state.readable(),
        message,
        options,
        grade,
    }))
}
