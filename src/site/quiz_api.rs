// src/site/quiz_api.rs

//! Typed wrappers around the `mod_quiz_*` web-service functions.

use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use super::{Params, SiteClient};
use crate::{
    error::{AppError, AppResult},
    models::{
        access::{AccessInformation, PreflightData},
        attempt::Attempt,
        quiz::Quiz,
    },
};

/// A warning returned next to a payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WsWarning {
    #[serde(default)]
    pub item: Option<String>,
    #[serde(default)]
    pub itemid: Option<i64>,
    #[serde(default)]
    pub warningcode: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttemptAccessInformation {
    #[serde(default)]
    pub endtime: Option<i64>,
    #[serde(default)]
    pub isfinished: bool,
    #[serde(default)]
    pub ispreflightcheckrequired: Option<bool>,
    #[serde(default)]
    pub preventnewattemptreasons: Vec<String>,
}

/// One question of an attempt page, as rendered by the site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttemptQuestion {
    pub slot: i64,
    #[serde(rename = "type", default)]
    pub question_type: String,
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub sequencecheck: Option<i64>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub mark: Option<String>,
    #[serde(default)]
    pub maxmark: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttemptData {
    pub attempt: Attempt,
    #[serde(default)]
    pub messages: Vec<String>,
    #[serde(default)]
    pub nextpage: i64,
    #[serde(default)]
    pub questions: Vec<AttemptQuestion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttemptReview {
    #[serde(default)]
    pub grade: Option<String>,
    pub attempt: Attempt,
    #[serde(default)]
    pub additionaldata: Vec<Value>,
    #[serde(default)]
    pub questions: Vec<AttemptQuestion>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewOption {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CombinedReviewOptions {
    #[serde(default)]
    pub someoptions: Vec<ReviewOption>,
    #[serde(default)]
    pub alloptions: Vec<ReviewOption>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BestGrade {
    #[serde(default)]
    pub hasgrade: bool,
    #[serde(default)]
    pub grade: Option<f64>,
}

/// Which attempts `get_user_attempts` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    All,
    Finished,
    Unfinished,
}

impl AttemptStatus {
    fn as_str(self) -> &'static str {
        match self {
            AttemptStatus::All => "all",
            AttemptStatus::Finished => "finished",
            AttemptStatus::Unfinished => "unfinished",
        }
    }
}

#[derive(Deserialize)]
struct QuizzesResponse {
    #[serde(default)]
    quizzes: Vec<Quiz>,
}

#[derive(Deserialize)]
struct AttemptsResponse {
    #[serde(default)]
    attempts: Vec<Attempt>,
}

#[derive(Deserialize)]
struct StartAttemptResponse {
    attempt: Attempt,
}

#[derive(Deserialize)]
struct ProcessAttemptResponse {
    state: crate::models::attempt::AttemptState,
}

#[derive(Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    questions: Vec<AttemptQuestion>,
}

#[derive(Deserialize)]
struct FeedbackResponse {
    #[serde(default)]
    feedbacktext: String,
}

#[derive(Deserialize)]
struct QuestionTypesResponse {
    #[serde(default)]
    questiontypes: Vec<String>,
}

fn param(name: &str, value: impl ToString) -> (String, String) {
    (name.to_string(), value.to_string())
}

/// Fails with the first warning's message if the payload carries any.
///
/// Used by calls whose warnings mean the request was not applied.
fn fail_on_warnings(value: &Value) -> AppResult<()> {
    let warnings: Vec<WsWarning> = match value.get("warnings") {
        Some(w) => serde_json::from_value(w.clone())?,
        None => return Ok(()),
    };

    match warnings.into_iter().next() {
        Some(first) => Err(AppError::Validation(first.message)),
        None => Ok(()),
    }
}

/// Answers of a page, flattened the way `process_attempt`/`save_attempt` expect.
fn answer_params(answers: &BTreeMap<String, String>) -> Params {
    answers
        .iter()
        .enumerate()
        .flat_map(|(i, (name, value))| {
            [
                param(&format!("data[{}][name]", i), name),
                param(&format!("data[{}][value]", i), value),
            ]
        })
        .collect()
}

/// Typed quiz web services on top of a `SiteClient`.
#[derive(Clone)]
pub struct QuizApi {
    client: Arc<dyn SiteClient>,
}

impl QuizApi {
    pub fn new(client: Arc<dyn SiteClient>) -> Self {
        Self { client }
    }

    pub fn user_id(&self) -> i64 {
        self.client.user_id()
    }

    async fn call<T: DeserializeOwned>(&self, function: &str, params: Params) -> AppResult<T> {
        let value = self
            .client
            .call(&format!("mod_quiz_{}", function), params)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn call_checked<T: DeserializeOwned>(&self, function: &str, params: Params) -> AppResult<T> {
        let value = self
            .client
            .call(&format!("mod_quiz_{}", function), params)
            .await?;
        fail_on_warnings(&value)?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get_quizzes_by_course(&self, course_id: i64) -> AppResult<Vec<Quiz>> {
        let response: QuizzesResponse = self
            .call("get_quizzes_by_courses", vec![param("courseids[0]", course_id)])
            .await?;
        Ok(response.quizzes)
    }

    pub async fn get_quiz(&self, course_id: i64, quiz_id: i64) -> AppResult<Quiz> {
        self.get_quizzes_by_course(course_id)
            .await?
            .into_iter()
            .find(|q| q.id == quiz_id)
            .ok_or_else(|| AppError::NotFound(format!("Quiz {} not found", quiz_id)))
    }

    pub async fn get_quiz_access_information(&self, quiz_id: i64) -> AppResult<AccessInformation> {
        self.call("get_quiz_access_information", vec![param("quizid", quiz_id)])
            .await
    }

    pub async fn get_attempt_access_information(
        &self,
        quiz_id: i64,
        attempt_id: Option<i64>,
    ) -> AppResult<AttemptAccessInformation> {
        let mut params = vec![param("quizid", quiz_id)];
        if let Some(id) = attempt_id {
            params.push(param("attemptid", id));
        }
        self.call("get_attempt_access_information", params).await
    }

    pub async fn get_attempt_data(
        &self,
        attempt_id: i64,
        page: i64,
        preflight: &PreflightData,
    ) -> AppResult<AttemptData> {
        let mut params = vec![param("attemptid", attempt_id), param("page", page)];
        params.extend(preflight.to_params());
        self.call("get_attempt_data", params).await
    }

    pub async fn get_attempt_review(&self, attempt_id: i64, page: Option<i64>) -> AppResult<AttemptReview> {
        self.call(
            "get_attempt_review",
            vec![param("attemptid", attempt_id), param("page", page.unwrap_or(-1))],
        )
        .await
    }

    pub async fn get_attempt_summary(
        &self,
        attempt_id: i64,
        preflight: &PreflightData,
    ) -> AppResult<Vec<AttemptQuestion>> {
        let mut params = vec![param("attemptid", attempt_id)];
        params.extend(preflight.to_params());
        let response: SummaryResponse = self.call("get_attempt_summary", params).await?;
        Ok(response.questions)
    }

    pub async fn get_combined_review_options(
        &self,
        quiz_id: i64,
        user_id: i64,
    ) -> AppResult<CombinedReviewOptions> {
        self.call(
            "get_combined_review_options",
            vec![param("quizid", quiz_id), param("userid", user_id)],
        )
        .await
    }

    pub async fn get_quiz_feedback_for_grade(&self, quiz_id: i64, grade: f64) -> AppResult<String> {
        let response: FeedbackResponse = self
            .call(
                "get_quiz_feedback_for_grade",
                vec![param("quizid", quiz_id), param("grade", grade)],
            )
            .await?;
        Ok(response.feedbacktext)
    }

    pub async fn get_quiz_required_question_types(&self, quiz_id: i64) -> AppResult<Vec<String>> {
        let response: QuestionTypesResponse = self
            .call("get_quiz_required_qtypes", vec![param("quizid", quiz_id)])
            .await?;
        Ok(response.questiontypes)
    }

    pub async fn get_user_attempts(
        &self,
        quiz_id: i64,
        user_id: i64,
        status: AttemptStatus,
        include_previews: bool,
    ) -> AppResult<Vec<Attempt>> {
        let response: AttemptsResponse = self
            .call(
                "get_user_attempts",
                vec![
                    param("quizid", quiz_id),
                    param("userid", user_id),
                    param("status", status.as_str()),
                    param("includepreviews", include_previews as i32),
                ],
            )
            .await?;
        Ok(response.attempts)
    }

    pub async fn get_user_best_grade(&self, quiz_id: i64, user_id: i64) -> AppResult<BestGrade> {
        self.call(
            "get_user_best_grade",
            vec![param("quizid", quiz_id), param("userid", user_id)],
        )
        .await
    }

    pub async fn view_quiz(&self, quiz_id: i64) -> AppResult<()> {
        let _: Value = self.call("view_quiz", vec![param("quizid", quiz_id)]).await?;
        Ok(())
    }

    pub async fn view_attempt(&self, attempt_id: i64, page: i64, preflight: &PreflightData) -> AppResult<()> {
        let mut params = vec![param("attemptid", attempt_id), param("page", page)];
        params.extend(preflight.to_params());
        let _: Value = self.call("view_attempt", params).await?;
        Ok(())
    }

    pub async fn view_attempt_summary(&self, attempt_id: i64, preflight: &PreflightData) -> AppResult<()> {
        let mut params = vec![param("attemptid", attempt_id)];
        params.extend(preflight.to_params());
        let _: Value = self.call("view_attempt_summary", params).await?;
        Ok(())
    }

    pub async fn view_attempt_review(&self, attempt_id: i64) -> AppResult<()> {
        let _: Value = self
            .call("view_attempt_review", vec![param("attemptid", attempt_id)])
            .await?;
        Ok(())
    }

    pub async fn start_attempt(
        &self,
        quiz_id: i64,
        preflight: &PreflightData,
        force_new: bool,
    ) -> AppResult<Attempt> {
        let mut params = vec![param("quizid", quiz_id), param("forcenew", force_new as i32)];
        params.extend(preflight.to_params());
        let response: StartAttemptResponse = self.call_checked("start_attempt", params).await?;
        Ok(response.attempt)
    }

    /// Saves answers without moving the attempt forward.
    pub async fn save_attempt(
        &self,
        attempt_id: i64,
        answers: &BTreeMap<String, String>,
        preflight: &PreflightData,
    ) -> AppResult<()> {
        let mut params = vec![param("attemptid", attempt_id)];
        params.extend(answer_params(answers));
        params.extend(preflight.to_params());
        let _: Value = self.call_checked("save_attempt", params).await?;
        Ok(())
    }

    /// Sends answers and optionally finishes the attempt. Returns the new state.
    pub async fn process_attempt(
        &self,
        attempt_id: i64,
        answers: &BTreeMap<String, String>,
        preflight: &PreflightData,
        finish: bool,
        time_up: bool,
    ) -> AppResult<crate::models::attempt::AttemptState> {
        let mut params = vec![
            param("attemptid", attempt_id),
            param("finishattempt", finish as i32),
            param("timeup", time_up as i32),
        ];
        params.extend(answer_params(answers));
        params.extend(preflight.to_params());
        let response: ProcessAttemptResponse = self.call_checked("process_attempt", params).await?;
        Ok(response.state)
    }
}
