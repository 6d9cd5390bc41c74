// src/services/preflight.rs

//! Gathering and validating preflight data before an attempt is started,
//! continued or prefetched.
//!
//! The flow is a small state machine. `transition` holds every rule about
//! what happens next, `PreflightFlow::run` only performs the side effects
//! of each state.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    access_rules::AccessRuleRegistry,
    error::{AppError, AppResult},
    models::{
        access::{AccessInformation, PreflightData},
        attempt::{Attempt, AttemptState},
        quiz::Quiz,
    },
    site::quiz_api::QuizApi,
    storage::LocalStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreflightState {
    Gathering { retrying: bool },
    Validating { check_required: bool, retrying: bool },
    Failed { retryable: bool },
    Succeeded,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreflightEvent {
    /// All data collected; `check_required` says whether the user was asked.
    Gathered { check_required: bool },
    /// The user closed the prompt without submitting.
    Dismissed,
    Validated,
    Rejected { web_service_error: bool },
    Retry,
}

/// Next state of the flow.
///
/// A rejection is only retried when the site itself rejected the data, we
/// are not prefetching, and this is not a retry on which no check was
/// required: asking again could not change the outcome in that case.
/// Unexpected events leave the state unchanged.
pub fn transition(state: PreflightState, event: PreflightEvent, prefetch: bool) -> PreflightState {
    use PreflightEvent as E;
    use PreflightState as S;

    match (state, event) {
        (S::Gathering { retrying }, E::Gathered { check_required }) => S::Validating {
            check_required,
            retrying,
        },
        (S::Gathering { .. }, E::Dismissed) => S::Cancelled,
        (S::Validating { .. }, E::Validated) => S::Succeeded,
        (
            S::Validating {
                check_required,
                retrying,
            },
            E::Rejected { web_service_error },
        ) => S::Failed {
            retryable: web_service_error && !prefetch && !(retrying && !check_required),
        },
        (S::Failed { retryable: true }, E::Retry) => S::Gathering { retrying: true },
        (state, _) => state,
    }
}

/// Asks the user for preflight data.
#[async_trait]
pub trait PreflightPrompt: Send + Sync {
    /// `None` means the user dismissed the prompt. `last_error` is the
    /// rejection that caused this prompt, if it is a retry.
    async fn ask(
        &self,
        quiz: &Quiz,
        attempt: Option<&Attempt>,
        prefetch: bool,
        last_error: Option<&AppError>,
    ) -> Option<PreflightData>;
}

/// Runs the preflight flow against the site.
#[derive(Clone)]
pub struct PreflightFlow {
    registry: Arc<AccessRuleRegistry>,
    api: QuizApi,
    store: LocalStore,
}

impl PreflightFlow {
    pub fn new(registry: Arc<AccessRuleRegistry>, api: QuizApi, store: LocalStore) -> Self {
        Self { registry, api, store }
    }

    /// Gathers, validates and (when allowed) retries until the site accepts
    /// the preflight data. Returns the attempt the data was validated for:
    /// the new attempt when `attempt` is `None`.
    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        &self,
        quiz: &Quiz,
        access_info: &AccessInformation,
        mut preflight_data: PreflightData,
        mut attempt: Option<Attempt>,
        offline: bool,
        prefetch: bool,
        prompt: &dyn PreflightPrompt,
    ) -> AppResult<Attempt> {
        let rules = &access_info.activerulenames;
        self.registry.ensure_rules_supported(rules)?;

        let mut state = PreflightState::Gathering { retrying: false };
        let mut last_error: Option<AppError> = None;

        loop {
            state = match state {
                PreflightState::Gathering { .. } => {
                    let check_required = self
                        .registry
                        .is_preflight_check_required(rules, quiz, attempt.as_ref(), prefetch)
                        .await;

                    let mut dismissed = false;
                    if check_required {
                        match prompt
                            .ask(quiz, attempt.as_ref(), prefetch, last_error.as_ref())
                            .await
                        {
                            Some(data) => preflight_data.merge(data),
                            None => dismissed = true,
                        }
                    }

                    if dismissed {
                        transition(state, PreflightEvent::Dismissed, prefetch)
                    } else {
                        self.registry
                            .get_fixed_preflight_data(
                                rules,
                                quiz,
                                &mut preflight_data,
                                attempt.as_ref(),
                                prefetch,
                            )
                            .await;
                        transition(state, PreflightEvent::Gathered { check_required }, prefetch)
                    }
                }
                PreflightState::Validating { .. } => {
                    match self
                        .validate(quiz, access_info, &preflight_data, attempt.as_ref(), offline, prefetch)
                        .await
                    {
                        Ok(validated) => {
                            attempt = Some(validated);
                            transition(state, PreflightEvent::Validated, prefetch)
                        }
                        Err(e) => {
                            let next = transition(
                                state,
                                PreflightEvent::Rejected {
                                    web_service_error: e.is_web_service_error(),
                                },
                                prefetch,
                            );
                            last_error = Some(e);
                            next
                        }
                    }
                }
                PreflightState::Failed { retryable: true } => {
                    tracing::info!("Preflight data for quiz {} rejected, asking again", quiz.id);
                    transition(state, PreflightEvent::Retry, prefetch)
                }
                PreflightState::Failed { retryable: false } => {
                    return Err(last_error.unwrap_or_else(|| {
                        AppError::InternalServerError("Preflight failed without an error".to_string())
                    }));
                }
                PreflightState::Succeeded => {
                    return attempt.ok_or_else(|| {
                        AppError::InternalServerError("Preflight succeeded without an attempt".to_string())
                    });
                }
                PreflightState::Cancelled => return Err(AppError::Cancelled),
            };
        }
    }

    /// Sends the data to the site through the call the attempt needs next:
    /// start for a new attempt, attempt data to continue one, the summary
    /// for one that can no longer be answered.
    async fn validate(
        &self,
        quiz: &Quiz,
        access_info: &AccessInformation,
        preflight_data: &PreflightData,
        attempt: Option<&Attempt>,
        offline: bool,
        prefetch: bool,
    ) -> AppResult<Attempt> {
        let rules = &access_info.activerulenames;

        let result = match attempt {
            Some(existing) if existing.state != AttemptState::Overdue && !existing.finishedoffline => {
                self.continue_attempt(existing, preflight_data, offline).await
            }
            Some(existing) => self
                .api
                .get_attempt_summary(existing.id, preflight_data)
                .await
                .map(|_| existing.clone()),
            None => self.api.start_attempt(quiz.id, preflight_data, false).await,
        };

        match result {
            Ok(validated) => {
                self.registry
                    .notify_preflight_check_passed(rules, quiz, Some(&validated), preflight_data, prefetch)
                    .await;
                Ok(validated)
            }
            Err(e) => {
                if e.is_web_service_error() {
                    self.registry
                        .notify_preflight_check_failed(rules, quiz, attempt, preflight_data, prefetch)
                        .await;
                }
                Err(e)
            }
        }
    }

    async fn continue_attempt(
        &self,
        attempt: &Attempt,
        preflight_data: &PreflightData,
        offline: bool,
    ) -> AppResult<Attempt> {
        let data = self
            .api
            .get_attempt_data(attempt.id, attempt.currentpage, preflight_data)
            .await?;

        let mut validated = attempt.clone();
        validated.state = data.attempt.state;

        if offline {
            // The device may be ahead of the site on which page the user is.
            if let Some(stored) = self.store.get_offline_attempt(attempt.id).await? {
                validated.currentpage = stored.currentpage;
            }
        }

        Ok(validated)
    }
}

/// Prompt answering with a fixed set of data, once.
///
/// For callers that collected the data up front and cannot ask again.
/// A rejection of that data is kept so the caller can report it instead of
/// the dismissal that follows.
#[derive(Default)]
pub struct PrefilledPrompt {
    data: std::sync::Mutex<Option<PreflightData>>,
    rejection: std::sync::Mutex<Option<AppError>>,
}

impl PrefilledPrompt {
    pub fn new(data: Option<PreflightData>) -> Self {
        Self {
            data: std::sync::Mutex::new(data),
            rejection: std::sync::Mutex::new(None),
        }
    }

    pub fn take_rejection(&self) -> Option<AppError> {
        self.rejection.lock().ok().and_then(|mut r| r.take())
    }
}

#[async_trait]
impl PreflightPrompt for PrefilledPrompt {
    async fn ask(
        &self,
        _quiz: &Quiz,
        _attempt: Option<&Attempt>,
        _prefetch: bool,
        last_error: Option<&AppError>,
    ) -> Option<PreflightData> {
        if let (Some(e), Ok(mut rejection)) = (last_error, self.rejection.lock()) {
            *rejection = Some(e.clone());
        }
        self.data.lock().ok().and_then(|mut d| d.take())
    }
}
