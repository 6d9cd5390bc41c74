// src/services/offline_sync.rs

//! Offline attempts: keeping answers on the device and sending them to the
//! site once it is reachable again.
//!
//! Only one sync per quiz runs at a time. A sync requested while another
//! one for the same quiz is in flight waits for it and gets its result.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use serde::Serialize;

use crate::{
    access_rules::AccessRuleRegistry,
    error::{AppError, AppResult},
    events::{AttemptFinished, QuizEvents},
    models::{
        access::PreflightData,
        attempt::{Attempt, AttemptState},
        quiz::Quiz,
    },
    site::quiz_api::{AttemptStatus, QuizApi},
    storage::{LocalStore, OfflineAttempt},
    utils::time::now_secs,
};

pub const DATA_DISCARDED_WARNING: &str =
    "Some offline data was discarded because it could not be synced.";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    /// An attempt was finished on the site by this sync.
    pub attempt_finished: bool,
    pub warnings: Vec<String>,
}

type SyncFuture = Shared<BoxFuture<'static, AppResult<SyncResult>>>;

pub struct OfflineSync {
    store: LocalStore,
    api: QuizApi,
    registry: Arc<AccessRuleRegistry>,
    events: QuizEvents,
    sync_interval: i64,
    in_flight: Mutex<HashMap<i64, SyncFuture>>,
}

impl OfflineSync {
    pub fn new(
        store: LocalStore,
        api: QuizApi,
        registry: Arc<AccessRuleRegistry>,
        events: QuizEvents,
        sync_interval: i64,
    ) -> Self {
        Self {
            store,
            api,
            registry,
            events,
            sync_interval,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    fn user_id(&self) -> i64 {
        self.api.user_id()
    }

    /// Whether any stored attempt of the quiz still has to reach the site.
    pub async fn has_data_to_sync(&self, quiz_id: i64) -> AppResult<bool> {
        let attempts = self
            .store
            .offline_attempts_for_quiz(quiz_id, self.user_id())
            .await?;
        Ok(attempts.iter().any(OfflineAttempt::has_pending_data))
    }

    /// Whether the last sync of the quiz is older than the sync interval.
    pub async fn is_sync_needed(&self, quiz_id: i64) -> AppResult<bool> {
        let last = self.store.get_sync_time(quiz_id).await?;
        Ok(now_secs() - last >= self.sync_interval)
    }

    pub fn is_syncing(&self, quiz_id: i64) -> bool {
        self.in_flight
            .lock()
            .map(|in_flight| in_flight.contains_key(&quiz_id))
            .unwrap_or(false)
    }

    pub async fn get_attempt_offline(&self, attempt_id: i64) -> AppResult<Option<OfflineAttempt>> {
        self.store.get_offline_attempt(attempt_id).await
    }

    /// Stores answers for `attempt` on the device, optionally finishing it.
    pub async fn process_attempt_offline(
        &self,
        quiz: &Quiz,
        attempt: &Attempt,
        answers: BTreeMap<String, String>,
        finish: bool,
    ) -> AppResult<OfflineAttempt> {
        let now = now_secs();
        let mut stored = match self.store.get_offline_attempt(attempt.id).await? {
            Some(stored) => stored,
            None => {
                let mut fresh = OfflineAttempt::new(
                    attempt.id,
                    quiz.id,
                    quiz.course,
                    self.user_id(),
                    attempt.attempt,
                    now,
                );
                fresh.currentpage = attempt.currentpage;
                fresh
            }
        };

        stored.answers.0.extend(answers);
        stored.timemodified = now;
        if finish {
            stored.finishedoffline = true;
            stored.timefinish = now;
        }

        self.store.save_offline_attempt(&stored).await?;
        Ok(stored)
    }

    pub async fn save_offline_answers(
        &self,
        quiz: &Quiz,
        attempt: &Attempt,
        answers: BTreeMap<String, String>,
    ) -> AppResult<OfflineAttempt> {
        self.process_attempt_offline(quiz, attempt, answers, false).await
    }

    /// Marks the attempt finished on the device; the site hears of it on
    /// the next sync.
    pub async fn finish_attempt_offline(
        &self,
        quiz: &Quiz,
        attempt: &Attempt,
        answers: BTreeMap<String, String>,
    ) -> AppResult<OfflineAttempt> {
        self.process_attempt_offline(quiz, attempt, answers, true).await
    }

    /// Remembers the page the user is on in an offline attempt.
    pub async fn set_current_page(&self, attempt_id: i64, page: i64) -> AppResult<()> {
        let mut stored = self
            .store
            .get_offline_attempt(attempt_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Offline attempt {} not found", attempt_id)))?;

        stored.currentpage = page;
        self.store.save_offline_attempt(&stored).await
    }

    /// Syncs the quiz, joining a sync already running for it.
    pub async fn sync_quiz(self: &Arc<Self>, quiz: Quiz) -> AppResult<SyncResult> {
        let quiz_id = quiz.id;

        let sync = {
            let mut in_flight = self
                .in_flight
                .lock()
                .map_err(|e| AppError::InternalServerError(e.to_string()))?;

            match in_flight.get(&quiz_id) {
                Some(running) => {
                    tracing::debug!("Quiz {} is already syncing, waiting for it", quiz_id);
                    running.clone()
                }
                None => {
                    let this = Arc::clone(self);
                    let sync = async move {
                        let result = this.perform_sync(&quiz).await;
                        if let Ok(mut in_flight) = this.in_flight.lock() {
                            in_flight.remove(&quiz.id);
                        }
                        result
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(quiz_id, sync.clone());
                    sync
                }
            }
        };

        sync.await
    }

    async fn perform_sync(&self, quiz: &Quiz) -> AppResult<SyncResult> {
        let user_id = self.user_id();
        let mut result = SyncResult::default();

        let mut offline = self.store.offline_attempts_for_quiz(quiz.id, user_id).await?;
        let Some(local) = offline.pop() else {
            self.store.set_sync_time(quiz.id, now_secs()).await?;
            return Ok(result);
        };

        tracing::info!("Syncing offline attempt {} of quiz {}", local.id, quiz.id);

        // Only the latest attempt can still be answered.
        for older in offline {
            tracing::warn!("Discarding stale offline attempt {} of quiz {}", older.id, quiz.id);
            self.store.remove_offline_attempt(older.id).await?;
            push_discarded(&mut result);
        }

        let online = self
            .api
            .get_user_attempts(quiz.id, user_id, AttemptStatus::All, true)
            .await?;

        let server_attempt = match discard_reason(&local, &online) {
            Ok(attempt) => attempt,
            Err(reason) => {
                tracing::warn!(
                    "Discarding offline attempt {} of quiz {}: {}",
                    local.id,
                    quiz.id,
                    reason
                );
                self.store.remove_offline_attempt(local.id).await?;
                push_discarded(&mut result);
                self.store.set_sync_time(quiz.id, now_secs()).await?;
                return Ok(result);
            }
        };

        let access = self.api.get_quiz_access_information(quiz.id).await?;
        self.registry
            .ensure_rules_supported(&access.activerulenames)?;

        let mut preflight = PreflightData::new();
        self.registry
            .get_fixed_preflight_data(
                &access.activerulenames,
                quiz,
                &mut preflight,
                Some(server_attempt),
                false,
            )
            .await;

        let state = if local.has_pending_data() {
            self.api
                .process_attempt(local.id, &local.answers.0, &preflight, local.finishedoffline, false)
                .await?
        } else {
            tracing::debug!("Offline attempt {} has no answers to send", local.id);
            server_attempt.state
        };

        if !local.finishedoffline {
            // Leaves the site on the page the user reached while offline.
            if let Err(e) = self
                .api
                .view_attempt(local.id, local.currentpage, &preflight)
                .await
            {
                tracing::debug!("Could not record page of attempt {}: {}", local.id, e);
            }
        }

        self.store.remove_offline_attempt(local.id).await?;
        self.store.set_sync_time(quiz.id, now_secs()).await?;

        if local.finishedoffline || state.is_completed() {
            result.attempt_finished = true;
            self.events.publish(AttemptFinished {
                quiz_id: quiz.id,
                attempt_id: local.id,
                synced: true,
            });
        }

        tracing::info!("Offline attempt {} of quiz {} synced", local.id, quiz.id);
        Ok(result)
    }

    /// Syncs every quiz with data on the device. Quizzes synced within the
    /// interval are skipped unless `force`. Returns how many were synced.
    pub async fn sync_all_quizzes(self: &Arc<Self>, force: bool) -> AppResult<usize> {
        let quizzes = self.store.quizzes_with_offline_data(self.user_id()).await?;
        let mut synced = 0;

        for quiz_ref in quizzes {
            if !force {
                match self.is_sync_needed(quiz_ref.quizid).await {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => {
                        tracing::warn!("Failed to check sync time of quiz {}: {}", quiz_ref.quizid, e);
                        continue;
                    }
                }
            }

            let outcome = match self.api.get_quiz(quiz_ref.courseid, quiz_ref.quizid).await {
                Ok(quiz) => self.sync_quiz(quiz).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(_) => synced += 1,
                Err(e) => tracing::warn!("Failed to sync quiz {}: {}", quiz_ref.quizid, e),
            }
        }

        Ok(synced)
    }
}

fn push_discarded(result: &mut SyncResult) {
    if !result.warnings.iter().any(|w| w == DATA_DISCARDED_WARNING) {
        result.warnings.push(DATA_DISCARDED_WARNING.to_string());
    }
}

/// The server copy of `local` if it can still take the local answers,
/// otherwise why not.
fn discard_reason<'a>(local: &OfflineAttempt, online: &'a [Attempt]) -> Result<&'a Attempt, &'static str> {
    let server = online
        .iter()
        .find(|a| a.id == local.id)
        .ok_or("attempt no longer exists on the site")?;

    if !matches!(server.state, AttemptState::InProgress | AttemptState::Overdue) {
        return Err("attempt was already closed on the site");
    }
    if online.iter().any(|a| a.attempt > server.attempt) {
        return Err("a newer attempt was started on the site");
    }
    if server.timemodified > local.timemodified {
        return Err("attempt was modified on the site after the local copy");
    }

    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        access_rules::{OfflineAttemptsRule, tests::quiz},
        site::testing::{FakeSite, param},
    };
    use serde_json::{Value, json};
    use std::time::Duration;

    const ATTEMPT_ID: i64 = 30;

    fn attempt_json(id: i64, number: i64, state: &str, timemodified: i64) -> Value {
        json!({
            "id": id, "quiz": 4, "userid": 7, "attempt": number,
            "state": state, "timemodified": timemodified, "layout": "1,0"
        })
    }

    fn online_attempt(state: AttemptState) -> Attempt {
        serde_json::from_value(attempt_json(ATTEMPT_ID, 1, state.as_str(), 100)).unwrap()
    }

    /// Site returning `attempts` for the quiz and accepting answers.
    fn site_with(attempts: Vec<Value>, delay: Option<Duration>) -> Arc<FakeSite> {
        Arc::new(FakeSite::new(7, move |function, params| {
            if let Some(d) = delay {
                std::thread::sleep(d);
            }
            match function {
                "mod_quiz_get_user_attempts" => Ok(json!({"attempts": attempts.clone()})),
                "mod_quiz_get_quiz_access_information" => Ok(json!({
                    "activerulenames": ["quizaccess_offlineattempts"]
                })),
                "mod_quiz_process_attempt" => {
                    let state = if param(params, "finishattempt") == Some("1") {
                        "finished"
                    } else {
                        "inprogress"
                    };
                    Ok(json!({"state": state, "warnings": []}))
                }
                "mod_quiz_view_attempt" => Ok(json!({"status": true, "warnings": []})),
                "mod_quiz_get_quizzes_by_courses" => Ok(json!({"quizzes": [{"id": 4, "course": 2}]})),
                _ => Err(AppError::Transport(format!("unexpected {}", function))),
            }
        }))
    }

    async fn sync_service(site: Arc<FakeSite>) -> (Arc<OfflineSync>, LocalStore, QuizEvents) {
        let store = LocalStore::in_memory().await.unwrap();
        let mut registry = AccessRuleRegistry::new();
        registry.register(OfflineAttemptsRule::new(store.clone(), 300));
        let events = QuizEvents::default();
        let sync = OfflineSync::new(
            store.clone(),
            QuizApi::new(site),
            Arc::new(registry),
            events.clone(),
            300,
        );
        (Arc::new(sync), store, events)
    }

    fn answers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[tokio::test]
    async fn test_has_data_to_sync() {
        let (sync, _, _) = sync_service(site_with(vec![], None)).await;
        let a = online_attempt(AttemptState::InProgress);

        assert!(!sync.has_data_to_sync(4).await.unwrap());

        sync.process_attempt_offline(&quiz(), &a, BTreeMap::new(), false)
            .await
            .unwrap();
        assert!(!sync.has_data_to_sync(4).await.unwrap());

        sync.save_offline_answers(&quiz(), &a, answers(&[("q30:1_answer", "1")]))
            .await
            .unwrap();
        assert!(sync.has_data_to_sync(4).await.unwrap());
    }

    #[tokio::test]
    async fn test_pending_finish_counts_as_data() {
        let (sync, _, _) = sync_service(site_with(vec![], None)).await;
        let a = online_attempt(AttemptState::InProgress);

        let stored = sync
            .finish_attempt_offline(&quiz(), &a, BTreeMap::new())
            .await
            .unwrap();
        assert!(stored.finishedoffline);
        assert!(sync.has_data_to_sync(4).await.unwrap());
    }

    #[tokio::test]
    async fn test_sync_sends_answers_and_announces_finish() {
        let site = site_with(vec![attempt_json(ATTEMPT_ID, 1, "inprogress", 100)], None);
        let (sync, store, events) = sync_service(site.clone()).await;
        let mut rx = events.subscribe();

        sync.process_attempt_offline(
            &quiz(),
            &online_attempt(AttemptState::InProgress),
            answers(&[("q30:1_answer", "2")]),
            true,
        )
        .await
        .unwrap();

        let result = sync.sync_quiz(quiz()).await.unwrap();
        assert!(result.attempt_finished);
        assert!(result.warnings.is_empty());

        let sent = site.calls_to("mod_quiz_process_attempt");
        assert_eq!(sent.len(), 1);
        assert_eq!(param(&sent[0], "finishattempt"), Some("1"));
        assert_eq!(param(&sent[0], "data[0][value]"), Some("2"));
        assert_eq!(param(&sent[0], "preflightdata[0][name]"), Some("confirmdatasaved"));

        assert!(site.calls_to("mod_quiz_view_attempt").is_empty());
        assert!(store.get_offline_attempt(ATTEMPT_ID).await.unwrap().is_none());
        assert!(store.get_sync_time(4).await.unwrap() > 0);
        assert_eq!(
            rx.recv().await.unwrap(),
            AttemptFinished { quiz_id: 4, attempt_id: ATTEMPT_ID, synced: true }
        );
    }

    #[tokio::test]
    async fn test_sync_discards_attempt_closed_on_site() {
        let site = site_with(vec![attempt_json(ATTEMPT_ID, 1, "finished", 100)], None);
        let (sync, store, _) = sync_service(site.clone()).await;

        sync.process_attempt_offline(
            &quiz(),
            &online_attempt(AttemptState::InProgress),
            answers(&[("q30:1_answer", "2")]),
            false,
        )
        .await
        .unwrap();

        let result = sync.sync_quiz(quiz()).await.unwrap();
        assert!(!result.attempt_finished);
        assert_eq!(result.warnings, vec![DATA_DISCARDED_WARNING.to_string()]);
        assert!(site.calls_to("mod_quiz_process_attempt").is_empty());
        assert!(store.get_offline_attempt(ATTEMPT_ID).await.unwrap().is_none());
    }

    #[test]
    fn test_discard_reasons() {
        let local = OfflineAttempt::new(ATTEMPT_ID, 4, 2, 7, 1, 500);
        let attempt = |id, number, state: &str, modified| -> Attempt {
            serde_json::from_value(attempt_json(id, number, state, modified)).unwrap()
        };

        assert!(discard_reason(&local, &[]).is_err());
        assert!(discard_reason(&local, &[attempt(ATTEMPT_ID, 1, "abandoned", 100)]).is_err());
        assert!(
            discard_reason(
                &local,
                &[attempt(ATTEMPT_ID, 1, "inprogress", 100), attempt(31, 2, "inprogress", 100)]
            )
            .is_err()
        );
        assert!(discard_reason(&local, &[attempt(ATTEMPT_ID, 1, "inprogress", 600)]).is_err());

        let ok = [attempt(ATTEMPT_ID, 1, "overdue", 100)];
        assert_eq!(discard_reason(&local, &ok).unwrap().id, ATTEMPT_ID);
    }

    #[tokio::test]
    async fn test_sync_without_local_data_only_records_time() {
        let site = site_with(vec![], None);
        let (sync, store, _) = sync_service(site.clone()).await;

        let result = sync.sync_quiz(quiz()).await.unwrap();
        assert_eq!(result, SyncResult::default());
        assert!(site.calls().is_empty());
        assert!(store.get_sync_time(4).await.unwrap() > 0);
    }

    #[tokio::test]
    async fn test_concurrent_syncs_share_one_run() {
        let site = site_with(
            vec![attempt_json(ATTEMPT_ID, 1, "inprogress", 100)],
            Some(Duration::from_millis(20)),
        );
        let (sync, _, _) = sync_service(site.clone()).await;

        sync.process_attempt_offline(
            &quiz(),
            &online_attempt(AttemptState::InProgress),
            answers(&[("q30:1_answer", "2")]),
            false,
        )
        .await
        .unwrap();

        let (first, second) = tokio::join!(sync.sync_quiz(quiz()), sync.sync_quiz(quiz()));
        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(site.calls_to("mod_quiz_get_user_attempts").len(), 1);
        assert_eq!(site.calls_to("mod_quiz_process_attempt").len(), 1);
        assert!(!sync.is_syncing(4));
    }

    #[tokio::test]
    async fn test_sync_all_skips_recently_synced() {
        let site = site_with(vec![attempt_json(ATTEMPT_ID, 1, "inprogress", 100)], None);
        let (sync, store, _) = sync_service(site.clone()).await;

        sync.process_attempt_offline(
            &quiz(),
            &online_attempt(AttemptState::InProgress),
            answers(&[("q30:1_answer", "2")]),
            false,
        )
        .await
        .unwrap();
        store.set_sync_time(4, now_secs()).await.unwrap();

        assert_eq!(sync.sync_all_quizzes(false).await.unwrap(), 0);
        assert!(site.calls_to("mod_quiz_process_attempt").is_empty());

        assert_eq!(sync.sync_all_quizzes(true).await.unwrap(), 1);
        assert_eq!(site.calls_to("mod_quiz_process_attempt").len(), 1);
    }

    #[tokio::test]
    async fn test_current_page_is_kept() {
        let (sync, _, _) = sync_service(site_with(vec![], None)).await;

        assert!(matches!(
            sync.set_current_page(ATTEMPT_ID, 2).await,
            Err(AppError::NotFound(_))
        ));

        sync.process_attempt_offline(&quiz(), &online_attempt(AttemptState::InProgress), BTreeMap::new(), false)
            .await
            .unwrap();
        sync.set_current_page(ATTEMPT_ID, 2).await.unwrap();
        assert_eq!(
            sync.get_attempt_offline(ATTEMPT_ID).await.unwrap().unwrap().currentpage,
            2
        );
    }
    #[tokio::test]
    async fn test_sync_sends_offline_page() {
        let site = site_with(vec![attempt_json(ATTEMPT_ID, 1, "inprogress", 100)], None);
        let (sync, store, _) = sync_service(site.clone()).await;

        sync.save_offline_answers(
            &quiz(),
            &online_attempt(AttemptState::InProgress),
            answers(&[("q30:1_answer", "2")]),
        )
        .await
        .unwrap();
        sync.set_current_page(ATTEMPT_ID, 2).await.unwrap();

        let result = sync.sync_quiz(quiz()).await.unwrap();
        assert!(!result.attempt_finished);

        let processed = site.calls_to("mod_quiz_process_attempt");
        assert_eq!(processed.len(), 1);
        assert_eq!(param(&processed[0], "finishattempt"), Some("0"));

        let viewed = site.calls_to("mod_quiz_view_attempt");
        assert_eq!(viewed.len(), 1);
        assert_eq!(param(&viewed[0], "attemptid"), Some("30"));
        assert_eq!(param(&viewed[0], "page"), Some("2"));

        let order: Vec<String> = site.calls().into_iter().map(|(f, _)| f).collect();
        let process_at = order.iter().position(|f| f == "mod_quiz_process_attempt");
        let view_at = order.iter().position(|f| f == "mod_quiz_view_attempt");
        assert!(process_at < view_at);

        assert!(store.get_offline_attempt(ATTEMPT_ID).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sync_page_only_skips_process() {
        let site = site_with(vec![attempt_json(ATTEMPT_ID, 1, "inprogress", 100)], None);
        let (sync, store, _) = sync_service(site.clone()).await;

        sync.save_offline_answers(&quiz(), &online_attempt(AttemptState::InProgress), BTreeMap::new())
            .await
            .unwrap();
        sync.set_current_page(ATTEMPT_ID, 1).await.unwrap();

        let result = sync.sync_quiz(quiz()).await.unwrap();
        assert_eq!(result, SyncResult::default());
        assert!(site.calls_to("mod_quiz_process_attempt").is_empty());
        assert_eq!(param(&site.calls_to("mod_quiz_view_attempt")[0], "page"), Some("1"));
        assert!(store.get_offline_attempt(ATTEMPT_ID).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_page_view_failure_does_not_fail_sync() {
        let site = Arc::new(FakeSite::new(7, |function, _| match function {
            "mod_quiz_get_user_attempts" => Ok(json!({
                "attempts": [attempt_json(ATTEMPT_ID, 1, "inprogress", 100)]
            })),
            "mod_quiz_get_quiz_access_information" => Ok(json!({"activerulenames": []})),
            "mod_quiz_process_attempt" => Ok(json!({"state": "inprogress", "warnings": []})),
            _ => Err(AppError::Transport("connection reset".to_string())),
        }));
        let (sync, store, _) = sync_service(site.clone()).await;

        sync.save_offline_answers(
            &quiz(),
            &online_attempt(AttemptState::InProgress),
            answers(&[("q30:1_answer", "2")]),
        )
        .await
        .unwrap();

        assert!(sync.sync_quiz(quiz()).await.is_ok());
        assert_eq!(site.calls_to("mod_quiz_view_attempt").len(), 1);
        assert!(store.get_offline_attempt(ATTEMPT_ID).await.unwrap().is_none());
    }

    /// Site that refuses the offline answers.
    fn rejecting_site() -> Arc<FakeSite> {
        Arc::new(FakeSite::new(7, |function, _| {
            std::thread::sleep(Duration::from_millis(20));
            match function {
                "mod_quiz_get_user_attempts" => Ok(json!({
                    "attempts": [attempt_json(ATTEMPT_ID, 1, "inprogress", 100)]
                })),
                "mod_quiz_get_quiz_access_information" => Ok(json!({"activerulenames": []})),
                "mod_quiz_process_attempt" => Ok(json!({
                    "state": "inprogress",
                    "warnings": [{"message": "This attempt is being edited elsewhere"}]
                })),
                _ => Err(AppError::Transport(format!("unexpected {}", function))),
            }
        }))
    }

    #[tokio::test]
    async fn test_rejected_answers_stay_on_device() {
        let site = rejecting_site();
        let (sync, store, _) = sync_service(site.clone()).await;

        sync.save_offline_answers(
            &quiz(),
            &online_attempt(AttemptState::InProgress),
            answers(&[("q30:1_answer", "2")]),
        )
        .await
        .unwrap();

        let err = sync.sync_quiz(quiz()).await.unwrap_err();
        assert_eq!(
            err,
            AppError::Validation("This attempt is being edited elsewhere".to_string())
        );

        let kept = store.get_offline_attempt(ATTEMPT_ID).await.unwrap().unwrap();
        assert_eq!(kept.answers.0.get("q30:1_answer").map(String::as_str), Some("2"));
        assert_eq!(store.get_sync_time(4).await.unwrap(), 0);
        assert!(sync.has_data_to_sync(4).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_syncs_share_one_error() {
        let site = rejecting_site();
        let (sync, _, _) = sync_service(site.clone()).await;

        sync.save_offline_answers(
            &quiz(),
            &online_attempt(AttemptState::InProgress),
            answers(&[("q30:1_answer", "2")]),
        )
        .await
        .unwrap();

        let (first, second) = tokio::join!(sync.sync_quiz(quiz()), sync.sync_quiz(quiz()));
        let first = first.unwrap_err();
        assert!(matches!(first, AppError::Validation(_)));
        assert_eq!(first, second.unwrap_err());
        assert_eq!(site.calls_to("mod_quiz_process_attempt").len(), 1);
        assert!(!sync.is_syncing(4));
    }

    #[tokio::test]
    async fn test_sync_all_survives_unreadable_sync_time() {
        let site = site_with(vec![attempt_json(ATTEMPT_ID, 1, "inprogress", 100)], None);
        let (sync, store, _) = sync_service(site.clone()).await;

        sync.save_offline_answers(
            &quiz(),
            &online_attempt(AttemptState::InProgress),
            answers(&[("q30:1_answer", "2")]),
        )
        .await
        .unwrap();
        sqlx::query("DROP TABLE quiz_sync_times")
            .execute(store.pool())
            .await
            .unwrap();

        assert_eq!(sync.sync_all_quizzes(false).await.unwrap(), 0);
        assert!(site.calls_to("mod_quiz_process_attempt").is_empty());
        assert!(store.get_offline_attempt(ATTEMPT_ID).await.unwrap().is_some());
    }
}
