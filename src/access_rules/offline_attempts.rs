// src/access_rules/offline_attempts.rs

use async_trait::async_trait;

use super::AccessRuleHandler;
use crate::{
    error::AppResult,
    models::{access::PreflightData, attempt::Attempt, quiz::Quiz},
    storage::LocalStore,
    utils::time::now_secs,
};

pub const RULE_NAME: &str = "quizaccess_offlineattempts";
pub const CONFIRM_FIELD: &str = "confirmdatasaved";

/// Offline attempts. Before answering, the user confirms that data saved on
/// the device is up to date with the site.
#[derive(Clone)]
pub struct OfflineAttemptsRule {
    store: LocalStore,
    sync_interval: i64,
}

impl OfflineAttemptsRule {
    pub fn new(store: LocalStore, sync_interval: i64) -> Self {
        Self { store, sync_interval }
    }
}

#[async_trait]
impl AccessRuleHandler for OfflineAttemptsRule {
    fn name(&self) -> &'static str {
        RULE_NAME
    }

    async fn is_preflight_check_required(
        &self,
        quiz: &Quiz,
        attempt: Option<&Attempt>,
        prefetch: bool,
    ) -> AppResult<bool> {
        if prefetch {
            return Ok(false);
        }
        if attempt.is_none() {
            return Ok(true);
        }

        let last_sync = self.store.get_sync_time(quiz.id).await?;
        Ok(now_secs() - last_sync > self.sync_interval)
    }

    async fn fixed_preflight_data(
        &self,
        _quiz: &Quiz,
        _current: &PreflightData,
        _attempt: Option<&Attempt>,
        _prefetch: bool,
    ) -> AppResult<PreflightData> {
        Ok([(CONFIRM_FIELD, "1")].into_iter().collect())
    }
}
