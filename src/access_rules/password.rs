// src/access_rules/password.rs

use async_trait::async_trait;

use super::AccessRuleHandler;
use crate::{
    error::AppResult,
    models::{access::PreflightData, attempt::Attempt, quiz::Quiz},
    storage::LocalStore,
    utils::time::now_secs,
};

pub const RULE_NAME: &str = "quizaccess_password";
pub const PASSWORD_FIELD: &str = "quizpassword";

/// Quiz password. Once the site accepts a password it is kept on the device
/// and sent again without asking.
#[derive(Clone)]
pub struct PasswordRule {
    store: LocalStore,
}

impl PasswordRule {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AccessRuleHandler for PasswordRule {
    fn name(&self) -> &'static str {
        RULE_NAME
    }

    async fn is_preflight_check_required(
        &self,
        quiz: &Quiz,
        _attempt: Option<&Attempt>,
        _prefetch: bool,
    ) -> AppResult<bool> {
        // A store we cannot read is the same as no stored password.
        Ok(!matches!(self.store.get_password(quiz.id).await, Ok(Some(_))))
    }

    async fn fixed_preflight_data(
        &self,
        quiz: &Quiz,
        current: &PreflightData,
        _attempt: Option<&Attempt>,
        _prefetch: bool,
    ) -> AppResult<PreflightData> {
        let mut data = PreflightData::new();
        if current.contains(PASSWORD_FIELD) {
            return Ok(data);
        }

        if let Some(password) = self.store.get_password(quiz.id).await? {
            data.insert(PASSWORD_FIELD, password);
        }
        Ok(data)
    }

    async fn notify_preflight_check_passed(
        &self,
        quiz: &Quiz,
        _attempt: Option<&Attempt>,
        preflight: &PreflightData,
        _prefetch: bool,
    ) -> AppResult<()> {
        match preflight.get(PASSWORD_FIELD) {
            Some(password) => self.store.store_password(quiz.id, password, now_secs()).await,
            None => Ok(()),
        }
    }

    async fn notify_preflight_check_failed(
        &self,
        quiz: &Quiz,
        _attempt: Option<&Attempt>,
        _preflight: &PreflightData,
        _prefetch: bool,
    ) -> AppResult<()> {
        self.store.remove_password(quiz.id).await
    }
}
