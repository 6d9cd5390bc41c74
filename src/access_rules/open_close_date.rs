// src/access_rules/open_close_date.rs

use async_trait::async_trait;

use super::AccessRuleHandler;
use crate::{
    error::AppResult,
    models::{attempt::Attempt, quiz::Quiz},
};

pub const RULE_NAME: &str = "quizaccess_openclosedate";

/// The countdown to the close date appears in the last day only.
pub const SHOW_TIME_BEFORE_DEADLINE: i64 = 24 * 3600;

/// Open and close dates. Enforced by the site; the client only decides
/// when to show the countdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenCloseDateRule;

#[async_trait]
impl AccessRuleHandler for OpenCloseDateRule {
    fn name(&self) -> &'static str {
        RULE_NAME
    }

    async fn is_preflight_check_required(
        &self,
        _quiz: &Quiz,
        _attempt: Option<&Attempt>,
        _prefetch: bool,
    ) -> AppResult<bool> {
        Ok(false)
    }

    fn should_show_time_left(&self, attempt: &Attempt, end_time: i64, now: i64) -> Option<bool> {
        if attempt.preview && now > end_time {
            return Some(false);
        }
        Some(now > end_time - SHOW_TIME_BEFORE_DEADLINE)
    }
}
