// src/access_rules/time_limit.rs

use async_trait::async_trait;

use super::AccessRuleHandler;
use crate::{
    error::AppResult,
    models::{attempt::Attempt, quiz::Quiz},
};

pub const RULE_NAME: &str = "quizaccess_timelimit";

/// Time limit. The user confirms before the clock starts on a new attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeLimitRule;

#[async_trait]
impl AccessRuleHandler for TimeLimitRule {
    fn name(&self) -> &'static str {
        RULE_NAME
    }

    async fn is_preflight_check_required(
        &self,
        _quiz: &Quiz,
        attempt: Option<&Attempt>,
        _prefetch: bool,
    ) -> AppResult<bool> {
        Ok(attempt.is_none())
    }

    fn should_show_time_left(&self, attempt: &Attempt, end_time: i64, now: i64) -> Option<bool> {
        // Teachers previewing past the limit get no countdown.
        Some(!(attempt.preview && now > end_time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_rules::tests::{attempt, quiz};
    use crate::models::attempt::AttemptState;

    #[tokio::test]
    async fn test_required_only_for_new_attempt() {
        let existing = attempt(AttemptState::InProgress);
        assert!(TimeLimitRule.is_preflight_check_required(&quiz(), None, false).await.unwrap());
        assert!(
            !TimeLimitRule
                .is_preflight_check_required(&quiz(), Some(&existing), false)
                .await
                .unwrap()
        );
    }

    #[test]
    fn test_time_left_hidden_for_expired_preview() {
        let mut a = attempt(AttemptState::InProgress);
        assert_eq!(TimeLimitRule.should_show_time_left(&a, 100, 200), Some(true));

        a.preview = true;
        assert_eq!(TimeLimitRule.should_show_time_left(&a, 100, 200), Some(false));
        assert_eq!(TimeLimitRule.should_show_time_left(&a, 300, 200), Some(true));
    }
}
