// src/access_rules/passive.rs

use async_trait::async_trait;

use super::AccessRuleHandler;
use crate::{
    error::AppResult,
    models::{attempt::Attempt, quiz::Quiz},
};

/// Rules the site enforces on its own. The client needs no input for them;
/// registering them only marks them as understood.
const SERVER_ENFORCED_RULES: [&str; 5] = [
    "quizaccess_delaybetweenattempts",
    "quizaccess_ipaddress",
    "quizaccess_numattempts",
    "quizaccess_safebrowser",
    "quizaccess_securewindow",
];

#[derive(Debug, Clone, Copy)]
pub struct ServerEnforcedRule {
    name: &'static str,
}

impl ServerEnforcedRule {
    pub fn all() -> impl Iterator<Item = ServerEnforcedRule> {
        SERVER_ENFORCED_RULES
            .into_iter()
            .map(|name| ServerEnforcedRule { name })
    }
}

#[async_trait]
impl AccessRuleHandler for ServerEnforcedRule {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn is_preflight_check_required(
        &self,
        _quiz: &Quiz,
        _attempt: Option<&Attempt>,
        _prefetch: bool,
    ) -> AppResult<bool> {
        Ok(false)
    }
}
