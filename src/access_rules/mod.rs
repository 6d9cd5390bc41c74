// src/access_rules/mod.rs

//! Access rules and the registry that aggregates them.
//!
//! Each rule the site can enforce on a quiz (password, time limit, …) has a
//! handler. Callers never talk to handlers directly: they hand the registry
//! the quiz's active rule names and get back the combined answer.
//!
//! Rules the registry does not know are treated as not requiring a preflight
//! check. Callers that must refuse unknown rules check
//! [`AccessRuleRegistry::ensure_rules_supported`] first.

pub mod offline_attempts;
pub mod open_close_date;
pub mod passive;
pub mod password;
pub mod time_limit;

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use futures::future::join_all;

use crate::{
    error::{AppError, AppResult},
    models::{access::PreflightData, attempt::Attempt, quiz::Quiz},
    storage::LocalStore,
};

pub use offline_attempts::OfflineAttemptsRule;
pub use open_close_date::OpenCloseDateRule;
pub use passive::ServerEnforcedRule;
pub use password::PasswordRule;
pub use time_limit::TimeLimitRule;

/// Behaviour of one access rule.
///
/// Only `name` and `is_preflight_check_required` are mandatory; the other
/// hooks default to "nothing to contribute".
#[async_trait]
pub trait AccessRuleHandler: Send + Sync {
    /// Rule identifier as sent by the site, e.g. `quizaccess_password`.
    fn name(&self) -> &'static str;

    async fn is_enabled(&self) -> bool {
        true
    }

    /// Whether the user must provide or confirm data before the attempt.
    async fn is_preflight_check_required(
        &self,
        quiz: &Quiz,
        attempt: Option<&Attempt>,
        prefetch: bool,
    ) -> AppResult<bool>;

    /// Preflight fields the rule can fill in without asking the user.
    /// `current` is the data gathered so far.
    async fn fixed_preflight_data(
        &self,
        _quiz: &Quiz,
        _current: &PreflightData,
        _attempt: Option<&Attempt>,
        _prefetch: bool,
    ) -> AppResult<PreflightData> {
        Ok(PreflightData::new())
    }

    async fn notify_preflight_check_passed(
        &self,
        _quiz: &Quiz,
        _attempt: Option<&Attempt>,
        _preflight: &PreflightData,
        _prefetch: bool,
    ) -> AppResult<()> {
        Ok(())
    }

    async fn notify_preflight_check_failed(
        &self,
        _quiz: &Quiz,
        _attempt: Option<&Attempt>,
        _preflight: &PreflightData,
        _prefetch: bool,
    ) -> AppResult<()> {
        Ok(())
    }

    /// `None` when the rule has no opinion on the countdown.
    fn should_show_time_left(&self, _attempt: &Attempt, _end_time: i64, _now: i64) -> Option<bool> {
        None
    }
}

/// Registry of access rule handlers, keyed by rule name.
#[derive(Clone, Default)]
pub struct AccessRuleRegistry {
    handlers: HashMap<String, Arc<dyn AccessRuleHandler>>,
}

impl AccessRuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a handler for every rule the client understands.
    pub fn with_default_rules(store: LocalStore, sync_interval: i64) -> Self {
        let mut registry = Self::new();
        registry.register(PasswordRule::new(store.clone()));
        registry.register(TimeLimitRule);
        registry.register(OfflineAttemptsRule::new(store, sync_interval));
        registry.register(OpenCloseDateRule);
        for rule in ServerEnforcedRule::all() {
            registry.register(rule);
        }
        registry
    }

    /// Registers `handler`, replacing any handler with the same name.
    pub fn register<H: AccessRuleHandler + 'static>(&mut self, handler: H) {
        self.handlers
            .insert(handler.name().to_string(), Arc::new(handler));
    }

    pub fn is_rule_supported(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Names in `rule_names` without a registered handler, in order.
    pub fn unsupported_rules(&self, rule_names: &[String]) -> Vec<String> {
        rule_names
            .iter()
            .filter(|name| !self.is_rule_supported(name))
            .cloned()
            .collect()
    }

    pub fn ensure_rules_supported(&self, rule_names: &[String]) -> AppResult<()> {
        let unsupported = self.unsupported_rules(rule_names);
        if unsupported.is_empty() {
            Ok(())
        } else {
            Err(AppError::UnsupportedRules(unsupported))
        }
    }

    /// Registered and enabled handlers for the active rule names.
    async fn active_handlers(&self, rule_names: &[String]) -> Vec<Arc<dyn AccessRuleHandler>> {
        let mut handlers = Vec::new();
        for name in rule_names {
            match self.handlers.get(name) {
                Some(handler) if handler.is_enabled().await => handlers.push(Arc::clone(handler)),
                Some(_) => tracing::debug!("Access rule {} is disabled", name),
                None => tracing::debug!("Access rule {} is not supported", name),
            }
        }
        handlers
    }

    /// True if any active rule requires a preflight check.
    pub async fn is_preflight_check_required(
        &self,
        rule_names: &[String],
        quiz: &Quiz,
        attempt: Option<&Attempt>,
        prefetch: bool,
    ) -> bool {
        let handlers = self.active_handlers(rule_names).await;

        let results = join_all(
            handlers
                .iter()
                .map(|h| h.is_preflight_check_required(quiz, attempt, prefetch)),
        )
        .await;

        handlers.iter().zip(results).any(|(handler, result)| match result {
            Ok(required) => required,
            Err(e) => {
                tracing::debug!(
                    "Access rule {} failed to report preflight: {}",
                    handler.name(),
                    e
                );
                false
            }
        })
    }

    /// Adds the fixed data of every active rule to `preflight_data`.
    /// A rule that fails contributes nothing; the others still do.
    pub async fn get_fixed_preflight_data(
        &self,
        rule_names: &[String],
        quiz: &Quiz,
        preflight_data: &mut PreflightData,
        attempt: Option<&Attempt>,
        prefetch: bool,
    ) {
        let handlers = self.active_handlers(rule_names).await;

        let contributions = {
            let current = &*preflight_data;
            join_all(
                handlers
                    .iter()
                    .map(|h| h.fixed_preflight_data(quiz, current, attempt, prefetch)),
            )
            .await
        };

        for (handler, contribution) in handlers.iter().zip(contributions) {
            match contribution {
                Ok(data) => preflight_data.merge(data),
                Err(e) => tracing::debug!(
                    "Access rule {} failed to provide fixed data: {}",
                    handler.name(),
                    e
                ),
            }
        }
    }

    pub async fn notify_preflight_check_passed(
        &self,
        rule_names: &[String],
        quiz: &Quiz,
        attempt: Option<&Attempt>,
        preflight_data: &PreflightData,
        prefetch: bool,
    ) {
        let handlers = self.active_handlers(rule_names).await;

        let results = join_all(
            handlers
                .iter()
                .map(|h| h.notify_preflight_check_passed(quiz, attempt, preflight_data, prefetch)),
        )
        .await;

        log_notify_failures(&handlers, results, "passed");
    }

    pub async fn notify_preflight_check_failed(
        &self,
        rule_names: &[String],
        quiz: &Quiz,
        attempt: Option<&Attempt>,
        preflight_data: &PreflightData,
        prefetch: bool,
    ) {
        let handlers = self.active_handlers(rule_names).await;

        let results = join_all(
            handlers
                .iter()
                .map(|h| h.notify_preflight_check_failed(quiz, attempt, preflight_data, prefetch)),
        )
        .await;

        log_notify_failures(&handlers, results, "failed");
    }

    /// True if any active rule wants the countdown shown.
    pub fn should_show_time_left(
        &self,
        rule_names: &[String],
        attempt: &Attempt,
        end_time: i64,
        now: i64,
    ) -> bool {
        rule_names
            .iter()
            .filter_map(|name| self.handlers.get(name))
            .any(|h| h.should_show_time_left(attempt, end_time, now) == Some(true))
    }
}

fn log_notify_failures(
    handlers: &[Arc<dyn AccessRuleHandler>],
    results: Vec<AppResult<()>>,
    outcome: &str,
) {
    for (handler, result) in handlers.iter().zip(results) {
        if let Err(e) = result {
            tracing::debug!(
                "Access rule {} failed to handle preflight {}: {}",
                handler.name(),
                outcome,
                e
            );
        }
    }
}
