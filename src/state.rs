// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    access_rules::AccessRuleRegistry,
    config::Config,
    events::QuizEvents,
    services::{offline_sync::OfflineSync, preflight::PreflightFlow},
    site::{
        SiteClient,
        groups::{GroupProvider, SiteGroups},
        quiz_api::QuizApi,
    },
    storage::LocalStore,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: LocalStore,
    pub api: QuizApi,
    pub registry: Arc<AccessRuleRegistry>,
    pub groups: Arc<dyn GroupProvider>,
    pub preflight: Arc<PreflightFlow>,
    pub sync: Arc<OfflineSync>,
    pub events: QuizEvents,
}

impl AppState {
    /// Wires every service to one site connection and one local store.
    pub fn new(config: Config, client: Arc<dyn SiteClient>, store: LocalStore) -> Self {
        let api = QuizApi::new(Arc::clone(&client));
        let registry = Arc::new(AccessRuleRegistry::with_default_rules(
            store.clone(),
            config.sync_interval,
        ));
        let groups: Arc<dyn GroupProvider> = Arc::new(SiteGroups::new(client));
        let events = QuizEvents::default();

        let preflight = Arc::new(PreflightFlow::new(
            Arc::clone(&registry),
            api.clone(),
            store.clone(),
        ));
        let sync = Arc::new(OfflineSync::new(
            store.clone(),
            api.clone(),
            Arc::clone(&registry),
            events.clone(),
            config.sync_interval,
        ));

        Self {
            config,
            store,
            api,
            registry,
            groups,
            preflight,
            sync,
            events,
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for LocalStore {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for QuizApi {
    fn from_ref(state: &AppState) -> Self {
        state.api.clone()
    }
}

impl FromRef<AppState> for Arc<OfflineSync> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.sync)
    }
}
