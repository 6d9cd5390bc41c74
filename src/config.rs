// src/config.rs

use std::env;
use dotenvy::dotenv;

/// Seconds between two automatic syncs of the same quiz.
pub const DEFAULT_SYNC_INTERVAL: i64 = 300;

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite URL of the on-device record store.
    pub database_url: String,
    /// Base URL of the remote site, e.g. `https://school.example.org`.
    pub site_url: String,
    pub site_token: String,
    /// The user the token belongs to; every review check is made as this viewer.
    pub site_user_id: i64,
    pub bind_addr: String,
    pub rust_log: String,
    pub sync_interval: i64,
    /// Offline attempts switched off for the whole site/device.
    pub offline_disabled: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://quiz_engine.db?mode=rwc".to_string());

        let site_url = env::var("SITE_URL")
            .expect("SITE_URL must be set");

        let site_token = env::var("SITE_TOKEN")
            .expect("SITE_TOKEN must be set");

        let site_user_id = env::var("SITE_USER_ID")
            .expect("SITE_USER_ID must be set")
            .parse::<i64>()
            .expect("SITE_USER_ID must be a number");

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string());

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let sync_interval = env::var("QUIZ_SYNC_INTERVAL")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_SYNC_INTERVAL);

        let offline_disabled = env::var("OFFLINE_DISABLED")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            database_url,
            site_url,
            site_token,
            site_user_id,
            bind_addr,
            rust_log,
            sync_interval,
            offline_disabled,
        }
    }
}
