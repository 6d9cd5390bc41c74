// src/site/mod.rs

//! Access to the remote site's web services.

pub mod groups;
pub mod quiz_api;
pub mod rest;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AppResult;

/// Flat form parameters of a web-service call.
pub type Params = Vec<(String, String)>;

/// A connection to one site, authenticated as one user.
#[async_trait]
pub trait SiteClient: Send + Sync {
    /// The user the connection is authenticated as.
    fn user_id(&self) -> i64;

    /// Calls the web-service function `function` with `params`.
    ///
    /// Exceptions raised by the site come back as `AppError::Validation`;
    /// failures to reach it as `AppError::Transport`.
    async fn call(&self, function: &str, params: Params) -> AppResult<Value>;
}
