// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Crate-wide error enum.
/// Every fallible operation of the engine reports one of these kinds; the
/// kind is fixed at creation and never rewritten on the way up.
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    // The remote site rejected the request (web-service exception or warning).
    // Preflight validation failures surface as this kind.
    Validation(String),

    // Active access rules with no registered handler.
    UnsupportedRules(Vec<String>),

    // The user dismissed a preflight prompt.
    Cancelled,

    // Network or service failure talking to the remote site.
    Transport(String),

    // Group membership could not be resolved.
    GroupLookup(String),

    // Local record store failure.
    Storage(String),

    NotFound(String),

    InternalServerError(String),
}

impl AppError {
    /// Whether this error came back from the remote web service itself,
    /// as opposed to the network or the local device.
    pub fn is_web_service_error(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "{}", msg),
            AppError::UnsupportedRules(rules) => {
                write!(f, "Unsupported access rules: {}", rules.join(", "))
            }
            AppError::Cancelled => write!(f, "Cancelled by the user"),
            AppError::Transport(msg) => write!(f, "Transport error: {}", msg),
            AppError::GroupLookup(msg) => write!(f, "Group lookup failed: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::NotFound(msg) => write!(f, "{}", msg),
            AppError::InternalServerError(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AppError {}

/// Converts the error into a JSON response with an appropriate status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) | AppError::UnsupportedRules(_) => StatusCode::BAD_REQUEST,
            AppError::Cancelled => StatusCode::CONFLICT,
            AppError::Transport(_) | AppError::GroupLookup(_) => StatusCode::BAD_GATEWAY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Storage(msg) | AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = match &self {
            AppError::UnsupportedRules(rules) => Json(json!({
                "error": self.to_string(),
                "rules": rules,
            })),
            _ => Json(json!({
                "error": self.to_string(),
            })),
        };

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::Storage`.
/// Allows using `?` operator on local store queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Transport(err.to_string())
    }
}

/// A payload the client cannot decode is a failure of the exchange, not a
/// rejection by the site.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Transport(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
