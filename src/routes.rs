// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{attempt, quiz, sync},
    state::AppState,
};

/// Assembles the main application router.
///
/// * Quiz access and review under `/api/quizzes/{quiz_id}`.
/// * Attempts (start, continue, offline answers) and sync below it.
/// * Global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let quiz_routes = Router::new()
        .route("/{quiz_id}/access", get(quiz::get_access))
        .route("/{quiz_id}/attempts", post(attempt::open_attempt))
        .route(
            "/{quiz_id}/attempts/{attempt_id}/offline",
            post(attempt::save_offline),
        )
        .route(
            "/{quiz_id}/attempts/{attempt_id}/review",
            get(quiz::get_review),
        )
        .route("/{quiz_id}/sync", post(sync::sync_quiz));

    Router::new()
        .nest("/api/quizzes", quiz_routes)
        // Applied from top to bottom
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
