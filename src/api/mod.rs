pub mod public;
pub mod user;

use axum::{http::StatusCode, middleware::from_fn, response::Response, Json, Router};
use sea_orm::DatabaseConnection;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use validator::ValidationErrors;

use crate::middleware::logging::{logging_middleware, to_response, ApiError};
use public::public_api_router;
use user::user_api_router;

pub fn create_api_router(shared_db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .nest("/api", public_api_router(shared_db.clone()))
        .nest("/api", user_api_router(shared_db.clone()))
        .layer(from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
}

//Shared 400 shape: first failing field, detail kept for the log line only.
pub fn validation_response(errors: &ValidationErrors) -> Response {
    let field = errors
        .field_errors()
        .keys()
        .next()
        .map(|key| key.to_string())
        .unwrap_or_default();

    to_response(
        (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Validation failed",
                "field": field.clone()
            })),
        ),
        Err(ApiError::Validation {
            field,
            reason: errors.to_string(),
        }),
    )
}
