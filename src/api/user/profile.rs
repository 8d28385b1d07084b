use axum::{
    extract::Extension,
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use sea_orm::{DatabaseConnection, EntityTrait, ModelTrait, TransactionTrait};
use serde_json::json;
use std::sync::Arc;

use crate::entities::{session::Entity as SessionEntity, user::Entity as UserEntity};
use crate::middleware::auth::CurrentUser;
use crate::middleware::logging::{to_response, ApiError};

//ROUTERS
pub fn profile_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/profile", get(get_profile))
        .route("/logout", post(logout))
        .layer(Extension(db))
}

//ROUTES
async fn get_profile(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current): Extension<CurrentUser>,
) -> Response {
    let txn = match db.begin().await {
        Ok(txn) => txn,
        Err(_) => {
            return to_response(
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Internal server error"
                    })),
                ),
                Err(ApiError::TransactionCreationFailed),
            );
        }
    };

    match UserEntity::find_by_id(current.user_id).one(&txn).await {
        Ok(Some(model)) => to_response(
            (
                StatusCode::OK,
                Json(json!({
                    "name": model.name,
                    "email": model.email,
                    "email_verified": model.email_verified
                })),
            ),
            Ok(()),
        ),
        Ok(None) => to_response(
            (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "error": "Not found"
                })),
            ),
            Err(ApiError::NotFound(format!("user {}", current.user_id))),
        ),
        Err(err) => to_response(
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Internal server error"
                })),
            ),
            Err(ApiError::DbError(err.to_string())),
        ),
    }
}

async fn logout(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current): Extension<CurrentUser>,
) -> Response {
    let txn = match db.begin().await {
        Ok(txn) => txn,
        Err(_) => {
            return to_response(
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Internal server error"
                    })),
                ),
                Err(ApiError::TransactionCreationFailed),
            );
        }
    };

    let session = match SessionEntity::find_by_id(current.session_id).one(&txn).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            //Already gone; logging out twice is not an error worth surfacing.
            return to_response(
                (
                    StatusCode::OK,
                    Json(json!({
                        "message": "Logged out"
                    })),
                ),
                Ok(()),
            );
        }
        Err(err) => {
            return to_response(
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Internal server error"
                    })),
                ),
                Err(ApiError::DbError(err.to_string())),
            );
        }
    };

    match session.delete(&txn).await {
        Ok(_) => match txn.commit().await {
            Ok(_) => to_response(
                (
                    StatusCode::OK,
                    Json(json!({
                        "message": "Logged out"
                    })),
                ),
                Ok(()),
            ),
            Err(err) => to_response(
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Internal server error"
                    })),
                ),
                Err(ApiError::DbError(err.to_string())),
            ),
        },
        Err(err) => {
            let _ = txn.rollback().await;
            to_response(
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Internal server error"
                    })),
                ),
                Err(ApiError::DbError(err.to_string())),
            )
        }
    }
}
