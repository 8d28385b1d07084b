use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::entities::{session, session::Entity as SessionEntity};

pub const TOKEN_LENGTH: usize = 32;

/// Guards a router subtree. Expects `Authorization: Bearer <token>` where the
/// token matches a live row in the `session` table.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let db = state.db;

    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => match header.strip_prefix("Bearer ") {
            Some(token) => token,
            _ => return Err(StatusCode::UNAUTHORIZED),
        },
        _ => return Err(StatusCode::UNAUTHORIZED),
    };

    let current = match validate_session(db.clone(), token).await {
        Ok(current) => current,
        Err(err) => {
            tracing::debug!(error = %err, "Rejected session token");
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    req.extensions_mut().insert(current);
    Ok(next.run(req).await)
}

#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub session_id: Uuid,
}

#[derive(Clone, Debug)]
pub struct AuthState {
    pub db: Arc<DatabaseConnection>,
}

//Used both for session tokens and for email verification values.
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

pub async fn validate_session(
    db: Arc<DatabaseConnection>,
    token: &str,
) -> Result<CurrentUser, SessionError> {
    let session = match SessionEntity::find()
        .filter(session::Column::Token.eq(token))
        .one(&*db)
        .await
    {
        Ok(Some(session)) => session,
        Ok(None) => return Err(SessionError::UnknownToken),
        Err(_) => return Err(SessionError::InternalServerError),
    };

    if session.expires_at <= Utc::now() {
        return Err(SessionError::Expired);
    }

    Ok(CurrentUser {
        user_id: session.user_id,
        session_id: session.id,
    })
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No session matches this token")]
    UnknownToken,
    #[error("Session expired")]
    Expired,
    #[error("Internal server error")]
    InternalServerError,
}
