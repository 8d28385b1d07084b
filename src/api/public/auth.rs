use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use axum::{
    extract::Extension,
    http::{header, HeaderMap, StatusCode},
    response::Response,
    routing::post,
    Json, Router,
};
use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, SqlErr,
    TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::api::validation_response;
use crate::entities::{
    account, session, user, user::Entity as UserEntity, verification,
    verification::Entity as VerificationEntity,
};
use crate::middleware::auth::generate_token;
use crate::middleware::logging::{to_response, ApiError};

pub const CREDENTIAL_PROVIDER: &str = "credential";

//ROUTERS
pub fn auth_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/register", post(register_user))
        .route("/login", post(login))
        .route("/verify", post(verify_email))
        .layer(Extension(db))
}

//ROUTES
async fn register_user(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<RegisterUser>,
) -> Response {
    if let Err(errors) = payload.validate() {
        return validation_response(&errors);
    }

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

    let password_hash = match hash_password(&payload.password) {
        Ok(password_hash) => password_hash,
        Err(err) => {
            return to_response(
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Internal server error"
                    })),
                ),
                Err(ApiError::PasswordHashFailed(err.to_string())),
            );
        }
    };

    let now = Utc::now();
    let user_id = Uuid::new_v4();
    let new_user = user::ActiveModel {
        id: Set(user_id),
        name: Set(payload.name),
        email: Set(payload.email.clone()),
        email_verified: Set(false),
        image: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    match UserEntity::insert(new_user).exec(&txn).await {
        Ok(_) => {}
        Err(err) => {
            let _ = txn.rollback().await;
            if let Some(SqlErr::UniqueConstraintViolation(_)) = err.sql_err() {
                return to_response(
                    (
                        StatusCode::CONFLICT,
                        Json(json!({
                            "error": "Email already registered"
                        })),
                    ),
                    Err(ApiError::Conflict(err.to_string())),
                );
            }
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
    }

    let new_account = account::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        provider_id: Set(CREDENTIAL_PROVIDER.to_owned()),
        account_id: Set(payload.email.clone()),
        password: Set(Some(password_hash)),
        access_token: Set(None),
        refresh_token: Set(None),
        scope: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    //Mail delivery is out of scope, so the token travels in the response.
    let verification_token = generate_token();
    let new_verification = verification::ActiveModel {
        id: Set(Uuid::new_v4()),
        identifier: Set(payload.email),
        value: Set(verification_token.clone()),
        expires_at: Set(now + Duration::hours(24)),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let inserts = async {
        account::Entity::insert(new_account).exec(&txn).await?;
        VerificationEntity::insert(new_verification).exec(&txn).await?;
        Ok::<(), sea_orm::DbErr>(())
    };

    match inserts.await {
        Ok(_) => match txn.commit().await {
            Ok(_) => to_response(
                (
                    StatusCode::CREATED,
                    Json(json!({
                        "message": "User registered successfully",
                        "verification_token": verification_token
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

async fn login(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    headers: HeaderMap,
    Json(payload): Json<UserLogin>,
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

    //Unknown email and wrong password answer identically.
    let rejected = || {
        to_response(
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "Invalid email or password"
                })),
            ),
            Err(ApiError::Unauthorized),
        )
    };

    let user = match UserEntity::find()
        .filter(user::Column::Email.eq(&*payload.email))
        .one(&txn)
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => return rejected(),
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

    let credential = match account::Entity::find()
        .filter(account::Column::UserId.eq(user.id))
        .filter(account::Column::ProviderId.eq(CREDENTIAL_PROVIDER))
        .one(&txn)
        .await
    {
        Ok(Some(credential)) => credential,
        Ok(None) => return rejected(),
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

    if credential.check_hash(&payload.password).is_err() {
        return rejected();
    }

    let now = Utc::now();
    let token = generate_token();
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned());

    let new_session = session::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.id),
        token: Set(token.clone()),
        expires_at: Set(now + Duration::days(7)),
        ip_address: Set(None),
        user_agent: Set(user_agent),
        created_at: Set(now),
        updated_at: Set(now),
    };

    match session::Entity::insert(new_session).exec(&txn).await {
        Ok(_) => match txn.commit().await {
            Ok(_) => to_response(
                (
                    StatusCode::OK,
                    Json(json!({
                        "token": token
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

async fn verify_email(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<VerifyEmail>,
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

    let row = match VerificationEntity::find()
        .filter(verification::Column::Value.eq(&*payload.token))
        .one(&txn)
        .await
    {
        Ok(Some(row)) => row,
        Ok(None) => {
            return to_response(
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({
                        "error": "Unknown verification token"
                    })),
                ),
                Err(ApiError::NotFound("verification token".to_owned())),
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

    if row.expires_at <= Utc::now() {
        let _ = VerificationEntity::delete_by_id(row.id).exec(&txn).await;
        let _ = txn.commit().await;
        return to_response(
            (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "error": "Unknown verification token"
                })),
            ),
            Err(ApiError::NotFound("verification token".to_owned())),
        );
    }

    let user = match UserEntity::find()
        .filter(user::Column::Email.eq(&*row.identifier))
        .one(&txn)
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            return to_response(
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({
                        "error": "Unknown verification token"
                    })),
                ),
                Err(ApiError::NotFound("verification subject".to_owned())),
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

    let mut user: user::ActiveModel = user.into();
    user.email_verified = Set(true);
    user.updated_at = Set(Utc::now());

    let result = async {
        user.update(&txn).await?;
        VerificationEntity::delete_by_id(row.id).exec(&txn).await?;
        Ok::<(), sea_orm::DbErr>(())
    };

    match result.await {
        Ok(_) => match txn.commit().await {
            Ok(_) => to_response(
                (
                    StatusCode::OK,
                    Json(json!({
                        "message": "Email verified"
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

fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    Ok(argon2
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

//Structs
#[derive(Deserialize, Debug, Validate)]
struct RegisterUser {
    #[validate(length(min = 1, max = 120))]
    name: String,
    #[validate(email)]
    email: String,
    #[validate(length(min = 8, max = 128))]
    password: String,
}

#[derive(Deserialize, Debug)]
struct UserLogin {
    email: String,
    password: String,
}

#[derive(Deserialize, Debug)]
struct VerifyEmail {
    token: String,
}
