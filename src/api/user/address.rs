use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::{delete, get},
    Json, Router,
};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::api::validation_response;
use crate::entities::{shipping_address, shipping_address::Entity as ShippingAddressEntity};
use crate::middleware::auth::CurrentUser;
use crate::middleware::logging::{to_response, ApiError};

static ZIP_CODE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9][0-9 -]{2,9}$").expect("Invalid zip code regex"));

//ROUTERS
pub fn address_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/address", get(get_addresses).post(create_address))
        .route("/address/:id", delete(delete_address))
        .layer(Extension(db))
}

//ROUTES
async fn get_addresses(
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

    match ShippingAddressEntity::find()
        .filter(shipping_address::Column::UserId.eq(current.user_id))
        .all(&txn)
        .await
    {
        Ok(addresses) => to_response((StatusCode::OK, Json(addresses)), Ok(())),
        Err(err) => to_response(
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Internal server error."
                })),
            ),
            Err(ApiError::DbError(err.to_string())),
        ),
    }
}

async fn create_address(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<CreateAddress>,
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

    let address_id = Uuid::new_v4();
    let new_address = shipping_address::ActiveModel {
        id: Set(address_id),
        user_id: Set(current.user_id),
        recipient_name: Set(payload.recipient_name),
        street: Set(payload.street),
        number: Set(payload.number),
        complement: Set(payload.complement),
        neighborhood: Set(payload.neighborhood),
        city: Set(payload.city),
        state: Set(payload.state),
        zip_code: Set(payload.zip_code),
        country: Set(payload.country),
        phone: Set(payload.phone),
        email: Set(payload.email),
        created_at: Set(Utc::now()),
    };

    match ShippingAddressEntity::insert(new_address).exec(&txn).await {
        Ok(_) => match txn.commit().await {
            Ok(_) => to_response(
                (
                    StatusCode::CREATED,
                    Json(json!({
                        "message": "Address created",
                        "id": address_id
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

async fn delete_address(
    Path(id): Path<Uuid>,
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

    let address = match ShippingAddressEntity::find_by_id(id)
        .filter(shipping_address::Column::UserId.eq(current.user_id))
        .one(&txn)
        .await
    {
        Ok(Some(address)) => address,
        Ok(None) => {
            return to_response(
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({
                        "error": format!("No shipping address with {} id was found.", id)
                    })),
                ),
                Err(ApiError::NotFound(format!("shipping address {}", id))),
            );
        }
        Err(err) => {
            return to_response(
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Internal server error."
                    })),
                ),
                Err(ApiError::DbError(err.to_string())),
            );
        }
    };

    //Carts pointing at this address fall back to NULL via the foreign key.
    let address: shipping_address::ActiveModel = address.into();
    match address.delete(&txn).await {
        Ok(_) => match txn.commit().await {
            Ok(_) => to_response(
                (
                    StatusCode::OK,
                    Json(json!({
                        "message": "Resource deleted successfully"
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

//Structs
#[derive(Deserialize, Debug, Validate)]
struct CreateAddress {
    #[validate(length(min = 1, max = 120))]
    recipient_name: String,
    #[validate(length(min = 1, max = 200))]
    street: String,
    #[validate(length(min = 1, max = 20))]
    number: String,
    complement: Option<String>,
    #[validate(length(min = 1, max = 120))]
    neighborhood: String,
    #[validate(length(min = 1, max = 120))]
    city: String,
    #[validate(length(min = 1, max = 120))]
    state: String,
    #[validate(regex(path = *ZIP_CODE_REGEX))]
    zip_code: String,
    #[validate(length(min = 2, max = 80))]
    country: String,
    #[validate(length(min = 5, max = 40))]
    phone: String,
    #[validate(email)]
    email: String,
}
