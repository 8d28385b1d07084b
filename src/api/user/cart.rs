use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::{get, patch, put},
    Json, Router,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    FromQueryResult, JoinType, QueryFilter, QuerySelect, RelationTrait, Set, SqlErr,
    TransactionTrait,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::api::validation_response;
use crate::entities::{
    cart, cart::Entity as CartEntity, cart_item, cart_item::Entity as CartItemEntity,
    product_variant, product_variant::Entity as ProductVariantEntity, shipping_address,
    shipping_address::Entity as ShippingAddressEntity,
};
use crate::middleware::auth::CurrentUser;
use crate::middleware::logging::{to_response, ApiError};

//ROUTERS
pub fn cart_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/cart", get(get_cart).post(add_product))
        .route("/cart/item/:id", patch(patch_item).delete(remove_item))
        .route("/cart/address", put(set_shipping_address))
        .layer(Extension(db))
}

//ROUTES
async fn get_cart(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current): Extension<CurrentUser>,
) -> Response {
    let txn = match db.begin().await {
        Ok(txn) => txn,
        Err(_) => return transaction_failed(),
    };

    let existing = match find_cart(&txn, current.user_id).await {
        Ok(existing) => existing,
        Err(err) => return db_error(err),
    };

    //A user who never added anything simply owns an empty cart.
    let cart = match existing {
        Some(cart) => cart,
        None => {
            return to_response(
                (
                    StatusCode::OK,
                    Json(json!({
                        "id": null,
                        "shipping_address_id": null,
                        "items": [],
                        "total_price_in_cents": 0
                    })),
                ),
                Ok(()),
            );
        }
    };

    let rows = match CartItemEntity::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .join(JoinType::InnerJoin, cart_item::Relation::ProductVariant.def())
        .column_as(product_variant::Column::Name, "name")
        .column_as(product_variant::Column::Color, "color")
        .column_as(product_variant::Column::PriceInCents, "price_in_cents")
        .column_as(product_variant::Column::ImageUrl, "image_url")
        .into_model::<CartItemRow>()
        .all(&txn)
        .await
    {
        Ok(rows) => rows,
        Err(err) => return db_error(err),
    };

    let items: Vec<CartItemResponse> = rows.into_iter().map(CartItemResponse::new).collect();
    let total_price_in_cents: i64 = items.iter().map(|item| item.subtotal_in_cents).sum();

    to_response(
        (
            StatusCode::OK,
            Json(json!({
                "id": cart.id,
                "shipping_address_id": cart.shipping_address_id,
                "items": items,
                "total_price_in_cents": total_price_in_cents
            })),
        ),
        Ok(()),
    )
}

/// The add-to-cart upsert. One transaction covers variant lookup, lazy cart
/// creation and the increment-or-insert; a unique-index violation on the
/// insert means a concurrent add won the race, and this request retries as a
/// plain increment.
async fn add_product(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<AddProduct>,
) -> Response {
    if let Err(errors) = payload.validate() {
        return validation_response(&errors);
    }

    let variant_id = match Uuid::parse_str(&payload.product_variant_id) {
        Ok(variant_id) => variant_id,
        Err(_) => {
            return to_response(
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": "Not a well-formed variant id",
                        "field": "product_variant_id"
                    })),
                ),
                Err(ApiError::Validation {
                    field: "product_variant_id".to_owned(),
                    reason: format!("`{}` is not a UUID", payload.product_variant_id),
                }),
            );
        }
    };

    let txn = match db.begin().await {
        Ok(txn) => txn,
        Err(_) => return transaction_failed(),
    };

    match ProductVariantEntity::find_by_id(variant_id).one(&txn).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return to_response(
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({
                        "error": format!("No product variant with {} id was found", variant_id)
                    })),
                ),
                Err(ApiError::NotFound(format!("product variant {}", variant_id))),
            );
        }
        Err(err) => return db_error(err),
    }

    let cart = match find_or_create_cart(&txn, current.user_id).await {
        Ok(cart) => cart,
        Err(err) => {
            let _ = txn.rollback().await;
            return db_error(err);
        }
    };

    match find_item(&txn, cart.id, variant_id).await {
        Ok(Some(entry)) => {
            let quantity = entry.quantity + payload.quantity;
            return apply_increment(txn, entry, quantity).await;
        }
        Ok(None) => {}
        Err(err) => {
            let _ = txn.rollback().await;
            return db_error(err);
        }
    }

    let item_id = Uuid::new_v4();
    let new_entry = cart_item::ActiveModel {
        id: Set(item_id),
        cart_id: Set(cart.id),
        product_variant_id: Set(variant_id),
        quantity: Set(payload.quantity),
        created_at: Set(Utc::now()),
    };

    match CartItemEntity::insert(new_entry).exec(&txn).await {
        Ok(_) => match txn.commit().await {
            Ok(_) => to_response(
                (
                    StatusCode::CREATED,
                    Json(json!({
                        "message": "Added successfully",
                        "id": item_id,
                        "product_variant_id": variant_id,
                        "quantity": payload.quantity
                    })),
                ),
                Ok(()),
            ),
            Err(err) => db_error(err),
        },
        Err(err) => {
            let _ = txn.rollback().await;

            //Recoverable: another request inserted the row between our find
            //and our insert. Increment the committed row instead.
            if let Some(SqlErr::UniqueConstraintViolation(_)) = err.sql_err() {
                return retry_as_increment(&db, cart.id, variant_id, payload.quantity).await;
            }

            db_error(err)
        }
    }
}

async fn patch_item(
    Path(id): Path<Uuid>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<PatchCartItem>,
) -> Response {
    if let Err(errors) = payload.validate() {
        return validation_response(&errors);
    }

    let txn = match db.begin().await {
        Ok(txn) => txn,
        Err(_) => return transaction_failed(),
    };

    let entry = match find_owned_item(&txn, current.user_id, id).await {
        Ok(Some(entry)) => entry,
        Ok(None) => return item_not_found(id),
        Err(err) => return db_error(err),
    };

    let entry: cart_item::ActiveModel = entry.into();
    let result: Result<(), DbErr> = if payload.quantity == 0 {
        entry.delete(&txn).await.map(|_| ())
    } else {
        let mut entry = entry;
        entry.quantity = Set(payload.quantity);
        entry.update(&txn).await.map(|_| ())
    };

    match result {
        Ok(_) => match txn.commit().await {
            Ok(_) => to_response(
                (
                    StatusCode::OK,
                    Json(json!({
                        "message": "Resource patched successfully",
                        "id": id,
                        "quantity": payload.quantity
                    })),
                ),
                Ok(()),
            ),
            Err(err) => db_error(err),
        },
        Err(err) => {
            let _ = txn.rollback().await;
            db_error(err)
        }
    }
}

async fn remove_item(
    Path(id): Path<Uuid>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current): Extension<CurrentUser>,
) -> Response {
    let txn = match db.begin().await {
        Ok(txn) => txn,
        Err(_) => return transaction_failed(),
    };

    let entry = match find_owned_item(&txn, current.user_id, id).await {
        Ok(Some(entry)) => entry,
        Ok(None) => return item_not_found(id),
        Err(err) => return db_error(err),
    };

    let entry: cart_item::ActiveModel = entry.into();
    match entry.delete(&txn).await {
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
            Err(err) => db_error(err),
        },
        Err(err) => {
            let _ = txn.rollback().await;
            db_error(err)
        }
    }
}

async fn set_shipping_address(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<SetShippingAddress>,
) -> Response {
    let address_id = match Uuid::parse_str(&payload.shipping_address_id) {
        Ok(address_id) => address_id,
        Err(_) => {
            return to_response(
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": "Not a well-formed address id",
                        "field": "shipping_address_id"
                    })),
                ),
                Err(ApiError::Validation {
                    field: "shipping_address_id".to_owned(),
                    reason: format!("`{}` is not a UUID", payload.shipping_address_id),
                }),
            );
        }
    };

    let txn = match db.begin().await {
        Ok(txn) => txn,
        Err(_) => return transaction_failed(),
    };

    //Only the caller's own addresses may become the delivery destination.
    match ShippingAddressEntity::find_by_id(address_id)
        .filter(shipping_address::Column::UserId.eq(current.user_id))
        .one(&txn)
        .await
    {
        Ok(Some(_)) => {}
        Ok(None) => {
            return to_response(
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({
                        "error": format!("No shipping address with {} id was found", address_id)
                    })),
                ),
                Err(ApiError::NotFound(format!("shipping address {}", address_id))),
            );
        }
        Err(err) => return db_error(err),
    }

    let cart = match find_or_create_cart(&txn, current.user_id).await {
        Ok(cart) => cart,
        Err(err) => {
            let _ = txn.rollback().await;
            return db_error(err);
        }
    };

    let mut cart: cart::ActiveModel = cart.into();
    cart.shipping_address_id = Set(Some(address_id));

    match cart.update(&txn).await {
        Ok(_) => match txn.commit().await {
            Ok(_) => to_response(
                (
                    StatusCode::OK,
                    Json(json!({
                        "message": "Shipping address set"
                    })),
                ),
                Ok(()),
            ),
            Err(err) => db_error(err),
        },
        Err(err) => {
            let _ = txn.rollback().await;
            db_error(err)
        }
    }
}

//Cart helpers
async fn find_cart(
    txn: &DatabaseTransaction,
    user_id: Uuid,
) -> Result<Option<cart::Model>, DbErr> {
    CartEntity::find()
        .filter(cart::Column::UserId.eq(user_id))
        .one(txn)
        .await
}

/// Carts come into being on first use; `user_id` is unique, so a racing
/// creation falls back to reading the winner's row.
async fn find_or_create_cart(
    txn: &DatabaseTransaction,
    user_id: Uuid,
) -> Result<cart::Model, DbErr> {
    if let Some(cart) = find_cart(txn, user_id).await? {
        return Ok(cart);
    }

    let new_cart = cart::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        shipping_address_id: Set(None),
        created_at: Set(Utc::now()),
    };

    match new_cart.insert(txn).await {
        Ok(cart) => Ok(cart),
        Err(err) => {
            if let Some(SqlErr::UniqueConstraintViolation(_)) = err.sql_err() {
                if let Some(cart) = find_cart(txn, user_id).await? {
                    return Ok(cart);
                }
            }
            Err(err)
        }
    }
}

async fn find_item(
    txn: &DatabaseTransaction,
    cart_id: Uuid,
    variant_id: Uuid,
) -> Result<Option<cart_item::Model>, DbErr> {
    CartItemEntity::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .filter(cart_item::Column::ProductVariantId.eq(variant_id))
        .one(txn)
        .await
}

async fn find_owned_item(
    txn: &DatabaseTransaction,
    user_id: Uuid,
    item_id: Uuid,
) -> Result<Option<cart_item::Model>, DbErr> {
    let cart = match find_cart(txn, user_id).await? {
        Some(cart) => cart,
        None => return Ok(None),
    };

    CartItemEntity::find_by_id(item_id)
        .filter(cart_item::Column::CartId.eq(cart.id))
        .one(txn)
        .await
}

async fn apply_increment(
    txn: DatabaseTransaction,
    entry: cart_item::Model,
    quantity: i32,
) -> Response {
    let item_id = entry.id;
    let variant_id = entry.product_variant_id;

    let mut entry: cart_item::ActiveModel = entry.into();
    entry.quantity = Set(quantity);

    match entry.update(&txn).await {
        Ok(_) => match txn.commit().await {
            Ok(_) => to_response(
                (
                    StatusCode::OK,
                    Json(json!({
                        "message": "Quantity increased",
                        "id": item_id,
                        "product_variant_id": variant_id,
                        "quantity": quantity
                    })),
                ),
                Ok(()),
            ),
            Err(err) => db_error(err),
        },
        Err(err) => {
            let _ = txn.rollback().await;
            db_error(err)
        }
    }
}

async fn retry_as_increment(
    db: &DatabaseConnection,
    cart_id: Uuid,
    variant_id: Uuid,
    quantity: i32,
) -> Response {
    let txn = match db.begin().await {
        Ok(txn) => txn,
        Err(_) => return transaction_failed(),
    };

    match find_item(&txn, cart_id, variant_id).await {
        Ok(Some(entry)) => {
            let quantity = entry.quantity + quantity;
            apply_increment(txn, entry, quantity).await
        }
        //The winning row is gone again; treat it as a plain conflict.
        Ok(None) => to_response(
            (
                StatusCode::CONFLICT,
                Json(json!({
                    "error": "Cart changed concurrently, retry the request"
                })),
            ),
            Err(ApiError::Conflict(format!(
                "cart {} lost variant {} between insert and retry",
                cart_id, variant_id
            ))),
        ),
        Err(err) => db_error(err),
    }
}

//Response helpers
fn transaction_failed() -> Response {
    to_response(
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Internal server error"
            })),
        ),
        Err(ApiError::TransactionCreationFailed),
    )
}

fn db_error(err: DbErr) -> Response {
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

fn item_not_found(id: Uuid) -> Response {
    to_response(
        (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": format!("No cart entry with {} id was found.", id)
            })),
        ),
        Err(ApiError::NotFound(format!("cart entry {}", id))),
    )
}

//Structs
#[derive(Deserialize, Debug, Validate)]
struct AddProduct {
    product_variant_id: String,
    #[validate(range(min = 1))]
    quantity: i32,
}

#[derive(Deserialize, Debug, Validate)]
struct PatchCartItem {
    //0 empties the line out of the cart.
    #[validate(range(min = 0))]
    quantity: i32,
}

#[derive(Deserialize, Debug)]
struct SetShippingAddress {
    shipping_address_id: String,
}

#[derive(FromQueryResult)]
struct CartItemRow {
    id: Uuid,
    product_variant_id: Uuid,
    quantity: i32,
    name: String,
    color: String,
    price_in_cents: i32,
    image_url: String,
}

#[derive(Serialize)]
struct CartItemResponse {
    id: Uuid,
    product_variant_id: Uuid,
    name: String,
    color: String,
    price_in_cents: i32,
    image_url: String,
    quantity: i32,
    subtotal_in_cents: i64,
}

impl CartItemResponse {
    fn new(value: CartItemRow) -> CartItemResponse {
        let subtotal_in_cents = i64::from(value.price_in_cents) * i64::from(value.quantity);

        CartItemResponse {
            id: value.id,
            product_variant_id: value.product_variant_id,
            name: value.name,
            color: value.color,
            price_in_cents: value.price_in_cents,
            image_url: value.image_url,
            quantity: value.quantity,
            subtotal_in_cents,
        }
    }
}
