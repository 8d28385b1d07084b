use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::get,
    Json, Router,
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, TransactionTrait};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{
    product, product::Entity as ProductEntity, product_variant,
    product_variant::Entity as ProductVariantEntity,
};
use crate::middleware::logging::{to_response, ApiError};

//ROUTERS
pub fn product_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/product", get(get_products))
        .route("/product/:slug", get(get_product))
        .layer(Extension(db))
}

//ROUTES
async fn get_products(Extension(db): Extension<Arc<DatabaseConnection>>) -> Response {
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

    match ProductEntity::find()
        .find_with_related(ProductVariantEntity)
        .all(&txn)
        .await
    {
        Ok(products) => {
            let response: Vec<ProductSummary> = products
                .into_iter()
                .map(ProductSummary::new)
                .collect();
            to_response((StatusCode::OK, Json(response)), Ok(()))
        }
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

async fn get_product(
    Path(slug): Path<String>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
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

    let found = match ProductEntity::find()
        .filter(product::Column::Slug.eq(&*slug))
        .find_with_related(ProductVariantEntity)
        .all(&txn)
        .await
    {
        Ok(found) => found,
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

    match found.into_iter().next() {
        Some(pair) => to_response((StatusCode::OK, Json(ProductDetail::new(pair))), Ok(())),
        None => to_response(
            (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "error": format!("No product with slug `{}` was found.", slug)
                })),
            ),
            Err(ApiError::NotFound(format!("product `{}`", slug))),
        ),
    }
}

//Structs
#[derive(Serialize)]
pub struct VariantResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub color: String,
    pub price_in_cents: i32,
    pub image_url: String,
}

impl VariantResponse {
    pub fn new(value: product_variant::Model) -> VariantResponse {
        VariantResponse {
            id: value.id,
            name: value.name,
            slug: value.slug,
            color: value.color,
            price_in_cents: value.price_in_cents,
            image_url: value.image_url,
        }
    }
}

/// Listing shape: the product plus its cheapest variant as the
/// representative one.
#[derive(Serialize)]
pub struct ProductSummary {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub variant: Option<VariantResponse>,
}

impl ProductSummary {
    pub fn new(value: (product::Model, Vec<product_variant::Model>)) -> ProductSummary {
        let (prod, variants) = value;
        let cheapest = variants
            .into_iter()
            .min_by_key(|variant| variant.price_in_cents)
            .map(VariantResponse::new);

        ProductSummary {
            id: prod.id,
            category_id: prod.category_id,
            name: prod.name,
            slug: prod.slug,
            description: prod.description,
            variant: cheapest,
        }
    }
}

#[derive(Serialize)]
struct ProductDetail {
    id: Uuid,
    category_id: Uuid,
    name: String,
    slug: String,
    description: String,
    variants: Vec<VariantResponse>,
}

impl ProductDetail {
    fn new(value: (product::Model, Vec<product_variant::Model>)) -> ProductDetail {
        let (prod, variants) = value;
        let mut variants: Vec<VariantResponse> =
            variants.into_iter().map(VariantResponse::new).collect();
        variants.sort_by_key(|variant| variant.price_in_cents);

        ProductDetail {
            id: prod.id,
            category_id: prod.category_id,
            name: prod.name,
            slug: prod.slug,
            description: prod.description,
            variants,
        }
    }
}
