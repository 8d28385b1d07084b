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

use crate::api::public::product::ProductSummary;
use crate::entities::{
    category, category::Entity as CategoryEntity, product, product::Entity as ProductEntity,
    product_variant::Entity as ProductVariantEntity,
};
use crate::middleware::logging::{to_response, ApiError};

//ROUTERS
pub fn category_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/category", get(get_categories))
        .route("/category/:slug", get(get_category))
        .layer(Extension(db))
}

//ROUTES
async fn get_categories(Extension(db): Extension<Arc<DatabaseConnection>>) -> Response {
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

    match CategoryEntity::find().all(&txn).await {
        Ok(categories) => {
            let response: Vec<CategoryResponse> = categories
                .into_iter()
                .map(CategoryResponse::new)
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

async fn get_category(
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

    let categor = match CategoryEntity::find()
        .filter(category::Column::Slug.eq(&*slug))
        .one(&txn)
        .await
    {
        Ok(Some(categor)) => categor,
        Ok(None) => {
            return to_response(
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({
                        "error": format!("No category with slug `{}` was found.", slug)
                    })),
                ),
                Err(ApiError::NotFound(format!("category `{}`", slug))),
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

    match ProductEntity::find()
        .filter(product::Column::CategoryId.eq(categor.id))
        .find_with_related(ProductVariantEntity)
        .all(&txn)
        .await
    {
        Ok(products) => {
            let products: Vec<ProductSummary> =
                products.into_iter().map(ProductSummary::new).collect();
            to_response(
                (
                    StatusCode::OK,
                    Json(json!({
                        "id": categor.id,
                        "name": categor.name,
                        "slug": categor.slug,
                        "products": products
                    })),
                ),
                Ok(()),
            )
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

//Structs
#[derive(Serialize)]
struct CategoryResponse {
    id: Uuid,
    name: String,
    slug: String,
}

impl CategoryResponse {
    fn new(value: category::Model) -> CategoryResponse {
        CategoryResponse {
            id: value.id,
            name: value.name,
            slug: value.slug,
        }
    }
}
