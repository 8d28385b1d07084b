mod common;

use reqwest::StatusCode;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;
use uuid::Uuid;

use common::{any_variant_id, fetch_cart, register_and_login, spawn_app};
use rust_attire::entities::{
    cart_item, cart_item::Entity as CartItemEntity, product::Entity as ProductEntity,
    product_variant, product_variant::Entity as ProductVariantEntity,
};

#[tokio::test]
async fn add_twice_accumulates_quantity_in_one_row() {
    let app = spawn_app().await;
    let token = register_and_login(&app, "shopper@example.com").await;
    let variant_id = any_variant_id(&app).await;

    let response = app
        .client
        .post(format!("{}/api/cart", app.address))
        .bearer_auth(&token)
        .json(&json!({ "product_variant_id": variant_id, "quantity": 2 }))
        .send()
        .await
        .expect("Failed to send add request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse add response JSON");
    assert_eq!(body["quantity"].as_i64(), Some(2));

    let response = app
        .client
        .post(format!("{}/api/cart", app.address))
        .bearer_auth(&token)
        .json(&json!({ "product_variant_id": variant_id, "quantity": 1 }))
        .send()
        .await
        .expect("Failed to send second add request");
    assert_eq!(response.status(), StatusCode::OK);
    let body = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse second add response JSON");
    assert_eq!(body["quantity"].as_i64(), Some(3));

    let cart = fetch_cart(&app, &token).await;
    let items = cart["items"].as_array().expect("Cart items not an array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"].as_i64(), Some(3));

    let unit_price = items[0]["price_in_cents"].as_i64().expect("No unit price");
    assert_eq!(items[0]["subtotal_in_cents"].as_i64(), Some(unit_price * 3));
    assert_eq!(cart["total_price_in_cents"].as_i64(), Some(unit_price * 3));
}

#[tokio::test]
async fn add_unknown_variant_is_not_found_and_cart_is_unchanged() {
    let app = spawn_app().await;
    let token = register_and_login(&app, "shopper@example.com").await;

    let response = app
        .client
        .post(format!("{}/api/cart", app.address))
        .bearer_auth(&token)
        .json(&json!({
            "product_variant_id": Uuid::new_v4().to_string(),
            "quantity": 1
        }))
        .send()
        .await
        .expect("Failed to send add request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let cart = fetch_cart(&app, &token).await;
    assert_eq!(cart["items"].as_array().map(|items| items.len()), Some(0));
    assert_eq!(cart["total_price_in_cents"].as_i64(), Some(0));
}

#[tokio::test]
async fn add_rejects_non_positive_quantity() {
    let app = spawn_app().await;
    let token = register_and_login(&app, "shopper@example.com").await;
    let variant_id = any_variant_id(&app).await;

    for quantity in [0, -3] {
        let response = app
            .client
            .post(format!("{}/api/cart", app.address))
            .bearer_auth(&token)
            .json(&json!({ "product_variant_id": variant_id, "quantity": quantity }))
            .send()
            .await
            .expect("Failed to send add request");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = response
            .json::<serde_json::Value>()
            .await
            .expect("Failed to parse validation response JSON");
        assert_eq!(body["field"].as_str(), Some("quantity"));
    }

    let cart = fetch_cart(&app, &token).await;
    assert_eq!(cart["items"].as_array().map(|items| items.len()), Some(0));
}

#[tokio::test]
async fn add_rejects_malformed_variant_id() {
    let app = spawn_app().await;
    let token = register_and_login(&app, "shopper@example.com").await;

    let response = app
        .client
        .post(format!("{}/api/cart", app.address))
        .bearer_auth(&token)
        .json(&json!({ "product_variant_id": "not-a-uuid", "quantity": 1 }))
        .send()
        .await
        .expect("Failed to send add request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse validation response JSON");
    assert_eq!(body["field"].as_str(), Some("product_variant_id"));
}

#[tokio::test]
async fn cart_routes_require_a_session() {
    let app = spawn_app().await;
    let variant_id = any_variant_id(&app).await;

    let response = app
        .client
        .post(format!("{}/api/cart", app.address))
        .json(&json!({ "product_variant_id": variant_id, "quantity": 1 }))
        .send()
        .await
        .expect("Failed to send add request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .client
        .get(format!("{}/api/cart", app.address))
        .bearer_auth("bogus-token")
        .send()
        .await
        .expect("Failed to send get cart request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn concurrent_adds_converge_to_the_summed_quantity() {
    let app = spawn_app().await;
    let token = register_and_login(&app, "shopper@example.com").await;
    let variant_id = any_variant_id(&app).await;

    let add = |quantity: i64| {
        let client = app.client.clone();
        let url = format!("{}/api/cart", app.address);
        let token = token.clone();
        let variant_id = variant_id.clone();
        async move {
            let response = client
                .post(url)
                .bearer_auth(token)
                .json(&json!({ "product_variant_id": variant_id, "quantity": quantity }))
                .send()
                .await
                .expect("Failed to send concurrent add request");
            assert!(
                response.status() == StatusCode::CREATED || response.status() == StatusCode::OK,
                "unexpected status {}",
                response.status()
            );
        }
    };

    tokio::join!(add(1), add(2), add(3), add(4));

    let cart = fetch_cart(&app, &token).await;
    let items = cart["items"].as_array().expect("Cart items not an array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"].as_i64(), Some(10));
}

#[tokio::test]
async fn patch_sets_quantity_and_zero_removes_the_row() {
    let app = spawn_app().await;
    let token = register_and_login(&app, "shopper@example.com").await;
    let variant_id = any_variant_id(&app).await;

    let response = app
        .client
        .post(format!("{}/api/cart", app.address))
        .bearer_auth(&token)
        .json(&json!({ "product_variant_id": variant_id, "quantity": 2 }))
        .send()
        .await
        .expect("Failed to send add request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let item_id = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse add response JSON")["id"]
        .as_str()
        .expect("No item id in add response")
        .to_owned();

    let response = app
        .client
        .patch(format!("{}/api/cart/item/{}", app.address, item_id))
        .bearer_auth(&token)
        .json(&json!({ "quantity": 5 }))
        .send()
        .await
        .expect("Failed to send patch request");
    assert_eq!(response.status(), StatusCode::OK);

    let cart = fetch_cart(&app, &token).await;
    assert_eq!(cart["items"][0]["quantity"].as_i64(), Some(5));

    let response = app
        .client
        .patch(format!("{}/api/cart/item/{}", app.address, item_id))
        .bearer_auth(&token)
        .json(&json!({ "quantity": 0 }))
        .send()
        .await
        .expect("Failed to send zeroing patch request");
    assert_eq!(response.status(), StatusCode::OK);

    let cart = fetch_cart(&app, &token).await;
    assert_eq!(cart["items"].as_array().map(|items| items.len()), Some(0));
}

#[tokio::test]
async fn remove_deletes_the_row_and_repeat_remove_is_not_found() {
    let app = spawn_app().await;
    let token = register_and_login(&app, "shopper@example.com").await;
    let variant_id = any_variant_id(&app).await;

    let response = app
        .client
        .post(format!("{}/api/cart", app.address))
        .bearer_auth(&token)
        .json(&json!({ "product_variant_id": variant_id, "quantity": 1 }))
        .send()
        .await
        .expect("Failed to send add request");
    let item_id = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse add response JSON")["id"]
        .as_str()
        .expect("No item id in add response")
        .to_owned();

    let response = app
        .client
        .delete(format!("{}/api/cart/item/{}", app.address, item_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send delete request");
    assert_eq!(response.status(), StatusCode::OK);

    let cart = fetch_cart(&app, &token).await;
    assert_eq!(cart["items"].as_array().map(|items| items.len()), Some(0));

    let response = app
        .client
        .delete(format!("{}/api/cart/item/{}", app.address, item_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send repeat delete request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_a_product_cascades_to_variants_and_cart_items() {
    let app = spawn_app().await;
    let token = register_and_login(&app, "shopper@example.com").await;
    let variant_id = any_variant_id(&app).await;

    let response = app
        .client
        .post(format!("{}/api/cart", app.address))
        .bearer_auth(&token)
        .json(&json!({ "product_variant_id": variant_id, "quantity": 2 }))
        .send()
        .await
        .expect("Failed to send add request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let variant_uuid = Uuid::parse_str(&variant_id).expect("Variant id is not a UUID");
    let variant = ProductVariantEntity::find_by_id(variant_uuid)
        .one(&*app.db)
        .await
        .expect("Failed to load variant")
        .expect("Seeded variant is missing");

    ProductEntity::delete_by_id(variant.product_id)
        .exec(&*app.db)
        .await
        .expect("Failed to delete product");

    let remaining_variants = ProductVariantEntity::find()
        .filter(product_variant::Column::ProductId.eq(variant.product_id))
        .all(&*app.db)
        .await
        .expect("Failed to list variants");
    assert!(remaining_variants.is_empty());

    let remaining_items = CartItemEntity::find()
        .filter(cart_item::Column::ProductVariantId.eq(variant_uuid))
        .all(&*app.db)
        .await
        .expect("Failed to list cart items");
    assert!(remaining_items.is_empty());

    let cart = fetch_cart(&app, &token).await;
    assert_eq!(cart["items"].as_array().map(|items| items.len()), Some(0));
}

#[tokio::test]
async fn shipping_address_can_be_attached_to_the_cart() {
    let app = spawn_app().await;
    let token = register_and_login(&app, "shopper@example.com").await;

    let response = app
        .client
        .post(format!("{}/api/address", app.address))
        .bearer_auth(&token)
        .json(&json!({
            "recipient_name": "Test Shopper",
            "street": "Long Road",
            "number": "42",
            "complement": null,
            "neighborhood": "Old Town",
            "city": "Springfield",
            "state": "IL",
            "zip_code": "62701",
            "country": "US",
            "phone": "+1 555 0100",
            "email": "shopper@example.com"
        }))
        .send()
        .await
        .expect("Failed to send create address request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let address_id = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse address response JSON")["id"]
        .as_str()
        .expect("No address id in response")
        .to_owned();

    let response = app
        .client
        .put(format!("{}/api/cart/address", app.address))
        .bearer_auth(&token)
        .json(&json!({ "shipping_address_id": address_id }))
        .send()
        .await
        .expect("Failed to send set address request");
    assert_eq!(response.status(), StatusCode::OK);

    let cart = fetch_cart(&app, &token).await;
    assert_eq!(cart["shipping_address_id"].as_str(), Some(address_id.as_str()));

    //Somebody else's (nonexistent) address must not attach.
    let response = app
        .client
        .put(format!("{}/api/cart/address", app.address))
        .bearer_auth(&token)
        .json(&json!({ "shipping_address_id": Uuid::new_v4().to_string() }))
        .send()
        .await
        .expect("Failed to send bogus set address request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
