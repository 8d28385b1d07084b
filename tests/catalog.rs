mod common;

use reqwest::StatusCode;

use common::spawn_app;
use rust_attire::seed::seed_catalog;

#[tokio::test]
async fn categories_are_listed_with_slugs() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(format!("{}/api/category", app.address))
        .send()
        .await
        .expect("Failed to send category list request");
    assert_eq!(response.status(), StatusCode::OK);

    let body = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse category list JSON");
    let categories = body.as_array().expect("Category list is not an array");
    assert_eq!(categories.len(), 4);

    let slugs: Vec<&str> = categories
        .iter()
        .filter_map(|category| category["slug"].as_str())
        .collect();
    assert!(slugs.contains(&"accessories"));
    assert!(slugs.contains(&"sweatshirts"));
}

#[tokio::test]
async fn category_page_carries_products_with_their_cheapest_variant() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(format!("{}/api/category/accessories", app.address))
        .send()
        .await
        .expect("Failed to send category request");
    assert_eq!(response.status(), StatusCode::OK);

    let body = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse category JSON");
    assert_eq!(body["slug"].as_str(), Some("accessories"));

    let products = body["products"].as_array().expect("No products array");
    assert_eq!(products.len(), 3);

    let cap = products
        .iter()
        .find(|product| product["slug"].as_str() == Some("curved-cap"))
        .expect("Seeded cap is missing");
    //Cheapest of 3499/3499/3799.
    assert_eq!(cap["variant"]["price_in_cents"].as_i64(), Some(3499));
}

#[tokio::test]
async fn unknown_category_slug_is_not_found() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(format!("{}/api/category/no-such-category", app.address))
        .send()
        .await
        .expect("Failed to send category request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn product_detail_lists_all_variants_sorted_by_price() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(format!("{}/api/product/curved-cap", app.address))
        .send()
        .await
        .expect("Failed to send product request");
    assert_eq!(response.status(), StatusCode::OK);

    let body = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse product JSON");
    let variants = body["variants"].as_array().expect("No variants array");
    assert_eq!(variants.len(), 3);

    let prices: Vec<i64> = variants
        .iter()
        .filter_map(|variant| variant["price_in_cents"].as_i64())
        .collect();
    assert_eq!(prices, vec![3499, 3499, 3799]);

    for variant in variants {
        let slug = variant["slug"].as_str().expect("Variant has no slug");
        assert!(slug.starts_with("curved-cap-"), "odd variant slug {}", slug);
    }
}

#[tokio::test]
async fn unknown_product_slug_is_not_found() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(format!("{}/api/product/no-such-product", app.address))
        .send()
        .await
        .expect("Failed to send product request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reseeding_wipes_and_reinserts_the_catalog() {
    let app = spawn_app().await;

    seed_catalog(&app.db).await.expect("Failed to reseed");

    let response = app
        .client
        .get(format!("{}/api/product", app.address))
        .send()
        .await
        .expect("Failed to send product list request");
    let body = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse product list JSON");
    assert_eq!(body.as_array().map(|products| products.len()), Some(9));
}
