#![allow(dead_code)]

use rust_attire::api::create_api_router;
use rust_attire::entities::setup_schema;
use rust_attire::seed::seed_catalog;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde_json::json;
use std::sync::Arc;

pub struct TestApp {
    pub address: String,
    pub db: Arc<DatabaseConnection>,
    pub client: reqwest::Client,
}

/// In-memory sqlite plus the real router on an ephemeral port. The pool is
/// pinned to one connection so every request sees the same `:memory:`
/// database.
pub async fn spawn_app() -> TestApp {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1);

    let db = Database::connect(options)
        .await
        .expect("Failed to connect to in-memory sqlite");
    setup_schema(&db).await;
    seed_catalog(&db).await.expect("Failed to seed catalog");

    let shared_db = Arc::new(db);
    let app = create_api_router(shared_db.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let address = format!(
        "http://{}",
        listener.local_addr().expect("Listener has no local addr")
    );

    tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("Test server stopped");
    });

    TestApp {
        address,
        db: shared_db,
        client: reqwest::Client::new(),
    }
}

pub async fn register_and_login(app: &TestApp, email: &str) -> String {
    let register_payload = json!({
        "name": "Test Shopper",
        "email": email,
        "password": "Secret15pass"
    });

    let response = app
        .client
        .post(format!("{}/api/register", app.address))
        .json(&register_payload)
        .send()
        .await
        .expect("Failed to send register request");
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);

    let login_payload = json!({
        "email": email,
        "password": "Secret15pass"
    });

    let response = app
        .client
        .post(format!("{}/api/login", app.address))
        .json(&login_payload)
        .send()
        .await
        .expect("Failed to send login request");
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse login response JSON");
    body["token"]
        .as_str()
        .expect("Token not found in login response")
        .to_owned()
}

/// Picks a variant id out of the seeded catalog via the public listing.
pub async fn any_variant_id(app: &TestApp) -> String {
    let response = app
        .client
        .get(format!("{}/api/product", app.address))
        .send()
        .await
        .expect("Failed to send product list request");
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse product list JSON");
    body[0]["variant"]["id"]
        .as_str()
        .expect("No representative variant in product list")
        .to_owned()
}

pub async fn fetch_cart(app: &TestApp, token: &str) -> serde_json::Value {
    let response = app
        .client
        .get(format!("{}/api/cart", app.address))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to send get cart request");
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse cart JSON")
}
