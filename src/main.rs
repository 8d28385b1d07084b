use sea_orm::{Database, DatabaseConnection};
use std::sync::Arc;

use rust_attire::api::create_api_router;
use rust_attire::entities::setup_schema;
use rust_attire::seed::seed_catalog;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let db: DatabaseConnection = Database::connect(&database_url)
        .await
        .expect("Failed to connect to the database");
    setup_schema(&db).await;

    if std::env::args().any(|arg| arg == "--seed") {
        seed_catalog(&db).await.expect("Failed to seed catalog");
    }

    let shared_db = Arc::new(db);

    let app = create_api_router(shared_db);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_owned());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind listener");
    tracing::info!("Running at {:?}", listener.local_addr());
    axum::serve(listener, app).await.expect("Server stopped");
}
