use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use clanhall_backend::{api, config, db, metrics};

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "clanhall-backend" }))
}

/// In local mode every request acts as the auto-created local admin, so
/// that user row has to exist.
async fn ensure_local_user(db: &db::Database) {
    match db.get_user(config::LOCAL_USER_ID).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            if let Err(e) = db
                .create_user(config::LOCAL_USERNAME, "Local admin", None)
                .await
            {
                tracing::warn!("Failed to create local user: {e}");
            }
        }
        Err(e) => tracing::warn!("Failed to look up local user: {e}"),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cfg = config::Config::load();
    config::set_local_mode(cfg.local_mode);

    let db = db::Database::new(&cfg.database_url)
        .await
        .expect("Failed to initialize database");
    let db = Arc::new(db);

    if cfg.local_mode {
        tracing::info!("Running in local mode: auth is bypassed");
        ensure_local_user(&db).await;
    }

    metrics::register_metrics();

    let mut app = Router::new()
        .route("/health", get(health_check))
        .merge(api::router(db))
        .layer(CorsLayer::permissive());

    if let Some(static_dir) = &cfg.static_dir {
        app = app.fallback_service(tower_http::services::ServeDir::new(static_dir));
    }

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", cfg.port))
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to port {}: {e}", cfg.port));

    tracing::info!("Clanhall backend listening on port {}", cfg.port);
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
