use std::path::PathBuf;

use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use parley_gateway::{Hub, connection};

pub fn build(hub: Hub, static_dir: Option<PathBuf>) -> Router {
    let app = Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/admin/reset", post(admin_reset))
        .route("/health", get(health))
        .with_state(hub);

    let app = match static_dir {
        Some(dir) => {
            info!("Serving static files from {}", dir.display());
            app.fallback_service(ServeDir::new(dir))
        }
        None => app,
    };

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn ws_upgrade(State(hub): State<Hub>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_connection(socket, hub))
}

/// Clears history and groups; connected users stay connected.
async fn admin_reset(State(hub): State<Hub>) -> StatusCode {
    info!("Administrative reset requested");
    hub.reset().await;
    StatusCode::NO_CONTENT
}

async fn health(State(hub): State<Hub>) -> impl IntoResponse {
    Json(hub.stats().await)
}
