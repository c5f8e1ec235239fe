pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod keys;
pub mod logging;
pub mod models;
pub mod redis_client;
pub mod services;
pub mod state;
pub mod websocket;

pub use error::{AppError, AppResult};

use axum::routing::get;
use axum::Router;
use state::AppState;

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(websocket::session::ws_handler))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
