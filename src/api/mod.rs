use axum::{
    routing::{get, post},
    Router,
};

use crate::app::AppState;

pub mod handlers;
pub mod types;

use handlers::{chat, root};

/// Liveness probe and chat.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/chat", post(chat))
}
