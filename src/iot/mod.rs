use crate::app::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub mod handlers;
mod pages;
pub mod token_cache;
pub mod tuya;

pub use token_cache::TokenCache;
pub use tuya::TuyaClient;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/iot/tuya/login", get(handlers::tuya_login))
        .route("/iot/tuya/callback", get(handlers::tuya_callback))
        .route("/iot/devices", get(handlers::list_devices))
        .route("/iot/{device_id}/on", post(handlers::device_on))
        .route("/iot/{device_id}/off", post(handlers::device_off))
        .route("/iot/{device_id}/brightness", post(handlers::device_brightness))
}
