use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    api,
    auth::IdentityVerifier,
    config::GatewayConfig,
    db::{LinkStore, SupabaseLinkStore},
    inference::ReplyGenerator,
    iot::{self, TokenCache, TuyaClient},
};

// ------------------------------------------------------------
// SHARED STATE
// ------------------------------------------------------------
#[derive(Clone)]
pub struct AppState {
    pub identity: IdentityVerifier,
    pub generator: ReplyGenerator,
    pub tuya: TuyaClient,
    pub links: Arc<dyn LinkStore>,
}

impl AppState {
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let tokens = Arc::new(TokenCache::new(config.tuya.token_ttl));
        Ok(Self {
            identity: IdentityVerifier::new(&config.supabase)?,
            generator: ReplyGenerator::new(&config.generation)?,
            tuya: TuyaClient::new(&config.tuya, tokens)?,
            links: Arc::new(SupabaseLinkStore::new(&config.supabase)?),
        })
    }
}

// ------------------------------------------------------------
// ROUTER
// ------------------------------------------------------------
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::api_router())
        .merge(iot::router())
        .layer(TraceLayer::new_for_http())
        // Mobile client
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}
