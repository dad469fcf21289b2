use anyhow::Result;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{auth::types::Principal, config::SupabaseConfig, error::ApiError};

/// Validates caller tokens against Supabase Auth.
#[derive(Clone)]
pub struct IdentityVerifier {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl IdentityVerifier {
    pub fn new(config: &SupabaseConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.url.clone(),
            service_key: config.service_key.clone(),
        })
    }

    /// Introspects `token` and returns the caller it belongs to.
    ///
    /// Every failure, including the provider being unreachable, maps to
    /// `Unauthorized`.
    pub async fn verify(&self, token: &str) -> Result<Principal, ApiError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ApiError::Unauthorized("missing_bearer_token"));
        }

        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.service_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| {
                warn!(%err, "identity provider unreachable");
                ApiError::Unauthorized("token_verification_failed")
            })?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "identity provider rejected token");
            return Err(ApiError::Unauthorized("invalid_or_expired_token"));
        }

        let payload: Value = response.json().await.map_err(|err| {
            warn!(%err, "identity provider returned malformed user payload");
            ApiError::Unauthorized("token_verification_failed")
        })?;

        Principal::from_identity(&payload).ok_or(ApiError::Unauthorized("invalid_or_expired_token"))
    }
}
