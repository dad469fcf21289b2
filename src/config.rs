use std::time::Duration;

use anyhow::{anyhow, Context, Result};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_HF_API_BASE: &str = "https://api-inference.huggingface.co";
pub const DEFAULT_HF_MODEL: &str = "google/flan-t5-base";
pub const DEFAULT_TUYA_ENDPOINT: &str = "https://openapi.tuyaeu.com";
pub const DEFAULT_TUYA_TOKEN_TTL_SECS: u64 = 7000;
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 15;
pub const GENERATION_TIMEOUT_SECS: u64 = 30;

/// Everything the gateway reads from the environment at startup.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: String,
    pub supabase: SupabaseConfig,
    pub generation: GenerationConfig,
    pub tuya: TuyaConfig,
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_key: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct TuyaConfig {
    pub endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub token_ttl: Duration,
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Reads the process environment; `.env` must already be loaded.
    pub fn from_env() -> Result<Self> {
        let upstream_timeout = Duration::from_secs(parse_or(
            "UPSTREAM_TIMEOUT_SECS",
            DEFAULT_UPSTREAM_TIMEOUT_SECS,
        )?);

        let supabase = SupabaseConfig {
            url: trim_base(required("SUPABASE_URL")?),
            service_key: required("SUPABASE_SERVICE_KEY")?,
            timeout: upstream_timeout,
        };

        let generation = GenerationConfig {
            api_base: trim_base(
                dotenvy::var("HF_API_BASE").unwrap_or_else(|_| DEFAULT_HF_API_BASE.to_string()),
            ),
            api_key: dotenvy::var("HF_API_KEY").unwrap_or_default(),
            model: dotenvy::var("HF_MODEL").unwrap_or_else(|_| DEFAULT_HF_MODEL.to_string()),
            timeout: Duration::from_secs(GENERATION_TIMEOUT_SECS),
        };

        let tuya = TuyaConfig {
            endpoint: trim_base(
                dotenvy::var("TUYA_ENDPOINT")
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_TUYA_ENDPOINT.to_string()),
            ),
            client_id: required("TUYA_CLIENT_ID")?,
            client_secret: required("TUYA_CLIENT_SECRET")?,
            redirect_url: required("OAUTH_REDIRECT_URL")?,
            token_ttl: Duration::from_secs(parse_or(
                "TUYA_TOKEN_TTL_SECS",
                DEFAULT_TUYA_TOKEN_TTL_SECS,
            )?),
            timeout: upstream_timeout,
        };

        Ok(Self {
            bind_addr: dotenvy::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            supabase,
            generation,
            tuya,
        })
    }
}

fn required(name: &str) -> Result<String> {
    let value = dotenvy::var(name).with_context(|| format!("{name} must be set"))?;
    if value.trim().is_empty() {
        return Err(anyhow!("{name} must not be empty"));
    }
    Ok(value)
}

fn parse_or(name: &str, default: u64) -> Result<u64> {
    match dotenvy::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a whole number of seconds, got {raw:?}")),
        Err(_) => Ok(default),
    }
}

fn trim_base(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}
