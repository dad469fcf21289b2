use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use reqwest::{RequestBuilder, StatusCode, Url};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::{config::TuyaConfig, iot::token_cache::TokenCache};

pub const SWITCH_CODE: &str = "switch_led";
pub const BRIGHTNESS_CODE: &str = "bright_value_v2";

/// Tuya's "token invalid" business code, returned with a 200 status.
const TOKEN_INVALID_CODE: i64 = 1010;

/// Tokens obtained by exchanging an OAuth authorization code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuyaGrant {
    pub uid: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// Result of an on/off command.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub success: bool,
    pub code: &'static str,
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct TuyaClient {
    client: reqwest::Client,
    endpoint: String,
    client_id: String,
    client_secret: String,
    redirect_url: String,
    tokens: Arc<TokenCache>,
}

impl TuyaClient {
    pub fn new(config: &TuyaConfig, tokens: Arc<TokenCache>) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_url: config.redirect_url.clone(),
            tokens,
        })
    }

    /// Smart Life login page the user is sent to for account linking.
    pub fn login_url(&self) -> Result<Url> {
        Url::parse_with_params(
            &format!("{}/login", self.endpoint),
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
                ("response_type", "code"),
            ],
        )
        .context("invalid tuya login url")
    }

    // ============================================================
    // TOKENS
    // ============================================================

    /// Returns the cached project token, fetching one on a miss.
    pub async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.tokens.get().await {
            return Ok(token);
        }

        let response = self
            .client
            .get(format!("{}/v1.0/token", self.endpoint))
            .query(&[("grant_type", "1")])
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .send()
            .await
            .context("tuya token request failed")?;

        let data = read_body(response).await;
        let result = data.get("result");
        let token = result
            .and_then(|r| r.get("access_token"))
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow!("failed to get tuya token: {data}"))?
            .to_string();

        let ttl = result
            .and_then(|r| r.get("expire_time"))
            .and_then(Value::as_u64)
            .map(Duration::from_secs);

        info!(ttl_secs = ?ttl.map(|t| t.as_secs()), "fetched tuya access token");
        self.tokens.store(token.clone(), ttl).await;
        Ok(token)
    }

    /// Trades an OAuth authorization code for the user's tokens.
    ///
    /// On failure the error message is the vendor's raw response body.
    pub async fn exchange_code(&self, code: &str) -> Result<TuyaGrant> {
        let response = self
            .client
            .post(format!("{}/v1.0/token", self.endpoint))
            .query(&[("grant_type", "authorization_code"), ("code", code)])
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .send()
            .await
            .context("tuya code exchange request failed")?;

        let data = read_body(response).await;
        let Some(result) = data.get("result").filter(|r| r.is_object()) else {
            return Err(anyhow!("{data}"));
        };

        let field = |name: &str| result.get(name).and_then(Value::as_str).map(str::to_owned);
        Ok(TuyaGrant {
            uid: field("uid"),
            access_token: field("access_token"),
            refresh_token: field("refresh_token"),
        })
    }

    // ============================================================
    // DEVICES
    // ============================================================

    pub async fn list_devices(&self, uid: &str) -> Result<Vec<Value>> {
        let request = self
            .client
            .get(format!("{}/v1.0/users/{uid}/devices", self.endpoint));
        let (status, data) = self.send_authorized(request).await?;
        if let Some(msg) = vendor_failure(&data) {
            warn!(%status, uid, %msg, "tuya device listing failed, returning no devices");
        }

        Ok(data
            .get("result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    pub async fn turn_on(&self, device_id: &str) -> Result<CommandOutcome> {
        self.switch(device_id, true).await
    }

    pub async fn turn_off(&self, device_id: &str) -> Result<CommandOutcome> {
        self.switch(device_id, false).await
    }

    async fn switch(&self, device_id: &str, on: bool) -> Result<CommandOutcome> {
        let (status, data) = self
            .send_command(device_id, SWITCH_CODE, json!(on))
            .await?;

        let success = status == StatusCode::OK;
        let error = (!success).then(|| {
            data.get("msg")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| format!("tuya returned {status}"))
        });

        Ok(CommandOutcome {
            success,
            code: SWITCH_CODE,
            error,
        })
    }

    /// Sets brightness and hands back the vendor response as-is.
    pub async fn set_brightness(&self, device_id: &str, value: u8) -> Result<Value> {
        let (_, data) = self
            .send_command(device_id, BRIGHTNESS_CODE, json!(value))
            .await?;
        Ok(data)
    }

    async fn send_command(
        &self,
        device_id: &str,
        code: &str,
        value: Value,
    ) -> Result<(StatusCode, Value)> {
        let request = self
            .client
            .post(format!("{}/v1.0/devices/{device_id}/commands", self.endpoint))
            .json(&json!({ "commands": [{ "code": code, "value": value }] }));
        debug!(device_id, code, "sending tuya command");
        self.send_authorized(request).await
    }

    /// Sends `request` with the project token. A response that says the token
    /// is no longer valid drops it from the cache so the next call refetches.
    async fn send_authorized(&self, request: RequestBuilder) -> Result<(StatusCode, Value)> {
        let token = self.access_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .context("tuya request failed")?;

        let status = response.status();
        let data = read_body(response).await;

        let token_rejected = status == StatusCode::UNAUTHORIZED
            || data.get("code").and_then(Value::as_i64) == Some(TOKEN_INVALID_CODE);
        if token_rejected {
            warn!(%status, "tuya rejected cached token, invalidating");
            self.tokens.invalidate().await;
        }

        Ok((status, data))
    }
}

/// Message of a body flagged `success: false`, if any.
fn vendor_failure(data: &Value) -> Option<String> {
    if data.get("success").and_then(Value::as_bool) != Some(false) {
        return None;
    }
    let msg = data
        .get("msg")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| data.get("code").map(Value::to_string).unwrap_or_default());
    Some(msg)
}

/// Vendor bodies are JSON in practice; anything else is kept as a string so
/// it can still be shown to the user.
async fn read_body(response: reqwest::Response) -> Value {
    match response.text().await {
        Ok(raw) if raw.trim().is_empty() => Value::Null,
        Ok(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
        Err(err) => {
            warn!(%err, "failed to read tuya response body");
            Value::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{basic_auth, body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config(server: &MockServer, ttl_secs: u64) -> TuyaConfig {
        TuyaConfig {
            endpoint: server.uri(),
            client_id: "cid".into(),
            client_secret: "secret".into(),
            redirect_url: "https://app.example/callback".into(),
            token_ttl: Duration::from_secs(ttl_secs),
            timeout: Duration::from_secs(5),
        }
    }

    fn client(server: &MockServer, ttl_secs: u64) -> TuyaClient {
        TuyaClient::new(
            &config(server, ttl_secs),
            Arc::new(TokenCache::new(Duration::from_secs(ttl_secs))),
        )
        .unwrap()
    }

    async fn mount_token(server: &MockServer, token: &str, times: u64) {
        Mock::given(method("GET"))
            .and(path("/v1.0/token"))
            .and(query_param("grant_type", "1"))
            .and(basic_auth("cid", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "result": {"access_token": token, "uid": "project"}
            })))
            .expect(times)
            .mount(server)
            .await;
    }

    async fn mount_devices(server: &MockServer, token: &str) {
        Mock::given(method("GET"))
            .and(path("/v1.0/users/tuya-uid/devices"))
            .and(header("authorization", format!("Bearer {token}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "result": [{"id": "dev-1", "name": "Desk lamp"}]
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn cached_token_is_reused() {
        let server = MockServer::start().await;
        mount_token(&server, "tok-1", 1).await;
        mount_devices(&server, "tok-1").await;

        let tuya = client(&server, 3600);
        let first = tuya.list_devices("tuya-uid").await.unwrap();
        let second = tuya.list_devices("tuya-uid").await.unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn oversized_vendor_expire_time_keeps_serving_cached_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"access_token": "tok-1", "expire_time": 1_000_000_000_000_000u64}
            })))
            .expect(1)
            .mount(&server)
            .await;
        mount_devices(&server, "tok-1").await;

        let tuya = client(&server, 3600);
        assert_eq!(tuya.list_devices("tuya-uid").await.unwrap().len(), 1);
        assert_eq!(tuya.list_devices("tuya-uid").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn token_response_without_result_is_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "code": 1004,
                "msg": "sign invalid"
            })))
            .expect(2)
            .mount(&server)
            .await;

        let tuya = client(&server, 3600);
        let err = tuya.access_token().await.unwrap_err();
        assert!(err.to_string().contains("failed to get tuya token"));
        assert!(err.to_string().contains("sign invalid"));

        assert!(tuya.access_token().await.is_err());
    }

    #[tokio::test]
    async fn expired_token_is_fetched_again() {
        let server = MockServer::start().await;
        mount_token(&server, "tok-1", 2).await;
        mount_devices(&server, "tok-1").await;

        let tuya = client(&server, 0);
        tuya.list_devices("tuya-uid").await.unwrap();
        tuya.list_devices("tuya-uid").await.unwrap();
    }

    #[tokio::test]
    async fn rejected_token_is_dropped_from_cache() {
        let server = MockServer::start().await;
        mount_token(&server, "tok-1", 2).await;
        Mock::given(method("GET"))
            .and(path("/v1.0/users/tuya-uid/devices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "code": 1010,
                "msg": "token invalid"
            })))
            .mount(&server)
            .await;

        let tuya = client(&server, 3600);
        assert!(tuya.list_devices("tuya-uid").await.unwrap().is_empty());
        assert!(tuya.list_devices("tuya-uid").await.unwrap().is_empty());
    }

    #[test]
    fn failure_bodies_are_recognised() {
        assert_eq!(
            vendor_failure(&json!({"success": false, "code": 1010, "msg": "token invalid"}))
                .as_deref(),
            Some("token invalid")
        );
        assert_eq!(
            vendor_failure(&json!({"success": false, "code": 1106})).as_deref(),
            Some("1106")
        );
        assert!(vendor_failure(&json!({"success": true, "result": []})).is_none());
        assert!(vendor_failure(&Value::Null).is_none());
    }

    #[tokio::test]
    async fn switch_commands_use_switch_led() {
        let server = MockServer::start().await;
        mount_token(&server, "tok-1", 1).await;
        Mock::given(method("POST"))
            .and(path("/v1.0/devices/dev-1/commands"))
            .and(body_json(json!({"commands": [{"code": "switch_led", "value": true}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1.0/devices/dev-1/commands"))
            .and(body_json(json!({"commands": [{"code": "switch_led", "value": false}]})))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({"msg": "device offline"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let tuya = client(&server, 3600);
        let on = tuya.turn_on("dev-1").await.unwrap();
        assert!(on.success);
        assert_eq!(on.code, SWITCH_CODE);

        let off = tuya.turn_off("dev-1").await.unwrap();
        assert!(!off.success);
        assert_eq!(off.error.as_deref(), Some("device offline"));
    }

    #[tokio::test]
    async fn brightness_returns_raw_vendor_body() {
        let server = MockServer::start().await;
        mount_token(&server, "tok-1", 1).await;
        Mock::given(method("POST"))
            .and(path("/v1.0/devices/dev-1/commands"))
            .and(body_json(json!({"commands": [{"code": "bright_value_v2", "value": 40}]})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"success": true, "t": 1})),
            )
            .mount(&server)
            .await;

        let raw = client(&server, 3600)
            .set_brightness("dev-1", 40)
            .await
            .unwrap();
        assert_eq!(raw, json!({"success": true, "t": 1}));
    }

    #[tokio::test]
    async fn code_exchange_returns_grant_or_raw_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1.0/token"))
            .and(query_param("grant_type", "authorization_code"))
            .and(query_param("code", "good"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"uid": "u1", "access_token": "a1", "refresh_token": "r1"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1.0/token"))
            .and(query_param("code", "bad"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "msg": "code expired"
            })))
            .mount(&server)
            .await;

        let tuya = client(&server, 3600);
        let grant = tuya.exchange_code("good").await.unwrap();
        assert_eq!(grant.uid.as_deref(), Some("u1"));
        assert_eq!(grant.refresh_token.as_deref(), Some("r1"));

        let err = tuya.exchange_code("bad").await.unwrap_err();
        assert!(err.to_string().contains("code expired"));
    }

    #[test]
    fn login_url_carries_client_and_redirect() {
        let tuya = TuyaClient::new(
            &TuyaConfig {
                endpoint: "https://openapi.tuyaeu.com".into(),
                client_id: "cid".into(),
                client_secret: "secret".into(),
                redirect_url: "https://app.example/callback".into(),
                token_ttl: Duration::from_secs(60),
                timeout: Duration::from_secs(5),
            },
            Arc::new(TokenCache::new(Duration::from_secs(60))),
        )
        .unwrap();

        let url = tuya.login_url().unwrap();
        assert_eq!(url.path(), "/login");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("client_id".into(), "cid".into())));
        assert!(pairs.contains(&("redirect_uri".into(), "https://app.example/callback".into())));
        assert!(pairs.contains(&("response_type".into(), "code".into())));
    }
}
