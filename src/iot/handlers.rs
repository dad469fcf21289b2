use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    app::AppState,
    auth::AuthenticatedUser,
    error::ApiError,
    iot::pages,
    model::user_iot_account::{UserIotAccount, PROVIDER_TUYA},
};

pub const MIN_BRIGHTNESS: i64 = 1;
pub const MAX_BRIGHTNESS: i64 = 100;
const DEFAULT_BRIGHTNESS: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: String,
}

/// `value` stays a string so a non-integer gets our 422 instead of the
/// extractor's 400.
#[derive(Debug, Deserialize)]
pub struct BrightnessParams {
    pub value: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DevicesResponse {
    pub devices: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct SwitchResponse {
    pub ok: bool,
    pub used_code: &'static str,
}

#[derive(Debug, Serialize)]
pub struct BrightnessResponse {
    pub raw: Value,
}

// ------------------------------------------------------------
// ACCOUNT LINKING
// ------------------------------------------------------------
pub async fn tuya_login(
    AuthenticatedUser(_user): AuthenticatedUser,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let url = state
        .tuya
        .login_url()
        .map_err(|e| ApiError::VendorCallFailed(e.to_string()))?;

    Ok((StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response())
}

pub async fn tuya_callback(
    AuthenticatedUser(user): AuthenticatedUser,
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ApiError> {
    let grant = match state.tuya.exchange_code(&params.code).await {
        Ok(grant) => grant,
        Err(err) => {
            warn!(user_id = %user.id, %err, "tuya code exchange failed");
            let page = pages::link_failed(&err.to_string())
                .map_err(|e| ApiError::Render(e.to_string()))?;
            return Ok((StatusCode::BAD_REQUEST, Html(page)).into_response());
        }
    };

    let account = UserIotAccount {
        user_id: user.id.clone(),
        provider: PROVIDER_TUYA.to_string(),
        tuya_uid: grant.uid,
        access_token: grant.access_token,
        refresh_token: grant.refresh_token,
    };

    state
        .links
        .upsert(&account)
        .await
        .map_err(|e| ApiError::Store(e.to_string()))?;

    info!(user_id = %user.id, "tuya account linked");
    let page = pages::linked().map_err(|e| ApiError::Render(e.to_string()))?;
    Ok(Html(page).into_response())
}

// ------------------------------------------------------------
// DEVICES & CONTROL
// ------------------------------------------------------------
pub async fn list_devices(
    AuthenticatedUser(user): AuthenticatedUser,
    State(state): State<AppState>,
) -> Result<Json<DevicesResponse>, ApiError> {
    let account = state
        .links
        .find(&user.id, PROVIDER_TUYA)
        .await
        .map_err(|e| ApiError::Store(e.to_string()))?
        .ok_or(ApiError::NotLinked)?;

    let uid = account.linked_uid().ok_or(ApiError::NotLinked)?;

    let devices = state
        .tuya
        .list_devices(uid)
        .await
        .map_err(|e| ApiError::VendorCallFailed(e.to_string()))?;

    Ok(Json(DevicesResponse { devices }))
}

pub async fn device_on(
    AuthenticatedUser(_user): AuthenticatedUser,
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<SwitchResponse>, ApiError> {
    switch_device(&state, &device_id, true).await
}

pub async fn device_off(
    AuthenticatedUser(_user): AuthenticatedUser,
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<SwitchResponse>, ApiError> {
    switch_device(&state, &device_id, false).await
}

async fn switch_device(
    state: &AppState,
    device_id: &str,
    on: bool,
) -> Result<Json<SwitchResponse>, ApiError> {
    validate_device_id(device_id)?;

    let result = if on {
        state.tuya.turn_on(device_id).await
    } else {
        state.tuya.turn_off(device_id).await
    };
    let outcome = result.map_err(|e| ApiError::VendorCallFailed(e.to_string()))?;

    if !outcome.success {
        return Err(ApiError::VendorCallFailed(
            outcome.error.unwrap_or_else(|| "Failed".to_string()),
        ));
    }

    Ok(Json(SwitchResponse {
        ok: true,
        used_code: outcome.code,
    }))
}

pub async fn device_brightness(
    AuthenticatedUser(_user): AuthenticatedUser,
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(params): Query<BrightnessParams>,
) -> Result<Json<BrightnessResponse>, ApiError> {
    let value = brightness_value(params.value.as_deref())?;
    validate_device_id(&device_id)?;

    let raw = state
        .tuya
        .set_brightness(&device_id, value)
        .await
        .map_err(|e| ApiError::VendorCallFailed(e.to_string()))?;

    Ok(Json(BrightnessResponse { raw }))
}

fn brightness_value(raw: Option<&str>) -> Result<u8, ApiError> {
    let value = match raw {
        None => DEFAULT_BRIGHTNESS,
        Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
            ApiError::InvalidInput(format!("value must be an integer, got {raw:?}"))
        })?,
    };
    if !(MIN_BRIGHTNESS..=MAX_BRIGHTNESS).contains(&value) {
        return Err(ApiError::InvalidInput(format!(
            "value must be between {MIN_BRIGHTNESS} and {MAX_BRIGHTNESS}, got {value}"
        )));
    }
    u8::try_from(value).map_err(|_| ApiError::InvalidInput(format!("value out of range: {value}")))
}

/// Device ids are interpolated into vendor URLs, so they must stay a single
/// path segment.
fn validate_device_id(device_id: &str) -> Result<(), ApiError> {
    let valid = !device_id.is_empty()
        && device_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ApiError::InvalidInput(format!("invalid device id: {device_id:?}")))
    }
}
