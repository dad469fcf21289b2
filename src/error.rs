use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Errors surfaced to the mobile client.
///
/// Generation failures never show up here: the inference layer swallows them
/// and answers with a fallback reply instead.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("no tuya account linked")]
    NotLinked,

    #[error("vendor call failed: {0}")]
    VendorCallFailed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("page render failed: {0}")]
    Render(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotLinked | ApiError::VendorCallFailed(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Store(_) | ApiError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(code) => *code,
            ApiError::NotLinked => "no_tuya_account_linked",
            ApiError::VendorCallFailed(_) => "vendor_call_failed",
            ApiError::InvalidInput(_) => "invalid_input",
            ApiError::Store(_) => "store_unavailable",
            ApiError::Render(_) => "render_failed",
        }
    }

    fn detail(&self) -> Option<&str> {
        match self {
            ApiError::VendorCallFailed(detail) | ApiError::InvalidInput(detail) => {
                Some(detail.as_str())
            }
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let body = json!({
            "error": self.code(),
            "detail": self.detail(),
        });
        (status, Json(body)).into_response()
    }
}
