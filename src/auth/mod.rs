pub mod supabase;
pub mod types;

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::typed_header::TypedHeader;
use headers::{authorization::Bearer, Authorization};

use crate::{app::AppState, error::ApiError};

pub use supabase::IdentityVerifier;
pub use types::Principal;

/// Extractor for protected routes: requires `Authorization: Bearer <token>`
/// and resolves it to a [`Principal`] before the handler body runs.
pub struct AuthenticatedUser(pub Principal);

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::Unauthorized("missing_bearer_token"))?;

        let principal = state.identity.verify(bearer.token()).await?;
        Ok(AuthenticatedUser(principal))
    }
}
