use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{error::AppError, state::AppState};

/// Authenticated caller id.
///
/// Credentials are verified upstream; the gateway forwards the caller in the
/// header named by `Config::identity_header`. A missing or blank header is
/// rejected with 401.
#[derive(Debug, Clone)]
pub struct CallerIdentity(pub String);

impl FromRequestParts<Arc<AppState>> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(state.config.identity_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| CallerIdentity(v.to_string()))
            .ok_or(AppError::Unauthorized)
    }
}
