use crate::error::AppError;
use crate::state::SharedState;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use bloggy_core::Identity;

pub async fn root() -> &'static str {
    "Bloggy post feed service. Try GET /posts"
}

pub async fn health() -> &'static str {
    "OK"
}

/// Identity of the caller, if a readable session token was sent.
pub(crate) fn optional_identity(headers: &HeaderMap) -> Option<Identity> {
    let auth_header = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok())?;
    bloggy_core::extract_identity(Some(auth_header)).ok()
}

/// Requires a session token and records the caller's author snapshot.
pub(crate) async fn authenticate(
    state: &SharedState,
    headers: &HeaderMap,
) -> Result<Identity, AppError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let identity = bloggy_core::extract_identity(Some(auth_header)).map_err(|e| {
        tracing::debug!("Rejected session token: {:#}", e);
        AppError::Auth("Invalid session token".to_string())
    })?;

    poststore::upsert_user(&state.db, &identity).await?;

    Ok(identity)
}
