use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{
        Authorization,
        authorization::{Basic, Bearer},
    },
};
use tracing::warn;

use stowage_types::models::Permissions;

use crate::auth::{AppState, verify_session};
use crate::error::ApiError;

/// Session path: `Authorization: Bearer <jwt>`.
///
/// Verifies the signed credential, resolves the account, and attaches the
/// typed [`stowage_types::models::User`] to the request for downstream
/// handlers. Missing accounts and deactivated accounts both fail closed.
pub async fn require_session(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(bearer) = bearer.ok_or(ApiError::Unauthorized)?;

    let claims =
        verify_session(&state.secret, bearer.token()).map_err(|_| ApiError::Unauthorized)?;

    let row = state
        .db
        .get_user_by_id(claims.sub)?
        .ok_or(ApiError::Unauthorized)?;
    if !row.active {
        return Err(ApiError::Unauthorized);
    }

    req.extensions_mut().insert(row.into_model()?);
    Ok(next.run(req).await)
}

/// Token path requiring Read access.
pub async fn require_token_read(
    State(state): State<AppState>,
    basic: Option<TypedHeader<Authorization<Basic>>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    token_auth(state, Permissions::Read, basic, req, next).await
}

/// Token path requiring Write access.
pub async fn require_token_write(
    State(state): State<AppState>,
    basic: Option<TypedHeader<Authorization<Basic>>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    token_auth(state, Permissions::Write, basic, req, next).await
}

/// Token path: `Authorization: Basic base64(email:secret)`.
///
/// Every failure here is a uniform 401 — a bad email, a bad secret, an
/// inactive owner and an insufficient permission level are indistinguishable
/// to the caller, unlike the management endpoints which may 404.
async fn token_auth(
    state: AppState,
    required: Permissions,
    basic: Option<TypedHeader<Authorization<Basic>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(basic) = basic.ok_or(ApiError::Unauthorized)?;
    let email = basic.username().trim().to_lowercase();

    let (token_row, user_row) = state
        .db
        .find_token_for_auth(&email, basic.password())?
        .ok_or(ApiError::Unauthorized)?;
    if !user_row.active {
        return Err(ApiError::Unauthorized);
    }

    let token = token_row.into_model()?;
    if !token.permissions.allows(required) {
        return Err(ApiError::Unauthorized);
    }

    // Best-effort: a failed last_used write must not fail an otherwise
    // authenticated request.
    if let Err(e) = state.db.touch_token_last_used(&token.id.to_string()) {
        warn!("failed to record last_used for token {}: {e}", token.id);
    }

    req.extensions_mut().insert(user_row.into_model()?);
    req.extensions_mut().insert(token);
    Ok(next.run(req).await)
}
