use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use stowage_types::api::{NewTokenRequest, TokenSecretResponse};
use stowage_types::models::{ApiToken, Permissions, User};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::secret::{SECRET_LEN, generate_secret};

const MAX_TOKEN_NAME_LEN: usize = 64;

/// GET /user/tokens — the caller's tokens, oldest first.
pub async fn list_tokens(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<ApiToken>>, ApiError> {
    let tokens = state
        .db
        .list_tokens(user.id)?
        .into_iter()
        .map(|row| row.into_model())
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Json(tokens))
}

/// POST /user/tokens/new — mint a token. The plaintext secret appears in
/// this response and never again.
pub async fn create_token(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<NewTokenRequest>,
) -> Result<Json<TokenSecretResponse>, ApiError> {
    if req.name.is_empty() || req.name.len() > MAX_TOKEN_NAME_LEN {
        return Err(ApiError::Validation(format!(
            "token name must be between 1 and {MAX_TOKEN_NAME_LEN} characters"
        )));
    }

    let permissions = req.permissions.unwrap_or(Permissions::ReadWrite);
    let id = Uuid::new_v4();
    let secret = generate_secret(SECRET_LEN);

    let row = state.db.insert_token(
        &id.to_string(),
        user.id,
        &req.name,
        &secret,
        &permissions.to_string(),
    )?;

    Ok(Json(TokenSecretResponse {
        token: row.into_model()?,
        secret,
    }))
}

/// GET /user/tokens/{id}. A cross-user id is a plain 404.
pub async fn get_token(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<ApiToken>, ApiError> {
    let id = parse_token_id(&id)?;
    let row = state
        .db
        .get_token(user.id, &id.to_string())?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(row.into_model()?))
}

/// POST /user/tokens/{id}/reset — rotate the secret in place. The old secret
/// stops authenticating the moment the update lands.
pub async fn reset_token(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<TokenSecretResponse>, ApiError> {
    let id = parse_token_id(&id)?;
    let secret = generate_secret(SECRET_LEN);

    let row = state
        .db
        .reset_token_secret(user.id, &id.to_string(), &secret)?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(TokenSecretResponse {
        token: row.into_model()?,
        secret,
    }))
}

/// DELETE /user/tokens/{id} — hard delete; revoking twice is a 404 the
/// second time.
pub async fn revoke_token(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<(), ApiError> {
    let id = parse_token_id(&id)?;
    if !state.db.delete_token(user.id, &id.to_string())? {
        return Err(ApiError::NotFound);
    }
    Ok(())
}

/// Malformed ids resolve exactly like absent ones.
fn parse_token_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound)
}
