use serde::{Deserialize, Serialize};

use crate::models::{ApiToken, Permissions, User};

// -- JWT Claims --

/// Session credential claims. Stateless and time-bound: the server keeps no
/// record of issued sessions, so an individual session cannot be revoked
/// short of rotating the signing secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub iat: usize,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthRequest {
    pub email: String,
    pub password: String,
}

/// Login response: user fields flattened alongside the session credential.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub user: User,
    pub token: String,
}

// -- Tokens --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewTokenRequest {
    pub name: String,
    /// Defaults to ReadWrite. Immutable once the token exists.
    #[serde(default)]
    pub permissions: Option<Permissions>,
}

/// The only shape that ever carries a plaintext secret, returned exactly
/// once at creation or reset time.
#[derive(Debug, Serialize)]
pub struct TokenSecretResponse {
    #[serde(flatten)]
    pub token: ApiToken,
    pub secret: String,
}
