use std::sync::{Arc, LazyLock};

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use regex::Regex;

use stowage_blobstore::BlobStore;
use stowage_db::Database;
use stowage_types::api::{AuthRequest, AuthResponse, Claims};
use stowage_types::models::{PlanQuotas, User};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub blobs: BlobStore,
    /// Process-wide symmetric signing secret, immutable after startup.
    pub secret: String,
    pub quotas: PlanQuotas,
}

/// Fixed session lifetime. Sessions are stateless, so shortening this is the
/// only lever against a leaked credential short of rotating the secret.
const SESSION_TTL_DAYS: i64 = 7;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_EMAIL_LEN: usize = 64;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email regex")
});

// -- Session credentials --

pub fn issue_session(secret: &str, user_id: i64) -> anyhow::Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        iat: now.timestamp() as usize,
        exp: (now + Duration::days(SESSION_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Validate signature and expiry. Zero leeway: a credential one second past
/// `exp` is already dead.
pub fn verify_session(secret: &str, token: &str) -> jsonwebtoken::errors::Result<Claims> {
    let mut validation = Validation::default();
    validation.leeway = 0;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;

    Ok(data.claims)
}

// -- Password hashing --

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let digest = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?
        .to_string();
    Ok(digest)
}

pub fn verify_password(password: &str, digest: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(digest) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

// -- Handlers --

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<AuthRequest>,
) -> Result<Json<User>, ApiError> {
    let email = req.email.trim().to_lowercase();
    validate_credentials(&email, &req.password)?;

    let digest = hash_password(&req.password)?;

    let row = state.db.create_user(&email, &digest).map_err(|e| {
        if stowage_db::is_unique_violation(&e) {
            ApiError::DuplicateEmail
        } else {
            ApiError::Internal(e)
        }
    })?;

    Ok(Json(row.into_model()?))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<AuthRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let email = req.email.trim().to_lowercase();

    // Unknown email and wrong password produce the same error: callers must
    // not be able to enumerate accounts from the response.
    let row = state
        .db
        .get_user_by_email(&email)?
        .ok_or(ApiError::InvalidCredentials)?;

    if !verify_password(&req.password, &row.password) {
        return Err(ApiError::InvalidCredentials);
    }

    let user = row.into_model()?;
    let token = issue_session(&state.secret, user.id)?;

    Ok(Json(AuthResponse { user, token }))
}

/// GET /user/me — the session-authenticated account.
pub async fn me(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}

fn validate_credentials(email: &str, password: &str) -> Result<(), ApiError> {
    if email.len() > MAX_EMAIL_LEN || !EMAIL_RE.is_match(email) {
        return Err(ApiError::Validation("invalid email address".into()));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::errors::ErrorKind;

    #[test]
    fn password_digest_differs_from_plaintext_and_verifies() {
        let digest = hash_password("password123").unwrap();
        assert_ne!(digest, "password123");
        assert!(verify_password("password123", &digest));
        assert!(!verify_password("password124", &digest));
        assert!(!verify_password("password123", "not-a-digest"));
    }

    #[test]
    fn session_round_trips_and_carries_the_user() {
        let token = issue_session("s3cret", 42).unwrap();
        let claims = verify_session("s3cret", &token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn session_with_wrong_secret_is_invalid() {
        let token = issue_session("s3cret", 42).unwrap();
        let err = verify_session("other", &token).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidSignature));
    }

    #[test]
    fn session_expiry_boundary() {
        let now = Utc::now().timestamp() as usize;

        let live = Claims {
            sub: 1,
            iat: now,
            exp: now + 30,
        };
        let token = encode(
            &Header::default(),
            &live,
            &EncodingKey::from_secret(b"s3cret"),
        )
        .unwrap();
        assert!(verify_session("s3cret", &token).is_ok());

        let expired = Claims {
            sub: 1,
            iat: now - 60,
            exp: now - 1,
        };
        let token = encode(
            &Header::default(),
            &expired,
            &EncodingKey::from_secret(b"s3cret"),
        )
        .unwrap();
        let err = verify_session("s3cret", &token).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ExpiredSignature));
    }

    #[test]
    fn credential_validation() {
        assert!(validate_credentials("a@example.com", "password123").is_ok());
        assert!(validate_credentials("not-an-email", "password123").is_err());
        assert!(validate_credentials("@example.com", "password123").is_err());
        assert!(validate_credentials("a@example.com", "short").is_err());
        let long = format!("{}@example.com", "a".repeat(MAX_EMAIL_LEN));
        assert!(validate_credentials(&long, "password123").is_err());
    }
}
