pub mod auth;
pub mod error;
pub mod files;
pub mod middleware;
pub mod secret;
pub mod tokens;

use axum::{
    Router,
    routing::{get, post},
};

use crate::auth::AppState;

/// Assemble the full HTTP surface.
///
/// Three route groups with distinct authentication: public (register/login),
/// session-authenticated account and token management, and token-authenticated
/// file endpoints split by the permission level they require.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let session = Router::new()
        .route("/user/me", get(auth::me))
        .route("/user/tokens", get(tokens::list_tokens))
        .route("/user/tokens/new", post(tokens::create_token))
        .route(
            "/user/tokens/{id}",
            get(tokens::get_token).delete(tokens::revoke_token),
        )
        .route("/user/tokens/{id}/reset", post(tokens::reset_token))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_session,
        ))
        .with_state(state.clone());

    let files_write = Router::new()
        .route("/files/upload", post(files::upload))
        .route("/files/{id}/unpin", post(files::unpin))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_token_write,
        ))
        .with_state(state.clone());

    let files_read = Router::new()
        .route("/files", get(files::list))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_token_read,
        ))
        .with_state(state);

    Router::new()
        .merge(public)
        .merge(session)
        .merge(files_write)
        .merge(files_read)
}

/// GET /health — liveness check (no auth).
async fn health() -> &'static str {
    "ok"
}
