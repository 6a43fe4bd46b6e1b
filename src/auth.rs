use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::routes::api::AppState;

/// Hex SHA-256 of a bearer token.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// True when `presented` matches `secret`. Compares fixed-length digests so
/// the comparison does not depend on where the raw strings first differ.
pub fn token_matches(presented: &str, secret: &str) -> bool {
    let a = hash_token(presented);
    let b = hash_token(secret);
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Middleware that validates the Bearer token against the trigger secret.
/// A deployment without a secret lets every request through.
pub async fn require_trigger_secret(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(secret) = state.trigger_secret.as_deref() else {
        return Ok(next.run(request).await);
    };

    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized)?;

    if !token_matches(token, secret) {
        tracing::warn!("rejected trigger call with a wrong secret");
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}
