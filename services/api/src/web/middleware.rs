//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;

/// The acting identity, extracted from a verified bearer token and made
/// available to handlers through request extensions.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
}

/// Middleware that validates the `Authorization: Bearer` header.
///
/// If valid, inserts an `AuthUser` into request extensions for handlers to
/// use. If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Extract the Authorization header
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing authorization header"))?;

    // 2. Strip the Bearer scheme
    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("Expected a bearer token"))?;

    // 3. Verify the token and extract the acting identity
    let claims = state.tokens.verify(token)?;

    // 4. Insert the identity into request extensions
    req.extensions_mut().insert(AuthUser {
        id: claims.user_id,
        username: claims.username,
    });

    // 5. Continue to the handler
    Ok(next.run(req).await)
}
