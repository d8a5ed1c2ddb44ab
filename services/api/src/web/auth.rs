//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for account signup and login. Both return a
//! bearer token; there is no server-side session to invalidate.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use readcircle_core::domain::NewUser;
use readcircle_core::ports::PortError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::profile::UserBody;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserBody,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Username or password too short"),
        (status = 409, description = "Username or email already taken"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Validate the credentials before touching the store
    let username = req.username.trim();
    if username.len() < 3 {
        return Err(ApiError::invalid("Username must be at least 3 characters"));
    }
    if req.password.len() < 8 {
        return Err(ApiError::invalid("Password must be at least 8 characters"));
    }

    // 2. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            ApiError::Internal("Failed to hash password".to_string())
        })?
        .to_string();

    // 3. Create the user; a taken username or email surfaces as 409
    let user = state
        .users
        .create_user(NewUser {
            username: username.to_string(),
            password_hash,
            name: req.name,
            email: req.email,
        })
        .await?;

    // 4. Issue the bearer token
    let token = state.tokens.issue(user.id, &user.username)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: UserBody::from(user),
        }),
    ))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Look up credentials; an unknown username reads the same as a bad
    //    password from outside
    let creds = state
        .users
        .get_credentials_by_username(req.username.trim())
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => ApiError::unauthorized("Invalid username or password"),
            other => ApiError::from(other),
        })?;

    // 2. Verify the password
    let parsed_hash = PasswordHash::new(&creds.password_hash).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        ApiError::Internal("Authentication error".to_string())
    })?;
    if Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(ApiError::unauthorized("Invalid username or password"));
    }

    // 3. Issue the bearer token and return the profile
    let token = state.tokens.issue(creds.id, &creds.username)?;
    let user = state.users.get_user_by_id(creds.id).await?;

    Ok(Json(AuthResponse {
        token,
        user: UserBody::from(user),
    }))
}
