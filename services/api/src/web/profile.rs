//! services/api/src/web/profile.rs
//!
//! The acting user's profile, plus the public profile view with computed
//! inventory/marketplace/lending stats.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use readcircle_core::domain::{NewNotification, ProfileUpdate, User};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::middleware::AuthUser;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// The wire shape of a user, shared by the auth and profile endpoints.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserBody {
    pub id: Uuid,
    pub username: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserBody {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            name: user.name,
            email: user.email,
            bio: user.bio,
            location: user.location,
            avatar_url: user.avatar_url,
            created_at: user.created_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub avatar_url: Option<String>,
}

/// Another user's profile as shown to the rest of the circle. No email.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfileBody {
    pub id: Uuid,
    pub username: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub stats: ProfileStats,
}

#[derive(Serialize, ToSchema)]
pub struct ProfileStats {
    pub books: i64,
    pub listings: i64,
    pub lendings: i64,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /profile - The acting user's own profile
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "The acting user's profile", body = UserBody),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state.users.get_user_by_id(user.id).await?;
    Ok(Json(UserBody::from(profile)))
}

/// PUT /profile - Update the acting user's profile
#[utoipa::path(
    put,
    path = "/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserBody),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Apply the partial update; omitted fields keep their value
    let updated = state
        .users
        .update_profile(
            user.id,
            ProfileUpdate {
                name: req.name,
                bio: req.bio,
                location: req.location,
                avatar_url: req.avatar_url,
            },
        )
        .await?;

    // 2. Tell the user's open sessions; the dedupe window collapses rapid
    //    consecutive edits into one alert, and a failure never fails the edit
    let notice = NewNotification {
        recipient_id: user.id,
        kind: "profile_updated".to_string(),
        message: "Your profile was updated".to_string(),
        data: json!({}),
        correlation: None,
    };
    if let Err(e) = state.notifier.create_if_not_exists(notice).await {
        warn!(user_id = %user.id, error = %e, "profile update notification failed");
    }

    Ok(Json(UserBody::from(updated)))
}

/// GET /users/{id} - A public profile with computed stats
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "The user to look up")),
    responses(
        (status = 200, description = "Public profile", body = PublicProfileBody),
        (status = 404, description = "No such user"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn public_profile_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.users.get_user_by_id(id).await?;
    let stats = ProfileStats {
        books: state.books.count_books_by_owner(id).await?,
        listings: state.listings.count_listings_by_seller(id).await?,
        lendings: state.lendings.count_lendings_by_lender(id).await?,
    };
    Ok(Json(PublicProfileBody {
        id: user.id,
        username: user.username,
        name: user.name,
        bio: user.bio,
        location: user.location,
        avatar_url: user.avatar_url,
        created_at: user.created_at,
        stats,
    }))
}
