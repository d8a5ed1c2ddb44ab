//! services/api/src/web/journal.rs
//!
//! The private reading journal. Entries are scoped to their author on every
//! operation; there is nothing to notify or broadcast here.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use readcircle_core::domain::{JournalDraft, JournalEntry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::middleware::AuthUser;
use crate::web::state::AppState;
use crate::web::PageQuery;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JournalPayload {
    pub title: Option<String>,
    pub content: String,
    pub book_title: Option<String>,
    pub rating: Option<u8>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JournalBody {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: Option<String>,
    pub content: String,
    pub book_title: Option<String>,
    pub rating: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<JournalEntry> for JournalBody {
    fn from(entry: JournalEntry) -> Self {
        Self {
            id: entry.id,
            author_id: entry.author_id,
            title: entry.title,
            content: entry.content,
            book_title: entry.book_title,
            rating: entry.rating,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}

fn to_draft(payload: JournalPayload) -> Result<JournalDraft, ApiError> {
    let content = payload.content.trim();
    if content.is_empty() {
        return Err(ApiError::invalid("Content is required"));
    }
    if let Some(rating) = payload.rating {
        if !(1..=5).contains(&rating) {
            return Err(ApiError::invalid("Rating must be between 1 and 5"));
        }
    }
    Ok(JournalDraft {
        title: payload.title,
        content: content.to_string(),
        book_title: payload.book_title,
        rating: payload.rating,
    })
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /journal - The acting user's entries, newest first
#[utoipa::path(
    get,
    path = "/journal",
    params(PageQuery),
    responses(
        (status = 200, description = "The acting user's journal entries", body = [JournalBody]),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn list_entries_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state
        .journal
        .list_entries_by_author(user.id, query.page())
        .await?;
    let body: Vec<JournalBody> = entries.into_iter().map(JournalBody::from).collect();
    Ok(Json(body))
}

/// POST /journal - Write a new entry
#[utoipa::path(
    post,
    path = "/journal",
    request_body = JournalPayload,
    responses(
        (status = 201, description = "Entry created", body = JournalBody),
        (status = 400, description = "Empty content or out-of-range rating"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn create_entry_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<JournalPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = to_draft(payload)?;
    let entry = state.journal.create_entry(user.id, draft).await?;
    Ok((StatusCode::CREATED, Json(JournalBody::from(entry))))
}

/// PUT /journal/{id} - Replace an entry (author only)
#[utoipa::path(
    put,
    path = "/journal/{id}",
    params(("id" = Uuid, Path, description = "The entry id")),
    request_body = JournalPayload,
    responses(
        (status = 200, description = "Entry updated", body = JournalBody),
        (status = 400, description = "Empty content or out-of-range rating"),
        (status = 404, description = "No such entry for this author"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn update_entry_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<JournalPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = to_draft(payload)?;
    let entry = state.journal.update_entry(id, user.id, draft).await?;
    Ok(Json(JournalBody::from(entry)))
}

/// DELETE /journal/{id} - Delete an entry (author only)
#[utoipa::path(
    delete,
    path = "/journal/{id}",
    params(("id" = Uuid, Path, description = "The entry id")),
    responses(
        (status = 204, description = "Entry deleted"),
        (status = 404, description = "No such entry for this author"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn delete_entry_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.journal.delete_entry(id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
