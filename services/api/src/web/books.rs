//! services/api/src/web/books.rs
//!
//! Owner-scoped CRUD for the personal book inventory.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use readcircle_core::domain::{Book, BookDraft, Condition};
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
pub struct BookPayload {
    pub title: String,
    pub author: Option<String>,
    pub condition: Option<String>,
    pub notes: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookBody {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub author: Option<String>,
    pub condition: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Book> for BookBody {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            owner_id: book.owner_id,
            title: book.title,
            author: book.author,
            condition: book.condition.map(|c| c.as_str().to_string()),
            notes: book.notes,
            created_at: book.created_at,
        }
    }
}

fn to_draft(payload: BookPayload) -> Result<BookDraft, ApiError> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(ApiError::invalid("Title is required"));
    }
    let condition = payload
        .condition
        .as_deref()
        .map(|raw| {
            Condition::parse(raw)
                .ok_or_else(|| ApiError::invalid("Condition must be one of new, good, fair, poor"))
        })
        .transpose()?;
    Ok(BookDraft {
        title: title.to_string(),
        author: payload.author,
        condition,
        notes: payload.notes,
    })
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /books - List the acting user's inventory, newest first
#[utoipa::path(
    get,
    path = "/books",
    params(PageQuery),
    responses(
        (status = 200, description = "The acting user's books", body = [BookBody]),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn list_books_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let books = state.books.list_books_by_owner(user.id, query.page()).await?;
    let body: Vec<BookBody> = books.into_iter().map(BookBody::from).collect();
    Ok(Json(body))
}

/// POST /books - Add a book to the inventory
#[utoipa::path(
    post,
    path = "/books",
    request_body = BookPayload,
    responses(
        (status = 201, description = "Book created", body = BookBody),
        (status = 400, description = "Missing title or unknown condition"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn create_book_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<BookPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = to_draft(payload)?;
    let book = state.books.create_book(user.id, draft).await?;
    Ok((StatusCode::CREATED, Json(BookBody::from(book))))
}

/// GET /books/{id} - Fetch one book from the acting user's inventory
#[utoipa::path(
    get,
    path = "/books/{id}",
    params(("id" = Uuid, Path, description = "The book id")),
    responses(
        (status = 200, description = "The book", body = BookBody),
        (status = 404, description = "No such book in this user's inventory"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn get_book_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let book = state.books.get_book_by_id(id).await?;
    // Inventory is private; someone else's book reads as absent.
    if book.owner_id != user.id {
        return Err(ApiError::not_found(format!("Book {id} not found")));
    }
    Ok(Json(BookBody::from(book)))
}

/// PUT /books/{id} - Replace a book's fields
#[utoipa::path(
    put,
    path = "/books/{id}",
    params(("id" = Uuid, Path, description = "The book id")),
    request_body = BookPayload,
    responses(
        (status = 200, description = "Updated book", body = BookBody),
        (status = 400, description = "Missing title or unknown condition"),
        (status = 404, description = "No such book in this user's inventory"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn update_book_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<BookPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = to_draft(payload)?;
    let book = state.books.update_book(id, user.id, draft).await?;
    Ok(Json(BookBody::from(book)))
}

/// DELETE /books/{id} - Remove a book from the inventory
#[utoipa::path(
    delete,
    path = "/books/{id}",
    params(("id" = Uuid, Path, description = "The book id")),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 404, description = "No such book in this user's inventory"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn delete_book_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.books.delete_book(id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
