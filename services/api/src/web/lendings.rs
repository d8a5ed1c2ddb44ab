//! services/api/src/web/lendings.rs
//!
//! Physical lending records: who has which book and when it is due. The book
//! can be named free-text, referenced from the lender's inventory, or both;
//! the borrower is optional so loans to people outside the system still get
//! tracked. Creating and returning notify the borrower and publish
//! `lending:update` to both parties.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use readcircle_core::domain::{
    CorrelationKey, CorrelationKind, Lending, LendingDraft, NewNotification,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::middleware::AuthUser;
use crate::web::state::AppState;
use crate::web::{wire_value, PageQuery};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LendingPayload {
    pub borrower_id: Option<Uuid>,
    pub book_id: Option<Uuid>,
    pub book_title: Option<String>,
    pub author: Option<String>,
    pub due_date: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LendingBody {
    pub id: Uuid,
    pub lender_id: Uuid,
    pub lender_username: String,
    pub borrower_id: Option<Uuid>,
    pub borrower_username: Option<String>,
    pub book_id: Option<Uuid>,
    pub book_title: Option<String>,
    pub author: Option<String>,
    pub due_date: DateTime<Utc>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl From<Lending> for LendingBody {
    fn from(lending: Lending) -> Self {
        Self {
            id: lending.id,
            lender_id: lending.lender_id,
            lender_username: lending.lender_username,
            borrower_id: lending.borrower_id,
            borrower_username: lending.borrower_username,
            book_id: lending.book_id,
            book_title: lending.book_title,
            author: lending.author,
            due_date: lending.due_date,
            status: lending.status.as_str().to_string(),
            created_at: lending.created_at,
            returned_at: lending.returned_at,
        }
    }
}

/// Looks up the inventory book only when the lending carries no free-text
/// title of its own.
async fn resolve_title(state: &AppState, lending: &Lending) -> String {
    let book = match (&lending.book_title, lending.book_id) {
        (None, Some(book_id)) => state.books.get_book_by_id(book_id).await.ok(),
        _ => None,
    };
    lending.display_title(book.as_ref())
}

/// Notifies the borrower about a lending event; failures are logged and never
/// fail the request.
async fn notify_borrower(
    state: &AppState,
    borrower_id: Uuid,
    kind: &str,
    message: String,
    lending: &Lending,
    title: &str,
) {
    let notice = NewNotification {
        recipient_id: borrower_id,
        kind: kind.to_string(),
        message,
        data: json!({
            "lendingId": lending.id,
            "bookTitle": title,
            "dueDate": lending.due_date,
        }),
        correlation: Some(CorrelationKey {
            kind: CorrelationKind::Lending,
            id: lending.id,
        }),
    };
    if let Err(e) = state.notifier.create_if_not_exists(notice).await {
        warn!(lending_id = %lending.id, kind, error = %e, "lending notification failed");
    }
}

/// Publishes `lending:update` to the lender and, when present, the borrower.
async fn publish_update(state: &AppState, lending: &Lending, body: &LendingBody) {
    state
        .publish_to_user(lending.lender_id, "lending:update", wire_value(body))
        .await;
    if let Some(borrower_id) = lending.borrower_id {
        state
            .publish_to_user(borrower_id, "lending:update", wire_value(body))
            .await;
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /lendings - Loans the acting user is lender or borrower of
#[utoipa::path(
    get,
    path = "/lendings",
    params(PageQuery),
    responses(
        (status = 200, description = "Lendings involving the acting user", body = [LendingBody]),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn list_lendings_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let lendings = state
        .lendings
        .list_lendings_for_user(user.id, query.page())
        .await?;
    let body: Vec<LendingBody> = lendings.into_iter().map(LendingBody::from).collect();
    Ok(Json(body))
}

/// POST /lendings - Record a loan
#[utoipa::path(
    post,
    path = "/lendings",
    request_body = LendingPayload,
    responses(
        (status = 201, description = "Lending recorded", body = LendingBody),
        (status = 400, description = "Neither a book title nor a book id was given"),
        (status = 404, description = "Referenced book or borrower does not exist"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn create_lending_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<LendingPayload>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. The book must be identified one way or the other
    let book_title = payload
        .book_title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    if book_title.is_none() && payload.book_id.is_none() {
        return Err(ApiError::invalid(
            "Either a book title or a book id is required",
        ));
    }

    // 2. A referenced inventory book must be the lender's own
    if let Some(book_id) = payload.book_id {
        let book = state.books.get_book_by_id(book_id).await?;
        if book.owner_id != user.id {
            return Err(ApiError::not_found("Book not found"));
        }
    }

    // 3. A referenced borrower must exist and cannot be the lender
    if let Some(borrower_id) = payload.borrower_id {
        if borrower_id == user.id {
            return Err(ApiError::invalid("You cannot lend a book to yourself"));
        }
        state.users.get_user_by_id(borrower_id).await?;
    }

    let draft = LendingDraft {
        borrower_id: payload.borrower_id,
        book_id: payload.book_id,
        book_title,
        author: payload.author,
        due_date: payload.due_date,
    };
    let lending = state.lendings.create_lending(user.id, draft).await?;

    // 4. Tell the borrower and both parties' open connections
    if let Some(borrower_id) = lending.borrower_id {
        let title = resolve_title(&state, &lending).await;
        let due = lending.due_date.format("%Y-%m-%d");
        notify_borrower(
            &state,
            borrower_id,
            "lending_created",
            format!("{} lent you \"{title}\" - due {due}", user.username),
            &lending,
            &title,
        )
        .await;
    }
    let body = LendingBody::from(lending.clone());
    publish_update(&state, &lending, &body).await;
    Ok((StatusCode::CREATED, Json(body)))
}

/// POST /lendings/{id}/return - Mark a loan returned (lender only)
#[utoipa::path(
    post,
    path = "/lendings/{id}/return",
    params(("id" = Uuid, Path, description = "The lending id")),
    responses(
        (status = 200, description = "Lending marked returned", body = LendingBody),
        (status = 404, description = "No such lending for this lender"),
        (status = 409, description = "Lending was already returned"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn return_lending_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Atomic transition: lent -> returned, lender only
    let lending = state
        .lendings
        .mark_lending_returned(id, user.id, Utc::now())
        .await?;

    // 2. Tell the borrower the loan is settled
    if let Some(borrower_id) = lending.borrower_id {
        let title = resolve_title(&state, &lending).await;
        notify_borrower(
            &state,
            borrower_id,
            "lending_returned",
            format!("{} marked \"{title}\" as returned", user.username),
            &lending,
            &title,
        )
        .await;
    }

    let body = LendingBody::from(lending.clone());
    publish_update(&state, &lending, &body).await;
    Ok(Json(body))
}

/// DELETE /lendings/{id} - Remove a lending record (lender only)
#[utoipa::path(
    delete,
    path = "/lendings/{id}",
    params(("id" = Uuid, Path, description = "The lending id")),
    responses(
        (status = 204, description = "Lending deleted"),
        (status = 404, description = "No such lending for this lender"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn delete_lending_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.lendings.delete_lending(id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
