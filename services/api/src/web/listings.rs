//! services/api/src/web/listings.rs
//!
//! The marketplace surface: open listings, the confirm/cancel/complete
//! lifecycle, and the on-demand expiry sweep. Transitions notify the
//! counterparty through the notification engine and publish `listing:*`
//! events to the shared broadcast topic.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use readcircle_core::domain::{
    Condition, CorrelationKey, CorrelationKind, Listing, ListingDraft, NewNotification,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::middleware::AuthUser;
use crate::web::protocol::LISTINGS_TOPIC;
use crate::web::state::AppState;
use crate::web::{wire_value, PageQuery};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListingPayload {
    pub title: String,
    pub author: Option<String>,
    pub condition: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListingBody {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub seller_username: String,
    pub buyer_id: Option<Uuid>,
    pub title: String,
    pub author: Option<String>,
    pub condition: String,
    pub status: String,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Listing> for ListingBody {
    fn from(listing: Listing) -> Self {
        Self {
            id: listing.id,
            seller_id: listing.seller_id,
            seller_username: listing.seller_username,
            buyer_id: listing.buyer_id,
            title: listing.title,
            author: listing.author,
            condition: listing.condition.as_str().to_string(),
            status: listing.status.as_str().to_string(),
            confirmed_at: listing.confirmed_at,
            created_at: listing.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SweepResponse {
    pub deleted: u64,
}

fn to_draft(payload: ListingPayload) -> Result<ListingDraft, ApiError> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(ApiError::invalid("Title is required"));
    }
    let condition = Condition::parse(&payload.condition)
        .ok_or_else(|| ApiError::invalid("Condition must be one of new, good, fair, poor"))?;
    Ok(ListingDraft {
        title: title.to_string(),
        author: payload.author,
        condition,
    })
}

/// Notifies one party about a lifecycle transition; failures are logged and
/// never fail the transition itself.
async fn notify_party(
    state: &AppState,
    recipient_id: Uuid,
    kind: &str,
    message: String,
    listing_id: Uuid,
    title: &str,
) {
    let notice = NewNotification {
        recipient_id,
        kind: kind.to_string(),
        message,
        data: json!({ "listingId": listing_id, "title": title }),
        correlation: Some(CorrelationKey {
            kind: CorrelationKind::Listing,
            id: listing_id,
        }),
    };
    if let Err(e) = state.notifier.create_if_not_exists(notice).await {
        warn!(listing_id = %listing_id, kind, error = %e, "listing notification failed");
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /listings - Browse open listings, newest first
#[utoipa::path(
    get,
    path = "/listings",
    params(PageQuery),
    responses(
        (status = 200, description = "Listings currently available", body = [ListingBody]),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn list_open_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let listings = state.listings.list_open_listings(query.page()).await?;
    let body: Vec<ListingBody> = listings.into_iter().map(ListingBody::from).collect();
    Ok(Json(body))
}

/// GET /listings/mine - The acting user's own listings, any status
#[utoipa::path(
    get,
    path = "/listings/mine",
    params(PageQuery),
    responses(
        (status = 200, description = "The acting user's listings", body = [ListingBody]),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn list_mine_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let listings = state
        .listings
        .list_listings_by_seller(user.id, query.page())
        .await?;
    let body: Vec<ListingBody> = listings.into_iter().map(ListingBody::from).collect();
    Ok(Json(body))
}

/// POST /listings - Offer a book for sale or exchange
#[utoipa::path(
    post,
    path = "/listings",
    request_body = ListingPayload,
    responses(
        (status = 201, description = "Listing created", body = ListingBody),
        (status = 400, description = "Missing title or unknown condition"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn create_listing_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ListingPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = to_draft(payload)?;
    let listing = state.listings.create_listing(user.id, draft).await?;
    let body = ListingBody::from(listing);
    state
        .publish_event(LISTINGS_TOPIC, "listing:created", wire_value(&body))
        .await;
    Ok((StatusCode::CREATED, Json(body)))
}

/// POST /listings/{id}/confirm - Reserve an available listing as buyer
#[utoipa::path(
    post,
    path = "/listings/{id}/confirm",
    params(("id" = Uuid, Path, description = "The listing id")),
    responses(
        (status = 200, description = "Listing reserved", body = ListingBody),
        (status = 400, description = "Sellers cannot reserve their own listing"),
        (status = 404, description = "No such listing"),
        (status = 409, description = "Listing is no longer available"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn confirm_listing_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Atomic transition: available -> confirmed, stamping buyer and time
    let listing = state
        .listings
        .confirm_listing(id, user.id, Utc::now())
        .await?;

    // 2. Tell the seller
    notify_party(
        &state,
        listing.seller_id,
        "listing_confirmed",
        format!("{} reserved \"{}\"", user.username, listing.title),
        listing.id,
        &listing.title,
    )
    .await;

    // 3. Announce to the marketplace topic
    let body = ListingBody::from(listing);
    state
        .publish_event(LISTINGS_TOPIC, "listing:confirmed", wire_value(&body))
        .await;
    Ok(Json(body))
}

/// POST /listings/{id}/cancel - Release a reservation (either party)
#[utoipa::path(
    post,
    path = "/listings/{id}/cancel",
    params(("id" = Uuid, Path, description = "The listing id")),
    responses(
        (status = 200, description = "Listing back to available", body = ListingBody),
        (status = 404, description = "No such listing for this user"),
        (status = 409, description = "Listing is not reserved"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn cancel_listing_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Remember who held the reservation; cancelling clears the buyer
    let before = state.listings.get_listing_by_id(id).await?;

    // 2. Atomic transition: confirmed -> available, seller or buyer only
    let listing = state.listings.cancel_listing(id, user.id).await?;

    // 3. Tell the other party
    let counterparty = if user.id == before.seller_id {
        before.buyer_id
    } else {
        Some(before.seller_id)
    };
    if let Some(recipient) = counterparty.filter(|r| *r != user.id) {
        notify_party(
            &state,
            recipient,
            "listing_cancelled",
            format!(
                "{} cancelled the reservation on \"{}\"",
                user.username, listing.title
            ),
            listing.id,
            &listing.title,
        )
        .await;
    }

    // 4. Announce to the marketplace topic
    let body = ListingBody::from(listing);
    state
        .publish_event(LISTINGS_TOPIC, "listing:cancelled", wire_value(&body))
        .await;
    Ok(Json(body))
}

/// POST /listings/{id}/complete - Finalise a reserved listing as sold
#[utoipa::path(
    post,
    path = "/listings/{id}/complete",
    params(("id" = Uuid, Path, description = "The listing id")),
    responses(
        (status = 200, description = "Listing sold", body = ListingBody),
        (status = 404, description = "No such listing for this seller"),
        (status = 409, description = "Listing is not reserved"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn complete_listing_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Atomic transition: confirmed -> sold, seller only
    let listing = state.listings.complete_listing(id, user.id).await?;

    // 2. Tell the buyer the sale went through
    if let Some(buyer_id) = listing.buyer_id {
        notify_party(
            &state,
            buyer_id,
            "listing_sold",
            format!("{} marked \"{}\" as sold to you", user.username, listing.title),
            listing.id,
            &listing.title,
        )
        .await;
    }

    // 3. Announce to the marketplace topic
    let body = ListingBody::from(listing);
    state
        .publish_event(LISTINGS_TOPIC, "listing:completed", wire_value(&body))
        .await;
    Ok(Json(body))
}

/// DELETE /listings/{id} - Withdraw a listing (seller only)
#[utoipa::path(
    delete,
    path = "/listings/{id}",
    params(("id" = Uuid, Path, description = "The listing id")),
    responses(
        (status = 204, description = "Listing removed"),
        (status = 404, description = "No such listing for this seller"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn delete_listing_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.listings.delete_listing(id, user.id).await?;
    state
        .publish_event(LISTINGS_TOPIC, "listing:removed", json!({ "id": id }))
        .await;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /listings/expired - Run the expiry sweep on demand
#[utoipa::path(
    delete,
    path = "/listings/expired",
    responses(
        (status = 200, description = "Expired reservations removed", body = SweepResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn sweep_expired_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.sweeper.expire_confirmed_listings().await?;
    Ok(Json(SweepResponse { deleted }))
}
