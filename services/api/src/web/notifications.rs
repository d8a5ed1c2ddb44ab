//! services/api/src/web/notifications.rs
//!
//! The notification inbox. Reads go straight to the store; the two mark-read
//! operations run through the notification engine so open connections hear
//! about the change.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use readcircle_core::domain::{Notification, Page};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::middleware::AuthUser;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationsQuery {
    /// When true, only unread notifications are returned.
    pub unread_only: Option<bool>,
    /// Page size, at most 100.
    pub limit: Option<i64>,
    /// Records to skip.
    pub offset: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct CorrelationBody {
    pub kind: String,
    pub id: Uuid,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationBody {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub kind: String,
    pub message: String,
    pub data: serde_json::Value,
    pub correlation: Option<CorrelationBody>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Notification> for NotificationBody {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id,
            recipient_id: n.recipient_id,
            kind: n.kind,
            message: n.message,
            data: n.data,
            correlation: n.correlation.map(|c| CorrelationBody {
                kind: c.kind.as_str().to_string(),
                id: c.id,
            }),
            read: n.read,
            created_at: n.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct UnreadCountResponse {
    pub count: i64,
}

#[derive(Serialize, ToSchema)]
pub struct MarkAllReadResponse {
    pub count: u64,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /notifications - The acting user's notifications, newest first
#[utoipa::path(
    get,
    path = "/notifications",
    params(NotificationsQuery),
    responses(
        (status = 200, description = "Notifications for the acting user", body = [NotificationBody]),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn list_notifications_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<NotificationsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = Page::clamped(query.limit, query.offset);
    let notifications = state
        .notifications
        .list_notifications(user.id, query.unread_only.unwrap_or(false), page)
        .await?;
    let body: Vec<NotificationBody> = notifications
        .into_iter()
        .map(NotificationBody::from)
        .collect();
    Ok(Json(body))
}

/// GET /notifications/unread-count - Badge count for the inbox icon
#[utoipa::path(
    get,
    path = "/notifications/unread-count",
    responses(
        (status = 200, description = "How many notifications are unread", body = UnreadCountResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn unread_count_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let count = state.notifications.count_unread_notifications(user.id).await?;
    Ok(Json(UnreadCountResponse { count }))
}

/// POST /notifications/{id}/read - Mark one notification read
#[utoipa::path(
    post,
    path = "/notifications/{id}/read",
    params(("id" = Uuid, Path, description = "The notification id")),
    responses(
        (status = 200, description = "The notification, now read", body = NotificationBody),
        (status = 404, description = "No such notification for this user"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn mark_read_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let notification = state.notifier.mark_read(user.id, id).await?;
    Ok(Json(NotificationBody::from(notification)))
}

/// POST /notifications/read-all - Mark the whole inbox read
#[utoipa::path(
    post,
    path = "/notifications/read-all",
    responses(
        (status = 200, description = "How many notifications were flipped", body = MarkAllReadResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn mark_all_read_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let count = state.notifier.mark_all_read(user.id).await?;
    Ok(Json(MarkAllReadResponse { count }))
}
