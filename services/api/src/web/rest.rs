//! services/api/src/web/rest.rs
//!
//! Shared REST plumbing and the master definition for the OpenAPI
//! specification. The handlers themselves live in their resource modules.

use readcircle_core::domain::Page;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::books::list_books_handler,
        crate::web::books::create_book_handler,
        crate::web::books::get_book_handler,
        crate::web::books::update_book_handler,
        crate::web::books::delete_book_handler,
        crate::web::listings::list_open_handler,
        crate::web::listings::list_mine_handler,
        crate::web::listings::create_listing_handler,
        crate::web::listings::confirm_listing_handler,
        crate::web::listings::cancel_listing_handler,
        crate::web::listings::complete_listing_handler,
        crate::web::listings::delete_listing_handler,
        crate::web::listings::sweep_expired_handler,
        crate::web::lendings::list_lendings_handler,
        crate::web::lendings::create_lending_handler,
        crate::web::lendings::return_lending_handler,
        crate::web::lendings::delete_lending_handler,
        crate::web::journal::list_entries_handler,
        crate::web::journal::create_entry_handler,
        crate::web::journal::update_entry_handler,
        crate::web::journal::delete_entry_handler,
        crate::web::habits::get_habit_handler,
        crate::web::habits::set_habit_handler,
        crate::web::habits::update_progress_handler,
        crate::web::profile::get_profile_handler,
        crate::web::profile::update_profile_handler,
        crate::web::profile::public_profile_handler,
        crate::web::notifications::list_notifications_handler,
        crate::web::notifications::unread_count_handler,
        crate::web::notifications::mark_read_handler,
        crate::web::notifications::mark_all_read_handler,
    ),
    components(schemas(
        crate::web::auth::SignupRequest,
        crate::web::auth::LoginRequest,
        crate::web::auth::AuthResponse,
        crate::web::books::BookPayload,
        crate::web::books::BookBody,
        crate::web::listings::ListingPayload,
        crate::web::listings::ListingBody,
        crate::web::listings::SweepResponse,
        crate::web::lendings::LendingPayload,
        crate::web::lendings::LendingBody,
        crate::web::journal::JournalPayload,
        crate::web::journal::JournalBody,
        crate::web::habits::HabitGoalRequest,
        crate::web::habits::ProgressRequest,
        crate::web::habits::HabitBody,
        crate::web::profile::UserBody,
        crate::web::profile::UpdateProfileRequest,
        crate::web::profile::PublicProfileBody,
        crate::web::profile::ProfileStats,
        crate::web::notifications::NotificationBody,
        crate::web::notifications::CorrelationBody,
        crate::web::notifications::UnreadCountResponse,
        crate::web::notifications::MarkAllReadResponse,
    )),
    tags(
        (name = "ReadCircle API", description = "REST endpoints for book inventories, lending, the marketplace, journaling, habits and notifications.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Shared Request Plumbing
//=========================================================================================

/// Caller-supplied pagination, clamped to a sane window before it reaches a
/// store.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Page size, at most 100.
    pub limit: Option<i64>,
    /// Records to skip.
    pub offset: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> Page {
        Page::clamped(self.limit, self.offset)
    }
}

/// Serialises a response body for reuse as a realtime event payload, so the
/// REST and WebSocket views of a record never drift apart.
pub fn wire_value<T: Serialize>(body: &T) -> serde_json::Value {
    serde_json::to_value(body).unwrap_or(serde_json::Value::Null)
}
