pub mod auth;
pub mod books;
pub mod habits;
pub mod journal;
pub mod lendings;
pub mod listings;
pub mod middleware;
pub mod notifications;
pub mod profile;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

// Re-export the shared plumbing so handler modules and the binaries reach it
// as `crate::web::*`.
pub use middleware::require_auth;
pub use rest::{wire_value, ApiDoc, PageQuery};
pub use ws_handler::ws_handler;

use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use state::AppState;

/// Builds the complete application router: public auth + WebSocket routes,
/// the token-guarded API surface, CORS, and the Swagger UI. Tests drive the
/// same router the binary serves.
pub fn router(app_state: Arc<AppState>) -> Router {
    let origin = app_state
        .config
        .cors_origin
        .parse::<HeaderValue>()
        .unwrap_or_else(|_| {
            warn!(
                origin = %app_state.config.cors_origin,
                "CORS_ORIGIN is not a valid header value; falling back to localhost"
            );
            HeaderValue::from_static("http://localhost:3000")
        });
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Public routes (no auth required). The WebSocket route authenticates
    // itself from the `?token=` query parameter.
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/ws", get(ws_handler::ws_handler));

    // Protected routes (bearer token required)
    let protected_routes = Router::new()
        .route(
            "/books",
            get(books::list_books_handler).post(books::create_book_handler),
        )
        .route(
            "/books/{id}",
            get(books::get_book_handler)
                .put(books::update_book_handler)
                .delete(books::delete_book_handler),
        )
        .route(
            "/listings",
            get(listings::list_open_handler).post(listings::create_listing_handler),
        )
        .route("/listings/mine", get(listings::list_mine_handler))
        .route("/listings/expired", delete(listings::sweep_expired_handler))
        .route("/listings/{id}", delete(listings::delete_listing_handler))
        .route(
            "/listings/{id}/confirm",
            post(listings::confirm_listing_handler),
        )
        .route(
            "/listings/{id}/cancel",
            post(listings::cancel_listing_handler),
        )
        .route(
            "/listings/{id}/complete",
            post(listings::complete_listing_handler),
        )
        .route(
            "/lendings",
            get(lendings::list_lendings_handler).post(lendings::create_lending_handler),
        )
        .route("/lendings/{id}", delete(lendings::delete_lending_handler))
        .route(
            "/lendings/{id}/return",
            post(lendings::return_lending_handler),
        )
        .route(
            "/journal",
            get(journal::list_entries_handler).post(journal::create_entry_handler),
        )
        .route(
            "/journal/{id}",
            put(journal::update_entry_handler).delete(journal::delete_entry_handler),
        )
        .route(
            "/habits",
            get(habits::get_habit_handler).put(habits::set_habit_handler),
        )
        .route("/habits/progress", post(habits::update_progress_handler))
        .route(
            "/profile",
            get(profile::get_profile_handler).put(profile::update_profile_handler),
        )
        .route("/users/{id}", get(profile::public_profile_handler))
        .route(
            "/notifications",
            get(notifications::list_notifications_handler),
        )
        .route(
            "/notifications/unread-count",
            get(notifications::unread_count_handler),
        )
        .route(
            "/notifications/read-all",
            post(notifications::mark_all_read_handler),
        )
        .route(
            "/notifications/{id}/read",
            post(notifications::mark_read_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
