//! crates/readcircle_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of the concrete database, realtime transport and
//! token implementation living in the api service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    AuthClaims, Book, BookDraft, CorrelationKey, GoalType, Habit, JournalDraft, JournalEntry,
    Lending, LendingDraft, Listing, ListingDraft, NewNotification, NewUser, Notification, Page,
    ProfileUpdate, User, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations, mirroring the error taxonomy
/// the HTTP layer reports: bad input, missing/foreign records, uniqueness
/// conflicts, failed auth, and everything else.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Store Ports (one per collection)
//=========================================================================================
// Ownership scoping is part of the contract: operations taking an owner or
// recipient id must report `NotFound` when the record exists but belongs to
// somebody else, so callers cannot distinguish (or probe) foreign records.
//=========================================================================================

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Creates an account; maps username/email uniqueness violations to
    /// `Conflict` so callers can prompt for a different value.
    async fn create_user(&self, user: NewUser) -> PortResult<User>;

    async fn get_user_by_id(&self, id: Uuid) -> PortResult<User>;

    async fn get_credentials_by_username(&self, username: &str) -> PortResult<UserCredentials>;

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> PortResult<User>;
}

#[async_trait]
pub trait BookStore: Send + Sync {
    async fn create_book(&self, owner_id: Uuid, draft: BookDraft) -> PortResult<Book>;

    /// Newest first.
    async fn list_books_by_owner(&self, owner_id: Uuid, page: Page) -> PortResult<Vec<Book>>;

    async fn get_book_by_id(&self, id: Uuid) -> PortResult<Book>;

    async fn update_book(&self, id: Uuid, owner_id: Uuid, draft: BookDraft) -> PortResult<Book>;

    async fn delete_book(&self, id: Uuid, owner_id: Uuid) -> PortResult<()>;

    async fn count_books_by_owner(&self, owner_id: Uuid) -> PortResult<i64>;
}

#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn create_listing(&self, seller_id: Uuid, draft: ListingDraft) -> PortResult<Listing>;

    /// Listings still open to buyers (status = available), newest first.
    async fn list_open_listings(&self, page: Page) -> PortResult<Vec<Listing>>;

    async fn list_listings_by_seller(&self, seller_id: Uuid, page: Page)
        -> PortResult<Vec<Listing>>;

    async fn get_listing_by_id(&self, id: Uuid) -> PortResult<Listing>;

    /// Atomic available -> confirmed transition stamping the buyer and
    /// `confirmed_at`. `Conflict` when the listing is no longer available,
    /// `Validation` when the buyer is the seller.
    async fn confirm_listing(
        &self,
        id: Uuid,
        buyer_id: Uuid,
        at: DateTime<Utc>,
    ) -> PortResult<Listing>;

    /// Atomic confirmed -> available transition clearing buyer and
    /// `confirmed_at`. Only the seller or the reserving buyer may cancel.
    async fn cancel_listing(&self, id: Uuid, party_id: Uuid) -> PortResult<Listing>;

    /// Atomic confirmed -> sold transition, seller only. Clears
    /// `confirmed_at` (the stamp belongs to the confirmed state alone).
    async fn complete_listing(&self, id: Uuid, seller_id: Uuid) -> PortResult<Listing>;

    async fn delete_listing(&self, id: Uuid, seller_id: Uuid) -> PortResult<()>;

    /// Deletes every listing confirmed before `cutoff` and returns the count.
    /// Listings with no `confirmed_at` are never matched, whatever their
    /// status says.
    async fn delete_expired_listings(&self, cutoff: DateTime<Utc>) -> PortResult<u64>;

    async fn count_listings_by_seller(&self, seller_id: Uuid) -> PortResult<i64>;
}

#[async_trait]
pub trait LendingStore: Send + Sync {
    async fn create_lending(&self, lender_id: Uuid, draft: LendingDraft) -> PortResult<Lending>;

    /// Everything the user participates in, as lender or borrower.
    async fn list_lendings_for_user(&self, user_id: Uuid, page: Page) -> PortResult<Vec<Lending>>;

    async fn get_lending_by_id(&self, id: Uuid) -> PortResult<Lending>;

    /// Atomic lent -> returned transition, lender only.
    async fn mark_lending_returned(
        &self,
        id: Uuid,
        lender_id: Uuid,
        at: DateTime<Utc>,
    ) -> PortResult<Lending>;

    async fn delete_lending(&self, id: Uuid, lender_id: Uuid) -> PortResult<()>;

    /// Unreturned lendings whose due date already passed.
    async fn find_overdue_lendings(&self, now: DateTime<Utc>) -> PortResult<Vec<Lending>>;

    /// Unreturned lendings due inside [start, end).
    async fn find_lendings_due_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PortResult<Vec<Lending>>;

    async fn count_lendings_by_lender(&self, lender_id: Uuid) -> PortResult<i64>;
}

#[async_trait]
pub trait JournalStore: Send + Sync {
    async fn create_entry(&self, author_id: Uuid, draft: JournalDraft) -> PortResult<JournalEntry>;

    /// Newest first.
    async fn list_entries_by_author(
        &self,
        author_id: Uuid,
        page: Page,
    ) -> PortResult<Vec<JournalEntry>>;

    async fn update_entry(
        &self,
        id: Uuid,
        author_id: Uuid,
        draft: JournalDraft,
    ) -> PortResult<JournalEntry>;

    async fn delete_entry(&self, id: Uuid, author_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait HabitStore: Send + Sync {
    /// Creates the user's habit or, if one exists, overwrites the goal fields
    /// only - progress, streak and last_updated are untouched by a goal edit.
    async fn upsert_habit_goal(
        &self,
        user_id: Uuid,
        goal_type: GoalType,
        goal_value: u32,
        now: DateTime<Utc>,
    ) -> PortResult<Habit>;

    async fn get_habit_by_user(&self, user_id: Uuid) -> PortResult<Habit>;

    /// Writes back progress/streak/last_updated after a progress update.
    async fn save_habit(&self, habit: &Habit) -> PortResult<()>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_notification(&self, new: NewNotification) -> PortResult<Notification>;

    /// The dedupe probe: the most recent notification for this recipient and
    /// kind created at or after `since`, additionally matching the
    /// correlation key when one is given.
    async fn find_recent_notification(
        &self,
        recipient_id: Uuid,
        kind: &str,
        since: DateTime<Utc>,
        correlation: Option<&CorrelationKey>,
    ) -> PortResult<Option<Notification>>;

    /// Newest first; optionally only unread.
    async fn list_notifications(
        &self,
        recipient_id: Uuid,
        unread_only: bool,
        page: Page,
    ) -> PortResult<Vec<Notification>>;

    /// Atomic conditional read-flip. `NotFound` when the notification does
    /// not belong to the recipient; already-read notifications flip quietly.
    async fn mark_notification_read(&self, id: Uuid, recipient_id: Uuid)
        -> PortResult<Notification>;

    /// Marks every unread notification read; returns how many were affected.
    async fn mark_all_notifications_read(&self, recipient_id: Uuid) -> PortResult<u64>;

    async fn count_unread_notifications(&self, recipient_id: Uuid) -> PortResult<i64>;
}

//=========================================================================================
// Collaborator Ports
//=========================================================================================

/// The realtime fan-out channel: fire-and-forget room-scoped publishing.
/// Callers treat failures as non-fatal; persistence stays authoritative.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, room: &str, event: &str, payload: serde_json::Value)
        -> PortResult<()>;
}

/// Bearer-token issue/verify. Verification failures of any sort (bad
/// signature, expired, malformed) surface as `Unauthorized`.
pub trait TokenService: Send + Sync {
    fn issue(&self, user_id: Uuid, username: &str) -> PortResult<String>;

    fn verify(&self, token: &str) -> PortResult<AuthClaims>;
}
