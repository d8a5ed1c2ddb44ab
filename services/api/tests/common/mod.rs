//! services/api/tests/common/mod.rs
//!
//! Shared harness for the HTTP integration tests: an in-memory store covering
//! every port, a recording publisher, and request helpers that drive the same
//! router the binary serves.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use tracing::Level;
use uuid::Uuid;

use api_lib::adapters::{JwtTokens, WsHub};
use api_lib::config::Config;
use api_lib::engine::{NotificationEngine, Sweeper};
use api_lib::web::{self, state::AppState};
use readcircle_core::domain::{
    Book, BookDraft, Condition, CorrelationKey, GoalType, Habit, JournalDraft, JournalEntry,
    Lending, LendingDraft, LendingStatus, Listing, ListingDraft, ListingStatus, NewNotification,
    NewUser, Notification, Page, ProfileUpdate, User, UserCredentials,
};
use readcircle_core::ports::{
    BookStore, EventPublisher, HabitStore, JournalStore, LendingStore, ListingStore,
    NotificationStore, PortError, PortResult, UserStore,
};

//=========================================================================================
// In-Memory Store
//=========================================================================================

/// One row per account, password hash included the way the users table
/// carries it.
pub struct UserRow {
    pub user: User,
    pub password_hash: String,
}

/// Implements every store port in memory with the same observable behaviour
/// as the Postgres adapter: ownership scoping reads as absence, transitions
/// are guarded, uniqueness maps to conflicts. Tables are public so tests can
/// seed rows the HTTP surface cannot produce (old timestamps, mostly).
#[derive(Default)]
pub struct MemStore {
    pub users: Mutex<Vec<UserRow>>,
    pub books: Mutex<Vec<Book>>,
    pub listings: Mutex<Vec<Listing>>,
    pub lendings: Mutex<Vec<Lending>>,
    pub journal: Mutex<Vec<JournalEntry>>,
    pub habits: Mutex<Vec<Habit>>,
    pub notifications: Mutex<Vec<Notification>>,
}

impl MemStore {
    fn username_of(&self, id: Uuid) -> Option<String> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|row| row.user.id == id)
            .map(|row| row.user.username.clone())
    }
}

fn page_window<T>(rows: Vec<T>, page: Page) -> Vec<T> {
    rows.into_iter()
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .collect()
}

#[async_trait]
impl UserStore for MemStore {
    async fn create_user(&self, new_user: NewUser) -> PortResult<User> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|r| r.user.username == new_user.username) {
            return Err(PortError::Conflict("username is already taken".to_string()));
        }
        if new_user.email.is_some() && users.iter().any(|r| r.user.email == new_user.email) {
            return Err(PortError::Conflict("email is already taken".to_string()));
        }
        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            name: new_user.name,
            email: new_user.email,
            bio: None,
            location: None,
            avatar_url: None,
            created_at: Utc::now(),
        };
        users.push(UserRow {
            user: user.clone(),
            password_hash: new_user.password_hash,
        });
        Ok(user)
    }

    async fn get_user_by_id(&self, id: Uuid) -> PortResult<User> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.user.id == id)
            .map(|r| r.user.clone())
            .ok_or_else(|| PortError::NotFound(format!("User {id} not found")))
    }

    async fn get_credentials_by_username(&self, username: &str) -> PortResult<UserCredentials> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.user.username == username)
            .map(|r| UserCredentials {
                id: r.user.id,
                username: r.user.username.clone(),
                password_hash: r.password_hash.clone(),
            })
            .ok_or_else(|| PortError::NotFound(format!("User {username} not found")))
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> PortResult<User> {
        let mut users = self.users.lock().unwrap();
        let row = users
            .iter_mut()
            .find(|r| r.user.id == id)
            .ok_or_else(|| PortError::NotFound(format!("User {id} not found")))?;
        if let Some(name) = update.name {
            row.user.name = Some(name);
        }
        if let Some(bio) = update.bio {
            row.user.bio = Some(bio);
        }
        if let Some(location) = update.location {
            row.user.location = Some(location);
        }
        if let Some(avatar_url) = update.avatar_url {
            row.user.avatar_url = Some(avatar_url);
        }
        Ok(row.user.clone())
    }
}

#[async_trait]
impl BookStore for MemStore {
    async fn create_book(&self, owner_id: Uuid, draft: BookDraft) -> PortResult<Book> {
        let book = Book {
            id: Uuid::new_v4(),
            owner_id,
            title: draft.title,
            author: draft.author,
            condition: draft.condition,
            notes: draft.notes,
            created_at: Utc::now(),
        };
        self.books.lock().unwrap().push(book.clone());
        Ok(book)
    }

    async fn list_books_by_owner(&self, owner_id: Uuid, page: Page) -> PortResult<Vec<Book>> {
        let mut rows: Vec<Book> = self
            .books
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.owner_id == owner_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page_window(rows, page))
    }

    async fn get_book_by_id(&self, id: Uuid) -> PortResult<Book> {
        self.books
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Book {id} not found")))
    }

    async fn update_book(&self, id: Uuid, owner_id: Uuid, draft: BookDraft) -> PortResult<Book> {
        let mut books = self.books.lock().unwrap();
        let book = books
            .iter_mut()
            .find(|b| b.id == id && b.owner_id == owner_id)
            .ok_or_else(|| PortError::NotFound(format!("Book {id} not found")))?;
        book.title = draft.title;
        book.author = draft.author;
        book.condition = draft.condition;
        book.notes = draft.notes;
        Ok(book.clone())
    }

    async fn delete_book(&self, id: Uuid, owner_id: Uuid) -> PortResult<()> {
        let mut books = self.books.lock().unwrap();
        let before = books.len();
        books.retain(|b| !(b.id == id && b.owner_id == owner_id));
        if books.len() == before {
            return Err(PortError::NotFound(format!("Book {id} not found")));
        }
        Ok(())
    }

    async fn count_books_by_owner(&self, owner_id: Uuid) -> PortResult<i64> {
        Ok(self
            .books
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.owner_id == owner_id)
            .count() as i64)
    }
}

#[async_trait]
impl ListingStore for MemStore {
    async fn create_listing(&self, seller_id: Uuid, draft: ListingDraft) -> PortResult<Listing> {
        let seller_username = self.username_of(seller_id).ok_or_else(|| {
            PortError::Validation("Referenced record does not exist".to_string())
        })?;
        let listing = Listing {
            id: Uuid::new_v4(),
            seller_id,
            seller_username,
            buyer_id: None,
            title: draft.title,
            author: draft.author,
            condition: draft.condition,
            status: ListingStatus::Available,
            confirmed_at: None,
            created_at: Utc::now(),
        };
        self.listings.lock().unwrap().push(listing.clone());
        Ok(listing)
    }

    async fn list_open_listings(&self, page: Page) -> PortResult<Vec<Listing>> {
        let mut rows: Vec<Listing> = self
            .listings
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.status == ListingStatus::Available)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page_window(rows, page))
    }

    async fn list_listings_by_seller(
        &self,
        seller_id: Uuid,
        page: Page,
    ) -> PortResult<Vec<Listing>> {
        let mut rows: Vec<Listing> = self
            .listings
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.seller_id == seller_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page_window(rows, page))
    }

    async fn get_listing_by_id(&self, id: Uuid) -> PortResult<Listing> {
        self.listings
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Listing {id} not found")))
    }

    async fn confirm_listing(
        &self,
        id: Uuid,
        buyer_id: Uuid,
        at: DateTime<Utc>,
    ) -> PortResult<Listing> {
        let mut listings = self.listings.lock().unwrap();
        let listing = listings
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Listing {id} not found")))?;
        if listing.seller_id == buyer_id {
            return Err(PortError::Validation(
                "You cannot reserve your own listing".to_string(),
            ));
        }
        if listing.status != ListingStatus::Available {
            return Err(PortError::Conflict(
                "Listing is no longer available".to_string(),
            ));
        }
        listing.status = ListingStatus::Confirmed;
        listing.buyer_id = Some(buyer_id);
        listing.confirmed_at = Some(at);
        Ok(listing.clone())
    }

    async fn cancel_listing(&self, id: Uuid, party_id: Uuid) -> PortResult<Listing> {
        let mut listings = self.listings.lock().unwrap();
        let listing = listings
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Listing {id} not found")))?;
        if listing.seller_id != party_id && listing.buyer_id != Some(party_id) {
            return Err(PortError::NotFound(format!("Listing {id} not found")));
        }
        if listing.status != ListingStatus::Confirmed {
            return Err(PortError::Conflict("Listing is not reserved".to_string()));
        }
        listing.status = ListingStatus::Available;
        listing.buyer_id = None;
        listing.confirmed_at = None;
        Ok(listing.clone())
    }

    async fn complete_listing(&self, id: Uuid, seller_id: Uuid) -> PortResult<Listing> {
        let mut listings = self.listings.lock().unwrap();
        let listing = listings
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Listing {id} not found")))?;
        if listing.seller_id != seller_id {
            return Err(PortError::NotFound(format!("Listing {id} not found")));
        }
        if listing.status != ListingStatus::Confirmed {
            return Err(PortError::Conflict("Listing is not reserved".to_string()));
        }
        listing.status = ListingStatus::Sold;
        listing.confirmed_at = None;
        Ok(listing.clone())
    }

    async fn delete_listing(&self, id: Uuid, seller_id: Uuid) -> PortResult<()> {
        let mut listings = self.listings.lock().unwrap();
        let before = listings.len();
        listings.retain(|l| !(l.id == id && l.seller_id == seller_id));
        if listings.len() == before {
            return Err(PortError::NotFound(format!("Listing {id} not found")));
        }
        Ok(())
    }

    async fn delete_expired_listings(&self, cutoff: DateTime<Utc>) -> PortResult<u64> {
        let mut listings = self.listings.lock().unwrap();
        let before = listings.len();
        listings.retain(|l| {
            !(l.status == ListingStatus::Confirmed
                && l.confirmed_at.is_some_and(|at| at < cutoff))
        });
        Ok((before - listings.len()) as u64)
    }

    async fn count_listings_by_seller(&self, seller_id: Uuid) -> PortResult<i64> {
        Ok(self
            .listings
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.seller_id == seller_id)
            .count() as i64)
    }
}

#[async_trait]
impl LendingStore for MemStore {
    async fn create_lending(&self, lender_id: Uuid, draft: LendingDraft) -> PortResult<Lending> {
        let lender_username = self.username_of(lender_id).ok_or_else(|| {
            PortError::Validation("Referenced record does not exist".to_string())
        })?;
        let borrower_username = match draft.borrower_id {
            Some(borrower_id) => Some(self.username_of(borrower_id).ok_or_else(|| {
                PortError::Validation("Referenced record does not exist".to_string())
            })?),
            None => None,
        };
        let lending = Lending {
            id: Uuid::new_v4(),
            lender_id,
            lender_username,
            borrower_id: draft.borrower_id,
            borrower_username,
            book_id: draft.book_id,
            book_title: draft.book_title,
            author: draft.author,
            due_date: draft.due_date,
            status: LendingStatus::Lent,
            created_at: Utc::now(),
            returned_at: None,
        };
        self.lendings.lock().unwrap().push(lending.clone());
        Ok(lending)
    }

    async fn list_lendings_for_user(&self, user_id: Uuid, page: Page) -> PortResult<Vec<Lending>> {
        let mut rows: Vec<Lending> = self
            .lendings
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.lender_id == user_id || l.borrower_id == Some(user_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page_window(rows, page))
    }

    async fn get_lending_by_id(&self, id: Uuid) -> PortResult<Lending> {
        self.lendings
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Lending {id} not found")))
    }

    async fn mark_lending_returned(
        &self,
        id: Uuid,
        lender_id: Uuid,
        at: DateTime<Utc>,
    ) -> PortResult<Lending> {
        let mut lendings = self.lendings.lock().unwrap();
        let lending = lendings
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Lending {id} not found")))?;
        if lending.lender_id != lender_id {
            return Err(PortError::NotFound(format!("Lending {id} not found")));
        }
        if lending.status != LendingStatus::Lent {
            return Err(PortError::Conflict(
                "Lending is already returned".to_string(),
            ));
        }
        lending.status = LendingStatus::Returned;
        lending.returned_at = Some(at);
        Ok(lending.clone())
    }

    async fn delete_lending(&self, id: Uuid, lender_id: Uuid) -> PortResult<()> {
        let mut lendings = self.lendings.lock().unwrap();
        let before = lendings.len();
        lendings.retain(|l| !(l.id == id && l.lender_id == lender_id));
        if lendings.len() == before {
            return Err(PortError::NotFound(format!("Lending {id} not found")));
        }
        Ok(())
    }

    async fn find_overdue_lendings(&self, now: DateTime<Utc>) -> PortResult<Vec<Lending>> {
        let mut rows: Vec<Lending> = self
            .lendings
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.status == LendingStatus::Lent && l.due_date < now)
            .cloned()
            .collect();
        rows.sort_by_key(|l| l.due_date);
        Ok(rows)
    }

    async fn find_lendings_due_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PortResult<Vec<Lending>> {
        let mut rows: Vec<Lending> = self
            .lendings
            .lock()
            .unwrap()
            .iter()
            .filter(|l| {
                l.status == LendingStatus::Lent && l.due_date >= start && l.due_date < end
            })
            .cloned()
            .collect();
        rows.sort_by_key(|l| l.due_date);
        Ok(rows)
    }

    async fn count_lendings_by_lender(&self, lender_id: Uuid) -> PortResult<i64> {
        Ok(self
            .lendings
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.lender_id == lender_id)
            .count() as i64)
    }
}

#[async_trait]
impl JournalStore for MemStore {
    async fn create_entry(&self, author_id: Uuid, draft: JournalDraft) -> PortResult<JournalEntry> {
        let now = Utc::now();
        let entry = JournalEntry {
            id: Uuid::new_v4(),
            author_id,
            title: draft.title,
            content: draft.content,
            book_title: draft.book_title,
            rating: draft.rating,
            created_at: now,
            updated_at: now,
        };
        self.journal.lock().unwrap().push(entry.clone());
        Ok(entry)
    }

    async fn list_entries_by_author(
        &self,
        author_id: Uuid,
        page: Page,
    ) -> PortResult<Vec<JournalEntry>> {
        let mut rows: Vec<JournalEntry> = self
            .journal
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.author_id == author_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page_window(rows, page))
    }

    async fn update_entry(
        &self,
        id: Uuid,
        author_id: Uuid,
        draft: JournalDraft,
    ) -> PortResult<JournalEntry> {
        let mut journal = self.journal.lock().unwrap();
        let entry = journal
            .iter_mut()
            .find(|e| e.id == id && e.author_id == author_id)
            .ok_or_else(|| PortError::NotFound(format!("Journal entry {id} not found")))?;
        entry.title = draft.title;
        entry.content = draft.content;
        entry.book_title = draft.book_title;
        entry.rating = draft.rating;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn delete_entry(&self, id: Uuid, author_id: Uuid) -> PortResult<()> {
        let mut journal = self.journal.lock().unwrap();
        let before = journal.len();
        journal.retain(|e| !(e.id == id && e.author_id == author_id));
        if journal.len() == before {
            return Err(PortError::NotFound(format!("Journal entry {id} not found")));
        }
        Ok(())
    }
}

#[async_trait]
impl HabitStore for MemStore {
    async fn upsert_habit_goal(
        &self,
        user_id: Uuid,
        goal_type: GoalType,
        goal_value: u32,
        now: DateTime<Utc>,
    ) -> PortResult<Habit> {
        let mut habits = self.habits.lock().unwrap();
        if let Some(habit) = habits.iter_mut().find(|h| h.user_id == user_id) {
            habit.goal_type = goal_type;
            habit.goal_value = goal_value;
            return Ok(habit.clone());
        }
        let habit = Habit {
            user_id,
            goal_type,
            goal_value,
            progress: 0,
            streak: 0,
            last_updated: now,
        };
        habits.push(habit.clone());
        Ok(habit)
    }

    async fn get_habit_by_user(&self, user_id: Uuid) -> PortResult<Habit> {
        self.habits
            .lock()
            .unwrap()
            .iter()
            .find(|h| h.user_id == user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound("No reading habit set".to_string()))
    }

    async fn save_habit(&self, habit: &Habit) -> PortResult<()> {
        let mut habits = self.habits.lock().unwrap();
        let stored = habits
            .iter_mut()
            .find(|h| h.user_id == habit.user_id)
            .ok_or_else(|| PortError::NotFound("No reading habit set".to_string()))?;
        *stored = habit.clone();
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for MemStore {
    async fn insert_notification(&self, new: NewNotification) -> PortResult<Notification> {
        let notification = Notification {
            id: Uuid::new_v4(),
            recipient_id: new.recipient_id,
            kind: new.kind,
            message: new.message,
            data: new.data,
            correlation: new.correlation,
            read: false,
            created_at: Utc::now(),
        };
        self.notifications.lock().unwrap().push(notification.clone());
        Ok(notification)
    }

    async fn find_recent_notification(
        &self,
        recipient_id: Uuid,
        kind: &str,
        since: DateTime<Utc>,
        correlation: Option<&CorrelationKey>,
    ) -> PortResult<Option<Notification>> {
        Ok(self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| {
                n.recipient_id == recipient_id
                    && n.kind == kind
                    && n.created_at >= since
                    && n.correlation.as_ref() == correlation
            })
            .max_by_key(|n| n.created_at)
            .cloned())
    }

    async fn list_notifications(
        &self,
        recipient_id: Uuid,
        unread_only: bool,
        page: Page,
    ) -> PortResult<Vec<Notification>> {
        let mut rows: Vec<Notification> = self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.recipient_id == recipient_id && (!unread_only || !n.read))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page_window(rows, page))
    }

    async fn mark_notification_read(
        &self,
        id: Uuid,
        recipient_id: Uuid,
    ) -> PortResult<Notification> {
        let mut rows = self.notifications.lock().unwrap();
        let notification = rows
            .iter_mut()
            .find(|n| n.id == id && n.recipient_id == recipient_id)
            .ok_or_else(|| PortError::NotFound(format!("Notification {id} not found")))?;
        notification.read = true;
        Ok(notification.clone())
    }

    async fn mark_all_notifications_read(&self, recipient_id: Uuid) -> PortResult<u64> {
        let mut rows = self.notifications.lock().unwrap();
        let mut flipped = 0;
        for n in rows
            .iter_mut()
            .filter(|n| n.recipient_id == recipient_id && !n.read)
        {
            n.read = true;
            flipped += 1;
        }
        Ok(flipped)
    }

    async fn count_unread_notifications(&self, recipient_id: Uuid) -> PortResult<i64> {
        Ok(self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.recipient_id == recipient_id && !n.read)
            .count() as i64)
    }
}

//=========================================================================================
// Recording Publisher
//=========================================================================================

/// Captures every realtime publish as `(room, event, payload)`.
#[derive(Default)]
pub struct RecordingPublisher {
    pub events: Mutex<Vec<(String, String, Value)>>,
}

impl RecordingPublisher {
    pub fn rooms_for_event(&self, event: &str) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, e, _)| e == event)
            .map(|(room, _, _)| room.clone())
            .collect()
    }

    pub fn count_event(&self, event: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, e, _)| e == event)
            .count()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, room: &str, event: &str, payload: Value) -> PortResult<()> {
        self.events
            .lock()
            .unwrap()
            .push((room.to_string(), event.to_string(), payload));
        Ok(())
    }
}

//=========================================================================================
// App Construction and Request Plumbing
//=========================================================================================

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemStore>,
    pub publisher: Arc<RecordingPublisher>,
}

fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        log_level: Level::WARN,
        token_secret: "integration-test-secret".to_string(),
        token_ttl_hours: 1,
        listing_grace_hours: 48,
        reminder_lead_days: 2,
        dedupe_window_hours: 24,
        sweep_hour_utc: 6,
        cors_origin: "http://localhost:3000".to_string(),
    }
}

/// Builds the full router over in-memory collaborators. The store and the
/// publisher stay accessible for seeding and assertions.
pub fn test_app() -> TestApp {
    let config = Arc::new(test_config());
    let store = Arc::new(MemStore::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let notifier = NotificationEngine::new(
        store.clone(),
        publisher.clone(),
        config.dedupe_window_hours,
    );
    let sweeper = Sweeper::new(
        store.clone(),
        store.clone(),
        store.clone(),
        notifier.clone(),
        config.listing_grace_hours,
        config.reminder_lead_days,
        config.sweep_hour_utc,
    );
    let state = Arc::new(AppState {
        users: store.clone(),
        books: store.clone(),
        listings: store.clone(),
        lendings: store.clone(),
        journal: store.clone(),
        habits: store.clone(),
        notifications: store.clone(),
        notifier,
        publisher: publisher.clone(),
        tokens: Arc::new(JwtTokens::new(&config.token_secret, config.token_ttl_hours)),
        hub: Arc::new(WsHub::new()),
        sweeper,
        config,
    });
    TestApp {
        router: web::router(state),
        store,
        publisher,
    }
}

/// Issues one request and returns the status plus the parsed JSON body
/// (`Value::Null` for empty bodies).
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let parsed = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, parsed)
}

/// An authenticated account created through the real signup endpoint.
pub struct Session {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

/// Signs up a fresh account and returns its session.
pub async fn signup(app: &Router, username: &str) -> Session {
    let (status, body) = send(
        app,
        Method::POST,
        "/auth/signup",
        None,
        Some(json!({ "username": username, "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");
    Session {
        user_id: body["user"]["id"].as_str().unwrap().parse().unwrap(),
        username: username.to_string(),
        token: body["token"].as_str().unwrap().to_string(),
    }
}

/// Inserts a listing row directly, bypassing the HTTP surface. Sweep tests
/// need reservation stamps older than anything a request could produce.
pub fn seed_listing(
    store: &MemStore,
    seller: &Session,
    title: &str,
    status: ListingStatus,
    confirmed_at: Option<DateTime<Utc>>,
) -> Uuid {
    let id = Uuid::new_v4();
    store.listings.lock().unwrap().push(Listing {
        id,
        seller_id: seller.user_id,
        seller_username: seller.username.clone(),
        buyer_id: confirmed_at.map(|_| Uuid::new_v4()),
        title: title.to_string(),
        author: None,
        condition: Condition::Good,
        status,
        confirmed_at,
        created_at: Utc::now(),
    });
    id
}
