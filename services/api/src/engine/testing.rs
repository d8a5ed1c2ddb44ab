//! services/api/src/engine/testing.rs
//!
//! In-memory fakes shared by the engine unit tests. The notification store
//! and the publisher implement their full contracts; the listing, lending and
//! book fakes implement only what the sweeper touches.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use readcircle_core::domain::{
    Book, BookDraft, CorrelationKey, Lending, LendingDraft, LendingStatus, Listing, ListingDraft,
    ListingStatus, NewNotification, Notification, Page,
};
use readcircle_core::ports::{
    BookStore, EventPublisher, LendingStore, ListingStore, NotificationStore, PortError,
    PortResult,
};
use serde_json::Value;
use std::sync::Mutex;
use uuid::Uuid;

//=========================================================================================
// Notification Store
//=========================================================================================

#[derive(Default)]
pub struct MemNotifications {
    pub rows: Mutex<Vec<Notification>>,
}

impl MemNotifications {
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Inserts a row directly, bypassing the engine, so tests can place
    /// notifications at arbitrary points in the past.
    pub fn seed(&self, new: NewNotification, created_at: DateTime<Utc>) -> Notification {
        let row = Notification {
            id: Uuid::new_v4(),
            recipient_id: new.recipient_id,
            kind: new.kind,
            message: new.message,
            data: new.data,
            correlation: new.correlation,
            read: false,
            created_at,
        };
        self.rows.lock().unwrap().push(row.clone());
        row
    }
}

#[async_trait]
impl NotificationStore for MemNotifications {
    async fn insert_notification(&self, new: NewNotification) -> PortResult<Notification> {
        Ok(self.seed(new, Utc::now()))
    }

    async fn find_recent_notification(
        &self,
        recipient_id: Uuid,
        kind: &str,
        since: DateTime<Utc>,
        correlation: Option<&CorrelationKey>,
    ) -> PortResult<Option<Notification>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
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
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.recipient_id == recipient_id && (!unread_only || !n.read))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn mark_notification_read(
        &self,
        id: Uuid,
        recipient_id: Uuid,
    ) -> PortResult<Notification> {
        let mut rows = self.rows.lock().unwrap();
        for n in rows.iter_mut() {
            if n.id == id && n.recipient_id == recipient_id {
                n.read = true;
                return Ok(n.clone());
            }
        }
        Err(PortError::NotFound("Notification not found".to_string()))
    }

    async fn mark_all_notifications_read(&self, recipient_id: Uuid) -> PortResult<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut count = 0;
        for n in rows.iter_mut() {
            if n.recipient_id == recipient_id && !n.read {
                n.read = true;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn count_unread_notifications(&self, recipient_id: Uuid) -> PortResult<i64> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|n| n.recipient_id == recipient_id && !n.read)
            .count() as i64)
    }
}

//=========================================================================================
// Publishers
//=========================================================================================

/// Records every publish so tests can assert on rooms, events and payloads.
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

/// Fails every publish. Persistence must still win.
pub struct FailingPublisher;

#[async_trait]
impl EventPublisher for FailingPublisher {
    async fn publish(&self, _room: &str, _event: &str, _payload: Value) -> PortResult<()> {
        Err(PortError::Unexpected("publisher offline".to_string()))
    }
}

//=========================================================================================
// Sweeper Collaborators
//=========================================================================================

#[derive(Default)]
pub struct MemLendings {
    pub rows: Mutex<Vec<Lending>>,
}

impl MemLendings {
    pub fn push(&self, lending: Lending) {
        self.rows.lock().unwrap().push(lending);
    }
}

#[async_trait]
impl LendingStore for MemLendings {
    async fn create_lending(&self, _lender_id: Uuid, _draft: LendingDraft) -> PortResult<Lending> {
        unimplemented!("not used by the sweeper")
    }

    async fn list_lendings_for_user(
        &self,
        _user_id: Uuid,
        _page: Page,
    ) -> PortResult<Vec<Lending>> {
        unimplemented!("not used by the sweeper")
    }

    async fn get_lending_by_id(&self, _id: Uuid) -> PortResult<Lending> {
        unimplemented!("not used by the sweeper")
    }

    async fn mark_lending_returned(
        &self,
        _id: Uuid,
        _lender_id: Uuid,
        _at: DateTime<Utc>,
    ) -> PortResult<Lending> {
        unimplemented!("not used by the sweeper")
    }

    async fn delete_lending(&self, _id: Uuid, _lender_id: Uuid) -> PortResult<()> {
        unimplemented!("not used by the sweeper")
    }

    async fn find_overdue_lendings(&self, now: DateTime<Utc>) -> PortResult<Vec<Lending>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.status == LendingStatus::Lent && l.due_date < now)
            .cloned()
            .collect())
    }

    async fn find_lendings_due_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PortResult<Vec<Lending>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.status == LendingStatus::Lent && l.due_date >= start && l.due_date < end)
            .cloned()
            .collect())
    }

    async fn count_lendings_by_lender(&self, _lender_id: Uuid) -> PortResult<i64> {
        unimplemented!("not used by the sweeper")
    }
}

#[derive(Default)]
pub struct MemListings {
    pub rows: Mutex<Vec<Listing>>,
}

impl MemListings {
    pub fn push(&self, listing: Listing) {
        self.rows.lock().unwrap().push(listing);
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl ListingStore for MemListings {
    async fn create_listing(&self, _seller_id: Uuid, _draft: ListingDraft) -> PortResult<Listing> {
        unimplemented!("not used by the sweeper")
    }

    async fn list_open_listings(&self, _page: Page) -> PortResult<Vec<Listing>> {
        unimplemented!("not used by the sweeper")
    }

    async fn list_listings_by_seller(
        &self,
        _seller_id: Uuid,
        _page: Page,
    ) -> PortResult<Vec<Listing>> {
        unimplemented!("not used by the sweeper")
    }

    async fn get_listing_by_id(&self, _id: Uuid) -> PortResult<Listing> {
        unimplemented!("not used by the sweeper")
    }

    async fn confirm_listing(
        &self,
        _id: Uuid,
        _buyer_id: Uuid,
        _at: DateTime<Utc>,
    ) -> PortResult<Listing> {
        unimplemented!("not used by the sweeper")
    }

    async fn cancel_listing(&self, _id: Uuid, _party_id: Uuid) -> PortResult<Listing> {
        unimplemented!("not used by the sweeper")
    }

    async fn complete_listing(&self, _id: Uuid, _seller_id: Uuid) -> PortResult<Listing> {
        unimplemented!("not used by the sweeper")
    }

    async fn delete_listing(&self, _id: Uuid, _seller_id: Uuid) -> PortResult<()> {
        unimplemented!("not used by the sweeper")
    }

    async fn delete_expired_listings(&self, cutoff: DateTime<Utc>) -> PortResult<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|l| {
            !(l.status == ListingStatus::Confirmed
                && l.confirmed_at.map(|at| at < cutoff).unwrap_or(false))
        });
        Ok((before - rows.len()) as u64)
    }

    async fn count_listings_by_seller(&self, _seller_id: Uuid) -> PortResult<i64> {
        unimplemented!("not used by the sweeper")
    }
}

#[derive(Default)]
pub struct MemBooks {
    pub rows: Mutex<Vec<Book>>,
}

impl MemBooks {
    pub fn push(&self, book: Book) {
        self.rows.lock().unwrap().push(book);
    }
}

#[async_trait]
impl BookStore for MemBooks {
    async fn create_book(&self, _owner_id: Uuid, _draft: BookDraft) -> PortResult<Book> {
        unimplemented!("not used by the sweeper")
    }

    async fn list_books_by_owner(&self, _owner_id: Uuid, _page: Page) -> PortResult<Vec<Book>> {
        unimplemented!("not used by the sweeper")
    }

    async fn get_book_by_id(&self, id: Uuid) -> PortResult<Book> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound("Book not found".to_string()))
    }

    async fn update_book(&self, _id: Uuid, _owner_id: Uuid, _draft: BookDraft) -> PortResult<Book> {
        unimplemented!("not used by the sweeper")
    }

    async fn delete_book(&self, _id: Uuid, _owner_id: Uuid) -> PortResult<()> {
        unimplemented!("not used by the sweeper")
    }

    async fn count_books_by_owner(&self, _owner_id: Uuid) -> PortResult<i64> {
        unimplemented!("not used by the sweeper")
    }
}

//=========================================================================================
// Record Builders
//=========================================================================================

pub fn lending_due(
    lender_id: Uuid,
    borrower_id: Option<Uuid>,
    title: Option<&str>,
    due_date: DateTime<Utc>,
) -> Lending {
    Lending {
        id: Uuid::new_v4(),
        lender_id,
        lender_username: "lender".to_string(),
        borrower_id,
        borrower_username: borrower_id.map(|_| "borrower".to_string()),
        book_id: None,
        book_title: title.map(str::to_string),
        author: None,
        due_date,
        status: LendingStatus::Lent,
        created_at: due_date - Duration::days(14),
        returned_at: None,
    }
}

pub fn confirmed_listing(confirmed_at: Option<DateTime<Utc>>) -> Listing {
    Listing {
        id: Uuid::new_v4(),
        seller_id: Uuid::new_v4(),
        seller_username: "seller".to_string(),
        buyer_id: Some(Uuid::new_v4()),
        title: "Some Book".to_string(),
        author: None,
        condition: readcircle_core::domain::Condition::Good,
        status: ListingStatus::Confirmed,
        confirmed_at,
        created_at: Utc::now() - Duration::days(7),
    }
}
