//! crates/readcircle_core/src/domain.rs
//!
//! Pure data structures and calendar logic for ReadCircle.
//! These types are independent of any database or serialization format;
//! the api service maps them to wire DTOs and storage records.

use chrono::{DateTime, Datelike, Days, NaiveTime, Utc};
use uuid::Uuid;

//=========================================================================================
// Users
//=========================================================================================

/// A registered user. The root identity every other entity references by id.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create an account. The password arrives already hashed;
/// the core never sees plaintext credentials.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Only used internally for login - contains sensitive data.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
}

/// Editable profile fields. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub avatar_url: Option<String>,
}

/// The identity extracted from a verified bearer token.
#[derive(Debug, Clone)]
pub struct AuthClaims {
    pub user_id: Uuid,
    pub username: String,
}

//=========================================================================================
// Books (personal inventory)
//=========================================================================================

/// A book in a user's personal inventory.
#[derive(Debug, Clone)]
pub struct Book {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub author: Option<String>,
    pub condition: Option<Condition>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields a caller supplies when creating or replacing a book.
#[derive(Debug, Clone)]
pub struct BookDraft {
    pub title: String,
    pub author: Option<String>,
    pub condition: Option<Condition>,
    pub notes: Option<String>,
}

/// Physical condition of a book, shared by inventory and marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    New,
    Good,
    Fair,
    Poor,
}

impl Condition {
    pub fn as_str(self) -> &'static str {
        match self {
            Condition::New => "new",
            Condition::Good => "good",
            Condition::Fair => "fair",
            Condition::Poor => "poor",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "new" => Some(Condition::New),
            "good" => Some(Condition::Good),
            "fair" => Some(Condition::Fair),
            "poor" => Some(Condition::Poor),
            _ => None,
        }
    }
}

//=========================================================================================
// Listings (marketplace)
//=========================================================================================

/// A book offered for sale or exchange, visible to other users while available.
///
/// Lifecycle: created `Available`; a buyer reserves it (`Confirmed`, stamping
/// `confirmed_at`); either party may cancel back to `Available`; the seller
/// finalizes to `Sold`. The sweeper deletes listings that sit `Confirmed`
/// past the grace period. `confirmed_at` is set if and only if the status is
/// `Confirmed`.
#[derive(Debug, Clone)]
pub struct Listing {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub seller_username: String,
    pub buyer_id: Option<Uuid>,
    pub title: String,
    pub author: Option<String>,
    pub condition: Condition,
    pub status: ListingStatus,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields a seller supplies when posting a listing.
#[derive(Debug, Clone)]
pub struct ListingDraft {
    pub title: String,
    pub author: Option<String>,
    pub condition: Condition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingStatus {
    Available,
    Confirmed,
    Sold,
}

impl ListingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ListingStatus::Available => "available",
            ListingStatus::Confirmed => "confirmed",
            ListingStatus::Sold => "sold",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "available" => Some(ListingStatus::Available),
            "confirmed" => Some(ListingStatus::Confirmed),
            "sold" => Some(ListingStatus::Sold),
            _ => None,
        }
    }
}

//=========================================================================================
// Lendings
//=========================================================================================

/// A physical book loaned from one user (lender) to another (borrower),
/// tracked to its due date and return.
///
/// The borrower is an optional identity reference; lendings to people outside
/// the system simply leave it unset. The book may be a free-text title, a
/// reference into the lender's inventory, or both.
#[derive(Debug, Clone)]
pub struct Lending {
    pub id: Uuid,
    pub lender_id: Uuid,
    pub lender_username: String,
    pub borrower_id: Option<Uuid>,
    pub borrower_username: Option<String>,
    pub book_id: Option<Uuid>,
    pub book_title: Option<String>,
    pub author: Option<String>,
    pub due_date: DateTime<Utc>,
    pub status: LendingStatus,
    pub created_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl Lending {
    /// Human-readable title for reminder and overdue messages: the free-text
    /// title wins, then the referenced inventory book, then a generic noun.
    pub fn display_title(&self, book: Option<&Book>) -> String {
        if let Some(title) = &self.book_title {
            return title.clone();
        }
        if let Some(book) = book {
            return book.title.clone();
        }
        "a book".to_string()
    }
}

/// Fields the lender supplies when recording a loan. At least one of
/// `book_title` / `book_id` must identify the book.
#[derive(Debug, Clone)]
pub struct LendingDraft {
    pub borrower_id: Option<Uuid>,
    pub book_id: Option<Uuid>,
    pub book_title: Option<String>,
    pub author: Option<String>,
    pub due_date: DateTime<Utc>,
}

/// Status only moves forward: a lending is created `Lent` and either marked
/// `Returned` by the lender or deleted outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LendingStatus {
    Lent,
    Returned,
}

impl LendingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LendingStatus::Lent => "lent",
            LendingStatus::Returned => "returned",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "lent" => Some(LendingStatus::Lent),
            "returned" => Some(LendingStatus::Returned),
            _ => None,
        }
    }
}

//=========================================================================================
// Journal
//=========================================================================================

/// A private reading-journal entry.
#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: Option<String>,
    pub content: String,
    pub book_title: Option<String>,
    pub rating: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied on create and on edit (edits replace the whole draft).
#[derive(Debug, Clone)]
pub struct JournalDraft {
    pub title: Option<String>,
    pub content: String,
    pub book_title: Option<String>,
    pub rating: Option<u8>,
}

//=========================================================================================
// Habits
//=========================================================================================

/// Per-user reading-habit state. At most one record per user.
#[derive(Debug, Clone)]
pub struct Habit {
    pub user_id: Uuid,
    pub goal_type: GoalType,
    pub goal_value: u32,
    pub progress: u32,
    pub streak: u32,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalType {
    Pages,
    Minutes,
}

impl GoalType {
    pub fn as_str(self) -> &'static str {
        match self {
            GoalType::Pages => "pages",
            GoalType::Minutes => "minutes",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pages" => Some(GoalType::Pages),
            "minutes" => Some(GoalType::Minutes),
            _ => None,
        }
    }
}

impl Habit {
    /// Advances the habit by one progress report.
    ///
    /// Updates on the same calendar day accumulate into `progress` and leave
    /// the streak alone. The first update of a new day settles the previous
    /// day first - streak increments if the accumulated progress met the
    /// goal, otherwise resets to zero - and then `progress` is replaced (not
    /// added) with the incoming amount.
    pub fn apply_progress(&mut self, amount: u32, now: DateTime<Utc>) {
        let today = CalendarDay::from_datetime(now);
        let last_day = CalendarDay::from_datetime(self.last_updated);

        if last_day == today {
            self.progress = self.progress.saturating_add(amount);
        } else {
            if self.progress >= self.goal_value {
                self.streak += 1;
            } else {
                self.streak = 0;
            }
            self.progress = amount;
        }
        self.last_updated = now;
    }
}

//=========================================================================================
// Notifications
//=========================================================================================

/// A persisted alert for one recipient. Created by the notification engine,
/// mutated only by read-marking, never auto-deleted.
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    /// Free-form tag such as "overdue", "reminder" or "profile_updated".
    pub kind: String,
    pub message: String,
    /// Display payload passed through to clients untouched.
    pub data: serde_json::Value,
    /// Typed correlation key the dedupe rule matches on.
    pub correlation: Option<CorrelationKey>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields the engine supplies when persisting a fresh notification.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: Uuid,
    pub kind: String,
    pub message: String,
    pub data: serde_json::Value,
    pub correlation: Option<CorrelationKey>,
}

/// Identifies the record a notification is about, so repeat alerts for the
/// same lending or listing can be recognised without sniffing the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationKey {
    pub kind: CorrelationKind,
    pub id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationKind {
    Lending,
    Listing,
}

impl CorrelationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CorrelationKind::Lending => "lending",
            CorrelationKind::Listing => "listing",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "lending" => Some(CorrelationKind::Lending),
            "listing" => Some(CorrelationKind::Listing),
            _ => None,
        }
    }
}

/// The realtime channel keys a recipient listens on.
///
/// Older clients join the bare user id, newer ones the prefixed form; every
/// recipient-targeted publish goes to both so either generation of client
/// receives it. This function is the single source for the two spellings.
pub fn recipient_rooms(user_id: Uuid) -> [String; 2] {
    [format!("{user_id}"), format!("user:{user_id}")]
}

//=========================================================================================
// Calendar days
//=========================================================================================

/// A calendar day in UTC.
///
/// Day-boundary decisions (habit streaks, due-date reminders) compare these
/// instead of formatted date strings, so behaviour cannot drift with locale
/// or timezone settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDay(chrono::NaiveDate);

impl CalendarDay {
    /// Projects an instant onto its UTC calendar day.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        CalendarDay(at.date_naive())
    }

    /// The day `n` days after this one.
    pub fn plus_days(self, n: u64) -> Self {
        CalendarDay(self.0 + Days::new(n))
    }

    /// Half-open UTC bounds of this day: [00:00:00, next day 00:00:00).
    pub fn bounds(self) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.0.and_time(NaiveTime::MIN).and_utc();
        let end = (self.0 + Days::new(1)).and_time(NaiveTime::MIN).and_utc();
        (start, end)
    }

    pub fn year(self) -> i32 {
        self.0.year()
    }

    pub fn month(self) -> u32 {
        self.0.month()
    }

    pub fn day(self) -> u32 {
        self.0.day()
    }
}

//=========================================================================================
// Pagination
//=========================================================================================

/// A sanitised skip/limit window for list queries.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub const DEFAULT_LIMIT: i64 = 20;
    pub const MAX_LIMIT: i64 = 100;

    /// Clamps caller-supplied values into a sane window.
    pub fn clamped(limit: Option<i64>, offset: Option<i64>) -> Self {
        let limit = limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT);
        let offset = offset.unwrap_or(0).max(0);
        Page { limit, offset }
    }
}

impl Default for Page {
    fn default() -> Self {
        Page {
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

//=========================================================================================
// Tests
//=========================================================================================
