//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the store ports from the `readcircle_core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use readcircle_core::domain::{
    Book, BookDraft, Condition, CorrelationKey, CorrelationKind, GoalType, Habit, JournalDraft,
    JournalEntry, Lending, LendingDraft, LendingStatus, Listing, ListingDraft, ListingStatus,
    NewNotification, NewUser, Notification, Page, ProfileUpdate, User, UserCredentials,
};
use readcircle_core::ports::{
    BookStore, HabitStore, JournalStore, LendingStore, ListingStore, NotificationStore, PortError,
    PortResult, UserStore,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements every store port against Postgres.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps a driver error on a write to the port taxonomy: unique-constraint
/// violations become conflicts naming the offending field.
fn map_write_err(err: sqlx::Error) -> PortError {
    if let sqlx::Error::Database(ref db_err) = err {
        match db_err.code().as_deref() {
            // unique_violation
            Some("23505") => {
                let field = match db_err.constraint() {
                    Some(c) if c.contains("username") => "username",
                    Some(c) if c.contains("email") => "email",
                    _ => "value",
                };
                return PortError::Conflict(format!("{field} is already taken"));
            }
            // foreign_key_violation, e.g. a borrower id that no longer exists
            Some("23503") => {
                return PortError::Validation("Referenced record does not exist".to_string());
            }
            _ => {}
        }
    }
    PortError::Unexpected(err.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    username: String,
    name: Option<String>,
    email: Option<String>,
    bio: Option<String>,
    location: Option<String>,
    avatar_url: Option<String>,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            username: self.username,
            name: self.name,
            email: self.email,
            bio: self.bio,
            location: self.location,
            avatar_url: self.avatar_url,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    username: String,
    password_hash: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            id: self.id,
            username: self.username,
            password_hash: self.password_hash,
        }
    }
}

#[derive(FromRow)]
struct BookRecord {
    id: Uuid,
    owner_id: Uuid,
    title: String,
    author: Option<String>,
    condition: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}
impl BookRecord {
    fn to_domain(self) -> PortResult<Book> {
        let condition = self.condition.map(|raw| parse_condition(&raw)).transpose()?;
        Ok(Book {
            id: self.id,
            owner_id: self.owner_id,
            title: self.title,
            author: self.author,
            condition,
            notes: self.notes,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct ListingRecord {
    id: Uuid,
    seller_id: Uuid,
    seller_username: String,
    buyer_id: Option<Uuid>,
    title: String,
    author: Option<String>,
    condition: String,
    status: String,
    confirmed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}
impl ListingRecord {
    fn to_domain(self) -> PortResult<Listing> {
        let condition = parse_condition(&self.condition)?;
        let status = ListingStatus::parse(&self.status).ok_or_else(|| {
            PortError::Unexpected(format!("unknown listing status in row: {}", self.status))
        })?;
        Ok(Listing {
            id: self.id,
            seller_id: self.seller_id,
            seller_username: self.seller_username,
            buyer_id: self.buyer_id,
            title: self.title,
            author: self.author,
            condition,
            status,
            confirmed_at: self.confirmed_at,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct LendingRecord {
    id: Uuid,
    lender_id: Uuid,
    lender_username: String,
    borrower_id: Option<Uuid>,
    borrower_username: Option<String>,
    book_id: Option<Uuid>,
    book_title: Option<String>,
    author: Option<String>,
    due_date: DateTime<Utc>,
    status: String,
    returned_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}
impl LendingRecord {
    fn to_domain(self) -> PortResult<Lending> {
        let status = LendingStatus::parse(&self.status).ok_or_else(|| {
            PortError::Unexpected(format!("unknown lending status in row: {}", self.status))
        })?;
        Ok(Lending {
            id: self.id,
            lender_id: self.lender_id,
            lender_username: self.lender_username,
            borrower_id: self.borrower_id,
            borrower_username: self.borrower_username,
            book_id: self.book_id,
            book_title: self.book_title,
            author: self.author,
            due_date: self.due_date,
            status,
            returned_at: self.returned_at,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct JournalRecord {
    id: Uuid,
    author_id: Uuid,
    title: Option<String>,
    content: String,
    book_title: Option<String>,
    rating: Option<i16>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl JournalRecord {
    fn to_domain(self) -> JournalEntry {
        JournalEntry {
            id: self.id,
            author_id: self.author_id,
            title: self.title,
            content: self.content,
            book_title: self.book_title,
            rating: self.rating.map(|r| r as u8),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct HabitRecord {
    user_id: Uuid,
    goal_type: String,
    goal_value: i64,
    progress: i64,
    streak: i64,
    last_updated: DateTime<Utc>,
}
impl HabitRecord {
    fn to_domain(self) -> PortResult<Habit> {
        let goal_type = GoalType::parse(&self.goal_type).ok_or_else(|| {
            PortError::Unexpected(format!("unknown goal type in row: {}", self.goal_type))
        })?;
        Ok(Habit {
            user_id: self.user_id,
            goal_type,
            goal_value: self.goal_value as u32,
            progress: self.progress as u32,
            streak: self.streak as u32,
            last_updated: self.last_updated,
        })
    }
}

#[derive(FromRow)]
struct NotificationRecord {
    id: Uuid,
    recipient_id: Uuid,
    kind: String,
    message: String,
    data: serde_json::Value,
    correlation_kind: Option<String>,
    correlation_id: Option<Uuid>,
    read: bool,
    created_at: DateTime<Utc>,
}
impl NotificationRecord {
    fn to_domain(self) -> PortResult<Notification> {
        let correlation = match (self.correlation_kind, self.correlation_id) {
            (Some(kind), Some(id)) => {
                let kind = CorrelationKind::parse(&kind).ok_or_else(|| {
                    PortError::Unexpected(format!("unknown correlation kind in row: {kind}"))
                })?;
                Some(CorrelationKey { kind, id })
            }
            _ => None,
        };
        Ok(Notification {
            id: self.id,
            recipient_id: self.recipient_id,
            kind: self.kind,
            message: self.message,
            data: self.data,
            correlation,
            read: self.read,
            created_at: self.created_at,
        })
    }
}

fn parse_condition(raw: &str) -> PortResult<Condition> {
    Condition::parse(raw)
        .ok_or_else(|| PortError::Unexpected(format!("unknown condition in row: {raw}")))
}

// Column lists for the queries that hydrate usernames from the `users` table,
// either through a join (reads) or a correlated subquery (RETURNING clauses,
// where a join is not available).
const LISTING_COLS: &str = "l.id, l.seller_id, u.username AS seller_username, l.buyer_id, \
     l.title, l.author, l.condition, l.status, l.confirmed_at, l.created_at";

const LISTING_RETURNING: &str = "id, seller_id, \
     (SELECT username FROM users WHERE users.id = listings.seller_id) AS seller_username, \
     buyer_id, title, author, condition, status, confirmed_at, created_at";

const LENDING_COLS: &str = "l.id, l.lender_id, lu.username AS lender_username, \
     l.borrower_id, bu.username AS borrower_username, l.book_id, l.book_title, \
     l.author, l.due_date, l.status, l.returned_at, l.created_at";

const LENDING_FROM: &str = "FROM lendings l \
     JOIN users lu ON lu.id = l.lender_id \
     LEFT JOIN users bu ON bu.id = l.borrower_id";

const LENDING_RETURNING: &str = "id, lender_id, \
     (SELECT username FROM users WHERE users.id = lendings.lender_id) AS lender_username, \
     borrower_id, \
     (SELECT username FROM users WHERE users.id = lendings.borrower_id) AS borrower_username, \
     book_id, book_title, author, due_date, status, returned_at, created_at";

//=========================================================================================
// `UserStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, new_user: NewUser) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (id, username, password_hash, name, email) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, username, name, email, bio, location, avatar_url, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(&new_user.username)
        .bind(&new_user.password_hash)
        .bind(&new_user.name)
        .bind(&new_user.email)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_err)?;
        Ok(record.to_domain())
    }

    async fn get_user_by_id(&self, id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, username, name, email, bio, location, avatar_url, created_at \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", id)),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
    }

    async fn get_credentials_by_username(&self, username: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, username, password_hash FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("User {} not found", username))
            }
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> PortResult<User> {
        // Omitted fields keep their current value.
        let record = sqlx::query_as::<_, UserRecord>(
            "UPDATE users SET \
                 name = COALESCE($2, name), \
                 bio = COALESCE($3, bio), \
                 location = COALESCE($4, location), \
                 avatar_url = COALESCE($5, avatar_url) \
             WHERE id = $1 \
             RETURNING id, username, name, email, bio, location, avatar_url, created_at",
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.bio)
        .bind(&update.location)
        .bind(&update.avatar_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", id)),
            _ => map_write_err(e),
        })?;
        Ok(record.to_domain())
    }
}

//=========================================================================================
// `BookStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl BookStore for PgStore {
    async fn create_book(&self, owner_id: Uuid, draft: BookDraft) -> PortResult<Book> {
        let record = sqlx::query_as::<_, BookRecord>(
            "INSERT INTO books (id, owner_id, title, author, condition, notes) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, owner_id, title, author, condition, notes, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(&draft.title)
        .bind(&draft.author)
        .bind(draft.condition.map(|c| c.as_str()))
        .bind(&draft.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_err)?;
        record.to_domain()
    }

    async fn list_books_by_owner(&self, owner_id: Uuid, page: Page) -> PortResult<Vec<Book>> {
        let records = sqlx::query_as::<_, BookRecord>(
            "SELECT id, owner_id, title, author, condition, notes, created_at \
             FROM books WHERE owner_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(owner_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn get_book_by_id(&self, id: Uuid) -> PortResult<Book> {
        let record = sqlx::query_as::<_, BookRecord>(
            "SELECT id, owner_id, title, author, condition, notes, created_at \
             FROM books WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Book {} not found", id)),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        record.to_domain()
    }

    async fn update_book(&self, id: Uuid, owner_id: Uuid, draft: BookDraft) -> PortResult<Book> {
        let record = sqlx::query_as::<_, BookRecord>(
            "UPDATE books SET title = $3, author = $4, condition = $5, notes = $6 \
             WHERE id = $1 AND owner_id = $2 \
             RETURNING id, owner_id, title, author, condition, notes, created_at",
        )
        .bind(id)
        .bind(owner_id)
        .bind(&draft.title)
        .bind(&draft.author)
        .bind(draft.condition.map(|c| c.as_str()))
        .bind(&draft.notes)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_err)?
        .ok_or_else(|| PortError::NotFound(format!("Book {} not found", id)))?;
        record.to_domain()
    }

    async fn delete_book(&self, id: Uuid, owner_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Book {} not found", id)));
        }
        Ok(())
    }

    async fn count_books_by_owner(&self, owner_id: Uuid) -> PortResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM books WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }
}

//=========================================================================================
// `ListingStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ListingStore for PgStore {
    async fn create_listing(&self, seller_id: Uuid, draft: ListingDraft) -> PortResult<Listing> {
        let record = sqlx::query_as::<_, ListingRecord>(&format!(
            "WITH l AS (\
                 INSERT INTO listings (id, seller_id, title, author, condition) \
                 VALUES ($1, $2, $3, $4, $5) \
                 RETURNING *\
             ) \
             SELECT {LISTING_COLS} FROM l JOIN users u ON u.id = l.seller_id"
        ))
        .bind(Uuid::new_v4())
        .bind(seller_id)
        .bind(&draft.title)
        .bind(&draft.author)
        .bind(draft.condition.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_err)?;
        record.to_domain()
    }

    async fn list_open_listings(&self, page: Page) -> PortResult<Vec<Listing>> {
        let records = sqlx::query_as::<_, ListingRecord>(&format!(
            "SELECT {LISTING_COLS} FROM listings l JOIN users u ON u.id = l.seller_id \
             WHERE l.status = 'available' \
             ORDER BY l.created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn list_listings_by_seller(
        &self,
        seller_id: Uuid,
        page: Page,
    ) -> PortResult<Vec<Listing>> {
        let records = sqlx::query_as::<_, ListingRecord>(&format!(
            "SELECT {LISTING_COLS} FROM listings l JOIN users u ON u.id = l.seller_id \
             WHERE l.seller_id = $1 \
             ORDER BY l.created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(seller_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn get_listing_by_id(&self, id: Uuid) -> PortResult<Listing> {
        let record = sqlx::query_as::<_, ListingRecord>(&format!(
            "SELECT {LISTING_COLS} FROM listings l JOIN users u ON u.id = l.seller_id \
             WHERE l.id = $1"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Listing {} not found", id)),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        record.to_domain()
    }

    async fn confirm_listing(
        &self,
        id: Uuid,
        buyer_id: Uuid,
        at: DateTime<Utc>,
    ) -> PortResult<Listing> {
        let record = sqlx::query_as::<_, ListingRecord>(&format!(
            "UPDATE listings \
             SET status = 'confirmed', buyer_id = $2, confirmed_at = $3 \
             WHERE id = $1 AND status = 'available' AND seller_id <> $2 \
             RETURNING {LISTING_RETURNING}"
        ))
        .bind(id)
        .bind(buyer_id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_err)?;
        match record {
            Some(record) => record.to_domain(),
            // The guarded update matched no row; look at the row to say why.
            None => {
                let listing = self.get_listing_by_id(id).await?;
                if listing.seller_id == buyer_id {
                    Err(PortError::Validation(
                        "You cannot reserve your own listing".to_string(),
                    ))
                } else {
                    Err(PortError::Conflict(
                        "Listing is no longer available".to_string(),
                    ))
                }
            }
        }
    }

    async fn cancel_listing(&self, id: Uuid, party_id: Uuid) -> PortResult<Listing> {
        let record = sqlx::query_as::<_, ListingRecord>(&format!(
            "UPDATE listings \
             SET status = 'available', buyer_id = NULL, confirmed_at = NULL \
             WHERE id = $1 AND status = 'confirmed' \
               AND (seller_id = $2 OR buyer_id = $2) \
             RETURNING {LISTING_RETURNING}"
        ))
        .bind(id)
        .bind(party_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_err)?;
        match record {
            Some(record) => record.to_domain(),
            None => {
                let listing = self.get_listing_by_id(id).await?;
                if listing.seller_id != party_id && listing.buyer_id != Some(party_id) {
                    Err(PortError::NotFound(format!("Listing {} not found", id)))
                } else {
                    Err(PortError::Conflict("Listing is not reserved".to_string()))
                }
            }
        }
    }

    async fn complete_listing(&self, id: Uuid, seller_id: Uuid) -> PortResult<Listing> {
        let record = sqlx::query_as::<_, ListingRecord>(&format!(
            "UPDATE listings \
             SET status = 'sold', confirmed_at = NULL \
             WHERE id = $1 AND seller_id = $2 AND status = 'confirmed' \
             RETURNING {LISTING_RETURNING}"
        ))
        .bind(id)
        .bind(seller_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_err)?;
        match record {
            Some(record) => record.to_domain(),
            None => {
                let listing = self.get_listing_by_id(id).await?;
                if listing.seller_id != seller_id {
                    Err(PortError::NotFound(format!("Listing {} not found", id)))
                } else {
                    Err(PortError::Conflict("Listing is not reserved".to_string()))
                }
            }
        }
    }

    async fn delete_listing(&self, id: Uuid, seller_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM listings WHERE id = $1 AND seller_id = $2")
            .bind(id)
            .bind(seller_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Listing {} not found", id)));
        }
        Ok(())
    }

    async fn delete_expired_listings(&self, cutoff: DateTime<Utc>) -> PortResult<u64> {
        let result = sqlx::query(
            "DELETE FROM listings \
             WHERE status = 'confirmed' AND confirmed_at IS NOT NULL AND confirmed_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn count_listings_by_seller(&self, seller_id: Uuid) -> PortResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM listings WHERE seller_id = $1")
            .bind(seller_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }
}

//=========================================================================================
// `LendingStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl LendingStore for PgStore {
    async fn create_lending(&self, lender_id: Uuid, draft: LendingDraft) -> PortResult<Lending> {
        let record = sqlx::query_as::<_, LendingRecord>(&format!(
            "WITH l AS (\
                 INSERT INTO lendings \
                     (id, lender_id, borrower_id, book_id, book_title, author, due_date) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 RETURNING *\
             ) \
             SELECT {LENDING_COLS} \
             FROM l JOIN users lu ON lu.id = l.lender_id \
             LEFT JOIN users bu ON bu.id = l.borrower_id"
        ))
        .bind(Uuid::new_v4())
        .bind(lender_id)
        .bind(draft.borrower_id)
        .bind(draft.book_id)
        .bind(&draft.book_title)
        .bind(&draft.author)
        .bind(draft.due_date)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_err)?;
        record.to_domain()
    }

    async fn list_lendings_for_user(&self, user_id: Uuid, page: Page) -> PortResult<Vec<Lending>> {
        let records = sqlx::query_as::<_, LendingRecord>(&format!(
            "SELECT {LENDING_COLS} {LENDING_FROM} \
             WHERE l.lender_id = $1 OR l.borrower_id = $1 \
             ORDER BY l.created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn get_lending_by_id(&self, id: Uuid) -> PortResult<Lending> {
        let record = sqlx::query_as::<_, LendingRecord>(&format!(
            "SELECT {LENDING_COLS} {LENDING_FROM} WHERE l.id = $1"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Lending {} not found", id)),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        record.to_domain()
    }

    async fn mark_lending_returned(
        &self,
        id: Uuid,
        lender_id: Uuid,
        at: DateTime<Utc>,
    ) -> PortResult<Lending> {
        let record = sqlx::query_as::<_, LendingRecord>(&format!(
            "UPDATE lendings \
             SET status = 'returned', returned_at = $3 \
             WHERE id = $1 AND lender_id = $2 AND status = 'lent' \
             RETURNING {LENDING_RETURNING}"
        ))
        .bind(id)
        .bind(lender_id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_err)?;
        match record {
            Some(record) => record.to_domain(),
            None => {
                let lending = self.get_lending_by_id(id).await?;
                if lending.lender_id != lender_id {
                    Err(PortError::NotFound(format!("Lending {} not found", id)))
                } else {
                    Err(PortError::Conflict(
                        "Lending is already returned".to_string(),
                    ))
                }
            }
        }
    }

    async fn delete_lending(&self, id: Uuid, lender_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM lendings WHERE id = $1 AND lender_id = $2")
            .bind(id)
            .bind(lender_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Lending {} not found", id)));
        }
        Ok(())
    }

    async fn find_overdue_lendings(&self, now: DateTime<Utc>) -> PortResult<Vec<Lending>> {
        let records = sqlx::query_as::<_, LendingRecord>(&format!(
            "SELECT {LENDING_COLS} {LENDING_FROM} \
             WHERE l.status = 'lent' AND l.due_date < $1 \
             ORDER BY l.due_date ASC"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn find_lendings_due_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PortResult<Vec<Lending>> {
        let records = sqlx::query_as::<_, LendingRecord>(&format!(
            "SELECT {LENDING_COLS} {LENDING_FROM} \
             WHERE l.status = 'lent' AND l.due_date >= $1 AND l.due_date < $2 \
             ORDER BY l.due_date ASC"
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn count_lendings_by_lender(&self, lender_id: Uuid) -> PortResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM lendings WHERE lender_id = $1")
            .bind(lender_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }
}

//=========================================================================================
// `JournalStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl JournalStore for PgStore {
    async fn create_entry(&self, author_id: Uuid, draft: JournalDraft) -> PortResult<JournalEntry> {
        let record = sqlx::query_as::<_, JournalRecord>(
            "INSERT INTO journal_entries (id, author_id, title, content, book_title, rating) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, author_id, title, content, book_title, rating, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(author_id)
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(&draft.book_title)
        .bind(draft.rating.map(|r| r as i16))
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_err)?;
        Ok(record.to_domain())
    }

    async fn list_entries_by_author(
        &self,
        author_id: Uuid,
        page: Page,
    ) -> PortResult<Vec<JournalEntry>> {
        let records = sqlx::query_as::<_, JournalRecord>(
            "SELECT id, author_id, title, content, book_title, rating, created_at, updated_at \
             FROM journal_entries WHERE author_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(author_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn update_entry(
        &self,
        id: Uuid,
        author_id: Uuid,
        draft: JournalDraft,
    ) -> PortResult<JournalEntry> {
        let record = sqlx::query_as::<_, JournalRecord>(
            "UPDATE journal_entries \
             SET title = $3, content = $4, book_title = $5, rating = $6, updated_at = NOW() \
             WHERE id = $1 AND author_id = $2 \
             RETURNING id, author_id, title, content, book_title, rating, created_at, updated_at",
        )
        .bind(id)
        .bind(author_id)
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(&draft.book_title)
        .bind(draft.rating.map(|r| r as i16))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_err)?
        .ok_or_else(|| PortError::NotFound(format!("Journal entry {} not found", id)))?;
        Ok(record.to_domain())
    }

    async fn delete_entry(&self, id: Uuid, author_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM journal_entries WHERE id = $1 AND author_id = $2")
            .bind(id)
            .bind(author_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Journal entry {} not found",
                id
            )));
        }
        Ok(())
    }
}

//=========================================================================================
// `HabitStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl HabitStore for PgStore {
    async fn upsert_habit_goal(
        &self,
        user_id: Uuid,
        goal_type: GoalType,
        goal_value: u32,
        now: DateTime<Utc>,
    ) -> PortResult<Habit> {
        // Changing the goal keeps progress and streak; only a fresh row starts from zero.
        let record = sqlx::query_as::<_, HabitRecord>(
            "INSERT INTO habits (user_id, goal_type, goal_value, progress, streak, last_updated) \
             VALUES ($1, $2, $3, 0, 0, $4) \
             ON CONFLICT (user_id) DO UPDATE \
                 SET goal_type = EXCLUDED.goal_type, goal_value = EXCLUDED.goal_value \
             RETURNING user_id, goal_type, goal_value, progress, streak, last_updated",
        )
        .bind(user_id)
        .bind(goal_type.as_str())
        .bind(goal_value as i64)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_err)?;
        record.to_domain()
    }

    async fn get_habit_by_user(&self, user_id: Uuid) -> PortResult<Habit> {
        let record = sqlx::query_as::<_, HabitRecord>(
            "SELECT user_id, goal_type, goal_value, progress, streak, last_updated \
             FROM habits WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound("No reading habit set".to_string()),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        record.to_domain()
    }

    async fn save_habit(&self, habit: &Habit) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE habits SET progress = $2, streak = $3, last_updated = $4 \
             WHERE user_id = $1",
        )
        .bind(habit.user_id)
        .bind(habit.progress as i64)
        .bind(habit.streak as i64)
        .bind(habit.last_updated)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound("No reading habit set".to_string()));
        }
        Ok(())
    }
}

//=========================================================================================
// `NotificationStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl NotificationStore for PgStore {
    async fn insert_notification(&self, new: NewNotification) -> PortResult<Notification> {
        let (correlation_kind, correlation_id) = match &new.correlation {
            Some(key) => (Some(key.kind.as_str()), Some(key.id)),
            None => (None, None),
        };
        let record = sqlx::query_as::<_, NotificationRecord>(
            "INSERT INTO notifications \
                 (id, recipient_id, kind, message, data, correlation_kind, correlation_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id, recipient_id, kind, message, data, \
                       correlation_kind, correlation_id, read, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(new.recipient_id)
        .bind(&new.kind)
        .bind(&new.message)
        .bind(&new.data)
        .bind(correlation_kind)
        .bind(correlation_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_err)?;
        record.to_domain()
    }

    async fn find_recent_notification(
        &self,
        recipient_id: Uuid,
        kind: &str,
        since: DateTime<Utc>,
        correlation: Option<&CorrelationKey>,
    ) -> PortResult<Option<Notification>> {
        let query = match correlation {
            Some(key) => sqlx::query_as::<_, NotificationRecord>(
                "SELECT id, recipient_id, kind, message, data, \
                        correlation_kind, correlation_id, read, created_at \
                 FROM notifications \
                 WHERE recipient_id = $1 AND kind = $2 AND created_at >= $3 \
                   AND correlation_kind = $4 AND correlation_id = $5 \
                 ORDER BY created_at DESC LIMIT 1",
            )
            .bind(recipient_id)
            .bind(kind)
            .bind(since)
            .bind(key.kind.as_str())
            .bind(key.id),
            None => sqlx::query_as::<_, NotificationRecord>(
                "SELECT id, recipient_id, kind, message, data, \
                        correlation_kind, correlation_id, read, created_at \
                 FROM notifications \
                 WHERE recipient_id = $1 AND kind = $2 AND created_at >= $3 \
                   AND correlation_kind IS NULL \
                 ORDER BY created_at DESC LIMIT 1",
            )
            .bind(recipient_id)
            .bind(kind)
            .bind(since),
        };
        let record = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        record.map(|r| r.to_domain()).transpose()
    }

    async fn list_notifications(
        &self,
        recipient_id: Uuid,
        unread_only: bool,
        page: Page,
    ) -> PortResult<Vec<Notification>> {
        let records = sqlx::query_as::<_, NotificationRecord>(
            "SELECT id, recipient_id, kind, message, data, \
                    correlation_kind, correlation_id, read, created_at \
             FROM notifications \
             WHERE recipient_id = $1 AND (NOT $2 OR read = FALSE) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4",
        )
        .bind(recipient_id)
        .bind(unread_only)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn mark_notification_read(
        &self,
        id: Uuid,
        recipient_id: Uuid,
    ) -> PortResult<Notification> {
        let record = sqlx::query_as::<_, NotificationRecord>(
            "UPDATE notifications SET read = TRUE \
             WHERE id = $1 AND recipient_id = $2 \
             RETURNING id, recipient_id, kind, message, data, \
                       correlation_kind, correlation_id, read, created_at",
        )
        .bind(id)
        .bind(recipient_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?
        .ok_or_else(|| PortError::NotFound(format!("Notification {} not found", id)))?;
        record.to_domain()
    }

    async fn mark_all_notifications_read(&self, recipient_id: Uuid) -> PortResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET read = TRUE WHERE recipient_id = $1 AND read = FALSE",
        )
        .bind(recipient_id)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn count_unread_notifications(&self, recipient_id: Uuid) -> PortResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND read = FALSE",
        )
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))
    }
}
