//! services/api/src/engine/sweeper.rs
//!
//! The lifecycle sweeper: time-windowed maintenance that runs next to the
//! request path. Two rules - confirmed listings past the grace period are
//! deleted, and lendings get overdue / upcoming-due-date notifications. A
//! daily loop fires both at a fixed UTC hour; the due-date scan also runs
//! once at startup to catch up after downtime.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use readcircle_core::domain::{CalendarDay, CorrelationKey, CorrelationKind, Lending, NewNotification};
use readcircle_core::ports::{BookStore, LendingStore, ListingStore, PortResult};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::notifier::NotificationEngine;

/// Fresh notifications emitted by one due-date scan. Suppressed duplicates
/// are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DueDateSummary {
    pub overdue: u64,
    pub reminders: u64,
}

#[derive(Clone)]
pub struct Sweeper {
    listings: Arc<dyn ListingStore>,
    lendings: Arc<dyn LendingStore>,
    books: Arc<dyn BookStore>,
    notifier: NotificationEngine,
    grace: Duration,
    reminder_lead_days: u32,
    sweep_hour_utc: u32,
}

impl Sweeper {
    pub fn new(
        listings: Arc<dyn ListingStore>,
        lendings: Arc<dyn LendingStore>,
        books: Arc<dyn BookStore>,
        notifier: NotificationEngine,
        grace_hours: i64,
        reminder_lead_days: u32,
        sweep_hour_utc: u32,
    ) -> Self {
        Self {
            listings,
            lendings,
            books,
            notifier,
            grace: Duration::hours(grace_hours),
            reminder_lead_days,
            sweep_hour_utc,
        }
    }

    /// Deletes listings that have sat in `confirmed` past the grace period.
    /// Listings that were never confirmed carry no `confirmed_at` and are
    /// never matched. Safe to run repeatedly.
    pub async fn expire_confirmed_listings(&self) -> PortResult<u64> {
        let cutoff = Utc::now() - self.grace;
        let deleted = self.listings.delete_expired_listings(cutoff).await?;
        if deleted > 0 {
            info!(deleted, "removed confirmed listings past the grace period");
        }
        Ok(deleted)
    }

    /// Runs the overdue pass and the reminder pass over active lendings.
    ///
    /// One failing lending is logged and skipped; the scan always covers the
    /// whole set. Every emission goes through the notification engine, so a
    /// repeated scan inside the dedupe window adds nothing.
    pub async fn scan_due_dates(&self) -> PortResult<DueDateSummary> {
        let now = Utc::now();
        let mut summary = DueDateSummary::default();

        for lending in self.lendings.find_overdue_lendings(now).await? {
            match self.notify_overdue(&lending).await {
                Ok(emitted) => summary.overdue += emitted,
                Err(e) => {
                    warn!(lending_id = %lending.id, error = %e, "overdue notification failed")
                }
            }
        }

        let target = CalendarDay::from_datetime(now).plus_days(u64::from(self.reminder_lead_days));
        let (start, end) = target.bounds();
        for lending in self.lendings.find_lendings_due_between(start, end).await? {
            match self.notify_reminder(&lending).await {
                Ok(emitted) => summary.reminders += emitted,
                Err(e) => {
                    warn!(lending_id = %lending.id, error = %e, "reminder notification failed")
                }
            }
        }

        Ok(summary)
    }

    /// Overdue alerts go to the borrower (when the lending has one) and to
    /// the lender. Returns how many fresh notifications were created.
    async fn notify_overdue(&self, lending: &Lending) -> PortResult<u64> {
        let title = self.resolve_title(lending).await;
        let due = lending.due_date.format("%Y-%m-%d");
        let mut emitted = 0;

        if let Some(borrower_id) = lending.borrower_id {
            let delivery = self
                .notifier
                .create_if_not_exists(self.alert(
                    borrower_id,
                    "overdue",
                    format!("\"{title}\" was due on {due} - time to return it"),
                    lending,
                    &title,
                ))
                .await?;
            if delivery.created {
                emitted += 1;
            }
        }

        let borrower = lending
            .borrower_username
            .clone()
            .unwrap_or_else(|| "someone".to_string());
        let delivery = self
            .notifier
            .create_if_not_exists(self.alert(
                lending.lender_id,
                "overdue",
                format!("\"{title}\" lent to {borrower} was due on {due}"),
                lending,
                &title,
            ))
            .await?;
        if delivery.created {
            emitted += 1;
        }

        Ok(emitted)
    }

    /// Reminders go to the borrower only; a lending without one is skipped.
    async fn notify_reminder(&self, lending: &Lending) -> PortResult<u64> {
        let Some(borrower_id) = lending.borrower_id else {
            return Ok(0);
        };
        let title = self.resolve_title(lending).await;
        let due = lending.due_date.format("%Y-%m-%d");
        let delivery = self
            .notifier
            .create_if_not_exists(self.alert(
                borrower_id,
                "reminder",
                format!("\"{title}\" is due on {due}"),
                lending,
                &title,
            ))
            .await?;
        Ok(u64::from(delivery.created))
    }

    fn alert(
        &self,
        recipient_id: Uuid,
        kind: &str,
        message: String,
        lending: &Lending,
        title: &str,
    ) -> NewNotification {
        NewNotification {
            recipient_id,
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
        }
    }

    /// Looks up the inventory book only when the lending carries no free-text
    /// title of its own.
    async fn resolve_title(&self, lending: &Lending) -> String {
        let book = match (&lending.book_title, lending.book_id) {
            (None, Some(book_id)) => self.books.get_book_by_id(book_id).await.ok(),
            _ => None,
        };
        lending.display_title(book.as_ref())
    }

    /// The long-running loop: catch-up scan at startup, then both rules once
    /// a day at the configured hour until shutdown is signalled. Failures are
    /// logged and the loop keeps going.
    pub async fn run(self, shutdown: CancellationToken) {
        match self.scan_due_dates().await {
            Ok(summary) => info!(
                overdue = summary.overdue,
                reminders = summary.reminders,
                "startup due-date scan complete"
            ),
            Err(e) => warn!(error = %e, "startup due-date scan failed"),
        }

        loop {
            let wait = until_next_daily_run(Utc::now(), self.sweep_hour_utc);
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("lifecycle sweeper stopped");
                    return;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            if let Err(e) = self.expire_confirmed_listings().await {
                warn!(error = %e, "listing expiry sweep failed");
            }
            match self.scan_due_dates().await {
                Ok(summary) => info!(
                    overdue = summary.overdue,
                    reminders = summary.reminders,
                    "daily due-date scan complete"
                ),
                Err(e) => warn!(error = %e, "daily due-date scan failed"),
            }
        }
    }
}

/// Time until the next occurrence of `hour:00:00Z`, strictly in the future.
fn until_next_daily_run(now: DateTime<Utc>, hour: u32) -> std::time::Duration {
    let today_run =
        now.date_naive().and_time(NaiveTime::MIN).and_utc() + Duration::hours(i64::from(hour));
    let next = if today_run > now {
        today_run
    } else {
        today_run + Duration::days(1)
    };
    (next - now).to_std().unwrap_or_default()
}
