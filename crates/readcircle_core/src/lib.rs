pub mod domain;
pub mod ports;

pub use domain::{
    AuthClaims, Book, BookDraft, CalendarDay, Condition, CorrelationKey, CorrelationKind, GoalType,
    Habit, JournalDraft, JournalEntry, Lending, LendingDraft, Listing, ListingDraft,
    NewNotification, NewUser, Notification, Page, ProfileUpdate, User, UserCredentials,
    recipient_rooms,
};
pub use ports::{
    BookStore, EventPublisher, HabitStore, JournalStore, LendingStore, ListingStore,
    NotificationStore, PortError, PortResult, TokenService, UserStore,
};
