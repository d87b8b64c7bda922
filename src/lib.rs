//! Expense Tracker is the core of a personal expense-tracking application.
//!
//! Users record daily expenses, browse them by day and category, and export
//! a rolling seven day report. This library provides the durable expense
//! store, duplicate detection, aggregation, a live per-day query layer and
//! the CSV report exporter. Front ends (such as the `expenses` binary) drive
//! the core through [AppState].

#![warn(missing_docs)]

mod aggregate;
mod app_state;
mod database_id;
mod day;
mod db;
mod day_view;
mod duplicate;
mod expense;
mod export;
mod preferences;
mod stores;
mod timezone;

pub use aggregate::{DailyTotal, category_totals, daily_total, daily_totals, range_total};
pub use app_state::{AppState, EXPENSE_ADDED_MESSAGE};
pub use database_id::{DatabaseId, ExpenseId};
pub use day::{Day, EpochMillis, MILLIS_PER_DAY, now_millis};
pub use day_view::{DaySnapshot, DayView};
pub use db::initialize as initialize_db;
pub use duplicate::{DUPLICATE_WINDOW_MILLIS, DuplicateDetector};
pub use expense::{Category, Expense, ExpenseBuilder, MAX_NOTES_LENGTH, ValidationError};
pub use export::{
    CSV_HEADER, EXPORT_FILE_NAME, ExportRecord, export_last_seven_days, export_range,
    parse_export, write_export,
};
pub use preferences::{PreferenceStore, SQLitePreferenceStore, ThemePreference};
pub use stores::{
    ExpenseStore, SQLiteExpenseStore, StoreChange,
    sqlite::{SQLAppState, create_app_state, open_app_state},
};
pub use timezone::{LocalTimezone, get_local_offset};

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The submitted expense failed validation.
    ///
    /// Nothing is written to the store when this error is returned.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The submitted expense looks like a duplicate of one recorded within the
    /// duplicate window and was not added.
    ///
    /// This is distinct from [Error::Validation] so that front ends can tell the
    /// user why their expense was not saved.
    #[error("possible duplicate detected, the expense was not added")]
    DuplicateRejected,

    /// The database could not complete a read or write.
    ///
    /// The core never retries; the caller decides whether to try again.
    #[error("the storage medium could not complete the request: {0}")]
    StorageFailure(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// The requested expense was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested expense could not be found")]
    NotFound,

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// The text does not name one of the fixed expense categories.
    #[error("invalid category \"{0}\", expected one of Staff, Travel, Food or Utility")]
    InvalidCategory(String),

    /// The CSV report could not be written or read.
    #[error("could not process the CSV export: {0}")]
    ExportError(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::StorageFailure(error)
            }
        }
    }
}

impl Error {
    /// Whether the error came from the durable storage medium rather than the
    /// submitted data.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, Error::StorageFailure(_) | Error::DatabaseLockError)
    }

    /// A short message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation(ValidationError::NotesTooLong(_)) => {
                format!("Validation failed: notes must be at most {MAX_NOTES_LENGTH} characters")
            }
            Error::Validation(_) => "Validation failed: title and amount required".to_owned(),
            Error::DuplicateRejected => "Possible duplicate detected, not added".to_owned(),
            Error::StorageFailure(_) | Error::DatabaseLockError => {
                "Could not save or load expenses, please try again".to_owned()
            }
            error => {
                let message = error.to_string();
                let mut chars = message.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => message,
                }
            }
        }
    }
}
