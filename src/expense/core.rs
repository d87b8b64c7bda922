//! Defines the expense model, its validation rules and its database schema.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::{
    database_id::ExpenseId,
    day::{Day, EpochMillis},
};

use super::Category;

// ============================================================================
// MODELS
// ============================================================================

/// The maximum number of characters allowed in an expense's notes.
pub const MAX_NOTES_LENGTH: usize = 100;

/// Money spent on something, recorded by the user.
///
/// Expenses are never modified after they are stored. To create a new
/// `Expense`, use [Expense::build] and insert the builder into a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    /// The ID the store assigned to the expense.
    pub id: ExpenseId,
    /// A short description of what the money was spent on.
    pub title: String,
    /// How much was spent.
    pub amount: f64,
    /// What the expense was for.
    pub category: Category,
    /// Optional free text from the user.
    pub notes: Option<String>,
    /// An opaque reference to a photo of the receipt.
    pub receipt_uri: Option<String>,
    /// Whether the expense has been uploaded to a backend.
    pub synced: bool,
    /// When the expense was recorded.
    pub timestamp: EpochMillis,
    /// The day the expense is attributed to.
    ///
    /// This is independent of `timestamp`, an expense recorded today may be
    /// attributed to an earlier day.
    pub date: Day,
}

impl Expense {
    /// Create a new expense.
    ///
    /// Shortcut for [ExpenseBuilder] for discoverability.
    pub fn build(
        title: &str,
        amount: f64,
        category: Category,
        timestamp: EpochMillis,
        date: Day,
    ) -> ExpenseBuilder {
        ExpenseBuilder {
            title: title.to_owned(),
            amount,
            category,
            notes: None,
            receipt_uri: None,
            timestamp,
            date,
        }
    }
}

/// A builder for creating [Expense] instances.
///
/// The store assigns the ID when the builder is inserted.
///
/// # Examples
///
/// ```ignore
/// use expense_tracker::{Category, Expense, LocalTimezone, now_millis};
///
/// let timezone = LocalTimezone::UTC;
/// let now = now_millis();
/// let lunch = Expense::build("Lunch", 250.0, Category::Food, now, timezone.start_of_day(now))
///     .notes(Some("Team lunch".to_owned()));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseBuilder {
    /// A short description of what the money was spent on.
    ///
    /// Must not be blank.
    pub title: String,

    /// How much was spent.
    ///
    /// Must be greater than zero.
    pub amount: f64,

    /// What the expense was for.
    pub category: Category,

    /// Optional free text, at most [MAX_NOTES_LENGTH] characters.
    pub notes: Option<String>,

    /// An opaque reference to a photo of the receipt.
    pub receipt_uri: Option<String>,

    /// When the expense was submitted, set by the caller at submission time.
    ///
    /// Duplicate detection compares this value between expenses.
    pub timestamp: EpochMillis,

    /// The day the expense is attributed to.
    pub date: Day,
}

impl ExpenseBuilder {
    /// Set the notes for the expense.
    ///
    /// Empty notes are treated as no notes.
    pub fn notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes.filter(|notes| !notes.is_empty());
        self
    }

    /// Set the receipt reference for the expense.
    pub fn receipt_uri(mut self, receipt_uri: Option<String>) -> Self {
        self.receipt_uri = receipt_uri;
        self
    }

    /// Check that the expense can be stored.
    ///
    /// # Errors
    /// This function will return a:
    /// - [ValidationError::EmptyTitle] if the title is empty or only whitespace,
    /// - [ValidationError::InvalidAmount] if the amount is not a number greater than zero,
    /// - or [ValidationError::NotesTooLong] if the notes are longer than [MAX_NOTES_LENGTH].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }

        if !(self.amount.is_finite() && self.amount > 0.0) {
            return Err(ValidationError::InvalidAmount(self.amount));
        }

        if let Some(notes) = &self.notes {
            let length = notes.graphemes(true).count();
            if length > MAX_NOTES_LENGTH {
                return Err(ValidationError::NotesTooLong(length));
            }
        }

        Ok(())
    }
}

/// The reasons a submitted expense can be refused before it is stored.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// The title was empty or only whitespace.
    #[error("the title cannot be empty")]
    EmptyTitle,

    /// The amount was zero, negative or not a number.
    #[error("the amount must be greater than zero, got {0}")]
    InvalidAmount(f64),

    /// The notes had more than [MAX_NOTES_LENGTH] characters.
    #[error("the notes must be at most {MAX_NOTES_LENGTH} characters, got {0}")]
    NotesTooLong(usize),
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the expense table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_expense_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS expense (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                amount REAL NOT NULL,
                category TEXT NOT NULL,
                notes TEXT,
                receipt_uri TEXT,
                synced INTEGER NOT NULL DEFAULT 0,
                timestamp INTEGER NOT NULL,
                date INTEGER NOT NULL
                )",
        (),
    )?;

    // Used by the per-day list and totals.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_expense_date_timestamp ON expense(date, timestamp);",
        (),
    )?;

    // Used by range exports and duplicate detection.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_expense_timestamp ON expense(timestamp);",
        (),
    )?;

    Ok(())
}

/// Map a database row to an Expense.
///
/// The row must contain the columns id, title, amount, category, notes,
/// receipt_uri, synced, timestamp and date, in that order.
pub fn map_expense_row(row: &Row) -> Result<Expense, rusqlite::Error> {
    let id = row.get(0)?;
    let title = row.get(1)?;
    let amount = row.get(2)?;
    let category = row.get(3)?;
    let notes = row.get(4)?;
    let receipt_uri = row.get(5)?;
    let synced = row.get(6)?;
    let timestamp = row.get(7)?;
    let date = row.get(8)?;

    Ok(Expense {
        id,
        title,
        amount,
        category,
        notes,
        receipt_uri,
        synced,
        timestamp,
        date,
    })
}

// ============================================================================
// TESTS
// ============================================================================
