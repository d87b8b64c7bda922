//! Defines the expense store trait.

use tokio::sync::broadcast;

use crate::{
    Error,
    database_id::ExpenseId,
    day::{Day, EpochMillis},
    expense::{Expense, ExpenseBuilder},
};

/// Handles the durable storage and retrieval of expenses.
///
/// Implementations must be safe to call from several threads at once and must
/// never expose a partially written expense to a concurrent reader.
pub trait ExpenseStore {
    /// Store a new expense and return the ID assigned to it.
    ///
    /// Once the expense is durable, implementers must send a
    /// [StoreChange::Inserted] to every [ExpenseStore::subscribe] receiver
    /// before returning.
    fn insert(&self, expense: ExpenseBuilder) -> Result<ExpenseId, Error>;

    /// Retrieve an expense by its ID.
    fn get(&self, id: ExpenseId) -> Result<Expense, Error>;

    /// Retrieve the expenses attributed to `day`, most recent first.
    fn query_by_date(&self, day: Day) -> Result<Vec<Expense>, Error>;

    /// Retrieve every expense, most recent first.
    fn query_all(&self) -> Result<Vec<Expense>, Error>;

    /// Retrieve the expenses recorded between `from` and `to` (both inclusive),
    /// oldest first.
    fn query_range(&self, from: EpochMillis, to: EpochMillis) -> Result<Vec<Expense>, Error>;

    /// Count the expenses with exactly this `title` and `amount` that were
    /// recorded less than `window_millis` before or after `timestamp`.
    fn count_matching(
        &self,
        title: &str,
        amount: f64,
        timestamp: EpochMillis,
        window_millis: i64,
    ) -> Result<u64, Error>;

    /// The sum of the amounts of the expenses attributed to `day`.
    ///
    /// Implementers should return zero for a day with no expenses.
    fn total_for_day(&self, day: Day) -> Result<f64, Error>;

    /// Listen for changes to the stored expenses.
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// A change to the contents of an [ExpenseStore].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    /// A new expense was stored.
    Inserted {
        /// The ID of the new expense.
        id: ExpenseId,
        /// The day the new expense is attributed to.
        day: Day,
    },
}

impl StoreChange {
    /// The day whose expenses changed.
    pub fn day(&self) -> Day {
        match self {
            StoreChange::Inserted { day, .. } => *day,
        }
    }
}
