//! Flags expenses that were probably submitted twice.

use crate::{Error, expense::ExpenseBuilder, stores::ExpenseStore};

/// Expenses with the same title and amount recorded less than five minutes
/// apart are treated as duplicates.
pub const DUPLICATE_WINDOW_MILLIS: i64 = 5 * 60 * 1000;

/// Decides whether a new expense repeats one that is already stored.
///
/// An expense is a duplicate when a stored expense has exactly the same title
/// and amount and a timestamp less than the window away, before or after. Two
/// genuinely separate purchases that match within the window are also flagged;
/// the add path rejects rather than merges them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateDetector {
    window_millis: i64,
}

impl DuplicateDetector {
    /// Create a detector with a custom window.
    pub fn new(window_millis: i64) -> Self {
        Self { window_millis }
    }

    /// The width of the window on either side of a candidate's timestamp.
    pub fn window_millis(&self) -> i64 {
        self.window_millis
    }

    /// Check `candidate` against the expenses in `store`.
    ///
    /// # Errors
    /// Returns a storage error if the store cannot be queried.
    pub fn is_duplicate(
        &self,
        store: &impl ExpenseStore,
        candidate: &ExpenseBuilder,
    ) -> Result<bool, Error> {
        let count = store.count_matching(
            &candidate.title,
            candidate.amount,
            candidate.timestamp,
            self.window_millis,
        )?;

        if count > 0 {
            tracing::debug!(
                "\"{}\" ({}) at {} matches {count} stored expense(s)",
                candidate.title,
                candidate.amount,
                candidate.timestamp
            );
        }

        Ok(count > 0)
    }
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new(DUPLICATE_WINDOW_MILLIS)
    }
}
