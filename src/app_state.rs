//! Implements a struct that holds the state shared by the front ends.

use std::sync::{Arc, Mutex};

use crate::{
    Error,
    database_id::ExpenseId,
    day::Day,
    day_view::DayView,
    duplicate::DuplicateDetector,
    expense::ExpenseBuilder,
    preferences::{PreferenceStore, ThemePreference},
    stores::ExpenseStore,
    timezone::LocalTimezone,
};

/// The message shown to the user after an expense was added.
pub const EXPENSE_ADDED_MESSAGE: &str = "Expense added";

/// The state shared by every front end.
///
/// Cloning is cheap: clones share the same stores and add lock.
#[derive(Debug, Clone)]
pub struct AppState<E, P>
where
    E: ExpenseStore,
    P: PreferenceStore,
{
    /// The store for expenses.
    pub expense_store: E,

    /// The store for user preferences such as the theme.
    pub preference_store: P,

    /// The timezone that decides which day an expense belongs to.
    pub local_timezone: LocalTimezone,

    /// Rejects expenses that were probably submitted twice.
    pub duplicate_detector: DuplicateDetector,

    /// Held across the duplicate check and the insert.
    add_lock: Arc<Mutex<()>>,
}

impl<E, P> AppState<E, P>
where
    E: ExpenseStore,
    P: PreferenceStore,
{
    /// Create a new [AppState] from already initialised stores.
    pub fn new(expense_store: E, preference_store: P, local_timezone: LocalTimezone) -> Self {
        Self {
            expense_store,
            preference_store,
            local_timezone,
            duplicate_detector: DuplicateDetector::default(),
            add_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Validate `expense`, reject it if it repeats a stored expense, and
    /// otherwise store it.
    ///
    /// Two concurrent calls with the same title and amount can never both be
    /// stored, because the duplicate check and the insert happen under one lock.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::Validation] if the expense is invalid, without touching the store,
    /// - [Error::DuplicateRejected] if the expense looks like a duplicate,
    /// - [Error::DatabaseLockError] if the add lock is poisoned,
    /// - or a storage error from the store.
    pub fn add_expense(&self, expense: ExpenseBuilder) -> Result<ExpenseId, Error> {
        expense.validate()?;

        let _guard = self.add_lock.lock().map_err(|_| Error::DatabaseLockError)?;

        if self
            .duplicate_detector
            .is_duplicate(&self.expense_store, &expense)?
        {
            tracing::debug!(
                "Rejected \"{}\" at {} as a possible duplicate",
                expense.title,
                expense.timestamp
            );
            return Err(Error::DuplicateRejected);
        }

        self.expense_store.insert(expense)
    }

    /// The current day in the local timezone.
    pub fn today(&self) -> Day {
        self.local_timezone.today()
    }

    /// Read and write the dark theme preference.
    pub fn theme(&self) -> ThemePreference<'_, P> {
        ThemePreference::new(&self.preference_store)
    }
}

impl<E, P> AppState<E, P>
where
    E: ExpenseStore + Clone + Send + Sync + 'static,
    P: PreferenceStore,
{
    /// Start a live view of the expenses for `day`.
    ///
    /// # Panics
    /// Panics if called outside of a Tokio runtime.
    pub fn day_view(&self, day: Day) -> DayView {
        DayView::spawn(self.expense_store.clone(), day)
    }
}
