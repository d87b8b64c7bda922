//! Implements a SQLite backed expense store.
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, params};
use tokio::sync::broadcast;

use crate::{
    Error,
    database_id::ExpenseId,
    day::{Day, EpochMillis},
    expense::{Expense, ExpenseBuilder, map_expense_row},
    stores::{ExpenseStore, StoreChange},
};

/// How many change notifications a slow listener may fall behind by before it
/// starts missing them.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Stores expenses in a SQLite database.
///
/// Clones share the same connection and change feed. All operations lock the
/// connection, so concurrent callers are serialized and never observe a
/// partially written expense.
#[derive(Debug, Clone)]
pub struct SQLiteExpenseStore {
    connection: Arc<Mutex<Connection>>,
    changes: broadcast::Sender<StoreChange>,
}

impl SQLiteExpenseStore {
    /// Create a new store for the SQLite `connection`.
    ///
    /// The expense table must already exist, see [crate::initialize_db].
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);

        Self {
            connection,
            changes,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)
    }

    fn select_expenses<P: rusqlite::Params>(
        &self,
        query: &str,
        params: P,
    ) -> Result<Vec<Expense>, Error> {
        let connection = self.lock()?;

        let expenses = connection
            .prepare(query)?
            .query_map(params, map_expense_row)?
            .collect::<Result<Vec<Expense>, rusqlite::Error>>()?;

        Ok(expenses)
    }
}

impl ExpenseStore for SQLiteExpenseStore {
    /// Store a new expense in the database.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::Validation] if the expense fails validation,
    /// - [Error::DatabaseLockError] if the connection lock is poisoned,
    /// - or [Error::StorageFailure] if there is an SQL error.
    fn insert(&self, expense: ExpenseBuilder) -> Result<ExpenseId, Error> {
        expense.validate()?;
        let day = expense.date;

        let id: ExpenseId = self
            .lock()?
            .prepare(
                "INSERT INTO expense (title, amount, category, notes, receipt_uri, synced, timestamp, date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 RETURNING id",
            )?
            .query_row(
                (
                    expense.title,
                    expense.amount,
                    expense.category,
                    expense.notes,
                    expense.receipt_uri,
                    false,
                    expense.timestamp,
                    expense.date,
                ),
                |row| row.get(0),
            )?;

        tracing::info!("Stored expense #{id} for day {day}");

        // Sending only fails when nobody is listening.
        let _ = self.changes.send(StoreChange::Inserted { id, day });

        Ok(id)
    }

    /// Retrieve an expense in the database by its `id`.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if `id` does not refer to a stored expense,
    /// - or [Error::StorageFailure] if there is some other SQL error.
    fn get(&self, id: ExpenseId) -> Result<Expense, Error> {
        let expense = self
            .lock()?
            .prepare(
                "SELECT id, title, amount, category, notes, receipt_uri, synced, timestamp, date
                 FROM expense WHERE id = :id",
            )?
            .query_row(&[(":id", &id)], map_expense_row)?;

        Ok(expense)
    }

    fn query_by_date(&self, day: Day) -> Result<Vec<Expense>, Error> {
        // Sort by ID as well to keep the order stable for equal timestamps.
        self.select_expenses(
            "SELECT id, title, amount, category, notes, receipt_uri, synced, timestamp, date
             FROM expense WHERE date = ?1
             ORDER BY timestamp DESC, id DESC",
            [day],
        )
    }

    fn query_all(&self) -> Result<Vec<Expense>, Error> {
        self.select_expenses(
            "SELECT id, title, amount, category, notes, receipt_uri, synced, timestamp, date
             FROM expense
             ORDER BY timestamp DESC, id DESC",
            params![],
        )
    }

    fn query_range(&self, from: EpochMillis, to: EpochMillis) -> Result<Vec<Expense>, Error> {
        self.select_expenses(
            "SELECT id, title, amount, category, notes, receipt_uri, synced, timestamp, date
             FROM expense WHERE timestamp BETWEEN ?1 AND ?2
             ORDER BY timestamp ASC, id ASC",
            [from, to],
        )
    }

    fn count_matching(
        &self,
        title: &str,
        amount: f64,
        timestamp: EpochMillis,
        window_millis: i64,
    ) -> Result<u64, Error> {
        let count: i64 = self.lock()?.query_row(
            "SELECT COUNT(id) FROM expense
             WHERE title = ?1 AND amount = ?2 AND abs(timestamp - ?3) < ?4",
            (title, amount, timestamp, window_millis),
            |row| row.get(0),
        )?;

        Ok(count as u64)
    }

    fn total_for_day(&self, day: Day) -> Result<f64, Error> {
        let total = self.lock()?.query_row(
            "SELECT COALESCE(SUM(amount), 0.0) FROM expense WHERE date = ?1",
            [day],
            |row| row.get(0),
        )?;

        Ok(total)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        thread,
    };

    use rusqlite::{Connection, OpenFlags};
    use tokio::sync::broadcast::error::TryRecvError;

    use crate::{
        Error,
        day::Day,
        db::initialize,
        expense::{Category, Expense, ValidationError},
        stores::{ExpenseStore, StoreChange},
    };

    use super::SQLiteExpenseStore;

    const DAY_MILLIS: i64 = 86_400_000;
    const TODAY: Day = Day::new_unchecked(20_000 * DAY_MILLIS);

    fn get_test_store() -> SQLiteExpenseStore {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        SQLiteExpenseStore::new(Arc::new(Mutex::new(conn)))
    }

    fn at(offset_millis: i64) -> i64 {
        TODAY.start_millis() + offset_millis
    }

    #[test]
    fn insert_assigns_fresh_ids() {
        let store = get_test_store();

        let first = store
            .insert(Expense::build("Lunch", 250.0, Category::Food, at(1000), TODAY))
            .unwrap();
        let second = store
            .insert(Expense::build("Taxi", 40.0, Category::Travel, at(2000), TODAY))
            .unwrap();

        assert_ne!(first, second);
        assert!(second > first, "ids should increase, got {first} then {second}");
    }

    #[test]
    fn inserted_expense_is_returned_by_query_by_date() {
        let store = get_test_store();
        let builder = Expense::build("Lunch", 250.0, Category::Food, at(1000), TODAY)
            .notes(Some("Team lunch".to_owned()))
            .receipt_uri(Some("content://receipts/1".to_owned()));

        let id = store.insert(builder.clone()).unwrap();
        let got = store.query_by_date(TODAY).unwrap();

        let want = Expense {
            id,
            title: builder.title,
            amount: builder.amount,
            category: builder.category,
            notes: builder.notes,
            receipt_uri: builder.receipt_uri,
            synced: false,
            timestamp: builder.timestamp,
            date: builder.date,
        };
        assert_eq!(got, vec![want.clone()]);
        assert_eq!(store.get(id), Ok(want));
    }

    #[test]
    fn get_missing_expense_is_not_found() {
        let store = get_test_store();

        assert_eq!(store.get(42), Err(Error::NotFound));
    }

    #[test]
    fn invalid_expense_is_not_stored() {
        let store = get_test_store();

        let result = store.insert(Expense::build("", 250.0, Category::Food, at(0), TODAY));

        assert_eq!(result, Err(Error::Validation(ValidationError::EmptyTitle)));
        assert_eq!(store.query_all().unwrap(), vec![]);
    }

    #[test]
    fn query_by_date_orders_most_recent_first_and_filters_days() {
        let store = get_test_store();
        let yesterday = Day::new_unchecked(TODAY.start_millis() - DAY_MILLIS);
        let early = store
            .insert(Expense::build("Coffee", 5.0, Category::Food, at(1000), TODAY))
            .unwrap();
        let late = store
            .insert(Expense::build("Dinner", 60.0, Category::Food, at(5000), TODAY))
            .unwrap();
        let middle = store
            .insert(Expense::build("Bus", 3.5, Category::Travel, at(3000), TODAY))
            .unwrap();
        store
            .insert(Expense::build("Power", 120.0, Category::Utility, at(2000), yesterday))
            .unwrap();

        let ids: Vec<_> = store
            .query_by_date(TODAY)
            .unwrap()
            .into_iter()
            .map(|expense| expense.id)
            .collect();

        assert_eq!(ids, vec![late, middle, early]);
    }

    #[test]
    fn backdated_expense_is_grouped_by_date_not_timestamp() {
        let store = get_test_store();
        let last_week = Day::new_unchecked(TODAY.start_millis() - 7 * DAY_MILLIS);

        let id = store
            .insert(Expense::build("Hotel", 180.0, Category::Travel, at(1000), last_week))
            .unwrap();

        assert_eq!(store.query_by_date(TODAY).unwrap(), vec![]);
        assert_eq!(store.query_by_date(last_week).unwrap()[0].id, id);
    }

    #[test]
    fn query_by_date_is_idempotent() {
        let store = get_test_store();
        for i in 0..5 {
            store
                .insert(Expense::build(
                    &format!("Item {i}"),
                    1.0 + i as f64,
                    Category::Staff,
                    at(i * 10),
                    TODAY,
                ))
                .unwrap();
        }

        let first = store.query_by_date(TODAY).unwrap();
        let second = store.query_by_date(TODAY).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn query_all_orders_most_recent_first() {
        let store = get_test_store();
        let yesterday = Day::new_unchecked(TODAY.start_millis() - DAY_MILLIS);
        let a = store
            .insert(Expense::build("A", 1.0, Category::Food, at(-5000), yesterday))
            .unwrap();
        let b = store
            .insert(Expense::build("B", 2.0, Category::Food, at(5000), TODAY))
            .unwrap();

        let ids: Vec<_> = store.query_all().unwrap().iter().map(|e| e.id).collect();

        assert_eq!(ids, vec![b, a]);
    }

    #[test]
    fn query_range_is_inclusive_and_oldest_first() {
        let store = get_test_store();
        let mut ids = Vec::new();
        for i in 0..6 {
            let id = store
                .insert(Expense::build(
                    &format!("Item {i}"),
                    1.0,
                    Category::Food,
                    at(i * 1000),
                    TODAY,
                ))
                .unwrap();
            ids.push(id);
        }

        let got: Vec<_> = store
            .query_range(at(1000), at(4000))
            .unwrap()
            .iter()
            .map(|expense| expense.id)
            .collect();

        assert_eq!(got, ids[1..=4].to_vec());
    }

    #[test]
    fn query_range_with_reversed_bounds_is_empty() {
        let store = get_test_store();
        store
            .insert(Expense::build("Lunch", 250.0, Category::Food, at(1000), TODAY))
            .unwrap();

        assert_eq!(store.query_range(at(2000), at(0)).unwrap(), vec![]);
    }

    #[test]
    fn count_matching_uses_strict_window_in_both_directions() {
        let store = get_test_store();
        let window = 300_000;
        store
            .insert(Expense::build("Lunch", 250.0, Category::Food, at(window), TODAY))
            .unwrap();

        let count = |timestamp| store.count_matching("Lunch", 250.0, timestamp, window).unwrap();

        assert_eq!(count(at(window)), 1);
        assert_eq!(count(at(window + 299_999)), 1);
        assert_eq!(count(at(1)), 1);
        assert_eq!(count(at(2 * window)), 0);
        assert_eq!(count(at(0)), 0);
    }

    #[test]
    fn count_matching_requires_exact_title_and_amount() {
        let store = get_test_store();
        store
            .insert(Expense::build("Lunch", 250.0, Category::Food, at(0), TODAY))
            .unwrap();

        assert_eq!(store.count_matching("lunch", 250.0, at(0), 300_000).unwrap(), 0);
        assert_eq!(store.count_matching("Lunch", 250.01, at(0), 300_000).unwrap(), 0);
        assert_eq!(store.count_matching("Lunch", 250.0, at(0), 300_000).unwrap(), 1);
    }

    #[test]
    fn total_for_day_sums_amounts_for_that_day_only() {
        let store = get_test_store();
        let yesterday = Day::new_unchecked(TODAY.start_millis() - DAY_MILLIS);
        store
            .insert(Expense::build("Lunch", 250.0, Category::Food, at(0), TODAY))
            .unwrap();
        store
            .insert(Expense::build("Taxi", 42.5, Category::Travel, at(1000), TODAY))
            .unwrap();
        store
            .insert(Expense::build("Power", 100.0, Category::Utility, at(2000), yesterday))
            .unwrap();

        assert_eq!(store.total_for_day(TODAY).unwrap(), 292.5);
        assert_eq!(store.total_for_day(yesterday).unwrap(), 100.0);
    }

    #[test]
    fn total_for_empty_day_is_zero() {
        let store = get_test_store();

        assert_eq!(store.total_for_day(TODAY).unwrap(), 0.0);
    }

    #[test]
    fn insert_notifies_subscribers_after_the_expense_is_visible() {
        let store = get_test_store();
        let mut changes = store.subscribe();

        let id = store
            .insert(Expense::build("Lunch", 250.0, Category::Food, at(0), TODAY))
            .unwrap();

        let change = changes.try_recv().expect("expected a change notification");
        assert_eq!(change, StoreChange::Inserted { id, day: TODAY });
        assert_eq!(store.query_by_date(change.day()).unwrap().len(), 1);
    }

    #[test]
    fn failed_insert_does_not_notify() {
        let store = get_test_store();
        let mut changes = store.subscribe();

        let _ = store.insert(Expense::build("Lunch", 0.0, Category::Food, at(0), TODAY));

        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn every_operation_fails_when_the_table_is_missing() {
        let store = get_test_store();
        let mut changes = store.subscribe();
        store
            .connection
            .lock()
            .unwrap()
            .execute("DROP TABLE expense", ())
            .unwrap();

        let insert = store.insert(Expense::build("Lunch", 250.0, Category::Food, at(0), TODAY));

        assert!(insert.unwrap_err().is_storage_failure());
        assert!(store.get(1).unwrap_err().is_storage_failure());
        assert!(store.query_by_date(TODAY).unwrap_err().is_storage_failure());
        assert!(store.query_all().unwrap_err().is_storage_failure());
        assert!(store.query_range(at(0), at(1)).unwrap_err().is_storage_failure());
        assert!(
            store
                .count_matching("Lunch", 250.0, at(0), 300_000)
                .unwrap_err()
                .is_storage_failure()
        );
        assert!(store.total_for_day(TODAY).unwrap_err().is_storage_failure());
        assert_eq!(changes.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn insert_into_read_only_database_fails_without_notifying() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("expenses.db");
        {
            let conn = Connection::open(&path).unwrap();
            initialize(&conn).unwrap();
        }
        let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY).unwrap();
        let store = SQLiteExpenseStore::new(Arc::new(Mutex::new(conn)));
        let mut changes = store.subscribe();

        let result = store.insert(Expense::build("Lunch", 250.0, Category::Food, at(0), TODAY));

        assert!(result.unwrap_err().is_storage_failure());
        assert_eq!(changes.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(store.query_by_date(TODAY).unwrap(), vec![]);
    }

    #[test]
    fn concurrent_inserts_get_unique_ids() {
        let store = get_test_store();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || {
                    (0..10)
                        .map(|j| {
                            store
                                .insert(Expense::build(
                                    &format!("Item {i}-{j}"),
                                    1.0,
                                    Category::Staff,
                                    at(i * 100 + j),
                                    TODAY,
                                ))
                                .unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<_> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        ids.sort();
        ids.dedup();

        assert_eq!(ids.len(), 80);
        assert_eq!(store.query_by_date(TODAY).unwrap().len(), 80);
    }

    #[test]
    fn expenses_survive_reopening_the_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("expenses.db");

        let id = {
            let conn = Connection::open(&path).unwrap();
            initialize(&conn).unwrap();
            let store = SQLiteExpenseStore::new(Arc::new(Mutex::new(conn)));
            store
                .insert(Expense::build("Lunch", 250.0, Category::Food, at(0), TODAY))
                .unwrap()
        };

        let conn = Connection::open(&path).unwrap();
        initialize(&conn).unwrap();
        let store = SQLiteExpenseStore::new(Arc::new(Mutex::new(conn)));

        let expenses = store.query_by_date(TODAY).unwrap();
        assert_eq!(expenses.len(), 1);
        assert_eq!(expenses[0].id, id);
        assert_eq!(expenses[0].title, "Lunch");

        let next_id = store
            .insert(Expense::build("Dinner", 80.0, Category::Food, at(1000), TODAY))
            .unwrap();
        assert!(next_id > id, "ids must never be reused");
    }
}
