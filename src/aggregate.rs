//! Expense totals per day, per date range and per category.
//!
//! Nothing here is cached; every call reads the store's current contents.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    Error,
    day::{Day, EpochMillis},
    expense::Category,
    stores::ExpenseStore,
    timezone::LocalTimezone,
};

/// The total spent on one day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyTotal {
    /// The day the total is for.
    pub day: Day,
    /// The sum of the amounts of the day's expenses.
    pub total: f64,
}

/// The total spent on `day`.
pub fn daily_total(store: &impl ExpenseStore, day: Day) -> Result<f64, Error> {
    store.total_for_day(day)
}

/// The total spent on expenses recorded between `from` and `to`, inclusive.
///
/// Unlike [daily_total] this selects expenses by their timestamp, not the day
/// they are attributed to.
pub fn range_total(
    store: &impl ExpenseStore,
    from: EpochMillis,
    to: EpochMillis,
) -> Result<f64, Error> {
    let total = store
        .query_range(from, to)?
        .iter()
        .map(|expense| expense.amount)
        .sum();

    Ok(total)
}

/// The total spent on `day` in each category.
///
/// Categories without any expenses that day are left out.
pub fn category_totals(
    store: &impl ExpenseStore,
    day: Day,
) -> Result<BTreeMap<Category, f64>, Error> {
    let mut totals = BTreeMap::new();

    for expense in store.query_by_date(day)? {
        *totals.entry(expense.category).or_insert(0.0) += expense.amount;
    }

    Ok(totals)
}

/// The total for each of the `days` calendar days ending with `last_day`,
/// oldest first.
///
/// Days without expenses are included with a total of zero.
pub fn daily_totals(
    store: &impl ExpenseStore,
    timezone: &LocalTimezone,
    last_day: Day,
    days: u32,
) -> Result<Vec<DailyTotal>, Error> {
    (0..days as i64)
        .rev()
        .map(|days_before| -> Result<DailyTotal, Error> {
            let day = timezone.add_days(last_day, -days_before);

            Ok(DailyTotal {
                day,
                total: store.total_for_day(day)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeMap,
        sync::{Arc, Mutex},
    };

    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        day::Day,
        db::initialize,
        expense::{Category, Expense},
        stores::{ExpenseStore, SQLiteExpenseStore},
        timezone::LocalTimezone,
    };

    use super::{DailyTotal, category_totals, daily_total, daily_totals, range_total};

    fn get_test_store() -> SQLiteExpenseStore {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        SQLiteExpenseStore::new(Arc::new(Mutex::new(conn)))
    }

    fn insert(store: &SQLiteExpenseStore, title: &str, amount: f64, category: Category, day: Day) {
        // Offset each timestamp so the duplicate window never matters here.
        let timestamp = day.start_millis() + (amount * 1000.0) as i64;
        store
            .insert(Expense::build(title, amount, category, timestamp, day))
            .unwrap();
    }

    #[test]
    fn daily_total_matches_store_total() {
        let store = get_test_store();
        let day = LocalTimezone::UTC.day_of_date(date!(2025 - 10 - 05));
        insert(&store, "Lunch", 250.0, Category::Food, day);
        insert(&store, "Bus", 3.5, Category::Travel, day);

        assert_eq!(daily_total(&store, day).unwrap(), 253.5);
    }

    #[test]
    fn daily_total_for_empty_day_is_zero() {
        let store = get_test_store();
        let day = LocalTimezone::UTC.day_of_date(date!(2025 - 10 - 05));

        assert_eq!(daily_total(&store, day).unwrap(), 0.0);
    }

    #[test]
    fn range_total_selects_by_timestamp() {
        let store = get_test_store();
        let day = LocalTimezone::UTC.day_of_date(date!(2025 - 10 - 05));
        let start = day.start_millis();
        for (offset, amount) in [(0, 10.0), (1000, 20.0), (2000, 40.0)] {
            store
                .insert(Expense::build("Item", amount, Category::Food, start + offset, day))
                .unwrap();
        }

        assert_eq!(range_total(&store, start, start + 1000).unwrap(), 30.0);
        assert_eq!(range_total(&store, start + 1, start + 5000).unwrap(), 60.0);
        assert_eq!(range_total(&store, start - 10, start - 1).unwrap(), 0.0);
    }

    #[test]
    fn range_total_reflects_new_inserts() {
        let store = get_test_store();
        let day = LocalTimezone::UTC.day_of_date(date!(2025 - 10 - 05));
        let start = day.start_millis();
        let end = start + 86_399_999;
        insert(&store, "Lunch", 12.0, Category::Food, day);

        let before = range_total(&store, start, end).unwrap();
        insert(&store, "Dinner", 30.0, Category::Food, day);
        let after = range_total(&store, start, end).unwrap();

        assert_eq!(before, 12.0);
        assert_eq!(after, 42.0);
    }

    #[test]
    fn category_totals_group_the_days_expenses() {
        let store = get_test_store();
        let day = LocalTimezone::UTC.day_of_date(date!(2025 - 10 - 05));
        let other_day = LocalTimezone::UTC.day_of_date(date!(2025 - 10 - 04));
        insert(&store, "Lunch", 25.0, Category::Food, day);
        insert(&store, "Dinner", 40.0, Category::Food, day);
        insert(&store, "Taxi", 18.0, Category::Travel, day);
        insert(&store, "Power", 90.0, Category::Utility, other_day);

        let got = category_totals(&store, day).unwrap();

        let want = BTreeMap::from([(Category::Travel, 18.0), (Category::Food, 65.0)]);
        assert_eq!(got, want);
    }

    #[test]
    fn daily_totals_cover_every_day_oldest_first() {
        let store = get_test_store();
        let timezone = LocalTimezone::UTC;
        let today = timezone.day_of_date(date!(2025 - 10 - 07));
        let two_days_ago = timezone.day_of_date(date!(2025 - 10 - 05));
        let too_old = timezone.day_of_date(date!(2025 - 09 - 30));
        insert(&store, "Lunch", 20.0, Category::Food, today);
        insert(&store, "Fuel", 60.0, Category::Travel, two_days_ago);
        insert(&store, "Rent", 500.0, Category::Utility, too_old);

        let got = daily_totals(&store, &timezone, today, 7).unwrap();

        let want: Vec<DailyTotal> = (1..=7)
            .map(|day_of_month| {
                let day = timezone.day_of_date(
                    date!(2025 - 10 - 01)
                        .replace_day(day_of_month)
                        .unwrap(),
                );
                let total = match day_of_month {
                    5 => 60.0,
                    7 => 20.0,
                    _ => 0.0,
                };
                DailyTotal { day, total }
            })
            .collect();
        assert_eq!(got, want);
    }
}
