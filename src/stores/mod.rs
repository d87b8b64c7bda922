//! Contains traits and implementations for objects that store the domain
//! [models](crate::Expense).

mod expense;

pub mod sqlite;

pub use expense::{ExpenseStore, StoreChange};
pub use sqlite::SQLiteExpenseStore;
