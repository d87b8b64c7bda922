//! Expense management for the expense tracker.
//!
//! This module contains the `Expense` model, its builder and validation rules,
//! the fixed set of expense categories, and the SQL schema and row mapping used
//! by the stores.

mod category;
mod core;

pub use category::Category;
pub use core::{
    Expense, ExpenseBuilder, MAX_NOTES_LENGTH, ValidationError, create_expense_table,
    map_expense_row,
};
