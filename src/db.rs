//! Sets up the application's database schema.

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};

use crate::{Error, expense::create_expense_table, preferences::create_preference_table};

/// Create the tables for the domain models if they do not exist yet.
///
/// Safe to call on every start up, existing data is left untouched.
///
/// # Errors
/// Returns an [Error::StorageFailure] if the tables cannot be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_expense_table(&transaction)?;
    create_preference_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
