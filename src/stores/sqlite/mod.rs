//! Contains convenience type alias and functions for [AppState] that uses
//! the SQLite backend.

pub mod expense;

pub use expense::SQLiteExpenseStore;

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use rusqlite::Connection;

use crate::{
    AppState, Error, db::initialize, preferences::SQLitePreferenceStore,
    timezone::LocalTimezone,
};

/// An alias for an [AppState] that uses SQLite for the backend.
pub type SQLAppState = AppState<SQLiteExpenseStore, SQLitePreferenceStore>;

/// Creates an [AppState] instance that uses SQLite for the backend.
///
/// This function will modify the database by adding the tables for the domain
/// models to the database.
pub fn create_app_state(
    db_connection: Connection,
    local_timezone: LocalTimezone,
) -> Result<SQLAppState, Error> {
    initialize(&db_connection)?;

    let connection = Arc::new(Mutex::new(db_connection));
    let expense_store = SQLiteExpenseStore::new(connection.clone());
    let preference_store = SQLitePreferenceStore::new(connection);

    Ok(AppState::new(expense_store, preference_store, local_timezone))
}

/// Opens (or creates) the database file at `path` and creates an [AppState]
/// for it.
///
/// # Errors
/// Returns a storage error if the file cannot be opened or initialised.
pub fn open_app_state(path: &Path, local_timezone: LocalTimezone) -> Result<SQLAppState, Error> {
    let connection = Connection::open(path)?;
    tracing::debug!("Opened database {}", path.display());

    create_app_state(connection, local_timezone)
}
