//! Preference Management
//!
//! This module handles saving and loading small user preferences, such as
//! whether the front end should use a dark theme. Preferences live in the same
//! database as the expenses but are not part of the expense core.

use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OptionalExtension};

use crate::Error;

/// The key under which the dark theme preference is stored.
pub const DARK_THEME_KEY: &str = "pref_dark";

/// Create the preference table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_preference_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS preference (
            key TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        )",
        (),
    )?;

    Ok(())
}

/// Persists boolean flags by name.
pub trait PreferenceStore {
    /// Get the flag stored under `key`, or `None` if it has never been set.
    fn get_bool(&self, key: &str) -> Result<Option<bool>, Error>;

    /// Store `value` under `key`, replacing any previous value.
    fn set_bool(&self, key: &str, value: bool) -> Result<(), Error>;
}

/// Stores preferences in a SQLite database.
#[derive(Debug, Clone)]
pub struct SQLitePreferenceStore {
    connection: Arc<Mutex<Connection>>,
}

impl SQLitePreferenceStore {
    /// Create a new store for the SQLite `connection`.
    ///
    /// The preference table must already exist, see [crate::initialize_db].
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }
}

impl PreferenceStore for SQLitePreferenceStore {
    fn get_bool(&self, key: &str) -> Result<Option<bool>, Error> {
        let value = self
            .connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?
            .query_row(
                "SELECT value FROM preference WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value)
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<(), Error> {
        self.connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?
            .execute(
                "INSERT INTO preference (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                (key, value),
            )?;

        Ok(())
    }
}

/// Whether the front end should use a dark theme.
pub struct ThemePreference<'a, P> {
    store: &'a P,
}

impl<'a, P: PreferenceStore> ThemePreference<'a, P> {
    /// Read and write the theme preference in `store`.
    pub fn new(store: &'a P) -> Self {
        Self { store }
    }

    /// Whether the dark theme is on, or `default` if the user never chose.
    ///
    /// Front ends should pass the system's own dark mode setting as `default`.
    pub fn is_dark(&self, default: bool) -> Result<bool, Error> {
        Ok(self.store.get_bool(DARK_THEME_KEY)?.unwrap_or(default))
    }

    /// Turn the dark theme on or off.
    pub fn set_dark(&self, value: bool) -> Result<(), Error> {
        tracing::debug!("Setting dark theme to {value}");
        self.store.set_bool(DARK_THEME_KEY, value)
    }
}
