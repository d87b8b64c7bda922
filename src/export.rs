//! CSV export of expense reports.
//!
//! The format is a header line followed by one line per expense, oldest first:
//!
//! ```text
//! id,title,amount,category,notes,timestamp
//! 1,Lunch,250.0,Food,,1759665600000
//! ```
//!
//! Fields are joined with commas and never quoted or escaped. A title or note
//! that contains a comma or a line break makes its line ambiguous; readers of
//! the report must accept that limitation.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{
    Error,
    database_id::ExpenseId,
    day::{EpochMillis, MILLIS_PER_DAY},
    expense::Category,
    stores::ExpenseStore,
};

/// The first line of every export.
pub const CSV_HEADER: &str = "id,title,amount,category,notes,timestamp";

/// The file name used for the rolling seven day report.
pub const EXPORT_FILE_NAME: &str = "expenses_last7days.csv";

/// How far back the rolling report reaches.
const REPORT_WINDOW_MILLIS: i64 = 7 * MILLIS_PER_DAY;

/// Write the expenses recorded between `from` and `to` (inclusive) as CSV.
///
/// # Errors
/// Returns a storage error if the store cannot be queried, or an
/// [Error::ExportError] if `writer` fails.
fn write_range<W: Write>(
    store: &impl ExpenseStore,
    from: EpochMillis,
    to: EpochMillis,
    writer: &mut W,
) -> Result<usize, Error> {
    let expenses = store.query_range(from, to)?;

    writeln!(writer, "{CSV_HEADER}").map_err(|e| Error::ExportError(e.to_string()))?;

    for expense in &expenses {
        writeln!(
            writer,
            "{},{},{},{},{},{}",
            expense.id,
            expense.title,
            format_amount(expense.amount),
            expense.category,
            expense.notes.as_deref().unwrap_or_default(),
            expense.timestamp
        )
        .map_err(|e| Error::ExportError(e.to_string()))?;
    }

    Ok(expenses.len())
}

/// Export the expenses recorded between `from` and `to` (inclusive) as CSV.
///
/// The same stored expenses and range always produce identical bytes.
pub fn export_range(
    store: &impl ExpenseStore,
    from: EpochMillis,
    to: EpochMillis,
) -> Result<Vec<u8>, Error> {
    let mut csv = Vec::new();
    let count = write_range(store, from, to, &mut csv)?;

    tracing::info!("Exported {count} expense(s) recorded between {from} and {to}");

    Ok(csv)
}

/// Export the expenses recorded in the seven days up to and including `now`.
pub fn export_last_seven_days(
    store: &impl ExpenseStore,
    now: EpochMillis,
) -> Result<Vec<u8>, Error> {
    export_range(store, now - REPORT_WINDOW_MILLIS, now)
}

/// Save an export as [EXPORT_FILE_NAME] in `directory`, replacing any previous
/// report, and return the path of the file.
///
/// # Errors
/// Returns an [Error::ExportError] if the directory or file cannot be written.
pub fn write_export(directory: &Path, contents: &[u8]) -> Result<PathBuf, Error> {
    fs::create_dir_all(directory).map_err(|e| Error::ExportError(e.to_string()))?;

    let path = directory.join(EXPORT_FILE_NAME);
    fs::write(&path, contents).map_err(|e| Error::ExportError(e.to_string()))?;

    tracing::info!("Saved expense report to {}", path.display());

    Ok(path)
}

/// Amounts always carry a decimal point, e.g. `250.0` rather than `250`.
fn format_amount(amount: f64) -> String {
    format!("{amount:?}")
}

/// One line of an export read back with [parse_export].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExportRecord {
    /// The ID of the expense.
    pub id: ExpenseId,
    /// The title of the expense.
    pub title: String,
    /// How much was spent.
    pub amount: f64,
    /// What the expense was for.
    pub category: Category,
    /// The notes, or `None` if the field was empty.
    pub notes: Option<String>,
    /// When the expense was recorded.
    pub timestamp: EpochMillis,
}

/// Read an export back into records, in file order.
///
/// # Errors
/// Returns an [Error::ExportError] if the header is not [CSV_HEADER] or a line
/// does not have exactly six fields, e.g. because a title contained a comma.
pub fn parse_export(contents: &[u8]) -> Result<Vec<ExportRecord>, Error> {
    // The writer never quotes, so a leading `"` is part of the field.
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .quoting(false)
        .from_reader(contents);

    let header = reader
        .headers()
        .map_err(|e| Error::ExportError(e.to_string()))?
        .iter()
        .collect::<Vec<_>>()
        .join(",");
    if header != CSV_HEADER {
        return Err(Error::ExportError(format!(
            "expected the header \"{CSV_HEADER}\", got \"{header}\""
        )));
    }

    reader
        .deserialize::<ExportRecord>()
        .map(|record| record.map_err(|e| Error::ExportError(e.to_string())))
        .collect()
}
