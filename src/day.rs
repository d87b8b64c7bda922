//! Instants and day buckets measured in milliseconds since the Unix epoch.

use std::fmt::Display;

use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Milliseconds since the Unix epoch.
pub type EpochMillis = i64;

/// The number of milliseconds in a 24 hour day.
///
/// Days in a timezone with daylight saving may be shorter or longer, use
/// [LocalTimezone](crate::LocalTimezone) to step between calendar days.
pub const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// The logical calendar day an expense is attributed to.
///
/// The inner value is the instant of local midnight that starts the day, in
/// milliseconds since the Unix epoch. Two instants on the same wall-clock day
/// always produce the same `Day`.
///
/// To create a `Day` from an arbitrary instant use
/// [LocalTimezone::start_of_day](crate::LocalTimezone::start_of_day).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Day(EpochMillis);

impl Day {
    /// Create a day from a value that is already the start of a local day.
    ///
    /// The caller should ensure that `start_millis` is a local midnight.
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`, because if the
    /// local midnight invariant is violated it will cause incorrect grouping but not
    /// affect memory safety.
    pub const fn new_unchecked(start_millis: EpochMillis) -> Self {
        Self(start_millis)
    }

    /// The instant the day starts, in milliseconds since the Unix epoch.
    pub const fn start_millis(self) -> EpochMillis {
        self.0
    }
}

impl Display for Day {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for Day {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for Day {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(Day)
    }
}

/// The current time in milliseconds since the Unix epoch.
pub fn now_millis() -> EpochMillis {
    to_millis(OffsetDateTime::now_utc())
}

/// Convert a date-time to milliseconds since the Unix epoch.
pub(crate) fn to_millis(date_time: OffsetDateTime) -> EpochMillis {
    (date_time.unix_timestamp_nanos() / 1_000_000) as EpochMillis
}

/// Convert milliseconds since the Unix epoch to a UTC date-time.
///
/// Values outside the range supported by [time] are clamped to the Unix epoch.
pub(crate) fn from_millis(millis: EpochMillis) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}
