//! Local timezone handling for normalizing instants to day buckets.

use std::fmt::Debug;

use time::{Date, Duration, OffsetDateTime, UtcOffset};
use time_tz::{Offset, TimeZone, Tz};

use crate::{
    Error,
    day::{Day, EpochMillis, from_millis, to_millis},
};

/// Get the current UTC offset of a canonical timezone, e.g. "Pacific/Auckland".
pub fn get_local_offset(canonical_timezone: &str) -> Option<UtcOffset> {
    time_tz::timezones::get_by_name(canonical_timezone)
        .map(|tz| tz.get_offset_utc(&OffsetDateTime::now_utc()).to_utc())
}

/// The timezone that decides where one calendar day ends and the next begins.
#[derive(Clone, Copy)]
pub enum LocalTimezone {
    /// A canonical timezone from the IANA database, honouring daylight saving.
    Named(&'static Tz),
    /// A fixed offset from UTC.
    Fixed(UtcOffset),
}

impl LocalTimezone {
    /// UTC.
    pub const UTC: Self = Self::Fixed(UtcOffset::UTC);

    /// Look up a canonical timezone name, e.g. "Pacific/Auckland".
    ///
    /// # Errors
    /// Returns [Error::InvalidTimezoneError] if the name is not a known timezone.
    pub fn from_name(canonical_timezone: &str) -> Result<Self, Error> {
        time_tz::timezones::get_by_name(canonical_timezone)
            .map(Self::Named)
            .ok_or_else(|| Error::InvalidTimezoneError(canonical_timezone.to_owned()))
    }

    /// The machine's current UTC offset, or UTC if it cannot be determined.
    pub fn system() -> Self {
        match UtcOffset::current_local_offset() {
            Ok(offset) => Self::Fixed(offset),
            Err(error) => {
                tracing::warn!(
                    "Could not determine the local UTC offset, falling back to UTC: {error}"
                );
                Self::UTC
            }
        }
    }

    /// The UTC offset in effect at `instant`.
    pub fn offset_at(&self, instant: EpochMillis) -> UtcOffset {
        self.offset_at_date_time(&from_millis(instant))
    }

    fn offset_at_date_time(&self, date_time: &OffsetDateTime) -> UtcOffset {
        match self {
            Self::Named(tz) => tz.get_offset_utc(date_time).to_utc(),
            Self::Fixed(offset) => *offset,
        }
    }

    /// The day bucket containing `instant`.
    ///
    /// Every instant on the same wall-clock day maps to the same [Day].
    pub fn start_of_day(&self, instant: EpochMillis) -> Day {
        let local_date = from_millis(instant)
            .to_offset(self.offset_at(instant))
            .date();

        self.day_of_date(local_date)
    }

    /// The day bucket for a calendar date.
    pub fn day_of_date(&self, date: Date) -> Day {
        let midnight = date.midnight();
        let guess = self.offset_at_date_time(&midnight.assume_utc());
        let mut start = midnight.assume_offset(guess);

        // The offset can change between UTC midnight and local midnight.
        let actual = self.offset_at_date_time(&start);
        if actual != guess {
            start = midnight.assume_offset(actual);
        }

        Day::new_unchecked(to_millis(start))
    }

    /// The calendar date a day bucket refers to.
    pub fn date_of(&self, day: Day) -> Date {
        let start = day.start_millis();

        from_millis(start).to_offset(self.offset_at(start)).date()
    }

    /// The day `days` calendar days after `day`, or before it when negative.
    pub fn add_days(&self, day: Day, days: i64) -> Day {
        let date = self.date_of(day).saturating_add(Duration::days(days));

        self.day_of_date(date)
    }

    /// The day bucket for the current time.
    pub fn today(&self) -> Day {
        self.start_of_day(to_millis(OffsetDateTime::now_utc()))
    }
}

impl Debug for LocalTimezone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(tz) => f.debug_tuple("Named").field(&tz.name()).finish(),
            Self::Fixed(offset) => f.debug_tuple("Fixed").field(offset).finish(),
        }
    }
}

impl Default for LocalTimezone {
    fn default() -> Self {
        Self::UTC
    }
}
