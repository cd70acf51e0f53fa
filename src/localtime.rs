//! Timezone helpers shared by the adapters
//!
//! All displayed clock times and day labels derive from an explicit
//! conversion of the instant into the configured timezone. Calendar-date
//! comparisons always go through `local_date` - never through offsets or
//! string slicing of timestamps.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Render an instant as a 24-hour "HH:MM" string in the target timezone.
pub fn format_hm(instant: DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format("%H:%M").to_string()
}

/// Calendar date of an instant in the target timezone.
pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Day-group label for an instant: "Today", "Tomorrow", or "Thu, 27 Feb".
pub fn day_label(instant: DateTime<Utc>, now: DateTime<Utc>, tz: Tz) -> String {
    let date = local_date(instant, tz);
    let today = local_date(now, tz);

    if date == today {
        return "Today".to_string();
    }
    if Some(date) == today.succ_opt() {
        return "Tomorrow".to_string();
    }
    instant.with_timezone(&tz).format("%a, %-d %b").to_string()
}

/// First instant of a calendar day in the target timezone.
/// `None` when local midnight falls into a DST gap; callers drop the record.
pub fn local_midnight(date: NaiveDate, tz: Tz) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0)
        .and_then(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc))
}

/// Last second of a calendar day in the target timezone.
pub fn local_end_of_day(date: NaiveDate, tz: Tz) -> Option<DateTime<Utc>> {
    date.and_hms_opt(23, 59, 59)
        .and_then(|naive| tz.from_local_datetime(&naive).latest())
        .map(|local| local.with_timezone(&Utc))
}
