use chrono::{DateTime, NaiveDate};

use crate::{CoreError, CoreResult};

/// Collapse whatever the booking UI sent into the calendar day it meant.
///
/// Accepted forms:
/// * `2024-06-01` (canonical)
/// * an RFC 3339 timestamp such as `2024-06-01T00:00:00+02:00`, in which case
///   the date is read in the timestamp's own offset. A visitor in UTC+2 who
///   picks June 1st therefore maps to 2024-06-01, not to May 31st in UTC.
pub fn normalize_date(input: &str) -> CoreResult<NaiveDate> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidArgument("date is required".to_string()));
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.date_naive());
    }

    Err(CoreError::InvalidArgument(format!(
        "invalid date '{}', expected YYYY-MM-DD",
        trimmed
    )))
}
