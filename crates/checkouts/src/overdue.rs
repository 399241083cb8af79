//! Read-time overdue computation.

use chrono::{DateTime, Utc};

use crate::tool::CheckoutRecord;

/// A checkout is overdue when it is still open, has an expected return date,
/// and `now` is strictly past it. Returning exactly at the expected time is
/// not overdue.
pub fn is_overdue(record: &CheckoutRecord, now: DateTime<Utc>) -> bool {
    if record.return_date.is_some() {
        return false;
    }
    match record.expected_return_date {
        Some(expected) => now > expected,
        None => false,
    }
}

/// Whole days past the expected return date, by calendar date. Zero for
/// anything not overdue, never negative.
pub fn days_overdue(record: &CheckoutRecord, now: DateTime<Utc>) -> i64 {
    if !is_overdue(record, now) {
        return 0;
    }
    let expected = match record.expected_return_date {
        Some(expected) => expected,
        None => return 0,
    };
    (now.date_naive() - expected.date_naive()).num_days().max(0)
}
