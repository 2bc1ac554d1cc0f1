//! Decides whether a tenant is due for another run.
//!
//! The check is pure: callers pass `now` explicitly so it can be exercised
//! without a clock.

use chrono::{DateTime, Utc};

/// Slack subtracted from the required interval to absorb timer jitter
/// (0.01 h = 36 s).
pub const DUE_EPSILON_HOURS: f64 = 0.01;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Hours elapsed between `last_run_at` and `now`. Negative when `last_run_at`
/// lies in the future.
#[must_use]
pub fn elapsed_hours(last_run_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let millis = (now - last_run_at).num_milliseconds() as f64;
    millis / MILLIS_PER_HOUR
}

/// Returns `true` when a tenant that last succeeded at `last_run_at` should
/// run again at `now`.
///
/// Tenants that have never run are always due.
#[must_use]
pub fn is_due(
    last_run_at: Option<DateTime<Utc>>,
    required_interval_hours: f64,
    now: DateTime<Utc>,
) -> bool {
    match last_run_at {
        None => true,
        Some(last) => elapsed_hours(last, now) >= required_interval_hours - DUE_EPSILON_HOURS,
    }
}

/// Same as [`is_due`] for a raw RFC 3339 timestamp. Missing or unparsable
/// values are treated as "never run".
#[must_use]
pub fn is_due_raw(
    last_run_at: Option<&str>,
    required_interval_hours: f64,
    now: DateTime<Utc>,
) -> bool {
    let parsed = last_run_at
        .map(str::trim)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc));
    is_due(parsed, required_interval_hours, now)
}
