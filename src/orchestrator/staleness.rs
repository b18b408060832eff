//! When an application is due for another fetch.
use chrono::{DateTime, Utc};

use crate::config::Frequency;

/// Whether an application last fetched at `last_fetch` should be fetched at `now`.
///
/// Forced runs and never-fetched applications are always due. Otherwise the
/// whole days elapsed since the last fetch are compared with the frequency's
/// threshold. A clock that went backwards counts as zero days.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use userapps_cli::config::Frequency;
/// use userapps_cli::orchestrator::should_fetch;
///
/// let now = Utc::now();
/// assert!(should_fetch(now, Frequency::Weekly, None, false));
/// assert!(!should_fetch(now, Frequency::Weekly, Some(now - Duration::days(5)), false));
/// assert!(should_fetch(now, Frequency::Weekly, Some(now - Duration::days(6)), false));
/// ```
#[must_use]
pub fn should_fetch(
    now: DateTime<Utc>,
    frequency: Frequency,
    last_fetch: Option<DateTime<Utc>>,
    forced: bool,
) -> bool {
    if forced {
        return true;
    }
    let Some(last) = last_fetch else {
        return true;
    };
    let elapsed = (now - last).num_days().max(0);
    elapsed >= frequency.threshold_days()
}

/// First instant at which [`should_fetch`] turns true again.
#[must_use]
pub fn next_due(frequency: Frequency, last_fetch: DateTime<Utc>) -> DateTime<Utc> {
    last_fetch + chrono::Duration::days(frequency.threshold_days())
}
