//! Time utilities for tvfleet
//!
//! Provides the staleness arithmetic shared by the sweeper and the API.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Current wall-clock time.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// The instant `window` before `now`.
///
/// Saturates at the earliest representable time for absurdly large windows.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use tvf_core::time::{now, stale_threshold};
///
/// let now = now();
/// let threshold = stale_threshold(now, Duration::from_secs(300));
/// assert_eq!((now - threshold).num_seconds(), 300);
/// ```
pub fn stale_threshold(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|w| now.checked_sub_signed(w))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
