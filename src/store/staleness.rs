//! Freshness policy: decides whether a cached entry warrants a new fetch.
//!
//! The rule is deliberately simple and shared by every caller of the
//! dispatcher:
//!
//! 1. No entry at all → fetch.
//! 2. A fetch is already in flight → never double-dispatch.
//! 3. The entry was refreshed within the threshold → skip.
//! 4. Otherwise → fetch.

use std::time::Duration;

use super::entry::CacheEntry;

/// Refetch on every check (list resources driven by an external tick).
pub const ALWAYS_REFRESH: Duration = Duration::ZERO;

/// Balance lookups tolerate a short window of staleness, which suppresses
/// redundant refetch bursts from rapid repeated requests.
pub const BALANCE_REFRESH: Duration = Duration::from_secs(3);

/// Fetch only when the key has never been loaded (warm-up semantics).
pub const IF_ABSENT: Duration = Duration::MAX;

/// Returns `true` when a new fetch should be dispatched for the entry.
///
/// # Examples
///
/// ```
/// use walletsync::store::staleness::{should_fetch, ALWAYS_REFRESH};
/// use walletsync::store::CacheEntry;
///
/// // An absent entry always warrants a fetch.
/// assert!(should_fetch::<u32>(None, ALWAYS_REFRESH));
///
/// // An empty entry that is not in flight does too.
/// let entry = CacheEntry::<u32>::new();
/// assert!(should_fetch(Some(&entry), ALWAYS_REFRESH));
/// ```
pub fn should_fetch<T>(entry: Option<&CacheEntry<T>>, threshold: Duration) -> bool {
    let Some(entry) = entry else {
        return true;
    };
    if entry.is_fetching() {
        return false;
    }
    match entry.age() {
        Some(age) if age < threshold => false,
        _ => true,
    }
}
