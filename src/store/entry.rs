//! The per-key unit of cached state.

use std::time::Duration;

use tokio::time::Instant;

/// A single keyed cache record: the last fetched payload, a fetch-in-progress
/// flag, the time of the last successful fetch, and the last fetch failure.
///
/// Entries move through a small lifecycle: created empty on first dispatch,
/// marked fetching when a load starts, completed or failed when it finishes,
/// and aborted when a cancelled load is torn down. A completed entry keeps its
/// payload until the whole store is cleared.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    data: Option<T>,
    is_fetching: bool,
    updated_at: Option<Instant>,
    error: Option<String>,
}

// Manual impl — no `T: Default` bound.
impl<T> Default for CacheEntry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CacheEntry<T> {
    /// Creates an empty entry: no data, not fetching, never updated.
    pub fn new() -> Self {
        Self {
            data: None,
            is_fetching: false,
            updated_at: None,
            error: None,
        }
    }

    /// Returns the last successfully fetched payload, if any.
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    /// Returns `true` while a fetch is outstanding for this key.
    pub fn is_fetching(&self) -> bool {
        self.is_fetching
    }

    /// Returns the time of the last successful fetch.
    pub fn updated_at(&self) -> Option<Instant> {
        self.updated_at
    }

    /// Returns the recorded failure of the most recent fetch, if it failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Time since the last successful fetch. `None` if never fetched.
    pub fn age(&self) -> Option<Duration> {
        self.updated_at.map(|at| at.elapsed())
    }

    /// Marks a fetch as outstanding. Clears any stale failure record so the
    /// new attempt starts from a clean slate.
    pub(crate) fn mark_fetching(&mut self) {
        self.is_fetching = true;
        self.error = None;
    }

    /// Records a successful fetch: stores the payload, stamps the update
    /// time, and clears the in-flight flag.
    pub(crate) fn complete(&mut self, data: T) {
        self.data = Some(data);
        self.is_fetching = false;
        self.updated_at = Some(Instant::now());
        self.error = None;
    }

    /// Records a failed fetch. Existing data (possibly stale) is kept so
    /// consumers can still render something while the error is surfaced.
    pub(crate) fn fail(&mut self, error: String) {
        self.is_fetching = false;
        self.error = Some(error);
    }

    /// Tears down a cancelled fetch: only the in-flight flag is cleared, so
    /// the key never wedges in a perpetual fetching state.
    pub(crate) fn abort(&mut self) {
        self.is_fetching = false;
    }
}
