//! Process-wide wallet state store.
//!
//! The store is the only shared mutable resource in the crate: the dispatcher
//! writes fetched payloads into it and the bridge (or any other consumer)
//! reads snapshots out of it. It is an explicit owned object — components
//! receive an `Arc<Store>` handle, never ambient static state.
//!
//! Instead of consumers polling on a timer, every mutation bumps a
//! [`tokio::sync::watch`] version counter. [`Store::wait_for`] checks the
//! awaited key immediately, then suspends on change notifications until the
//! data appears, a fetch failure is recorded, or the wait budget elapses —
//! whichever comes first, exactly once.

pub mod entry;
pub mod staleness;

pub use entry::CacheEntry;

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use crate::wallet::{NetworkId, Resource};

/// Identity of a cached resource.
///
/// Balance and asset lookups are scoped per address; the wallet's own address
/// lists are singletons.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    /// The wallet's platform address list.
    PlatformAddresses,
    /// The wallet's asset address list.
    AssetAddresses,
    /// Spendable balance of one platform address.
    Balance(String),
    /// Asset holdings of one asset address.
    Assets(String),
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlatformAddresses => f.write_str("platform-addresses"),
            Self::AssetAddresses => f.write_str("asset-addresses"),
            Self::Balance(address) => write!(f, "balance-{address}"),
            Self::Assets(address) => write!(f, "assets-{address}"),
        }
    }
}

/// Why a [`Store::wait_for`] call resolved without data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WaitError {
    /// The wait budget elapsed before the key was populated.
    #[error("wait for {key} timed out")]
    Timeout { key: ResourceKey },

    /// The underlying fetch failed; carries the upstream error text.
    #[error("{0}")]
    Fetch(String),
}

#[derive(Debug)]
struct State {
    entries: HashMap<ResourceKey, CacheEntry<Resource>>,
    network_id: NetworkId,
    keystore_present: bool,
    passphrase_present: bool,
}

/// Keyed mapping from resource identity to cache entries, plus the handful of
/// wallet-level fields the bridge reads directly (network id and the two
/// authentication presence flags).
///
/// All mutation goes through short critical sections that are never held
/// across an `.await`, so per-key updates are serialized and the
/// at-most-one-in-flight invariant observed by readers holds.
#[derive(Debug)]
pub struct Store {
    inner: RwLock<State>,
    version: watch::Sender<u64>,
}

impl Store {
    /// Creates an empty store for the given network.
    pub fn new(network_id: NetworkId) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            inner: RwLock::new(State {
                entries: HashMap::new(),
                network_id,
                keystore_present: false,
                passphrase_present: false,
            }),
            version,
        }
    }

    fn read<R>(&self, f: impl FnOnce(&State) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }

    // Runs a mutation and wakes every waiter afterwards.
    fn mutate<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let out = {
            let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
            f(&mut guard)
        };
        self.version.send_modify(|v| *v = v.wrapping_add(1));
        out
    }

    /// Returns a snapshot of the entry for `key`, if one exists.
    pub fn get(&self, key: &ResourceKey) -> Option<CacheEntry<Resource>> {
        self.read(|state| state.entries.get(key).cloned())
    }

    /// Marks a fetch as outstanding for `key`, creating the entry on first
    /// use.
    pub fn set_fetching(&self, key: &ResourceKey) {
        self.mutate(|state| {
            state.entries.entry(key.clone()).or_default().mark_fetching();
        });
        debug!(key = %key, "fetch marked in flight");
    }

    /// Records a completed fetch for `key` and wakes waiters.
    pub fn set_data(&self, key: &ResourceKey, data: Resource) {
        self.mutate(|state| {
            state.entries.entry(key.clone()).or_default().complete(data);
        });
        debug!(key = %key, "entry updated");
    }

    /// Records a failed fetch for `key` and wakes waiters, so they surface
    /// the real upstream error instead of running out their timeout.
    pub fn set_error(&self, key: &ResourceKey, error: impl Into<String>) {
        let error = error.into();
        self.mutate(|state| {
            state
                .entries
                .entry(key.clone())
                .or_default()
                .fail(error.clone());
        });
        debug!(key = %key, error = %error, "entry failed");
    }

    /// Clears the in-flight flag for `key` without touching its data. Used
    /// when a dispatched fetch is cancelled.
    pub fn clear_fetching(&self, key: &ResourceKey) {
        self.mutate(|state| {
            if let Some(entry) = state.entries.get_mut(key) {
                entry.abort();
            }
        });
    }

    /// Resets every cache entry. Network id and authentication flags are
    /// untouched; this is the "clear wallet" operation, not a full logout.
    pub fn clear(&self) {
        self.mutate(|state| state.entries.clear());
        debug!("store cleared");
    }

    /// Returns the current network identifier.
    pub fn network_id(&self) -> NetworkId {
        self.read(|state| state.network_id.clone())
    }

    /// Switches the store to a different network.
    pub fn set_network_id(&self, network_id: NetworkId) {
        self.mutate(|state| state.network_id = network_id);
    }

    /// Records whether an encrypted keystore exists on disk.
    pub fn set_keystore_present(&self, present: bool) {
        self.mutate(|state| state.keystore_present = present);
    }

    /// Records whether the keystore passphrase has been decrypted this
    /// session.
    pub fn set_passphrase_present(&self, present: bool) {
        self.mutate(|state| state.passphrase_present = present);
    }

    /// `true` when both authentication material and the decrypted passphrase
    /// are present.
    pub fn is_authenticated(&self) -> bool {
        self.read(|state| state.keystore_present && state.passphrase_present)
    }

    /// Subscribes to the store's version counter. The receiver resolves on
    /// every mutation; consumers re-read the parts of the store they care
    /// about.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Waits until `key` holds data, a fetch failure is recorded for it, or
    /// `budget` elapses.
    ///
    /// The first check happens immediately, so a pre-populated key resolves
    /// without suspending at all. Exactly one outcome is produced per call.
    ///
    /// # Errors
    ///
    /// - [`WaitError::Fetch`] when the entry records a fetch failure while
    ///   still holding no data.
    /// - [`WaitError::Timeout`] when the budget elapses first.
    pub async fn wait_for(
        &self,
        key: &ResourceKey,
        budget: Duration,
    ) -> Result<Resource, WaitError> {
        // Subscribe before the first check so a write between check and
        // suspend is never missed.
        let mut rx = self.version.subscribe();
        let deadline = Instant::now() + budget;

        loop {
            if let Some(entry) = self.get(key) {
                if let Some(data) = entry.data() {
                    return Ok(data.clone());
                }
                if let Some(error) = entry.error() {
                    return Err(WaitError::Fetch(error.to_owned()));
                }
            }
            if tokio::time::timeout_at(deadline, rx.changed())
                .await
                .is_err()
            {
                return Err(WaitError::Timeout { key: key.clone() });
            }
        }
    }

    /// Waits until every key in `keys` holds data, sharing a single budget.
    ///
    /// All-or-nothing: the first recorded fetch failure or the budget
    /// elapsing fails the whole wait.
    ///
    /// # Errors
    ///
    /// Same as [`Store::wait_for`]; the timeout carries the first key that
    /// was still missing.
    pub async fn wait_for_all(
        &self,
        keys: &[ResourceKey],
        budget: Duration,
    ) -> Result<(), WaitError> {
        let mut rx = self.version.subscribe();
        let deadline = Instant::now() + budget;

        loop {
            let mut missing = None;
            for key in keys {
                match self.get(key) {
                    Some(entry) if entry.data().is_some() => {}
                    Some(entry) if entry.error().is_some() => {
                        let error = entry.error().unwrap_or_default().to_owned();
                        return Err(WaitError::Fetch(error));
                    }
                    _ => {
                        missing.get_or_insert_with(|| key.clone());
                    }
                }
            }
            let Some(key) = missing else {
                return Ok(());
            };
            if tokio::time::timeout_at(deadline, rx.changed())
                .await
                .is_err()
            {
                return Err(WaitError::Timeout { key });
            }
        }
    }
}
