//! Fetch dispatch — asynchronous loads from the external data source into
//! the store.
//!
//! [`DataSource`] is the seam to the outside world (indexer, key storage).
//! [`Dispatcher`] owns the fetch lifecycle for each resource key: it marks
//! the entry in flight synchronously, runs the load on a spawned task, and
//! writes the outcome back into the store. At most one fetch is ever in
//! flight per key, and an in-flight fetch can be cancelled so a timed-out
//! wait leaves neither orphaned work nor a stale late store write.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::store::{ResourceKey, Store, staleness};
use crate::wallet::{Balance, OwnedAsset, Resource, WalletAddress};

/// Errors produced by the external data source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The upstream call failed (network error, indexer rejection, …).
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// The requested address is not known to the data source.
    #[error("unknown address: {0}")]
    UnknownAddress(String),
}

/// Boxed future returned by [`DataSource`] methods.
pub type FetchFuture<T> = Pin<Box<dyn Future<Output = Result<T, FetchError>> + Send + 'static>>;

/// External collaborators the wallet synchronizes against.
///
/// Implementations talk to the chain indexer and the wallet's key storage;
/// this crate only consumes the interface. All methods return boxed futures
/// so implementations stay object-safe and can be shared as
/// `Arc<dyn DataSource>` across spawned tasks.
pub trait DataSource: Send + Sync {
    /// The wallet's platform address list.
    fn platform_addresses(&self) -> FetchFuture<Vec<WalletAddress>>;

    /// The wallet's asset address list.
    fn asset_addresses(&self) -> FetchFuture<Vec<WalletAddress>>;

    /// Spendable balance of one platform address.
    fn available_balance(&self, address: &str) -> FetchFuture<Balance>;

    /// Asset holdings of one asset address.
    fn available_assets(&self, address: &str) -> FetchFuture<Vec<OwnedAsset>>;
}

/// Registry slot for one in-flight fetch. The generation ties the slot to
/// the exact dispatch that created it: a cancelled task must never tear down
/// a newer flight that reused its key.
struct Flight {
    generation: u64,
    cancel: oneshot::Sender<()>,
}

/// Issues asynchronous fetches and funnels their outcomes into the store.
///
/// Cheap to clone; all clones share the same in-flight registry, which is
/// what enforces the at-most-one-fetch-per-key invariant.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<Store>,
    source: Arc<dyn DataSource>,
    in_flight: Arc<Mutex<HashMap<ResourceKey, Flight>>>,
    generation: Arc<AtomicU64>,
}

impl Dispatcher {
    /// Creates a dispatcher writing into `store` and reading from `source`.
    pub fn new(store: Arc<Store>, source: Arc<dyn DataSource>) -> Self {
        Self {
            store,
            source,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, HashMap<ResourceKey, Flight>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Starts a fetch for `key` unless one is already in flight.
    ///
    /// The entry is marked fetching synchronously, before this returns; the
    /// load itself runs on a spawned task. On completion the payload is
    /// written via [`Store::set_data`]; on failure the error is recorded via
    /// [`Store::set_error`]. Either way the in-flight flag is cleared, so a
    /// key can never wedge in a perpetual fetching state.
    ///
    /// Returns `true` when a fetch was actually started.
    pub fn dispatch(&self, key: ResourceKey) -> bool {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        {
            let mut registry = self.registry();
            if registry.contains_key(&key) {
                debug!(key = %key, "fetch already in flight");
                return false;
            }
            registry.insert(
                key.clone(),
                Flight {
                    generation,
                    cancel: cancel_tx,
                },
            );
        }

        self.store.set_fetching(&key);
        debug!(key = %key, "dispatching fetch");

        let fut = self.load(&key);
        let store = Arc::clone(&self.store);
        let in_flight = Arc::clone(&self.in_flight);
        let task_key = key;
        tokio::spawn(async move {
            tokio::select! {
                // Biased: a cancel signaled before this task first runs must
                // win even over an instantly-ready load.
                biased;

                // `cancel` already cleared the flag and vacated the slot;
                // touching either here could tear down a newer flight that
                // reused this key.
                _ = cancel_rx => {
                    debug!(key = %task_key, "fetch cancelled");
                }
                result = fut => {
                    match result {
                        Ok(resource) => store.set_data(&task_key, resource),
                        Err(e) => {
                            warn!(key = %task_key, error = %e, "fetch failed");
                            store.set_error(&task_key, e.to_string());
                        }
                    }
                    let mut registry = in_flight.lock().unwrap_or_else(|e| e.into_inner());
                    // Vacate only our own slot. A concurrent cancel may have
                    // already replaced it with a newer flight's.
                    if registry
                        .get(&task_key)
                        .is_some_and(|flight| flight.generation == generation)
                    {
                        registry.remove(&task_key);
                    }
                }
            }
        });

        true
    }

    /// Consults the staleness gate and dispatches only when it says so.
    ///
    /// Returns `true` when a fetch was started.
    pub fn dispatch_if_stale(&self, key: ResourceKey, threshold: Duration) -> bool {
        let entry = self.store.get(&key);
        if !staleness::should_fetch(entry.as_ref(), threshold) {
            return false;
        }
        self.dispatch(key)
    }

    /// Cancels the in-flight fetch for `key`, if any.
    ///
    /// The slot is vacated and the entry's in-flight flag cleared here,
    /// synchronously, so the key is immediately re-dispatchable; the
    /// cancelled task itself writes nothing. No stale late result can land
    /// in the store.
    pub fn cancel(&self, key: &ResourceKey) {
        if let Some(flight) = self.registry().remove(key) {
            let _ = flight.cancel.send(());
            self.store.clear_fetching(key);
        }
    }

    // Builds the boxed load future matching a resource key to its source call.
    fn load(&self, key: &ResourceKey) -> FetchFuture<Resource> {
        match key {
            ResourceKey::PlatformAddresses => {
                let fut = self.source.platform_addresses();
                Box::pin(async move { fut.await.map(Resource::Addresses) })
            }
            ResourceKey::AssetAddresses => {
                let fut = self.source.asset_addresses();
                Box::pin(async move { fut.await.map(Resource::Addresses) })
            }
            ResourceKey::Balance(address) => {
                let fut = self.source.available_balance(address);
                Box::pin(async move { fut.await.map(Resource::Balance) })
            }
            ResourceKey::Assets(address) => {
                let fut = self.source.available_assets(address);
                Box::pin(async move { fut.await.map(Resource::Assets) })
            }
        }
    }
}
