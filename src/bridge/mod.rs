//! Cross-context bridge — translates page-script requests into
//! store-mediated fetch + wait + reply.
//!
//! Each request carries an action kind and a flat parameter map; each reply
//! is a single envelope whose `status` field doubles as the error channel:
//! `{"status":"success","data":…}` or `{"status":"<error text>"}`.
//!
//! State machine per request:
//!
//! 1. Parse the kind. Unknown kinds follow [`UnknownKindPolicy`].
//! 2. Validate params — a missing `address` fails with `invalid params`
//!    before any auth check or fetch.
//! 3. Authorization (auth-required kinds): both authentication presence
//!    flags must be set in the store, else `Not authorized` and no fetch is
//!    attempted.
//! 4. Warm-up (auth-required kinds): the wallet's address lists are loaded
//!    once and awaited under a shared budget; a timeout cancels the fetches
//!    and fails the whole request — no partial reply.
//! 5. Action dispatch: direct store reads where the data is already at hand,
//!    keyed fetch + wait for per-address lookups.
//!
//! Timeout texts stay distinguishable per wait purpose so a caller can tell
//! which stage starved.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::fetch::Dispatcher;
use crate::store::{ResourceKey, Store, WaitError, staleness};

/// Envelope status for a successful reply.
const STATUS_SUCCESS: &str = "success";

/// Fixed failure texts. The wire literals are load-bearing: page scripts
/// match on them.
const NOT_AUTHORIZED: &str = "Not authorized";
const INVALID_PARAMS: &str = "invalid params";
const UNKNOWN_ACTION: &str = "unknown action";
const LOAD_WALLET_TIMEOUT: &str = "loadWallet timeout";
const LOAD_QUARK_TIMEOUT: &str = "loadQuark timeout";
const LOAD_ASSET_TIMEOUT: &str = "loadAsset timeout";

/// The request kinds the bridge understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    GetNetworkId,
    IsAuthenticated,
    GetAvailableBalance,
    GetAvailableAssets,
    GetPlatformAddresses,
    GetAssetAddresses,
}

impl ActionKind {
    /// Returns the wire name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GetNetworkId => "get-network-id",
            Self::IsAuthenticated => "is-authenticated",
            Self::GetAvailableBalance => "get-available-balance",
            Self::GetAvailableAssets => "get-available-assets",
            Self::GetPlatformAddresses => "get-platform-addresses",
            Self::GetAssetAddresses => "get-asset-addresses",
        }
    }

    /// `true` when the kind exposes wallet contents and requires an
    /// authenticated session.
    pub fn requires_auth(self) -> bool {
        matches!(
            self,
            Self::GetAvailableBalance
                | Self::GetAvailableAssets
                | Self::GetPlatformAddresses
                | Self::GetAssetAddresses
        )
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "get-network-id" => Ok(Self::GetNetworkId),
            "is-authenticated" => Ok(Self::IsAuthenticated),
            "get-available-balance" => Ok(Self::GetAvailableBalance),
            "get-available-assets" => Ok(Self::GetAvailableAssets),
            "get-platform-addresses" => Ok(Self::GetPlatformAddresses),
            "get-asset-addresses" => Ok(Self::GetAssetAddresses),
            _ => Err(()),
        }
    }
}

/// An incoming request from the page-script side of the bridge.
///
/// # Examples
///
/// ```
/// use walletsync::bridge::BridgeRequest;
///
/// let request = BridgeRequest::new("get-available-balance")
///     .param("address", "cccq9h7vnl68");
/// assert_eq!(request.address(), Some("cccq9h7vnl68"));
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeRequest {
    /// Wire name of the requested action.
    pub kind: String,
    /// Flat parameter map; currently only `address` is meaningful.
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl BridgeRequest {
    /// Creates a request with no parameters.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Map::new(),
        }
    }

    /// Adds a string parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), Value::String(value.into()));
        self
    }

    /// Returns the `address` parameter when present and a string.
    pub fn address(&self) -> Option<&str> {
        self.params.get("address").and_then(Value::as_str)
    }
}

/// The flat reply envelope sent back through the bridge's response channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// `"success"`, or the failure text.
    pub status: String,
    /// Present on success only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    /// Wraps a payload in a success envelope.
    pub fn success(data: impl Serialize) -> Self {
        Self {
            status: STATUS_SUCCESS.to_owned(),
            data: Some(serde_json::to_value(data).unwrap_or(Value::Null)),
        }
    }

    /// Builds a failure envelope carrying `reason` in the status field.
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            status: reason.into(),
            data: None,
        }
    }

    /// `true` when the status is `"success"`.
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

/// What to do with a request whose kind matches no known action.
///
/// The original extension silently dropped such requests, which a caller
/// observes as an indefinite hang. Strict mode replies with an explicit
/// failure instead and is the default; permissive mode preserves the drop
/// for callers that depend on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownKindPolicy {
    /// Reply `{status:"unknown action"}`.
    #[default]
    Strict,
    /// Send no reply at all.
    Drop,
}

/// Tunable budgets and policies for the bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Overall budget for the wallet address warm-up.
    pub wallet_load_budget: Duration,
    /// Budget for a single keyed resource wait.
    pub resource_budget: Duration,
    /// Staleness threshold for balance lookups.
    pub balance_refresh: Duration,
    /// Staleness threshold for per-address asset lookups.
    pub asset_refresh: Duration,
    /// Handling of unknown request kinds.
    pub unknown_kind: UnknownKindPolicy,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            wallet_load_budget: Duration::from_secs(15),
            resource_budget: Duration::from_secs(15),
            balance_refresh: staleness::BALANCE_REFRESH,
            asset_refresh: staleness::ALWAYS_REFRESH,
            unknown_kind: UnknownKindPolicy::default(),
        }
    }
}

/// Receives requests from a separate execution context, consults the store,
/// triggers fetches as needed, and replies with an [`Envelope`].
///
/// Cheap to clone; clones share the store and dispatcher.
#[derive(Clone)]
pub struct Bridge {
    store: Arc<Store>,
    dispatcher: Dispatcher,
    config: BridgeConfig,
}

impl Bridge {
    /// Creates a bridge with the default [`BridgeConfig`].
    pub fn new(store: Arc<Store>, dispatcher: Dispatcher) -> Self {
        Self::with_config(store, dispatcher, BridgeConfig::default())
    }

    /// Creates a bridge with an explicit configuration.
    pub fn with_config(store: Arc<Store>, dispatcher: Dispatcher, config: BridgeConfig) -> Self {
        Self {
            store,
            dispatcher,
            config,
        }
    }

    /// Handles one request and produces the reply envelope.
    ///
    /// Returns `None` only for unknown kinds under
    /// [`UnknownKindPolicy::Drop`]; every other path replies.
    pub async fn handle(&self, request: BridgeRequest) -> Option<Envelope> {
        let Ok(kind) = request.kind.parse::<ActionKind>() else {
            return match self.config.unknown_kind {
                UnknownKindPolicy::Strict => {
                    warn!(kind = %request.kind, "unknown bridge action");
                    Some(Envelope::failure(UNKNOWN_ACTION))
                }
                UnknownKindPolicy::Drop => {
                    warn!(kind = %request.kind, "dropping unknown bridge action");
                    None
                }
            };
        };

        debug!(kind = %kind, "handling bridge request");

        // Param validation comes before the auth check: a malformed request
        // is rejected the same way whether or not the wallet is unlocked.
        let keyed = match kind {
            ActionKind::GetAvailableBalance => {
                let Some(address) = request.address() else {
                    return Some(Envelope::failure(INVALID_PARAMS));
                };
                Some((
                    ResourceKey::Balance(address.to_owned()),
                    self.config.balance_refresh,
                    LOAD_QUARK_TIMEOUT,
                ))
            }
            ActionKind::GetAvailableAssets => {
                let Some(address) = request.address() else {
                    return Some(Envelope::failure(INVALID_PARAMS));
                };
                Some((
                    ResourceKey::Assets(address.to_owned()),
                    self.config.asset_refresh,
                    LOAD_ASSET_TIMEOUT,
                ))
            }
            _ => None,
        };

        if kind.requires_auth() {
            if !self.store.is_authenticated() {
                debug!(kind = %kind, "rejecting unauthenticated request");
                return Some(Envelope::failure(NOT_AUTHORIZED));
            }
            if let Err(envelope) = self.load_wallet().await {
                return Some(envelope);
            }
        }

        let envelope = match keyed {
            Some((key, threshold, timeout_text)) => {
                self.load_resource(key, threshold, timeout_text).await
            }
            None => match kind {
                ActionKind::GetNetworkId => Envelope::success(self.store.network_id()),
                ActionKind::IsAuthenticated => Envelope::success(self.store.is_authenticated()),
                ActionKind::GetPlatformAddresses => {
                    self.read_cached(&ResourceKey::PlatformAddresses)
                }
                ActionKind::GetAssetAddresses => self.read_cached(&ResourceKey::AssetAddresses),
                // Address-scoped kinds always take the keyed path above.
                ActionKind::GetAvailableBalance | ActionKind::GetAvailableAssets => {
                    Envelope::failure(INVALID_PARAMS)
                }
            },
        };

        Some(envelope)
    }

    // Warm-up: ensure the wallet's address lists are loaded, all-or-nothing
    // under one shared budget.
    async fn load_wallet(&self) -> Result<(), Envelope> {
        let keys = [ResourceKey::PlatformAddresses, ResourceKey::AssetAddresses];
        for key in &keys {
            self.dispatcher
                .dispatch_if_stale(key.clone(), staleness::IF_ABSENT);
        }

        match self
            .store
            .wait_for_all(&keys, self.config.wallet_load_budget)
            .await
        {
            Ok(()) => Ok(()),
            Err(WaitError::Timeout { key }) => {
                warn!(key = %key, "wallet warm-up timed out");
                for key in &keys {
                    self.dispatcher.cancel(key);
                }
                Err(Envelope::failure(LOAD_WALLET_TIMEOUT))
            }
            Err(WaitError::Fetch(error)) => {
                for key in &keys {
                    self.dispatcher.cancel(key);
                }
                Err(Envelope::failure(error))
            }
        }
    }

    // Keyed fetch + wait. A timed-out wait cancels its dispatch so no
    // orphaned fetch can land a stale write later.
    async fn load_resource(
        &self,
        key: ResourceKey,
        threshold: Duration,
        timeout_text: &str,
    ) -> Envelope {
        self.dispatcher.dispatch_if_stale(key.clone(), threshold);

        match self.store.wait_for(&key, self.config.resource_budget).await {
            Ok(resource) => Envelope::success(resource),
            Err(WaitError::Timeout { .. }) => {
                warn!(key = %key, "resource wait timed out");
                self.dispatcher.cancel(&key);
                Envelope::failure(timeout_text)
            }
            Err(WaitError::Fetch(error)) => Envelope::failure(error),
        }
    }

    // Direct store read; serializes to `null` when the key holds nothing,
    // mirroring a plain state lookup.
    fn read_cached(&self, key: &ResourceKey) -> Envelope {
        let data = self.store.get(key).and_then(|entry| entry.data().cloned());
        Envelope::success(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{DataSource, FetchError, FetchFuture};
    use crate::wallet::{
        AddressKind, Balance, NetworkId, OwnedAsset, Resource, WalletAddress,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Test double with call counters. Balance/asset calls can be gated or
    /// made to fail; address lists resolve immediately.
    struct FakeSource {
        calls: AtomicUsize,
        gate_accounts: Option<Arc<Notify>>,
        gate_addresses: bool,
        fail_balance: bool,
    }

    impl FakeSource {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate_accounts: None,
                gate_addresses: false,
                fail_balance: false,
            })
        }

        fn gated() -> (Arc<Self>, Arc<Notify>) {
            let gate = Arc::new(Notify::new());
            let source = Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate_accounts: Some(Arc::clone(&gate)),
                gate_addresses: false,
                fail_balance: false,
            });
            (source, gate)
        }

        fn stuck_addresses() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate_accounts: None,
                gate_addresses: true,
                fail_balance: false,
            })
        }

        fn failing_balance() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate_accounts: None,
                gate_addresses: false,
                fail_balance: true,
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn addresses(kind: AddressKind) -> Vec<WalletAddress> {
            vec![WalletAddress {
                name: "primary".to_owned(),
                kind,
                address: match kind {
                    AddressKind::Platform => "cccq9platform".to_owned(),
                    AddressKind::Asset => "ccaq9asset".to_owned(),
                },
            }]
        }
    }

    impl DataSource for FakeSource {
        fn platform_addresses(&self) -> FetchFuture<Vec<WalletAddress>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.gate_addresses {
                return Box::pin(std::future::pending());
            }
            Box::pin(async { Ok(Self::addresses(AddressKind::Platform)) })
        }

        fn asset_addresses(&self) -> FetchFuture<Vec<WalletAddress>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.gate_addresses {
                return Box::pin(std::future::pending());
            }
            Box::pin(async { Ok(Self::addresses(AddressKind::Asset)) })
        }

        fn available_balance(&self, address: &str) -> FetchFuture<Balance> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_balance {
                let address = address.to_owned();
                return Box::pin(async move {
                    Err(FetchError::Upstream(format!("indexer 502 for {address}")))
                });
            }
            match &self.gate_accounts {
                Some(gate) => {
                    let gate = Arc::clone(gate);
                    Box::pin(async move {
                        gate.notified().await;
                        Ok(Balance { quark: 1000 })
                    })
                }
                None => Box::pin(async { Ok(Balance { quark: 1000 }) }),
            }
        }

        fn available_assets(&self, _address: &str) -> FetchFuture<Vec<OwnedAsset>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let assets = vec![OwnedAsset {
                asset_type: "0xabc".to_owned(),
                quantity: 5,
            }];
            match &self.gate_accounts {
                Some(gate) => {
                    let gate = Arc::clone(gate);
                    Box::pin(async move {
                        gate.notified().await;
                        Ok(assets)
                    })
                }
                None => Box::pin(async move { Ok(assets) }),
            }
        }
    }

    fn authenticated_store() -> Arc<Store> {
        let store = Arc::new(Store::new(NetworkId::from("tc")));
        store.set_keystore_present(true);
        store.set_passphrase_present(true);
        store
    }

    fn bridge_with(store: Arc<Store>, source: Arc<FakeSource>) -> Bridge {
        let dispatcher = Dispatcher::new(Arc::clone(&store), source);
        Bridge::new(store, dispatcher)
    }

    fn prepopulate_addresses(store: &Store) {
        store.set_data(
            &ResourceKey::PlatformAddresses,
            Resource::Addresses(FakeSource::addresses(AddressKind::Platform)),
        );
        store.set_data(
            &ResourceKey::AssetAddresses,
            Resource::Addresses(FakeSource::addresses(AddressKind::Asset)),
        );
    }

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    // ── No-auth reads ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn network_id_needs_no_auth() {
        let store = Arc::new(Store::new(NetworkId::from("tc")));
        let bridge = bridge_with(Arc::clone(&store), FakeSource::new());

        let reply = bridge
            .handle(BridgeRequest::new("get-network-id"))
            .await
            .unwrap();
        assert!(reply.is_success());
        assert_eq!(reply.data, Some(Value::String("tc".to_owned())));
    }

    #[tokio::test]
    async fn is_authenticated_reflects_store_flags() {
        let store = Arc::new(Store::new(NetworkId::from("tc")));
        let bridge = bridge_with(Arc::clone(&store), FakeSource::new());

        let reply = bridge
            .handle(BridgeRequest::new("is-authenticated"))
            .await
            .unwrap();
        assert_eq!(reply.data, Some(Value::Bool(false)));

        store.set_keystore_present(true);
        store.set_passphrase_present(true);

        let reply = bridge
            .handle(BridgeRequest::new("is-authenticated"))
            .await
            .unwrap();
        assert_eq!(reply.data, Some(Value::Bool(true)));
    }

    // ── Authorization & validation ────────────────────────────────────────────

    #[tokio::test]
    async fn unauthorized_request_never_fetches() {
        let store = Arc::new(Store::new(NetworkId::from("tc")));
        let source = FakeSource::new();
        let bridge = bridge_with(store, Arc::clone(&source));

        let reply = bridge
            .handle(BridgeRequest::new("get-available-balance").param("address", "addrA"))
            .await
            .unwrap();

        assert_eq!(reply, Envelope::failure(NOT_AUTHORIZED));
        assert_eq!(source.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_address_fails_before_auth_and_fetch() {
        // Not authenticated on purpose: validation must win over auth.
        let store = Arc::new(Store::new(NetworkId::from("tc")));
        let source = FakeSource::new();
        let bridge = bridge_with(store, Arc::clone(&source));

        for kind in ["get-available-balance", "get-available-assets"] {
            let reply = bridge.handle(BridgeRequest::new(kind)).await.unwrap();
            assert_eq!(reply, Envelope::failure(INVALID_PARAMS));
        }
        assert_eq!(source.call_count(), 0);
    }

    #[tokio::test]
    async fn non_string_address_is_invalid() {
        let store = authenticated_store();
        let source = FakeSource::new();
        let bridge = bridge_with(store, Arc::clone(&source));

        let mut request = BridgeRequest::new("get-available-assets");
        request.params.insert("address".to_owned(), Value::from(42));

        let reply = bridge.handle(request).await.unwrap();
        assert_eq!(reply, Envelope::failure(INVALID_PARAMS));
        assert_eq!(source.call_count(), 0);
    }

    // ── Unknown kinds ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn unknown_kind_strict_replies_explicitly() {
        let bridge = bridge_with(authenticated_store(), FakeSource::new());

        let reply = bridge
            .handle(BridgeRequest::new("get-parcel-history"))
            .await;
        assert_eq!(reply, Some(Envelope::failure(UNKNOWN_ACTION)));
    }

    #[tokio::test]
    async fn unknown_kind_permissive_drops_silently() {
        let store = authenticated_store();
        let dispatcher = Dispatcher::new(Arc::clone(&store), FakeSource::new());
        let bridge = Bridge::with_config(
            store,
            dispatcher,
            BridgeConfig {
                unknown_kind: UnknownKindPolicy::Drop,
                ..BridgeConfig::default()
            },
        );

        let reply = bridge
            .handle(BridgeRequest::new("get-parcel-history"))
            .await;
        assert_eq!(reply, None);
    }

    // ── Cached fast path ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn prepopulated_assets_resolve_immediately() {
        let store = authenticated_store();
        prepopulate_addresses(&store);
        let assets = vec![OwnedAsset {
            asset_type: "0xabc".to_owned(),
            quantity: 5,
        }];
        store.set_data(
            &ResourceKey::Assets("addrA".to_owned()),
            Resource::Assets(assets.clone()),
        );

        // A source that never resolves proves no wait was needed. The
        // zero-threshold refetch it triggers runs in the background.
        let (source, _gate) = FakeSource::gated();
        let bridge = bridge_with(store, source);

        let reply = bridge
            .handle(BridgeRequest::new("get-available-assets").param("address", "addrA"))
            .await
            .unwrap();

        assert!(reply.is_success());
        assert_eq!(reply.data, Some(serde_json::to_value(&assets).unwrap()));
    }

    #[tokio::test]
    async fn address_lists_are_read_from_the_store() {
        let store = authenticated_store();
        let source = FakeSource::new();
        let bridge = bridge_with(Arc::clone(&store), Arc::clone(&source));

        let reply = bridge
            .handle(BridgeRequest::new("get-platform-addresses"))
            .await
            .unwrap();

        assert!(reply.is_success());
        let expected =
            serde_json::to_value(FakeSource::addresses(AddressKind::Platform)).unwrap();
        assert_eq!(reply.data, Some(expected));

        // Warm-up fetched both lists exactly once; a second request reuses
        // the cache.
        let before = source.call_count();
        let reply = bridge
            .handle(BridgeRequest::new("get-asset-addresses"))
            .await
            .unwrap();
        assert!(reply.is_success());
        assert_eq!(source.call_count(), before);
    }

    // ── Fetch-then-wait path ──────────────────────────────────────────────────

    #[tokio::test]
    async fn empty_store_dispatches_and_resolves_on_completion() {
        let store = authenticated_store();
        prepopulate_addresses(&store);
        let (source, gate) = FakeSource::gated();
        let bridge = bridge_with(Arc::clone(&store), source);

        let pending = {
            let bridge = bridge.clone();
            tokio::spawn(async move {
                bridge
                    .handle(
                        BridgeRequest::new("get-available-assets").param("address", "addrA"),
                    )
                    .await
            })
        };

        settle().await;
        let key = ResourceKey::Assets("addrA".to_owned());
        assert!(store.get(&key).unwrap().is_fetching());

        gate.notify_one();
        let reply = pending.await.unwrap().unwrap();

        assert!(reply.is_success());
        let entry = store.get(&key).unwrap();
        assert!(!entry.is_fetching());
        assert_eq!(reply.data, Some(serde_json::to_value(entry.data()).unwrap()));
    }

    #[tokio::test]
    async fn balance_resolves_with_fetched_value() {
        let store = authenticated_store();
        prepopulate_addresses(&store);
        let bridge = bridge_with(store, FakeSource::new());

        let reply = bridge
            .handle(BridgeRequest::new("get-available-balance").param("address", "addrA"))
            .await
            .unwrap();

        assert!(reply.is_success());
        assert_eq!(reply.data, Some(serde_json::json!({ "quark": 1000 })));
    }

    // ── Timeouts & error threading ────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn wallet_warmup_timeout_fails_whole_request_and_cancels() {
        let store = authenticated_store();
        let source = FakeSource::stuck_addresses();
        let bridge = bridge_with(Arc::clone(&store), source);

        let reply = bridge
            .handle(BridgeRequest::new("get-platform-addresses"))
            .await
            .unwrap();

        assert_eq!(reply, Envelope::failure(LOAD_WALLET_TIMEOUT));

        settle().await;
        for key in [ResourceKey::PlatformAddresses, ResourceKey::AssetAddresses] {
            assert!(!store.get(&key).unwrap().is_fetching());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn balance_timeout_uses_its_own_text() {
        let store = authenticated_store();
        prepopulate_addresses(&store);
        let (source, _gate) = FakeSource::gated();
        let bridge = bridge_with(Arc::clone(&store), source);

        let reply = bridge
            .handle(BridgeRequest::new("get-available-balance").param("address", "addrA"))
            .await
            .unwrap();

        assert_eq!(reply, Envelope::failure(LOAD_QUARK_TIMEOUT));

        settle().await;
        let key = ResourceKey::Balance("addrA".to_owned());
        assert!(!store.get(&key).unwrap().is_fetching());
    }

    #[tokio::test(start_paused = true)]
    async fn assets_timeout_uses_its_own_text() {
        let store = authenticated_store();
        prepopulate_addresses(&store);
        let (source, _gate) = FakeSource::gated();
        let bridge = bridge_with(store, source);

        let reply = bridge
            .handle(BridgeRequest::new("get-available-assets").param("address", "addrA"))
            .await
            .unwrap();

        assert_eq!(reply, Envelope::failure(LOAD_ASSET_TIMEOUT));
    }

    #[tokio::test]
    async fn fetch_failure_surfaces_upstream_error() {
        let store = authenticated_store();
        prepopulate_addresses(&store);
        let bridge = bridge_with(store, FakeSource::failing_balance());

        let reply = bridge
            .handle(BridgeRequest::new("get-available-balance").param("address", "addrA"))
            .await
            .unwrap();

        assert_eq!(
            reply,
            Envelope::failure("upstream request failed: indexer 502 for addrA")
        );
    }

    // ── Envelope wire shape ───────────────────────────────────────────────────

    #[test]
    fn envelope_wire_shapes() {
        let ok = Envelope::success(Balance { quark: 3 });
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            serde_json::json!({ "status": "success", "data": { "quark": 3 } })
        );

        let fail = Envelope::failure(NOT_AUTHORIZED);
        assert_eq!(
            serde_json::to_value(&fail).unwrap(),
            serde_json::json!({ "status": "Not authorized" })
        );
    }

    #[test]
    fn request_deserializes_from_wire_json() {
        let request: BridgeRequest = serde_json::from_value(serde_json::json!({
            "kind": "get-available-balance",
            "params": { "address": "addrA" }
        }))
        .unwrap();
        assert_eq!(request.kind, "get-available-balance");
        assert_eq!(request.address(), Some("addrA"));

        let bare: BridgeRequest =
            serde_json::from_value(serde_json::json!({ "kind": "get-network-id" })).unwrap();
        assert!(bare.params.is_empty());
    }
}
